//! Router configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use crate::core::{
    DEAD_INTERVAL, HANDSHAKE_TIMEOUT, HELLO_INTERVAL, INITIAL_DIAL_DELAY, LOCAL_NEXT_HOP,
    MAX_ID_LEN, MAX_REDIAL_INTERVAL, NeighborId, PERIODIC_INTERVAL, REDIAL_INTERVAL, ROUTE_TTL,
    RouterError, SWEEP_INTERVAL,
};

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Identifier announced to neighbors.
    pub router_id: String,

    /// Address both listeners bind to.
    pub bind_ip: IpAddr,

    /// Control channel (TCP) listen port. 0 picks an ephemeral port.
    pub control_port: u16,

    /// Update channel (UDP) listen port. 0 picks an ephemeral port.
    pub update_port: u16,

    /// Control addresses of neighbors this router dials.
    pub neighbors: Vec<SocketAddr>,

    /// Keepalive cadence.
    pub hello_interval: Duration,

    /// Silence after which a neighbor is removed.
    pub dead_interval: Duration,

    /// Staleness after which a learned route is forgotten.
    pub route_ttl: Duration,

    /// Full-table broadcast cadence.
    pub periodic_interval: Duration,

    /// Timeout scheduler tick.
    pub sweep_interval: Duration,

    /// Limit on one handshake exchange, connect included.
    pub handshake_timeout: Duration,

    /// First re-dial delay after a failed or lost outbound session.
    pub redial_interval: Duration,

    /// Re-dial backoff cap.
    pub max_redial_interval: Duration,

    /// Delay before the first outbound dial.
    pub initial_dial_delay: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            router_id: String::new(),
            bind_ip: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            control_port: 0,
            update_port: 0,
            neighbors: Vec::new(),
            hello_interval: HELLO_INTERVAL,
            dead_interval: DEAD_INTERVAL,
            route_ttl: ROUTE_TTL,
            periodic_interval: PERIODIC_INTERVAL,
            sweep_interval: SWEEP_INTERVAL,
            handshake_timeout: HANDSHAKE_TIMEOUT,
            redial_interval: REDIAL_INTERVAL,
            max_redial_interval: MAX_REDIAL_INTERVAL,
            initial_dial_delay: INITIAL_DIAL_DELAY,
        }
    }
}

impl RouterConfig {
    /// Check the configuration and return the parsed router id.
    pub fn validate(&self) -> Result<NeighborId, RouterError> {
        if self.router_id.is_empty() {
            return Err(RouterError::Config("router id must not be empty".into()));
        }
        if self.router_id.len() > MAX_ID_LEN {
            return Err(RouterError::Config(format!(
                "router id is {} bytes, limit {MAX_ID_LEN}",
                self.router_id.len()
            )));
        }
        if self.router_id == LOCAL_NEXT_HOP {
            return Err(RouterError::Config(format!(
                "router id {LOCAL_NEXT_HOP:?} is reserved"
            )));
        }
        if self.dead_interval <= self.hello_interval {
            return Err(RouterError::Config(format!(
                "dead interval {:?} must exceed hello interval {:?}",
                self.dead_interval, self.hello_interval
            )));
        }
        let tickers = [
            ("hello interval", self.hello_interval),
            ("periodic interval", self.periodic_interval),
            ("sweep interval", self.sweep_interval),
            ("redial interval", self.redial_interval),
        ];
        if let Some((name, _)) = tickers.iter().find(|(_, d)| d.is_zero()) {
            return Err(RouterError::Config(format!("{name} must be non-zero")));
        }
        if self.max_redial_interval < self.redial_interval {
            return Err(RouterError::Config(
                "max redial interval must not be below redial interval".into(),
            ));
        }
        NeighborId::new(self.router_id.as_str()).map_err(|e| RouterError::Config(e.to_string()))
    }

    /// Control listener address.
    pub fn control_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.control_port)
    }

    /// Update listener address.
    pub fn update_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.update_port)
    }
}

/// Builder for [`RouterConfig`].
#[derive(Debug)]
pub struct RouterConfigBuilder {
    config: RouterConfig,
}

impl RouterConfigBuilder {
    /// Create a builder for the router called `router_id`.
    pub fn new(router_id: impl Into<String>) -> Self {
        Self {
            config: RouterConfig {
                router_id: router_id.into(),
                ..RouterConfig::default()
            },
        }
    }

    /// Set the listen address.
    pub fn bind_ip(mut self, ip: IpAddr) -> Self {
        self.config.bind_ip = ip;
        self
    }

    /// Set the control channel port.
    pub fn control_port(mut self, port: u16) -> Self {
        self.config.control_port = port;
        self
    }

    /// Set the update channel port.
    pub fn update_port(mut self, port: u16) -> Self {
        self.config.update_port = port;
        self
    }

    /// Add a neighbor to dial.
    pub fn neighbor(mut self, addr: SocketAddr) -> Self {
        self.config.neighbors.push(addr);
        self
    }

    /// Set all neighbors to dial.
    pub fn neighbors(mut self, addrs: impl IntoIterator<Item = SocketAddr>) -> Self {
        self.config.neighbors = addrs.into_iter().collect();
        self
    }

    /// Set the keepalive cadence.
    pub fn hello_interval(mut self, interval: Duration) -> Self {
        self.config.hello_interval = interval;
        self
    }

    /// Set the neighbor dead interval.
    pub fn dead_interval(mut self, interval: Duration) -> Self {
        self.config.dead_interval = interval;
        self
    }

    /// Set the route staleness window.
    pub fn route_ttl(mut self, ttl: Duration) -> Self {
        self.config.route_ttl = ttl;
        self
    }

    /// Set the periodic broadcast cadence.
    pub fn periodic_interval(mut self, interval: Duration) -> Self {
        self.config.periodic_interval = interval;
        self
    }

    /// Set the scheduler tick.
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Set the handshake timeout.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.config.handshake_timeout = timeout;
        self
    }

    /// Set the re-dial backoff range.
    pub fn redial(mut self, initial: Duration, max: Duration) -> Self {
        self.config.redial_interval = initial;
        self.config.max_redial_interval = max;
        self
    }

    /// Set the delay before the first dial.
    pub fn initial_dial_delay(mut self, delay: Duration) -> Self {
        self.config.initial_dial_delay = delay;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> RouterConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RouterConfigBuilder::new("R1").build();
        assert_eq!(config.hello_interval, Duration::from_secs(5));
        assert_eq!(config.dead_interval, Duration::from_secs(15));
        assert_eq!(config.route_ttl, Duration::from_secs(60));
        assert_eq!(config.periodic_interval, Duration::from_secs(20));
        assert_eq!(config.sweep_interval, Duration::from_secs(1));
        assert_eq!(config.validate().unwrap().as_str(), "R1");
    }

    #[test]
    fn test_builder_sets_fields() {
        let peer: SocketAddr = "10.0.0.2:5000".parse().unwrap();
        let config = RouterConfigBuilder::new("R1")
            .bind_ip("127.0.0.1".parse().unwrap())
            .control_port(5000)
            .update_port(5001)
            .neighbor(peer)
            .hello_interval(Duration::from_millis(100))
            .dead_interval(Duration::from_millis(400))
            .build();
        assert_eq!(config.control_addr(), "127.0.0.1:5000".parse().unwrap());
        assert_eq!(config.update_addr(), "127.0.0.1:5001".parse().unwrap());
        assert_eq!(config.neighbors, vec![peer]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_ids() {
        assert!(RouterConfigBuilder::new("").build().validate().is_err());
        assert!(RouterConfigBuilder::new("-").build().validate().is_err());
        let long = "x".repeat(MAX_ID_LEN + 1);
        assert!(RouterConfigBuilder::new(long).build().validate().is_err());
    }

    #[test]
    fn test_rejects_dead_not_above_hello() {
        let config = RouterConfigBuilder::new("R1")
            .hello_interval(Duration::from_secs(5))
            .dead_interval(Duration::from_secs(5))
            .build();
        assert!(matches!(config.validate(), Err(RouterError::Config(_))));
    }

    #[test]
    fn test_rejects_zero_tick() {
        let config = RouterConfigBuilder::new("R1")
            .sweep_interval(Duration::ZERO)
            .build();
        assert!(config.validate().is_err());
    }
}
