//! Top-level router: binds the listeners and runs every task.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::config::RouterConfig;
use crate::context::RouterContext;
use crate::core::{KernelRouteSink, LocalRouteSource, NeighborId, Prefix, RouterError};
use crate::kernel::{KernelQueue, KernelWorker};
use crate::routing::RouteEntry;
use crate::scheduler::Scheduler;
use crate::session::SessionManager;
use crate::transport::UpdateSocket;
use crate::wire::{DvMessage, HandshakeParams};

/// A bound, not yet running router.
///
/// # Example
///
/// ```ignore
/// use dvroute::prelude::*;
///
/// let config = RouterConfigBuilder::new("R1")
///     .control_port(5000)
///     .update_port(5001)
///     .neighbor("10.0.1.2:5000".parse()?)
///     .build();
///
/// let router = Router::bind(config, Arc::new(IpRouteSource::default()), Arc::new(IpRouteSink)).await?;
/// router.run().await?;
/// ```
pub struct Router {
    ctx: Arc<RouterContext>,
    listener: TcpListener,
    socket: UpdateSocket,
    kernel: KernelWorker,
    control_addr: SocketAddr,
    update_addr: SocketAddr,
}

impl Router {
    /// Validate `config`, bind both listeners and seed local routes.
    ///
    /// Failing to enumerate local routes is logged and the router starts
    /// with none.
    pub async fn bind(
        config: RouterConfig,
        source: Arc<dyn LocalRouteSource>,
        sink: Arc<dyn KernelRouteSink>,
    ) -> Result<Self, RouterError> {
        let router_id = config.validate()?;

        let addr = config.control_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RouterError::Bind {
                what: "control listener",
                addr,
                source,
            })?;
        let addr = config.update_addr();
        let socket = UpdateSocket::bind(addr)
            .await
            .map_err(|source| RouterError::Bind {
                what: "update socket",
                addr,
                source,
            })?;
        let control_addr = listener.local_addr()?;
        let update_addr = socket.local_addr()?;

        let (queue, kernel) = KernelQueue::new(sink);
        let local = HandshakeParams {
            originator: router_id.clone(),
            udp_port: update_addr.port(),
        };
        let ctx = Arc::new(RouterContext::new(config, local, socket.sender(), queue));

        let seeded = ctx.seed_local(local_routes(source).await);
        info!(
            router = %router_id,
            control = %control_addr,
            update = %update_addr,
            local_routes = seeded,
            "router bound"
        );

        Ok(Self {
            ctx,
            listener,
            socket,
            kernel,
            control_addr,
            update_addr,
        })
    }

    /// Bound control listener address.
    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    /// Bound update socket address.
    pub fn update_addr(&self) -> SocketAddr {
        self.update_addr
    }

    /// Start every router task in the background.
    pub fn spawn(self) -> RouterHandle {
        let mut tasks = JoinSet::new();
        let sessions = SessionManager::new(Arc::clone(&self.ctx));
        let scheduler = Scheduler::new(Arc::clone(&self.ctx));

        tasks.spawn(named("kernel worker", self.kernel.run()));
        tasks.spawn(named("update receiver", receive_updates(Arc::clone(&self.ctx), self.socket)));
        tasks.spawn(named("accept", sessions.clone().accept_loop(self.listener)));
        for addr in self.ctx.config().neighbors.clone() {
            tasks.spawn(named("dial", sessions.clone().dial_loop(addr)));
        }
        tasks.spawn(named("sweep", scheduler.clone().sweep_loop()));
        tasks.spawn(named("periodic broadcast", scheduler.clone().periodic_loop()));
        tasks.spawn(named("hello", scheduler.clone().hello_loop()));
        tasks.spawn(named("triggered broadcast", scheduler.broadcast_loop()));

        RouterHandle {
            ctx: self.ctx,
            tasks,
            control_addr: self.control_addr,
            update_addr: self.update_addr,
        }
    }

    /// Run until a router task stops, which only happens on a bug.
    pub async fn run(self) -> Result<(), RouterError> {
        self.spawn().wait().await
    }
}

/// A running router.
///
/// Dropping the handle stops every task and closes every control channel.
pub struct RouterHandle {
    ctx: Arc<RouterContext>,
    tasks: JoinSet<&'static str>,
    control_addr: SocketAddr,
    update_addr: SocketAddr,
}

impl RouterHandle {
    /// This router's identifier.
    pub fn router_id(&self) -> &NeighborId {
        self.ctx.router_id()
    }

    /// Bound control listener address.
    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    /// Bound update socket address.
    pub fn update_addr(&self) -> SocketAddr {
        self.update_addr
    }

    /// Snapshot of the routing table.
    pub fn routes(&self) -> Vec<RouteEntry> {
        self.ctx.routes()
    }

    /// Current entry for `prefix`.
    pub fn route(&self, prefix: &Prefix) -> Option<RouteEntry> {
        self.ctx.lock().engine.table().get(prefix).cloned()
    }

    /// Established neighbors.
    pub fn neighbors(&self) -> Vec<NeighborId> {
        self.ctx.neighbor_ids()
    }

    /// Wait for the first task to stop.
    pub async fn wait(mut self) -> Result<(), RouterError> {
        match self.tasks.join_next().await {
            Some(Ok(name)) => Err(RouterError::TaskExited(name.to_string())),
            Some(Err(e)) => Err(RouterError::TaskExited(e.to_string())),
            None => Ok(()),
        }
    }
}

impl Drop for RouterHandle {
    fn drop(&mut self) {
        self.tasks.abort_all();
        self.ctx.close_sessions();
    }
}

async fn named<F: Future<Output = ()>>(name: &'static str, task: F) -> &'static str {
    task.await;
    name
}

async fn local_routes(source: Arc<dyn LocalRouteSource>) -> Vec<Prefix> {
    match tokio::task::spawn_blocking(move || source.enumerate()).await {
        Ok(Ok(prefixes)) => prefixes,
        Ok(Err(e)) => {
            warn!(error = %e, "local route enumeration failed, starting with none");
            Vec::new()
        }
        Err(e) => {
            warn!(error = %e, "local route enumeration panicked, starting with none");
            Vec::new()
        }
    }
}

async fn receive_updates(ctx: Arc<RouterContext>, mut socket: UpdateSocket) {
    loop {
        let (data, from) = match socket.recv_from().await {
            Ok(received) => received,
            Err(e) => {
                debug!(error = %e, "update receive failed");
                continue;
            }
        };
        match DvMessage::decode(data) {
            Ok(message) => {
                ctx.apply_update(&message, from);
            }
            Err(e) => warn!(%from, error = %e, "malformed update dropped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing::RecordingSink;
    use crate::core::{INFINITY, NextHop, NoLocalRoutes, StaticRoutes};
    use crate::router::RouterConfigBuilder;
    use crate::routing::KernelOp;
    use std::time::Duration;

    fn fast(id: &str) -> RouterConfigBuilder {
        RouterConfigBuilder::new(id)
            .bind_ip("127.0.0.1".parse().unwrap())
            .hello_interval(Duration::from_millis(100))
            .dead_interval(Duration::from_millis(500))
            .periodic_interval(Duration::from_secs(1))
            .sweep_interval(Duration::from_millis(50))
            .handshake_timeout(Duration::from_secs(1))
            .redial(Duration::from_millis(200), Duration::from_secs(1))
            .initial_dial_delay(Duration::ZERO)
    }

    fn prefix(s: &str) -> Prefix {
        s.parse().unwrap()
    }

    async fn eventually(mut check: impl FnMut() -> bool) -> bool {
        for _ in 0..100 {
            if check() {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        false
    }

    #[tokio::test]
    async fn test_bind_rejects_invalid_config() {
        let config = RouterConfigBuilder::new("").build();
        let result = Router::bind(config, Arc::new(NoLocalRoutes), Arc::new(RecordingSink::default())).await;
        assert!(matches!(result, Err(RouterError::Config(_))));
    }

    #[tokio::test]
    async fn test_bind_seeds_local_routes() {
        let router = Router::bind(
            fast("A").build(),
            Arc::new(StaticRoutes(vec![prefix("10.0.0.0/24")])),
            Arc::new(RecordingSink::default()),
        )
        .await
        .unwrap();
        assert_ne!(router.control_addr().port(), 0);
        let handle = router.spawn();
        let entry = handle.route(&prefix("10.0.0.0/24")).unwrap();
        assert!(entry.next_hop.is_local());
        assert_eq!(entry.metric, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_two_routers_converge_and_poison_on_disconnect() {
        let a_sink = Arc::new(RecordingSink::default());
        let a = Router::bind(
            fast("A").build(),
            Arc::new(StaticRoutes(vec![prefix("10.0.0.0/24")])),
            a_sink.clone(),
        )
        .await
        .unwrap()
        .spawn();

        let b_sink = Arc::new(RecordingSink::default());
        let b = Router::bind(
            fast("B").neighbor(a.control_addr()).build(),
            Arc::new(StaticRoutes(vec![prefix("10.1.0.0/24")])),
            b_sink.clone(),
        )
        .await
        .unwrap()
        .spawn();

        let a_id = NeighborId::new("A").unwrap();
        let b_id = NeighborId::new("B").unwrap();

        assert!(
            eventually(|| {
                b.route(&prefix("10.0.0.0/24"))
                    .is_some_and(|e| e.metric == 1 && e.next_hop == NextHop::Neighbor(a_id.clone()))
            })
            .await
        );
        assert!(
            eventually(|| {
                a.route(&prefix("10.1.0.0/24"))
                    .is_some_and(|e| e.metric == 1 && e.next_hop == NextHop::Neighbor(b_id.clone()))
            })
            .await
        );
        assert_eq!(a.neighbors(), vec![b_id.clone()]);
        assert_eq!(b.neighbors(), vec![a_id.clone()]);

        let installed = KernelOp::Install {
            prefix: prefix("10.1.0.0/24"),
            via: "127.0.0.1".parse().unwrap(),
            neighbor: b_id.clone(),
        };
        assert!(eventually(|| a_sink.ops.lock().contains(&installed)).await);

        drop(b);

        assert!(
            eventually(|| {
                a.route(&prefix("10.1.0.0/24"))
                    .is_some_and(|e| e.metric == INFINITY)
            })
            .await
        );
        assert!(a.neighbors().is_empty());
        let removed = KernelOp::Remove {
            prefix: prefix("10.1.0.0/24"),
        };
        assert!(eventually(|| a_sink.ops.lock().contains(&removed)).await);
        assert!(a.route(&prefix("10.0.0.0/24")).is_some_and(|e| e.next_hop.is_local()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_inbound_session_from_same_host_does_not_suppress_dial() {
        let spawn = |config: RouterConfig| async move {
            Router::bind(config, Arc::new(NoLocalRoutes), Arc::new(RecordingSink::default()))
                .await
                .unwrap()
                .spawn()
        };

        let b = spawn(fast("B").build()).await;
        let a = spawn(
            fast("A")
                .initial_dial_delay(Duration::from_millis(300))
                .neighbor(b.control_addr())
                .build(),
        )
        .await;
        let c = spawn(fast("C").neighbor(a.control_addr()).build()).await;

        let b_id = NeighborId::new("B").unwrap();
        let c_id = NeighborId::new("C").unwrap();
        assert!(eventually(|| a.neighbors().contains(&c_id)).await);
        assert!(eventually(|| a.neighbors().contains(&b_id)).await);
        let a_id = NeighborId::new("A").unwrap();
        assert!(eventually(|| b.neighbors() == vec![a_id.clone()]).await);
        assert!(eventually(|| c.neighbors() == vec![a_id.clone()]).await);
    }
}
