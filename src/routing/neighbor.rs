//! Established neighbors as seen by the protocol engine.

use std::collections::BTreeMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use crate::core::NeighborId;

/// Identifies one session object.
///
/// A neighbor that reconnects gets a new token, so failures reported by a
/// superseded session can be told apart from failures of the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionToken(u64);

impl SessionToken {
    /// Wrap a raw token value.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outcome of checking an update's sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceCheck {
    /// Newer than anything accepted so far; now recorded.
    Accepted,
    /// Duplicate or reordered.
    Stale {
        /// Highest sequence accepted so far.
        last: u64,
    },
    /// No established session with the sender.
    UnknownSender,
}

/// One established neighbor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Neighbor {
    /// Identifier supplied by the peer in its handshake.
    pub id: NeighborId,
    /// Session that registered this neighbor.
    pub token: SessionToken,
    /// Address the control connection came from (also the forwarding next hop).
    pub addr: IpAddr,
    /// Port the peer listens on for update datagrams.
    pub udp_port: u16,
    /// Last keepalive received.
    pub last_hello: Instant,
    /// Highest update sequence accepted, `None` before the first.
    pub last_sequence: Option<u64>,
}

impl Neighbor {
    /// A freshly established neighbor.
    pub fn new(
        id: NeighborId,
        token: SessionToken,
        addr: IpAddr,
        udp_port: u16,
        now: Instant,
    ) -> Self {
        Self {
            id,
            token,
            addr,
            udp_port,
            last_hello: now,
            last_sequence: None,
        }
    }

    /// Where update datagrams for this neighbor go.
    pub fn update_addr(&self) -> SocketAddr {
        SocketAddr::new(self.addr, self.udp_port)
    }

    /// Whether the neighbor has been silent for longer than `dead_interval`.
    pub fn is_dead(&self, now: Instant, dead_interval: Duration) -> bool {
        now.saturating_duration_since(self.last_hello) > dead_interval
    }
}

/// Mapping neighbor id to [`Neighbor`].
#[derive(Debug, Clone, Default)]
pub struct NeighborSet {
    neighbors: BTreeMap<NeighborId, Neighbor>,
}

impl NeighborSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a neighbor, returning the one it replaces.
    pub fn insert(&mut self, neighbor: Neighbor) -> Option<Neighbor> {
        self.neighbors.insert(neighbor.id.clone(), neighbor)
    }

    /// Remove a neighbor by id.
    pub fn remove(&mut self, id: &NeighborId) -> Option<Neighbor> {
        self.neighbors.remove(id)
    }

    /// Look up a neighbor.
    pub fn get(&self, id: &NeighborId) -> Option<&Neighbor> {
        self.neighbors.get(id)
    }

    /// Whether `id` is established.
    pub fn contains(&self, id: &NeighborId) -> bool {
        self.neighbors.contains_key(id)
    }

    /// Whether `id` is established under `token`.
    pub fn is_current(&self, id: &NeighborId, token: SessionToken) -> bool {
        self.neighbors.get(id).is_some_and(|n| n.token == token)
    }

    /// Record a keepalive. Returns false for unknown neighbors.
    pub fn touch(&mut self, id: &NeighborId, now: Instant) -> bool {
        match self.neighbors.get_mut(id) {
            Some(n) => {
                n.last_hello = now;
                true
            }
            None => false,
        }
    }

    /// Apply the strictly-increasing sequence rule for one sender.
    pub fn check_sequence(&mut self, id: &NeighborId, sequence: u64) -> SequenceCheck {
        let Some(n) = self.neighbors.get_mut(id) else {
            return SequenceCheck::UnknownSender;
        };
        match n.last_sequence {
            Some(last) if sequence <= last => SequenceCheck::Stale { last },
            _ => {
                n.last_sequence = Some(sequence);
                SequenceCheck::Accepted
            }
        }
    }

    /// Neighbors silent for longer than `dead_interval`.
    pub fn dead(&self, now: Instant, dead_interval: Duration) -> Vec<NeighborId> {
        self.neighbors
            .values()
            .filter(|n| n.is_dead(now, dead_interval))
            .map(|n| n.id.clone())
            .collect()
    }

    /// Number of established neighbors.
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    /// Whether no neighbor is established.
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Iterate neighbors in id order.
    pub fn iter(&self) -> impl Iterator<Item = &Neighbor> {
        self.neighbors.values()
    }
}
