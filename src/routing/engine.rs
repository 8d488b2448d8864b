//! Distance-vector protocol engine.
//!
//! Owns the routing table and the set of established neighbors. Applies
//! incoming updates, builds outgoing ones with split-horizon poison reverse,
//! and reports every forwarding-table change as a [`KernelOp`] for the caller
//! to execute once the engine's lock is released.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::neighbor::{Neighbor, NeighborSet, SequenceCheck, SessionToken};
use super::table::{RouteEntry, RoutingTable};
use crate::core::{INFINITY, NeighborId, Prefix, effective_metric};
use crate::wire::{DvMessage, RouteAdvert};

/// Why a broadcast is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BroadcastReason {
    /// Fixed-cadence refresh.
    Periodic,
    /// Immediate reaction to a topology change.
    Triggered,
}

impl BroadcastReason {
    /// Label for logs.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Periodic => "periodic",
            Self::Triggered => "triggered",
        }
    }
}

/// A forwarding-table mutation decided by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelOp {
    /// Install or replace the route for `prefix`.
    Install {
        /// Destination.
        prefix: Prefix,
        /// Physical address of the next-hop router.
        via: IpAddr,
        /// Router the path was learned from.
        neighbor: NeighborId,
    },
    /// Remove the route for `prefix`.
    Remove {
        /// Destination.
        prefix: Prefix,
    },
}

/// Effect of an accepted update.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Whether any entry changed (a triggered broadcast is due).
    pub changed: bool,
    /// Forwarding-table work to perform.
    pub kernel_ops: Vec<KernelOp>,
}

/// Result of processing an incoming update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessResult {
    /// The update was applied.
    Accepted(UpdateOutcome),
    /// Duplicate or reordered update; nothing was applied.
    Stale {
        /// Highest sequence accepted from the sender.
        last: u64,
    },
    /// Sender has no established session; nothing was applied.
    UnknownSender,
}

impl ProcessResult {
    /// Whether the table changed.
    pub fn changed(&self) -> bool {
        matches!(self, Self::Accepted(outcome) if outcome.changed)
    }

    /// Forwarding-table work resulting from this update.
    pub fn into_kernel_ops(self) -> Vec<KernelOp> {
        match self {
            Self::Accepted(outcome) => outcome.kernel_ops,
            _ => Vec::new(),
        }
    }
}

/// Effect of removing a neighbor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOutcome {
    /// The neighbor that was removed.
    pub neighbor: Neighbor,
    /// Prefixes that were poisoned.
    pub poisoned: Vec<Prefix>,
    /// Forwarding-table work to perform.
    pub kernel_ops: Vec<KernelOp>,
}

/// One update datagram to send.
#[derive(Debug, Clone)]
pub struct OutgoingUpdate {
    /// Destination neighbor.
    pub neighbor: NeighborId,
    /// Destination update-channel address.
    pub dest: SocketAddr,
    /// Message tailored for that neighbor.
    pub message: DvMessage,
}

/// A broadcast snapshot, built under lock and sent without it.
#[derive(Debug, Clone)]
pub struct BroadcastPlan {
    /// Why this broadcast happens.
    pub reason: BroadcastReason,
    /// Sequence number shared by every message of this broadcast.
    pub sequence: u64,
    /// One message per established neighbor.
    pub updates: Vec<OutgoingUpdate>,
}

/// Distance-vector engine state.
#[derive(Debug)]
pub struct DvEngine {
    router_id: NeighborId,
    table: RoutingTable,
    neighbors: NeighborSet,
    sequence: u64,
}

impl DvEngine {
    /// Create an engine for the router called `router_id`.
    pub fn new(router_id: NeighborId) -> Self {
        Self {
            router_id,
            table: RoutingTable::new(),
            neighbors: NeighborSet::new(),
            sequence: 0,
        }
    }

    /// This router's identifier.
    pub fn router_id(&self) -> &NeighborId {
        &self.router_id
    }

    /// The routing table.
    pub fn table(&self) -> &RoutingTable {
        &self.table
    }

    /// Established neighbors.
    pub fn neighbors(&self) -> &NeighborSet {
        &self.neighbors
    }

    /// Sequence number of the most recent broadcast (0 before the first).
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Seed the table with local prefixes.
    pub fn seed_local(&mut self, prefixes: impl IntoIterator<Item = Prefix>, now: Instant) -> usize {
        let added = self.table.seed_local(prefixes, now);
        for entry in self.table.iter().filter(|e| e.next_hop.is_local()) {
            info!(prefix = %entry.prefix, "added local network");
        }
        added
    }

    /// Register an established neighbor, returning the one it supersedes.
    ///
    /// Replacing a neighbor keeps its routes: the peer is still alive.
    pub fn register_neighbor(&mut self, neighbor: Neighbor) -> Option<Neighbor> {
        info!(
            neighbor = %neighbor.id,
            addr = %neighbor.addr,
            udp_port = neighbor.udp_port,
            session = %neighbor.token,
            "neighbor established"
        );
        self.neighbors.insert(neighbor)
    }

    /// Record a hello from `id`. Returns false for unknown neighbors.
    pub fn record_hello(&mut self, id: &NeighborId, now: Instant) -> bool {
        self.neighbors.touch(id, now)
    }

    /// Remove `id` and poison every route through it.
    ///
    /// Idempotent: returns `None` if `id` is not established.
    pub fn remove_neighbor(&mut self, id: &NeighborId, now: Instant) -> Option<RemovalOutcome> {
        let neighbor = self.neighbors.remove(id)?;
        let poisoned = self.table.poison_via(id, now);
        info!(
            neighbor = %id,
            session = %neighbor.token,
            poisoned = poisoned.len(),
            "neighbor removed, routes poisoned"
        );
        let kernel_ops = poisoned
            .iter()
            .map(|prefix| KernelOp::Remove { prefix: *prefix })
            .collect();
        Some(RemovalOutcome {
            neighbor,
            poisoned,
            kernel_ops,
        })
    }

    /// Remove `id` only if it is still registered by session `token`.
    pub fn remove_session(
        &mut self,
        id: &NeighborId,
        token: SessionToken,
        now: Instant,
    ) -> Option<RemovalOutcome> {
        if !self.neighbors.is_current(id, token) {
            return None;
        }
        self.remove_neighbor(id, now)
    }

    /// Neighbors whose last hello is older than `dead_interval`.
    pub fn dead_neighbors(&self, now: Instant, dead_interval: Duration) -> Vec<NeighborId> {
        self.neighbors.dead(now, dead_interval)
    }

    /// Forget learned routes unrefreshed for longer than `ttl`.
    pub fn expire_routes(&mut self, now: Instant, ttl: Duration) -> Vec<KernelOp> {
        self.table
            .expire(now, ttl)
            .into_iter()
            .map(|entry| {
                info!(prefix = %entry.prefix, next_hop = %entry.next_hop, "route expired");
                KernelOp::Remove {
                    prefix: entry.prefix,
                }
            })
            .collect()
    }

    /// Apply a full-table update from `sender`.
    ///
    /// The advertised next hop of each route is ignored; `sender` is always
    /// the candidate next hop.
    pub fn process_update(
        &mut self,
        sender: &NeighborId,
        sequence: u64,
        routes: &[RouteAdvert],
        now: Instant,
    ) -> ProcessResult {
        let via = match self.neighbors.get(sender) {
            Some(n) => n.addr,
            None => return ProcessResult::UnknownSender,
        };
        match self.neighbors.check_sequence(sender, sequence) {
            SequenceCheck::Accepted => {}
            SequenceCheck::Stale { last } => return ProcessResult::Stale { last },
            SequenceCheck::UnknownSender => return ProcessResult::UnknownSender,
        }
        debug!(neighbor = %sender, sequence, routes = routes.len(), "update accepted");

        let mut outcome = UpdateOutcome::default();
        for route in routes {
            self.apply_route(sender, via, route.prefix, route.metric, now, &mut outcome);
        }
        ProcessResult::Accepted(outcome)
    }

    fn apply_route(
        &mut self,
        sender: &NeighborId,
        via: IpAddr,
        prefix: Prefix,
        advertised: u8,
        now: Instant,
        outcome: &mut UpdateOutcome,
    ) {
        let metric = effective_metric(advertised);

        if metric >= INFINITY {
            if let Some(entry) = self.table.get_mut(&prefix) {
                if entry.next_hop.is_neighbor(sender) && entry.metric < INFINITY {
                    entry.metric = INFINITY;
                    entry.last_refresh = now;
                    info!(prefix = %prefix, neighbor = %sender, "route became unreachable");
                    outcome.changed = true;
                    outcome.kernel_ops.push(KernelOp::Remove { prefix });
                }
            }
            return;
        }

        let install = KernelOp::Install {
            prefix,
            via,
            neighbor: sender.clone(),
        };
        match self.table.get_mut(&prefix) {
            None => {
                self.table
                    .insert(RouteEntry::learned(prefix, sender.clone(), metric, now));
                info!(prefix = %prefix, neighbor = %sender, metric, "new route");
                outcome.changed = true;
                outcome.kernel_ops.push(install);
            }
            Some(entry) if metric < entry.metric => {
                *entry = RouteEntry::learned(prefix, sender.clone(), metric, now);
                info!(prefix = %prefix, neighbor = %sender, metric, "better path");
                outcome.changed = true;
                outcome.kernel_ops.push(install);
            }
            Some(entry) if entry.next_hop.is_neighbor(sender) => {
                entry.last_refresh = now;
                if entry.metric != metric {
                    info!(
                        prefix = %prefix,
                        neighbor = %sender,
                        from = entry.metric,
                        to = metric,
                        "route metric adjusted"
                    );
                    entry.metric = metric;
                    outcome.changed = true;
                }
            }
            Some(_) => {}
        }
    }

    /// Routes to advertise to `target`, with split-horizon poison reverse.
    ///
    /// Every entry is included; entries learned from `target` carry
    /// [`INFINITY`].
    pub fn build_outgoing_routes(&self, target: &NeighborId) -> Vec<RouteAdvert> {
        self.table
            .iter()
            .map(|entry| RouteAdvert {
                prefix: entry.prefix,
                next_hop: entry.next_hop.clone(),
                metric: if entry.next_hop.is_neighbor(target) {
                    INFINITY
                } else {
                    entry.metric
                },
            })
            .collect()
    }

    /// Snapshot one full-table message per neighbor.
    ///
    /// Bumps the sequence number once for the whole broadcast. Periodic
    /// broadcasts first refresh local entries so they never expire.
    pub fn prepare_broadcast(&mut self, reason: BroadcastReason, now: Instant) -> BroadcastPlan {
        if reason == BroadcastReason::Periodic {
            self.table.refresh_local(now);
        }
        self.sequence += 1;
        let sequence = self.sequence;

        let updates = self
            .neighbors
            .iter()
            .map(|n| OutgoingUpdate {
                neighbor: n.id.clone(),
                dest: n.update_addr(),
                message: DvMessage::new(
                    self.router_id.clone(),
                    sequence,
                    self.build_outgoing_routes(&n.id),
                ),
            })
            .collect();

        BroadcastPlan {
            reason,
            sequence,
            updates,
        }
    }
}
