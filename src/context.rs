//! Shared router state.
//!
//! One [`RouterContext`] is created by the router at startup and handed to
//! every task. The engine and the per-session links sit behind a single
//! lock. Nothing awaits while holding it: broadcasts are planned under the
//! lock and sent after. Kernel operations are queued to the worker before
//! the lock is released, so the host sees them in table order.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::{Mutex, MutexGuard};
use tokio::sync::{Notify, mpsc};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use crate::core::{NeighborId, Prefix};
use crate::kernel::KernelQueue;
use crate::router::RouterConfig;
use crate::routing::{
    BroadcastReason, DvEngine, Neighbor, ProcessResult, RemovalOutcome, RouteEntry, SessionToken,
};
use crate::transport::UpdateSender;
use crate::wire::{ControlMessage, DvMessage, HandshakeParams};

/// Current time as the routing core sees it.
///
/// Follows the tokio clock, so a paused runtime drives liveness and expiry.
pub fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// Handles to the tasks serving one established session.
///
/// Dropping the link aborts both tasks, which closes the control channel.
#[derive(Debug)]
pub struct SessionLink {
    token: SessionToken,
    outbound: mpsc::Sender<ControlMessage>,
    tasks: Vec<AbortHandle>,
}

impl SessionLink {
    /// Bundle a session's writer queue and task handles.
    pub fn new(
        token: SessionToken,
        outbound: mpsc::Sender<ControlMessage>,
        tasks: Vec<AbortHandle>,
    ) -> Self {
        Self {
            token,
            outbound,
            tasks,
        }
    }

    /// Token of the session these tasks serve.
    pub fn token(&self) -> SessionToken {
        self.token
    }
}

impl Drop for SessionLink {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Everything guarded by the router lock.
#[derive(Debug)]
pub struct RouterState {
    /// Routing table and neighbor set.
    pub engine: DvEngine,
    links: HashMap<NeighborId, SessionLink>,
    kernel: KernelQueue,
}

impl RouterState {
    /// Remove `id` from the engine, drop its link and queue its kernel
    /// removals.
    fn remove(&mut self, id: &NeighborId, now: Instant) -> Option<RemovalOutcome> {
        self.links.remove(id);
        let outcome = self.engine.remove_neighbor(id, now)?;
        self.kernel.submit(outcome.kernel_ops.iter().cloned());
        Some(outcome)
    }
}

/// State and handles shared by all router tasks.
#[derive(Debug)]
pub struct RouterContext {
    config: RouterConfig,
    local: HandshakeParams,
    state: Mutex<RouterState>,
    trigger: Notify,
    updates: UpdateSender,
    tokens: AtomicU64,
}

impl RouterContext {
    /// Create the context. `local` is what this router announces in
    /// handshakes.
    pub fn new(
        config: RouterConfig,
        local: HandshakeParams,
        updates: UpdateSender,
        kernel: KernelQueue,
    ) -> Self {
        let engine = DvEngine::new(local.originator.clone());
        Self {
            config,
            local,
            state: Mutex::new(RouterState {
                engine,
                links: HashMap::new(),
                kernel,
            }),
            trigger: Notify::new(),
            updates,
            tokens: AtomicU64::new(1),
        }
    }

    /// Router configuration.
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Our handshake parameters.
    pub fn local(&self) -> &HandshakeParams {
        &self.local
    }

    /// This router's identifier.
    pub fn router_id(&self) -> &NeighborId {
        &self.local.originator
    }

    /// Take the router lock.
    pub fn lock(&self) -> MutexGuard<'_, RouterState> {
        self.state.lock()
    }

    /// Allocate a token for a new session attempt.
    pub fn next_token(&self) -> SessionToken {
        SessionToken::new(self.tokens.fetch_add(1, Ordering::Relaxed))
    }

    /// Ask the broadcaster for a triggered broadcast.
    ///
    /// Requests made before the broadcaster wakes collapse into one.
    pub fn request_broadcast(&self) {
        self.trigger.notify_one();
    }

    /// Wait for a broadcast request.
    pub async fn broadcast_requested(&self) {
        self.trigger.notified().await;
    }

    /// Seed the table with local prefixes.
    pub fn seed_local(&self, prefixes: Vec<Prefix>) -> usize {
        self.lock().engine.seed_local(prefixes, now())
    }

    /// Snapshot of the routing table.
    pub fn routes(&self) -> Vec<RouteEntry> {
        self.lock().engine.table().iter().cloned().collect()
    }

    /// Established neighbor ids.
    pub fn neighbor_ids(&self) -> Vec<NeighborId> {
        self.lock().engine.neighbors().iter().map(|n| n.id.clone()).collect()
    }

    /// Whether `id` is established.
    pub fn is_established(&self, id: &NeighborId) -> bool {
        self.lock().engine.neighbors().contains(id)
    }

    /// Register an established session, replacing any previous session of
    /// the same neighbor.
    ///
    /// `start` spawns the session tasks and runs under the lock, so a task
    /// that fails at once still finds its session registered. The replaced
    /// session's tasks are aborted; its routes are kept.
    pub fn establish(&self, neighbor: Neighbor, start: impl FnOnce() -> SessionLink) {
        let id = neighbor.id.clone();
        let replaced = {
            let mut state = self.lock();
            let replaced = state.engine.register_neighbor(neighbor);
            state.links.insert(id.clone(), start());
            replaced
        };
        if let Some(old) = replaced {
            info!(neighbor = %id, old = %old.token, "session replaced");
        }
        self.request_broadcast();
    }

    /// Remove `id` whichever session registered it (liveness timeout).
    pub fn remove_neighbor(&self, id: &NeighborId, reason: &str) -> bool {
        let outcome = self.lock().remove(id, now());
        self.finish_removal(id, outcome, reason)
    }

    /// Remove `id` only if `token` is still its current session.
    ///
    /// A superseded session reporting its own failure is a no-op.
    pub fn remove_session(&self, id: &NeighborId, token: SessionToken, reason: &str) -> bool {
        let outcome = {
            let mut state = self.lock();
            if state.engine.neighbors().is_current(id, token) {
                state.remove(id, now())
            } else {
                None
            }
        };
        self.finish_removal(id, outcome, reason)
    }

    fn finish_removal(&self, id: &NeighborId, outcome: Option<RemovalOutcome>, reason: &str) -> bool {
        let Some(outcome) = outcome else {
            return false;
        };
        warn!(neighbor = %id, session = %outcome.neighbor.token, reason, "neighbor down");
        self.request_broadcast();
        true
    }

    /// Abort every session's tasks, closing all control channels.
    ///
    /// Neighbor entries and routes are left as they are.
    pub fn close_sessions(&self) {
        let links: Vec<_> = self.lock().links.drain().collect();
        debug!(sessions = links.len(), "closing sessions");
    }

    /// Record a hello from `id`.
    pub fn record_hello(&self, id: &NeighborId) -> bool {
        self.lock().engine.record_hello(id, now())
    }

    /// Apply a received update datagram.
    pub fn apply_update(&self, message: &DvMessage, from: SocketAddr) -> ProcessResult {
        let result = {
            let mut state = self.lock();
            let result = state.engine.process_update(
                &message.originator,
                message.sequence,
                &message.routes,
                now(),
            );
            if let ProcessResult::Accepted(outcome) = &result {
                state.kernel.submit(outcome.kernel_ops.iter().cloned());
            }
            result
        };
        match &result {
            ProcessResult::Accepted(outcome) => {
                if outcome.changed {
                    self.request_broadcast();
                }
            }
            ProcessResult::Stale { last } => {
                debug!(neighbor = %message.originator, sequence = message.sequence, last, "stale update ignored");
            }
            ProcessResult::UnknownSender => {
                debug!(neighbor = %message.originator, %from, "update from unknown sender ignored");
            }
        }
        result
    }

    /// Queue a hello on every established session's writer.
    pub fn send_hellos(&self) {
        let hello = ControlMessage::hello(self.router_id().clone());
        let state = self.lock();
        for (id, link) in &state.links {
            if link.outbound.try_send(hello.clone()).is_err() {
                debug!(neighbor = %id, "hello queue full or closed");
            }
        }
    }

    /// Apply timeout sweeps: remove dead neighbors and expire stale routes.
    ///
    /// Returns the removed neighbors and the number of expired routes.
    pub fn sweep(&self, now: Instant) -> (Vec<NeighborId>, usize) {
        let (removed, expired) = {
            let mut state = self.lock();
            let dead = state.engine.dead_neighbors(now, self.config.dead_interval);
            let removed: Vec<_> = dead
                .into_iter()
                .filter_map(|id| state.remove(&id, now).map(|outcome| (id, outcome)))
                .collect();
            let expired = state.engine.expire_routes(now, self.config.route_ttl);
            let expired_count = expired.len();
            state.kernel.submit(expired);
            (removed, expired_count)
        };

        let ids = removed
            .into_iter()
            .map(|(id, outcome)| {
                self.finish_removal(&id, Some(outcome), "hello timeout");
                id
            })
            .collect();
        (ids, expired)
    }

    /// Send one full-table message to every established neighbor.
    pub async fn broadcast(&self, reason: BroadcastReason) {
        let plan = self.lock().engine.prepare_broadcast(reason, now());
        debug!(
            reason = reason.as_str(),
            sequence = plan.sequence,
            neighbors = plan.updates.len(),
            "broadcast"
        );
        for update in plan.updates {
            if let Err(e) = self.updates.send(&update.message, update.dest).await {
                warn!(neighbor = %update.neighbor, dest = %update.dest, error = %e, "update send failed");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::net::IpAddr;
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;
    use crate::core::{KernelError, KernelRouteSink};
    use crate::routing::KernelOp;
    use crate::transport::UpdateSocket;

    /// Sink that records every operation it is given.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub ops: Mutex<Vec<KernelOp>>,
    }

    impl KernelRouteSink for RecordingSink {
        fn install(&self, prefix: &Prefix, via: IpAddr, neighbor: &NeighborId) -> Result<(), KernelError> {
            self.ops.lock().push(KernelOp::Install {
                prefix: *prefix,
                via,
                neighbor: neighbor.clone(),
            });
            Ok(())
        }

        fn remove(&self, prefix: &Prefix) -> Result<(), KernelError> {
            self.ops.lock().push(KernelOp::Remove { prefix: *prefix });
            Ok(())
        }
    }

    /// A context with a loopback update socket and a recording kernel sink.
    pub async fn context(id: &str) -> (Arc<RouterContext>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let (kernel, _worker) = KernelQueue::spawn(sink.clone());
        (with_kernel(id, kernel).await, sink)
    }

    /// A context with a loopback update socket over the given kernel queue.
    pub async fn with_kernel(id: &str, kernel: KernelQueue) -> Arc<RouterContext> {
        let socket = UpdateSocket::bind("127.0.0.1:0".parse().unwrap())
            .await
            .unwrap();
        let local = HandshakeParams {
            originator: NeighborId::new(id).unwrap(),
            udp_port: socket.local_addr().unwrap().port(),
        };
        let config = crate::router::RouterConfigBuilder::new(id).build();
        Arc::new(RouterContext::new(config, local, socket.sender(), kernel))
    }

    /// Register `id` with no session tasks behind it.
    pub fn establish(ctx: &RouterContext, id: &str, token: u64, udp: SocketAddr) -> mpsc::Receiver<ControlMessage> {
        let (tx, rx) = mpsc::channel(8);
        let token = SessionToken::new(token);
        let neighbor = Neighbor::new(NeighborId::new(id).unwrap(), token, udp.ip(), udp.port(), now());
        ctx.establish(neighbor, || SessionLink::new(token, tx, Vec::new()));
        rx
    }
}
