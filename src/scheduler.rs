//! Timers: liveness and expiry sweeps, hellos, periodic and triggered
//! broadcasts.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tracing::debug;

use crate::context::{RouterContext, now};
use crate::routing::BroadcastReason;

fn ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Drives every timer-based activity of the router.
#[derive(Debug, Clone)]
pub struct Scheduler {
    ctx: Arc<RouterContext>,
}

impl Scheduler {
    /// Create a scheduler over the shared router context.
    pub fn new(ctx: Arc<RouterContext>) -> Self {
        Self { ctx }
    }

    /// Every sweep tick: remove silent neighbors, forget stale routes.
    pub async fn sweep_loop(self) {
        let mut tick = ticker(self.ctx.config().sweep_interval);
        loop {
            tick.tick().await;
            let (dead, expired) = self.ctx.sweep(now());
            if !dead.is_empty() || expired > 0 {
                debug!(dead = dead.len(), expired, "sweep");
            }
        }
    }

    /// Unconditional full-table broadcast on the periodic cadence.
    pub async fn periodic_loop(self) {
        let mut tick = ticker(self.ctx.config().periodic_interval);
        loop {
            tick.tick().await;
            self.ctx.broadcast(BroadcastReason::Periodic).await;
        }
    }

    /// Keepalive hellos on every established session.
    pub async fn hello_loop(self) {
        let mut tick = ticker(self.ctx.config().hello_interval);
        loop {
            tick.tick().await;
            self.ctx.send_hellos();
        }
    }

    /// Single consumer of broadcast requests.
    ///
    /// Requests arriving while a broadcast is in flight collapse into one
    /// follow-up broadcast.
    pub async fn broadcast_loop(self) {
        loop {
            self.ctx.broadcast_requested().await;
            self.ctx.broadcast(BroadcastReason::Triggered).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::testing;
    use crate::core::{INFINITY, NeighborId, NextHop, Prefix};
    use crate::routing::KernelOp;
    use crate::transport::UpdateSocket;
    use crate::wire::{ControlMessage, DvMessage, RouteAdvert};

    fn prefix(s: &str) -> Prefix {
        s.parse().unwrap()
    }

    fn update(from: &str, sequence: u64, p: &str, metric: u8) -> DvMessage {
        DvMessage::new(
            NeighborId::new(from).unwrap(),
            sequence,
            vec![RouteAdvert {
                prefix: prefix(p),
                next_hop: NextHop::Local,
                metric,
            }],
        )
    }

    async fn requested(ctx: &RouterContext) -> bool {
        tokio::time::timeout(Duration::from_millis(50), ctx.broadcast_requested())
            .await
            .is_ok()
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_sweep_removes_silent_neighbor_and_poisons() {
        let (ctx, sink) = testing::context("A").await;
        let udp = "127.0.0.1:9".parse().unwrap();
        let _rx = testing::establish(&ctx, "B", 1, udp);
        assert!(requested(&ctx).await);

        ctx.apply_update(&update("B", 1, "10.9.0.0/16", 1), udp);
        assert!(requested(&ctx).await);

        let (dead, _) = ctx.sweep(now() + Duration::from_secs(10));
        assert!(dead.is_empty());

        let (dead, expired) = ctx.sweep(now() + Duration::from_secs(16));
        assert_eq!(dead, vec![NeighborId::new("B").unwrap()]);
        assert_eq!(expired, 0);
        assert!(requested(&ctx).await);

        let routes = ctx.routes();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].metric, INFINITY);
        assert_eq!(routes[0].next_hop, NextHop::Neighbor(NeighborId::new("B").unwrap()));

        settle().await;
        assert_eq!(
            sink.ops.lock().last(),
            Some(&KernelOp::Remove {
                prefix: prefix("10.9.0.0/16")
            })
        );
    }

    #[tokio::test]
    async fn test_sweep_expires_stale_routes() {
        let (ctx, sink) = testing::context("A").await;
        ctx.seed_local(vec![prefix("10.0.0.0/24")]);
        let udp = "127.0.0.1:9".parse().unwrap();
        let _rx = testing::establish(&ctx, "B", 1, udp);
        ctx.apply_update(&update("B", 1, "10.9.0.0/16", 1), udp);

        // keep B alive, let its route go stale
        let later = now() + Duration::from_secs(61);
        ctx.lock().engine.record_hello(&NeighborId::new("B").unwrap(), later);
        let (dead, expired) = ctx.sweep(later);
        assert!(dead.is_empty());
        assert_eq!(expired, 1);

        let routes = ctx.routes();
        assert_eq!(routes.len(), 1);
        assert!(routes[0].next_hop.is_local());

        settle().await;
        assert_eq!(sink.ops.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_loop_applies_default_timers() {
        let (ctx, sink) = testing::context("A").await;
        let udp = "127.0.0.1:9".parse().unwrap();
        let b = NeighborId::new("B").unwrap();
        let c = NeighborId::new("C").unwrap();
        let _b = testing::establish(&ctx, "B", 1, udp);
        let _c = testing::establish(&ctx, "C", 2, udp);
        ctx.apply_update(&update("C", 1, "10.3.0.0/16", 0), udp);
        tokio::spawn(Scheduler::new(Arc::clone(&ctx)).sweep_loop());

        // C keeps its session alive but never refreshes the route
        for second in (5..=70).step_by(5) {
            tokio::time::sleep(Duration::from_secs(5)).await;
            ctx.record_hello(&c);
            match second {
                10 => assert!(ctx.is_established(&b)),
                20 => assert!(!ctx.is_established(&b)),
                55 => assert_eq!(ctx.routes().len(), 1),
                _ => {}
            }
        }
        assert!(ctx.is_established(&c));
        assert!(ctx.routes().is_empty());

        let removed = KernelOp::Remove {
            prefix: prefix("10.3.0.0/16"),
        };
        for _ in 0..100 {
            if sink.ops.lock().last() == Some(&removed) {
                break;
            }
            settle().await;
        }
        assert_eq!(sink.ops.lock().last(), Some(&removed));
    }

    #[tokio::test]
    async fn test_broadcast_requests_coalesce() {
        let (ctx, _) = testing::context("A").await;
        ctx.request_broadcast();
        ctx.request_broadcast();
        ctx.request_broadcast();
        assert!(requested(&ctx).await);
        assert!(!requested(&ctx).await);
    }

    #[tokio::test]
    async fn test_hellos_queued_per_session() {
        let (ctx, _) = testing::context("A").await;
        let mut b = testing::establish(&ctx, "B", 1, "127.0.0.1:9".parse().unwrap());
        let mut c = testing::establish(&ctx, "C", 2, "127.0.0.1:9".parse().unwrap());
        ctx.send_hellos();
        let hello = ControlMessage::hello(NeighborId::new("A").unwrap());
        assert_eq!(b.recv().await.unwrap(), hello);
        assert_eq!(c.recv().await.unwrap(), hello);
    }

    #[tokio::test]
    async fn test_broadcast_sends_poison_reverse() {
        let (ctx, _) = testing::context("A").await;
        let mut b_sock = UpdateSocket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let mut c_sock = UpdateSocket::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let b_addr = b_sock.local_addr().unwrap();
        let _b = testing::establish(&ctx, "B", 1, b_addr);
        let _c = testing::establish(&ctx, "C", 2, c_sock.local_addr().unwrap());
        ctx.apply_update(&update("B", 1, "10.5.0.0/16", 1), b_addr);

        ctx.broadcast(BroadcastReason::Triggered).await;

        let (data, _) = b_sock.recv_from().await.unwrap();
        let to_b = DvMessage::decode(data).unwrap();
        assert_eq!(to_b.originator.as_str(), "A");
        assert_eq!(to_b.routes[0].metric, INFINITY);

        let (data, _) = c_sock.recv_from().await.unwrap();
        let to_c = DvMessage::decode(data).unwrap();
        assert_eq!(to_c.routes[0].metric, 2);
        assert_eq!(to_c.sequence, to_b.sequence);
    }

    #[tokio::test]
    async fn test_stale_session_failure_keeps_successor() {
        let (ctx, _) = testing::context("A").await;
        let udp = "127.0.0.1:9".parse().unwrap();
        let _old = testing::establish(&ctx, "B", 1, udp);
        let _new = testing::establish(&ctx, "B", 2, udp);
        let b = NeighborId::new("B").unwrap();

        assert!(!ctx.remove_session(&b, crate::routing::SessionToken::new(1), "eof"));
        assert!(ctx.is_established(&b));
        assert!(ctx.remove_neighbor(&b, "timeout"));
        assert!(!ctx.remove_neighbor(&b, "timeout"));
    }
}
