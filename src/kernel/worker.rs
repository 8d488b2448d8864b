//! Ordered kernel operation queue.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;

use super::apply;
use crate::core::KernelRouteSink;
use crate::routing::KernelOp;

/// Send side of the kernel worker.
///
/// Operations run one at a time in submission order, so an install and a
/// later removal of the same prefix never reach the host reversed.
#[derive(Debug, Clone)]
pub struct KernelQueue {
    tx: mpsc::UnboundedSender<KernelOp>,
}

impl KernelQueue {
    /// Create a queue and the worker that drains it.
    pub fn new(sink: Arc<dyn KernelRouteSink>) -> (Self, KernelWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, KernelWorker { sink, rx })
    }

    /// Create a queue and spawn its worker.
    pub fn spawn(sink: Arc<dyn KernelRouteSink>) -> (Self, JoinHandle<()>) {
        let (queue, worker) = Self::new(sink);
        (queue, tokio::spawn(worker.run()))
    }

    /// Queue operations. Never blocks.
    pub fn submit(&self, ops: impl IntoIterator<Item = KernelOp>) {
        for op in ops {
            if self.tx.send(op).is_err() {
                warn!("kernel worker stopped, dropping operation");
                return;
            }
        }
    }
}

/// Applies queued operations one at a time on the blocking pool.
pub struct KernelWorker {
    sink: Arc<dyn KernelRouteSink>,
    rx: mpsc::UnboundedReceiver<KernelOp>,
}

impl KernelWorker {
    /// Run until every [`KernelQueue`] handle is dropped.
    ///
    /// Failures are logged; the in-memory table stays authoritative.
    pub async fn run(mut self) {
        while let Some(op) = self.rx.recv().await {
            let sink = Arc::clone(&self.sink);
            let result = tokio::task::spawn_blocking(move || {
                let result = apply(sink.as_ref(), &op);
                (op, result)
            })
            .await;
            match result {
                Ok((_, Ok(()))) => {}
                Ok((op, Err(e))) => warn!(?op, error = %e, "kernel route update failed"),
                Err(e) => warn!(error = %e, "kernel worker task failed"),
            }
        }
    }

    /// Take every queued operation without applying it.
    #[cfg(test)]
    pub(crate) fn drain(&mut self) -> Vec<KernelOp> {
        let mut ops = Vec::new();
        while let Ok(op) = self.rx.try_recv() {
            ops.push(op);
        }
        ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{KernelError, NeighborId, Prefix};
    use parking_lot::Mutex;
    use std::net::IpAddr;
    use std::time::Duration;

    #[derive(Default)]
    struct Recording(Mutex<Vec<String>>);

    impl KernelRouteSink for Recording {
        fn install(&self, prefix: &Prefix, via: IpAddr, _: &NeighborId) -> Result<(), KernelError> {
            self.0.lock().push(format!("install {prefix} via {via}"));
            Ok(())
        }

        fn remove(&self, prefix: &Prefix) -> Result<(), KernelError> {
            self.0.lock().push(format!("remove {prefix}"));
            Err(KernelError::CommandFailed {
                command: "ip route del".into(),
                stderr: "test".into(),
            })
        }
    }

    #[tokio::test]
    async fn test_operations_applied_in_order() {
        let sink = Arc::new(Recording::default());
        let (queue, _handle) = KernelQueue::spawn(sink.clone());
        let prefix: Prefix = "10.1.0.0/16".parse().unwrap();
        queue.submit([
            KernelOp::Install {
                prefix,
                via: "192.168.0.2".parse().unwrap(),
                neighbor: NeighborId::new("B").unwrap(),
            },
            KernelOp::Remove { prefix },
            KernelOp::Install {
                prefix,
                via: "192.168.0.3".parse().unwrap(),
                neighbor: NeighborId::new("C").unwrap(),
            },
        ]);

        for _ in 0..100 {
            if sink.0.lock().len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        // a failed removal does not stop the queue
        assert_eq!(
            *sink.0.lock(),
            vec![
                "install 10.1.0.0/16 via 192.168.0.2",
                "remove 10.1.0.0/16",
                "install 10.1.0.0/16 via 192.168.0.3",
            ]
        );
    }
}
