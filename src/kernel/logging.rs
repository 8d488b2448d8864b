//! Sink that only logs.

use std::net::IpAddr;

use tracing::info;

use crate::core::{KernelError, KernelRouteSink, NeighborId, Prefix};

/// Logs every decision and never touches the host.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingSink;

impl KernelRouteSink for LoggingSink {
    fn install(&self, prefix: &Prefix, via: IpAddr, neighbor: &NeighborId) -> Result<(), KernelError> {
        info!(%prefix, %via, %neighbor, "kernel install (dry run)");
        Ok(())
    }

    fn remove(&self, prefix: &Prefix) -> Result<(), KernelError> {
        info!(%prefix, "kernel remove (dry run)");
        Ok(())
    }
}
