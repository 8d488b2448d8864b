//! Host forwarding-table adapters.
//!
//! [`IpRouteSource`] and [`IpRouteSink`] drive the iproute2 `ip` command.
//! [`LoggingSink`] records decisions without touching the host, for
//! unprivileged runs. With the `transport` feature, [`KernelQueue`] applies
//! operations in order on the blocking pool.

mod ip;
mod logging;
#[cfg(feature = "transport")]
mod worker;

pub use ip::*;
pub use logging::*;
#[cfg(feature = "transport")]
pub use worker::*;

use crate::core::{KernelError, KernelRouteSink};
use crate::routing::KernelOp;

/// Execute one operation against `sink`.
pub fn apply(sink: &dyn KernelRouteSink, op: &KernelOp) -> Result<(), KernelError> {
    match op {
        KernelOp::Install {
            prefix,
            via,
            neighbor,
        } => sink.install(prefix, *via, neighbor),
        KernelOp::Remove { prefix } => sink.remove(prefix),
    }
}
