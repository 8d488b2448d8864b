//! Router configuration and the top-level orchestrator.
//!
//! [`Router::bind`] validates the configuration, binds the control listener
//! and the update socket, and seeds local routes. [`Router::spawn`] then
//! starts the accept loop, one dialer per configured neighbor, the update
//! receiver, the kernel worker and the scheduler loops, all sharing one
//! [`RouterContext`](crate::context::RouterContext).

mod config;
#[allow(clippy::module_inception)]
mod router;

pub use config::*;
pub use router::*;
