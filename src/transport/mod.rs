//! Async transport over tokio.
//!
//! Two channels connect routers:
//!
//! - **Control channel** ([`ControlChannel`]): one TCP connection per
//!   neighbor carrying the handshake and keepalives as length-prefixed frames.
//! - **Update channel** ([`UpdateSocket`]): a single UDP socket shared by all
//!   neighbors carrying one distance-vector message per datagram.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     Sessions / Scheduler / Router       │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   framed control stream, datagrams      │
//! ├─────────────────────────────────────────┤
//! │            TCP / UDP                    │
//! └─────────────────────────────────────────┘
//! ```

mod control;
mod error;
mod socket;

pub use control::*;
pub use error::*;
pub use socket::*;
