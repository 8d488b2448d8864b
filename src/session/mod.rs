//! Neighbor sessions.
//!
//! A session is one control connection that completed the handshake. The
//! [`SessionManager`] accepts and dials connections, registers established
//! sessions in the shared neighbor set, and tears them down on any control
//! channel failure.

mod handshake;
mod manager;
mod state;

pub use handshake::handshake;
pub use manager::SessionManager;
pub use state::*;
