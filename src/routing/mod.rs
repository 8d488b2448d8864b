//! Distance-vector routing core.
//!
//! Everything here is synchronous and takes the current time as an argument,
//! so the whole protocol can be driven deterministically from tests. The
//! async layers hold a [`DvEngine`] behind one lock and perform all network
//! and kernel I/O on what it returns, after the lock is released.

mod engine;
mod neighbor;
mod table;

pub use engine::*;
pub use neighbor::*;
pub use table::*;
