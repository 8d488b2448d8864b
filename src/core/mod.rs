//! Core types, constants, error taxonomy and collaborator traits.
//!
//! This module has no I/O dependencies. Everything the protocol engine needs
//! to describe routes and neighbors lives here.

mod constants;
mod error;
mod traits;
mod types;

pub use constants::*;
pub use error::*;
pub use traits::*;
pub use types::*;
