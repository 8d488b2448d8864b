//! Collaborator traits at the edge of the routing core.
//!
//! The core never touches the host forwarding table directly. It asks a
//! [`LocalRouteSource`] once at startup and tells a [`KernelRouteSink`]
//! about every install and removal it decides on.

use std::net::IpAddr;

use super::error::{KernelError, SourceError};
use super::types::{NeighborId, Prefix};

/// Enumerates the prefixes directly reachable from this host.
///
/// Consulted exactly once, before any session is established.
pub trait LocalRouteSource: Send + Sync {
    /// List locally attached prefixes.
    fn enumerate(&self) -> Result<Vec<Prefix>, SourceError>;
}

/// Programs single-prefix entries into the host forwarding table.
///
/// # Requirements
///
/// - `install` and `remove` MUST be idempotent
/// - failures are reported, never retried by the implementation
/// - implementations may block; callers run them off the async reactor
pub trait KernelRouteSink: Send + Sync {
    /// Install or replace the route for `prefix` through `via`.
    ///
    /// `neighbor` is the router that advertised the path, for diagnostics.
    fn install(&self, prefix: &Prefix, via: IpAddr, neighbor: &NeighborId)
    -> Result<(), KernelError>;

    /// Remove the route for `prefix`, if present.
    fn remove(&self, prefix: &Prefix) -> Result<(), KernelError>;
}

/// A source that reports no local prefixes.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocalRoutes;

impl LocalRouteSource for NoLocalRoutes {
    fn enumerate(&self) -> Result<Vec<Prefix>, SourceError> {
        Ok(Vec::new())
    }
}

/// A fixed list of local prefixes.
#[derive(Debug, Clone, Default)]
pub struct StaticRoutes(pub Vec<Prefix>);

impl LocalRouteSource for StaticRoutes {
    fn enumerate(&self) -> Result<Vec<Prefix>, SourceError> {
        Ok(self.0.clone())
    }
}
