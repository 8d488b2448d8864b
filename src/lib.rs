//! # dvroute
//!
//! A distance-vector routing daemon.
//!
//! Each router discovers the prefixes attached to its host, exchanges
//! reachability and hop counts with directly configured neighbors, and
//! programs the best paths into the host forwarding table. It is a
//! simplified RIP-like protocol:
//!
//! - **Hop-count metric** with 16 as infinity
//! - **Split horizon with poison reverse** against two-node loops
//! - **Triggered updates** on every topology change, coalesced
//! - **Periodic full-table updates** to survive datagram loss
//! - **Staleness-based garbage collection** of neighbors and routes
//!
//! ## Feature Flags
//!
//! - `transport` (default): tokio transport, sessions, scheduler and router
//! - `daemon` (default): the `dvrouted` binary
//!
//! ## Modules
//!
//! - [`core`]: Types, constants, error taxonomy and collaborator traits
//! - [`wire`]: Control frame and update datagram codecs
//! - [`routing`]: Routing table, neighbor set and protocol engine (synchronous)
//! - [`kernel`]: `ip route` adapters and the kernel operation queue
//! - [`transport`]: Framed TCP control channel and UDP update socket
//! - [`session`]: Per-neighbor session state machine and manager
//! - [`scheduler`]: Sweeps, hellos, periodic and triggered broadcasts
//! - [`context`]: State shared by all router tasks
//! - [`router`]: Configuration and the top-level orchestrator
//!
//! ## Example Usage
//!
//! ```rust
//! use std::time::Instant;
//! use dvroute::prelude::*;
//!
//! let now = Instant::now();
//! let mut engine = DvEngine::new(NeighborId::new("A").unwrap());
//! engine.seed_local(["10.0.0.0/24".parse::<Prefix>().unwrap()], now);
//!
//! let b = NeighborId::new("B").unwrap();
//! engine.register_neighbor(Neighbor::new(
//!     b.clone(),
//!     SessionToken::new(1),
//!     "192.168.0.2".parse().unwrap(),
//!     5001,
//!     now,
//! ));
//!
//! let routes = vec![RouteAdvert {
//!     prefix: "10.9.0.0/16".parse().unwrap(),
//!     next_hop: NextHop::Local,
//!     metric: 0,
//! }];
//! let result = engine.process_update(&b, 1, &routes, now);
//! assert!(result.changed());
//!
//! // Routes learned from B go back to B poisoned.
//! let to_b = engine.build_outgoing_routes(&b);
//! assert!(to_b.iter().any(|r| r.metric == INFINITY));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

pub mod kernel;
pub mod routing;
pub mod wire;

// Async layers (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod context;

#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod session;

#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod scheduler;

#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod router;

/// Prelude module for convenient imports.
pub mod prelude {
    // Core traits and types
    pub use crate::core::*;

    pub use crate::kernel::{IpRouteSink, IpRouteSource, LoggingSink};
    pub use crate::routing::*;
    pub use crate::wire::{ControlMessage, DvMessage, HandshakeParams, RouteAdvert};

    #[cfg(feature = "transport")]
    pub use crate::router::{Router, RouterConfig, RouterConfigBuilder, RouterHandle};

    #[cfg(feature = "transport")]
    pub use crate::transport::{TransportError, TransportResult};
}

// Re-export commonly used items at crate root
pub use crate::core::{DecodeError, NeighborId, Prefix, RouterError};

#[cfg(feature = "transport")]
pub use router::{Router, RouterConfig, RouterConfigBuilder};
