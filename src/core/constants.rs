//! Protocol constants.
//!
//! Timer values are defaults; every one of them can be overridden through
//! [`RouterConfig`](crate::router::RouterConfig).

use std::time::Duration;

// =============================================================================
// METRICS
// =============================================================================

/// Sentinel metric meaning "unreachable".
pub const INFINITY: u8 = 16;

/// Metric of a directly attached (local) prefix.
pub const LOCAL_METRIC: u8 = 0;

/// Wire representation of the local next-hop sentinel.
pub const LOCAL_NEXT_HOP: &str = "-";

// =============================================================================
// WIRE
// =============================================================================

/// Distance-vector protocol version carried in every update datagram.
pub const PROTOCOL_VERSION: u8 = 1;

/// Control frame type: handshake parameters.
pub const FRAME_TYPE_HANDSHAKE: u8 = 0x01;

/// Control frame type: keepalive hello.
pub const FRAME_TYPE_HELLO: u8 = 0x02;

/// Datagram type: distance-vector update.
pub const FRAME_TYPE_DV_UPDATE: u8 = 0x03;

/// Maximum encoded size of one update datagram (also the receive buffer size).
pub const MAX_DATAGRAM_SIZE: usize = 4096;

/// Maximum size of one control frame body.
pub const MAX_CONTROL_FRAME_SIZE: usize = 1024;

/// Maximum identifier length in bytes (u8 length prefix).
pub const MAX_ID_LEN: usize = 255;

// =============================================================================
// TIMERS
// =============================================================================

/// Cadence of keepalive hellos on every control channel.
pub const HELLO_INTERVAL: Duration = Duration::from_secs(5);

/// A neighbor silent for longer than this is declared dead.
pub const DEAD_INTERVAL: Duration = Duration::from_secs(15);

/// A learned route not refreshed for longer than this is forgotten.
pub const ROUTE_TTL: Duration = Duration::from_secs(60);

/// Cadence of unconditional full-table broadcasts.
pub const PERIODIC_INTERVAL: Duration = Duration::from_secs(20);

/// Tick of the timeout scheduler sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// A handshake must complete within this window.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Initial delay before re-dialing a configured neighbor.
pub const REDIAL_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound of the re-dial backoff.
pub const MAX_REDIAL_INTERVAL: Duration = Duration::from_secs(60);

/// Re-dial backoff multiplier.
pub const REDIAL_BACKOFF: u32 = 2;

/// Delay before the first outbound dial, so the local listeners are up.
pub const INITIAL_DIAL_DELAY: Duration = Duration::from_secs(2);

// =============================================================================
// LOCAL ROUTES
// =============================================================================

/// Prefixes never imported from the host table (container bridge).
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &["172.17."];
