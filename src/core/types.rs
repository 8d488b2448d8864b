//! Identifiers and address types shared by every layer.

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use super::constants::{INFINITY, LOCAL_NEXT_HOP, MAX_ID_LEN};
use super::error::DecodeError;

/// An IPv4 network prefix such as `10.0.0.0/24`.
///
/// Ordered by address then length, so a table keyed by `Prefix` iterates
/// in a stable order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Prefix {
    addr: Ipv4Addr,
    len: u8,
}

impl Prefix {
    /// Create a prefix. Fails if `len` exceeds 32.
    pub fn new(addr: Ipv4Addr, len: u8) -> Result<Self, DecodeError> {
        if len > 32 {
            return Err(DecodeError::InvalidPrefixLength(len));
        }
        Ok(Self { addr, len })
    }

    /// Network address.
    pub fn addr(&self) -> Ipv4Addr {
        self.addr
    }

    /// Prefix length in bits.
    pub fn prefix_len(&self) -> u8 {
        self.len
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.addr, self.len)
    }
}

impl FromStr for Prefix {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (addr, len) = s
            .split_once('/')
            .ok_or_else(|| DecodeError::InvalidPrefix(s.to_string()))?;
        let addr = addr
            .parse::<Ipv4Addr>()
            .map_err(|_| DecodeError::InvalidPrefix(s.to_string()))?;
        let len = len
            .parse::<u8>()
            .map_err(|_| DecodeError::InvalidPrefix(s.to_string()))?;
        Self::new(addr, len)
    }
}

/// Identifier a router announces for itself during the handshake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NeighborId(String);

impl NeighborId {
    /// Create an identifier. Fails on empty, over-long, or sentinel values.
    pub fn new(id: impl Into<String>) -> Result<Self, DecodeError> {
        let id = id.into();
        if id.is_empty() || id == LOCAL_NEXT_HOP {
            return Err(DecodeError::InvalidIdentifier(id));
        }
        if id.len() > MAX_ID_LEN {
            return Err(DecodeError::IdentifierTooLong(id.len()));
        }
        Ok(Self(id))
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NeighborId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NeighborId {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Where traffic for a prefix is forwarded.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NextHop {
    /// Directly attached to this router.
    Local,
    /// Learned from the named neighbor.
    Neighbor(NeighborId),
}

impl NextHop {
    /// Whether this is the local sentinel.
    pub fn is_local(&self) -> bool {
        matches!(self, NextHop::Local)
    }

    /// Whether this next hop is the given neighbor.
    pub fn is_neighbor(&self, id: &NeighborId) -> bool {
        matches!(self, NextHop::Neighbor(n) if n == id)
    }

    /// The wire string (`-` for local).
    pub fn as_wire_str(&self) -> &str {
        match self {
            NextHop::Local => LOCAL_NEXT_HOP,
            NextHop::Neighbor(id) => id.as_str(),
        }
    }

    /// Parse the wire string.
    pub fn from_wire_str(s: &str) -> Result<Self, DecodeError> {
        if s == LOCAL_NEXT_HOP {
            Ok(NextHop::Local)
        } else {
            NeighborId::new(s).map(NextHop::Neighbor)
        }
    }
}

impl fmt::Display for NextHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire_str())
    }
}

/// Hop count a neighbor would pay through us: `metric + 1`, capped at [`INFINITY`].
pub fn effective_metric(advertised: u8) -> u8 {
    advertised.saturating_add(1).min(INFINITY)
}
