//! Per-neighbor session state machine.
//!
//! ```text
//! Connecting ──► Handshaking ──► Established ──► Removed
//!      │              │                            ▲
//!      └──────────────┴────────────────────────────┘
//! ```
//!
//! Accepted connections start in `Handshaking`. `Removed` is terminal; a
//! new attempt is a new [`SessionAttempt`] with a new token.

use std::fmt;
use std::net::SocketAddr;

use tracing::debug;

use crate::routing::SessionToken;

/// Session lifecycle phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Opening the control connection (outbound only).
    Connecting,
    /// Exchanging handshake parameters.
    Handshaking,
    /// Registered in the neighbor set, keepalives flowing.
    Established,
    /// Torn down. Terminal.
    Removed,
}

impl SessionPhase {
    /// Whether moving from `self` to `next` is a legal transition.
    pub fn can_advance_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (Connecting, Handshaking)
                | (Handshaking, Established)
                | (Connecting | Handshaking | Established, Removed)
        )
    }

    /// Whether the session is established.
    pub fn is_established(self) -> bool {
        self == SessionPhase::Established
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Handshaking => "handshaking",
            Self::Established => "established",
            Self::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// Which side opened the control connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRole {
    /// We dialed; we send our handshake first.
    Initiator,
    /// The peer dialed; we answer its handshake.
    Acceptor,
}

/// Illegal phase transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal session transition {from} -> {to}")]
pub struct TransitionError {
    /// Phase the session was in.
    pub from: SessionPhase,
    /// Phase that was requested.
    pub to: SessionPhase,
}

/// One connection attempt to or from a peer.
#[derive(Debug)]
pub struct SessionAttempt {
    token: SessionToken,
    role: SessionRole,
    peer: SocketAddr,
    phase: SessionPhase,
}

impl SessionAttempt {
    /// Start an outbound attempt.
    pub fn outbound(token: SessionToken, peer: SocketAddr) -> Self {
        Self {
            token,
            role: SessionRole::Initiator,
            peer,
            phase: SessionPhase::Connecting,
        }
    }

    /// Start handling an accepted connection.
    pub fn inbound(token: SessionToken, peer: SocketAddr) -> Self {
        Self {
            token,
            role: SessionRole::Acceptor,
            peer,
            phase: SessionPhase::Handshaking,
        }
    }

    /// Session token.
    pub fn token(&self) -> SessionToken {
        self.token
    }

    /// Which side we are.
    pub fn role(&self) -> SessionRole {
        self.role
    }

    /// Remote control address.
    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Move to `next`, rejecting illegal transitions.
    pub fn advance(&mut self, next: SessionPhase) -> Result<(), TransitionError> {
        if !self.phase.can_advance_to(next) {
            return Err(TransitionError {
                from: self.phase,
                to: next,
            });
        }
        debug!(session = %self.token, peer = %self.peer, from = %self.phase, to = %next, "session phase");
        self.phase = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer() -> SocketAddr {
        "192.168.0.2:5000".parse().unwrap()
    }

    #[test]
    fn test_outbound_lifecycle() {
        let mut s = SessionAttempt::outbound(SessionToken::new(1), peer());
        assert_eq!(s.phase(), SessionPhase::Connecting);
        assert_eq!(s.role(), SessionRole::Initiator);
        s.advance(SessionPhase::Handshaking).unwrap();
        s.advance(SessionPhase::Established).unwrap();
        assert!(s.phase().is_established());
        s.advance(SessionPhase::Removed).unwrap();
    }

    #[test]
    fn test_inbound_skips_connecting() {
        let mut s = SessionAttempt::inbound(SessionToken::new(2), peer());
        assert_eq!(s.phase(), SessionPhase::Handshaking);
        assert_eq!(s.role(), SessionRole::Acceptor);
        assert!(s.advance(SessionPhase::Connecting).is_err());
        s.advance(SessionPhase::Established).unwrap();
    }

    #[test]
    fn test_removed_is_terminal() {
        let mut s = SessionAttempt::outbound(SessionToken::new(3), peer());
        s.advance(SessionPhase::Removed).unwrap();
        for next in [
            SessionPhase::Connecting,
            SessionPhase::Handshaking,
            SessionPhase::Established,
            SessionPhase::Removed,
        ] {
            assert_eq!(
                s.advance(next),
                Err(TransitionError {
                    from: SessionPhase::Removed,
                    to: next
                })
            );
        }
    }

    #[test]
    fn test_cannot_skip_handshake() {
        let mut s = SessionAttempt::outbound(SessionToken::new(4), peer());
        assert!(s.advance(SessionPhase::Established).is_err());
    }
}
