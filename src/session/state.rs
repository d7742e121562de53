//! Session lifecycle states.
//!
//! ```text
//! CREATED ──listen──► WAIT_PASSIVELY ──first datagram──► READY
//!    └─────────────── first datagram ──────────────────────┘
//! READY ──close──► FIN ──FIN_ACK──► FIN_ACK ──all acked──► WAIT_FREE
//! ≤ READY ──FIN──► FIN_ACK
//! any ──timeout──► WAIT_FREE
//! ```

use std::fmt;

/// Lifecycle state of a session.
///
/// States only ever move forward; [`advance_to`](Self::advance_to)
/// refuses backward transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, neither listening nor connected.
    Created,
    /// Listening for the first datagram from a peer.
    WaitPassively,
    /// Established; data flows both ways.
    Ready,
    /// Close requested locally, FIN sent.
    Fin,
    /// Close agreed, draining unacknowledged data.
    FinAck,
    /// Removed from the registry, awaiting release.
    WaitFree,
}

impl SessionState {
    /// Ordinal used for forward-only comparisons.
    fn rank(self) -> u8 {
        match self {
            Self::Created => 0,
            Self::WaitPassively => 1,
            Self::Ready => 2,
            Self::Fin => 3,
            Self::FinAck => 4,
            Self::WaitFree => 5,
        }
    }

    /// Whether the application may send data.
    pub fn is_sendable(self) -> bool {
        self != Self::WaitPassively && self.rank() < Self::FinAck.rank()
    }

    /// Whether inbound data still reaches the application.
    pub fn accepts_input(self) -> bool {
        self.rank() < Self::FinAck.rank()
    }

    /// Whether the session may still use the wire.
    ///
    /// Covers FIN_ACK replies, retransmissions and acknowledgments while
    /// draining.
    pub fn can_transmit(self) -> bool {
        !self.is_terminal()
    }

    /// Whether a FIN from the peer should be answered.
    ///
    /// `Fin` answers too, so a simultaneous close completes.
    pub fn answers_fin(self) -> bool {
        self.rank() <= Self::Fin.rank()
    }

    /// Whether the first datagram moves this state to `Ready`.
    pub fn awaits_peer(self) -> bool {
        matches!(self, Self::Created | Self::WaitPassively)
    }

    /// Whether the session has been removed from its registry.
    pub fn is_terminal(self) -> bool {
        self == Self::WaitFree
    }

    /// Move to `next` if that is a forward transition.
    ///
    /// Returns `false` and leaves the state untouched otherwise.
    pub fn advance_to(&mut self, next: SessionState) -> bool {
        if next.rank() > self.rank() {
            *self = next;
            true
        } else {
            false
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "CREATED",
            Self::WaitPassively => "WAIT_PASSIVELY",
            Self::Ready => "READY",
            Self::Fin => "FIN",
            Self::FinAck => "FIN_ACK",
            Self::WaitFree => "WAIT_FREE",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [SessionState; 6] = [
        SessionState::Created,
        SessionState::WaitPassively,
        SessionState::Ready,
        SessionState::Fin,
        SessionState::FinAck,
        SessionState::WaitFree,
    ];

    #[test]
    fn test_send_guard() {
        use SessionState::*;
        let sendable: Vec<_> = ALL.into_iter().filter(|s| s.is_sendable()).collect();
        assert_eq!(sendable, vec![Created, Ready, Fin]);
    }

    #[test]
    fn test_input_guard() {
        use SessionState::*;
        let accepting: Vec<_> = ALL.into_iter().filter(|s| s.accepts_input()).collect();
        assert_eq!(accepting, vec![Created, WaitPassively, Ready, Fin]);
        assert!(FinAck.can_transmit());
        assert!(!WaitFree.can_transmit());
    }

    #[test]
    fn test_never_moves_backward() {
        for from in ALL {
            for to in ALL {
                let mut state = from;
                let moved = state.advance_to(to);
                if moved {
                    assert!(to.rank() > from.rank());
                    assert_eq!(state, to);
                } else {
                    assert_eq!(state, from);
                }
            }
        }
    }

    #[test]
    fn test_fin_answer_and_terminal() {
        use SessionState::*;
        assert!(Created.answers_fin());
        assert!(Ready.answers_fin());
        assert!(Fin.answers_fin());
        assert!(!FinAck.answers_fin());

        assert!(WaitFree.is_terminal());
        assert!(!FinAck.is_terminal());
    }

    #[test]
    fn test_display() {
        assert_eq!(SessionState::WaitPassively.to_string(), "WAIT_PASSIVELY");
        assert_eq!(SessionState::FinAck.to_string(), "FIN_ACK");
    }
}
