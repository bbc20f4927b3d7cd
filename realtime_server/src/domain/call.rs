// Per-user call state for the signaling handshake.

use super::UserId;

/// Which side of the handshake a busy user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallRole {
    Initiator,
    Receiver,
}

/// An invite in flight or an accepted call, seen from one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveCall {
    pub role: CallRole,
    pub peer: UserId,
    // Epoch millis of the invite (initiator) or accept (receiver).
    pub started_at: u64,
}

/// A user is either idle or busy with exactly one peer.
///
/// Busy always carries a role and a start time, so "busy without a call"
/// cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CallState {
    #[default]
    Idle,
    Busy(ActiveCall),
}

impl CallState {
    pub fn start(role: CallRole, peer: UserId, started_at: u64) -> Self {
        Self::Busy(ActiveCall {
            role,
            peer,
            started_at,
        })
    }

    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Busy(_))
    }

    pub fn active(&self) -> Option<&ActiveCall> {
        match self {
            Self::Idle => None,
            Self::Busy(call) => Some(call),
        }
    }

    /// True when busy with `peer`, in either role.
    pub fn references(&self, peer: UserId) -> bool {
        self.active().is_some_and(|call| call.peer == peer)
    }

    pub fn is_initiator_of(&self, peer: UserId) -> bool {
        self.active()
            .is_some_and(|call| call.peer == peer && call.role == CallRole::Initiator)
    }

    pub fn is_receiver_of(&self, peer: UserId) -> bool {
        self.active()
            .is_some_and(|call| call.peer == peer && call.role == CallRole::Receiver)
    }

    pub fn reset(&mut self) {
        *self = Self::Idle;
    }
}
