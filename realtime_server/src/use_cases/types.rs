// Use-case level outputs handed to the message router.

use crate::domain::{Participant, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    Offline,
    Busy,
    Reject,
}

#[derive(Debug, Clone)]
pub enum Outbound {
    Chat {
        from_id: UserId,
        to_id: UserId,
        message: String,
        timestamp: u64,
    },
    CallInvite {
        from_id: UserId,
        to_id: UserId,
    },
    CallAccept {
        from_id: UserId,
        to_id: UserId,
    },
    CallReject {
        from_id: UserId,
        to_id: UserId,
        reason: RejectReason,
    },
    CallProcessing {
        from_id: UserId,
        to_id: UserId,
        forward_data: serde_json::Value,
    },
    CallEnd {
        from_id: UserId,
        to_id: UserId,
    },
    CallCancel {
        from_id: UserId,
        to_id: UserId,
    },
    WorldBatch {
        participants: Vec<Participant>,
    },
    ParticipantRemoved {
        user_id: UserId,
    },
}
