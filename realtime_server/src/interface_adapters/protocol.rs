// Wire protocol DTOs and conversions for the client WebSocket.

use crate::domain::world::DEFAULT_ACTION;
use crate::domain::{Participant, UserId, WorldUpdate};
use crate::use_cases::{Outbound, RejectReason};
use serde::{Deserialize, Serialize};

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    Chat(ChatPayload),
    VideoInvite(CallTarget),
    VideoAccept(CallTarget),
    VideoReject(CallTarget),
    VideoEnd(CallTarget),
    VideoCancel(CallTarget),
    VideoProcessing(ProcessingPayload),
    // First world-sync message; forces the action to idle.
    Init(WorldStateDto),
    Update(WorldStateDto),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPayload {
    pub remote_id: UserId,
    pub message: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallTarget {
    pub to_id: UserId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingPayload {
    pub to_id: UserId,
    // Opaque negotiation data (SDP, ICE candidates, ...).
    #[serde(default)]
    pub forward_data: serde_json::Value,
}

/// Position/appearance fields carried by `init` and `update`.
#[derive(Debug, Clone, Deserialize)]
pub struct WorldStateDto {
    pub model: String,
    pub colour: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub heading: f64,
    #[serde(alias = "pb")]
    pub pitch: f64,
    #[serde(default)]
    pub action: Option<String>,
}

impl WorldStateDto {
    pub fn into_init(self) -> WorldUpdate {
        let mut update = self.into_update();
        update.action = Some(DEFAULT_ACTION.to_string());
        update
    }

    pub fn into_update(self) -> WorldUpdate {
        WorldUpdate {
            model: self.model,
            colour: self.colour,
            x: self.x,
            y: self.y,
            z: self.z,
            heading: self.heading,
            pitch: self.pitch,
            action: self.action,
        }
    }
}

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    #[serde(rename = "chat")]
    Chat(ChatDto),
    #[serde(rename = "video-invite")]
    VideoInvite(CallSignalDto),
    #[serde(rename = "video-accept")]
    VideoAccept(CallSignalDto),
    #[serde(rename = "video-reject")]
    VideoReject(CallRejectDto),
    #[serde(rename = "video-processing")]
    VideoProcessing(ProcessingDto),
    #[serde(rename = "video-end")]
    VideoEnd(CallSignalDto),
    #[serde(rename = "video-cancel")]
    VideoCancel(CallSignalDto),
    // Batched world state for one tick.
    #[serde(rename = "remoteData")]
    RemoteData { data: Vec<ParticipantDto> },
    #[serde(rename = "deletePlayer")]
    DeletePlayer { id: UserId },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatDto {
    pub from_id: UserId,
    pub to_id: UserId,
    pub message: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSignalDto {
    pub from_id: UserId,
    pub to_id: UserId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRejectDto {
    pub from_id: UserId,
    pub to_id: UserId,
    pub reason: RejectReasonDto,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectReasonDto {
    Offline,
    Busy,
    Reject,
}

impl From<RejectReason> for RejectReasonDto {
    fn from(reason: RejectReason) -> Self {
        match reason {
            RejectReason::Offline => RejectReasonDto::Offline,
            RejectReason::Busy => RejectReasonDto::Busy,
            RejectReason::Reject => RejectReasonDto::Reject,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingDto {
    pub from_id: UserId,
    pub to_id: UserId,
    pub forward_data: serde_json::Value,
}

/// Flattened participant state for wire transmission in world batches.
#[derive(Debug, Clone, Serialize)]
pub struct ParticipantDto {
    pub id: UserId,
    pub model: String,
    pub colour: String,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub heading: f64,
    // Existing clients read pitch as `pb`.
    #[serde(rename = "pb")]
    pub pitch: f64,
    pub action: String,
}

impl From<Participant> for ParticipantDto {
    fn from(p: Participant) -> Self {
        Self {
            id: p.id,
            model: p.model,
            colour: p.colour,
            x: p.x,
            y: p.y,
            z: p.z,
            heading: p.heading,
            pitch: p.pitch,
            action: p.action,
        }
    }
}

impl From<Outbound> for ServerMessage {
    fn from(msg: Outbound) -> Self {
        match msg {
            Outbound::Chat {
                from_id,
                to_id,
                message,
                timestamp,
            } => ServerMessage::Chat(ChatDto {
                from_id,
                to_id,
                message,
                timestamp,
            }),
            Outbound::CallInvite { from_id, to_id } => {
                ServerMessage::VideoInvite(CallSignalDto { from_id, to_id })
            }
            Outbound::CallAccept { from_id, to_id } => {
                ServerMessage::VideoAccept(CallSignalDto { from_id, to_id })
            }
            Outbound::CallReject {
                from_id,
                to_id,
                reason,
            } => ServerMessage::VideoReject(CallRejectDto {
                from_id,
                to_id,
                reason: reason.into(),
            }),
            Outbound::CallProcessing {
                from_id,
                to_id,
                forward_data,
            } => ServerMessage::VideoProcessing(ProcessingDto {
                from_id,
                to_id,
                forward_data,
            }),
            Outbound::CallEnd { from_id, to_id } => {
                ServerMessage::VideoEnd(CallSignalDto { from_id, to_id })
            }
            Outbound::CallCancel { from_id, to_id } => {
                ServerMessage::VideoCancel(CallSignalDto { from_id, to_id })
            }
            Outbound::WorldBatch { participants } => ServerMessage::RemoteData {
                data: participants.into_iter().map(ParticipantDto::from).collect(),
            },
            Outbound::ParticipantRemoved { user_id } => ServerMessage::DeletePlayer { id: user_id },
        }
    }
}
