use crate::domain::UserId;
use crate::interface_adapters::protocol::ClientMessage;
use crate::interface_adapters::state::AppState;

use tracing::debug;

// Routes one parsed client message to the workflow that owns it.
pub async fn dispatch(state: &AppState, user_id: UserId, msg: ClientMessage) {
    match msg {
        ClientMessage::Chat(payload) => {
            state
                .chat
                .on_chat(user_id, payload.remote_id, payload.message);
        }
        ClientMessage::VideoInvite(target) => state.signaling.invite(user_id, target.to_id).await,
        ClientMessage::VideoAccept(target) => state.signaling.accept(user_id, target.to_id).await,
        ClientMessage::VideoReject(target) => state.signaling.reject(user_id, target.to_id).await,
        ClientMessage::VideoEnd(target) => state.signaling.end(user_id, target.to_id).await,
        ClientMessage::VideoCancel(target) => state.signaling.cancel(user_id, target.to_id).await,
        ClientMessage::VideoProcessing(payload) => {
            state
                .signaling
                .processing(user_id, payload.to_id, payload.forward_data);
        }
        ClientMessage::Init(dto) => {
            if !state.world.on_update(user_id, dto.into_init()) {
                debug!(user_id, "init ignored; no world snapshot");
            }
        }
        ClientMessage::Update(dto) => {
            state.world.on_update(user_id, dto.into_update());
        }
    }
}
