use crate::domain::{HistoryEntry, HistoryEvent, HistoryKind, UserId};
use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::state::AppState;

use axum::{
    extract::{Json, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryQuery {
    // The user asking; entries they wrote come back with ifSelf = true.
    local_id: UserId,
    remote_id: UserId,
}

#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntryDto {
    pub message: String,
    pub timestamp: u64,
    pub if_self: bool,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl From<HistoryEntry> for HistoryEntryDto {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            message: entry.message,
            timestamp: entry.timestamp,
            if_self: entry.is_self,
            kind: entry.kind.as_str(),
        }
    }
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySaveRequest {
    local_id: UserId,
    remote_id: UserId,
    content: String,
    #[serde(rename = "type")]
    kind: String,
    // Defaults to the server clock when omitted.
    #[serde(default)]
    timestamp: Option<u64>,
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
        .into_response()
}

pub async fn history_query_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HistoryQuery>,
) -> impl IntoResponse {
    match state.history.query(query.local_id, query.remote_id).await {
        Ok(entries) => {
            let body: Vec<HistoryEntryDto> =
                entries.into_iter().map(HistoryEntryDto::from).collect();
            (StatusCode::OK, Json(body)).into_response()
        }
        Err(e) => {
            warn!(
                local_id = query.local_id,
                remote_id = query.remote_id,
                error = %e,
                "history query failed"
            );
            error_response(StatusCode::BAD_GATEWAY, "history unavailable")
        }
    }
}

pub async fn history_save_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<HistorySaveRequest>,
) -> impl IntoResponse {
    let Some(kind) = HistoryKind::parse(payload.kind.trim()) else {
        return error_response(StatusCode::BAD_REQUEST, "type must be chat or video");
    };

    let event = HistoryEvent {
        local_id: payload.local_id,
        remote_id: payload.remote_id,
        content: payload.content,
        kind,
        timestamp: payload
            .timestamp
            .unwrap_or_else(|| state.clock.now_epoch_millis()),
    };

    match state.history.save(event).await {
        Ok(()) => StatusCode::CREATED.into_response(),
        Err(e) => {
            warn!(error = %e, "history save failed");
            error_response(StatusCode::BAD_GATEWAY, "history unavailable")
        }
    }
}
