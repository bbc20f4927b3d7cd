use crate::domain::UserId;
use crate::interface_adapters::net::dispatch::dispatch;
use crate::interface_adapters::protocol::ClientMessage;
use crate::interface_adapters::state::AppState;
use crate::use_cases::ConnectionHandle;

use axum::{
    Error,
    extract::{
        Path, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::mpsc;
use tracing::{Instrument, debug, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    EgressClosed,
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

enum LoopControl {
    Continue,
    Disconnect,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<UserId>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, user_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, user_id: UserId) {
    let (handle, egress_rx) = ConnectionHandle::new(state.egress_capacity);
    // Separate connection id for telling a replaced session apart from its successor.
    let span = info_span!("conn", conn_id = handle.token(), user_id);
    serve_connection(socket, state, user_id, handle, egress_rx)
        .instrument(span)
        .await;
}

async fn serve_connection(
    mut socket: WebSocket,
    state: Arc<AppState>,
    user_id: UserId,
    handle: ConnectionHandle,
    mut egress_rx: mpsc::Receiver<Utf8Bytes>,
) {
    // Newest connection wins; the old socket task sees its close signal and exits.
    if let Some(previous) = state.registry.upsert(user_id, handle.clone()) {
        previous.close();
        info!(
            replaced_conn_id = previous.token(),
            "previous connection replaced"
        );
    }
    state.signaling.on_connect(user_id);
    state.world.on_connect(user_id);
    info!("client connected");

    let mut ctx = ConnCtx::new(user_id);

    if let Err(e) = run_client_loop(&mut socket, &state, &handle, &mut egress_rx, &mut ctx).await
    {
        warn!(error = ?e, "client loop exited with error");
    }

    disconnect_cleanup(&state, &handle, &ctx).await;
}

struct ConnCtx {
    pub user_id: UserId,

    pub msgs_in: u64,
    pub msgs_out: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,

    pub invalid_total: u64,
    pub dropped_total: u64,

    pub last_invalid_log: Instant,

    pub close_frame: Option<CloseFrame>,
}

impl ConnCtx {
    fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            msgs_in: 0,
            msgs_out: 0,
            bytes_in: 0,
            bytes_out: 0,
            invalid_total: 0,
            dropped_total: 0,
            last_invalid_log: Instant::now() - LOG_THROTTLE,
            close_frame: None,
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

async fn run_client_loop(
    socket: &mut WebSocket,
    state: &AppState,
    handle: &ConnectionHandle,
    egress_rx: &mut mpsc::Receiver<Utf8Bytes>,
    ctx: &mut ConnCtx,
) -> Result<(), NetError> {
    let mut fatal: Option<NetError> = None;

    loop {
        // disconnect becomes true on error
        let disconnect: bool = tokio::select! {
            // Incoming message from the client
            incoming = socket.recv() => {
                match handle_incoming_ws(state, incoming, ctx).await {
                    LoopControl::Continue => false,
                    LoopControl::Disconnect => true,
                }
            }

            // Outgoing frame queued by the router
            frame = egress_rx.recv() => {
                match frame {
                    Some(frame) => match forward_frame(frame, socket, ctx).await {
                        Ok(()) => false,
                        Err(e) => {
                            fatal = Some(e);
                            true
                        }
                    },
                    None => {
                        fatal = Some(NetError::EgressClosed);
                        true
                    }
                }
            }

            // Connection replacement signal for duplicate user ids.
            _ = handle.closed() => {
                // Ask the client to close; a newer connection took ownership.
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "connection replaced".into(),
                });
                info!("connection replaced by newer session");
                true
            }
        };

        if disconnect {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

async fn handle_incoming_ws(
    state: &AppState,
    incoming: Option<Result<Message, Error>>,
    ctx: &mut ConnCtx,
) -> LoopControl {
    let user_id = ctx.user_id;
    match incoming {
        Some(Ok(msg)) => match msg {
            Message::Text(text) => {
                ctx.msgs_in += 1;
                ctx.bytes_in += text.len() as u64;

                match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(msg) => {
                        dispatch(state, user_id, msg).await;
                        LoopControl::Continue
                    }
                    // Malformed payloads are dropped; the connection stays open.
                    Err(parse_err) => {
                        ctx.invalid_total += 1;
                        if should_log(&mut ctx.last_invalid_log) {
                            warn!(
                                bytes = text.len(),
                                error = %parse_err,
                                "failed to parse client message"
                            );
                        }
                        LoopControl::Continue
                    }
                }
            }
            Message::Binary(_) => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::UNSUPPORTED,
                    reason: "binary messages not supported".into(),
                });
                LoopControl::Disconnect
            }
            Message::Ping(_) | Message::Pong(_) => LoopControl::Continue,
            Message::Close(_) => LoopControl::Disconnect,
        },
        Some(Err(e)) => {
            warn!(error = %e, "websocket recv error");
            LoopControl::Disconnect
        }
        None => {
            info!("websocket closed");
            LoopControl::Disconnect
        }
    }
}

async fn forward_frame(
    frame: Utf8Bytes,
    socket: &mut WebSocket,
    ctx: &mut ConnCtx,
) -> Result<(), NetError> {
    let bytes_len = frame.len();
    match socket.send(Message::Text(frame)).await {
        Ok(()) => {
            ctx.msgs_out += 1;
            ctx.bytes_out += bytes_len as u64;
            Ok(())
        }
        Err(err) => {
            ctx.dropped_total += 1;
            // Log unexpected send failures; disconnect will follow immediately.
            warn!(error = ?err, "failed to send frame");
            Err(err.into())
        }
    }
}

async fn disconnect_cleanup(state: &AppState, handle: &ConnectionHandle, ctx: &ConnCtx) {
    let user_id = ctx.user_id;
    // Stop the router from queueing more frames for this socket.
    handle.close();

    // Only the connection that still owns the registry slot tears down user state.
    if state.registry.remove(user_id, handle) {
        state.signaling.on_disconnect(user_id).await;
        state.world.on_disconnect(user_id);
        info!("client disconnected");
    } else {
        info!("superseded connection closed");
    }

    debug!(
        msgs_in = ctx.msgs_in,
        msgs_out = ctx.msgs_out,
        bytes_in = ctx.bytes_in,
        bytes_out = ctx.bytes_out,
        invalid_total = ctx.invalid_total,
        dropped_total = ctx.dropped_total,
        "connection stats"
    );
}
