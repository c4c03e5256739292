//! WebSocket upgrade handler for overlays and the control panel

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{CommandError, MatchCommand, MatchHandle};
use crate::http::middleware::verify_admin;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Admin token; overlays connect without one
    #[serde(default)]
    pub token: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let admin = match &query.token {
        None => false,
        Some(token) => match verify_admin(token, &state.config.admin_jwt_secret) {
            Ok(claims) => {
                info!(operator = %claims.sub, "WebSocket upgrade for admin");
                true
            }
            Err(e) => {
                error!(error = %e, "WebSocket auth failed");
                return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
            }
        },
    };

    let handle = state.match_handle.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, handle, admin))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, handle: MatchHandle, admin: bool) {
    let session_id = Uuid::new_v4();
    info!(session_id = %session_id, admin, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        server_time: unix_millis(),
        admin,
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(session_id = %session_id, error = %e, "Failed to send welcome");
        return;
    }

    // Late joiners draw the current frame immediately
    if let Some(snapshot) = handle.latest_snapshot() {
        if send_msg(&mut ws_sink, &ServerMsg::Snapshot { snapshot }).await.is_err() {
            return;
        }
    }

    let broadcast_rx = handle.subscribe();
    run_session(session_id, admin, handle, ws_sink, ws_stream, broadcast_rx).await;

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
async fn run_session(
    session_id: Uuid,
    admin: bool,
    handle: MatchHandle,
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    mut broadcast_rx: broadcast::Receiver<ServerMsg>,
) {
    // Replies meant for this session only (pong, errors)
    let (direct_tx, mut direct_rx) = mpsc::channel::<ServerMsg>(32);

    // Writer task: broadcasts and direct replies -> WebSocket
    let writer_handle = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                received = broadcast_rx.recv() => match received {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(session_id = %session_id, lagged_count = n, "Client lagged, skipping messages");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!(session_id = %session_id, "Broadcast channel closed");
                        break;
                    }
                },
                direct = direct_rx.recv() => match direct {
                    Some(msg) => msg,
                    None => break,
                },
            };

            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    // Reader loop: WebSocket -> match loop
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMsg>(&text) {
                Ok(client_msg) => {
                    if let Some(reply) = handle_client_msg(&handle, admin, client_msg).await {
                        if direct_tx.send(reply).await.is_err() {
                            break;
                        }
                    }
                }
                Err(e) => {
                    warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                }
            },
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    writer_handle.abort();
}

/// Apply one client message; returns the direct reply, if any
async fn handle_client_msg(
    handle: &MatchHandle,
    admin: bool,
    msg: ClientMsg,
) -> Option<ServerMsg> {
    let command = match msg {
        ClientMsg::Ping { t } => return Some(ServerMsg::Pong { t }),
        ClientMsg::OpenLobby => MatchCommand::OpenLobby,
        ClientMsg::StartBattle => MatchCommand::StartBattle,
        ClientMsg::Eliminate { username } => MatchCommand::Eliminate { username },
        ClientMsg::Reset => MatchCommand::Reset,
    };

    if !admin {
        return Some(ServerMsg::Error {
            code: "forbidden".to_string(),
            message: "Admin token required".to_string(),
        });
    }

    match handle.request(command).await {
        Ok(()) => None,
        Err(CommandError::Stopped) => Some(ServerMsg::Error {
            code: "unavailable".to_string(),
            message: "Match loop is not running".to_string(),
        }),
        Err(CommandError::Rejected(e)) => Some(ServerMsg::Error {
            code: "rejected".to_string(),
            message: e.to_string(),
        }),
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json)).await.map_err(|e| e.to_string())
}
