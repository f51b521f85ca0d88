//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{
    stream::{SplitSink, SplitStream},
    SinkExt, StreamExt,
};
use serde::Deserialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::app::AppState;
use crate::game::{ArenaHandle, ArenaLayout, GameArena, PlayerInput};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::util::time::unix_millis;
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// Query parameters for WebSocket connection
#[derive(Debug, Default, Deserialize)]
pub struct WsQuery {
    /// Preferred display name
    pub name: Option<String>,
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, query.name, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, display_name: Option<String>, state: AppState) {
    // Anonymous sessions: identity lives only as long as the connection.
    let user_id = Uuid::new_v4();
    info!(user_id = %user_id, "New WebSocket connection");

    let (mut ws_sink, ws_stream) = socket.split();

    let welcome = ServerMsg::Welcome {
        user_id,
        server_time: unix_millis(),
    };
    if let Err(e) = send_msg(&mut ws_sink, &welcome).await {
        error!(user_id = %user_id, error = %e, "Failed to send welcome");
        return;
    }

    run_session(user_id, display_name, ws_sink, ws_stream, state).await;

    info!(user_id = %user_id, "WebSocket connection closed");
}

/// Run the WebSocket session with read/write split
///
/// Before the first join the sink stays with the session for direct
/// replies; once attached to an arena the sink moves into the writer task,
/// which merges the arena broadcast with a per-session reply channel so
/// pongs only ever reach the client that pinged.
async fn run_session(
    user_id: Uuid,
    display_name: Option<String>,
    ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    state: AppState,
) {
    let rate_limiter = PlayerRateLimiter::new();
    let mut sink = Some(ws_sink);
    let mut attached: Option<ArenaHandle> = None;
    let mut writer: Option<tokio::task::JoinHandle<()>> = None;
    let (reply_tx, reply_rx) = mpsc::channel::<ServerMsg>(16);
    let mut reply_rx = Some(reply_rx);

    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(user_id = %user_id, "Rate limited input message");
                    continue;
                }

                let client_msg = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => msg,
                    Err(e) => {
                        warn!(user_id = %user_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                // Pongs are session-scoped and never routed through the
                // arena.
                if let ClientMsg::Ping { t } = client_msg {
                    let pong = ServerMsg::Pong { t };
                    if let Some(s) = sink.as_mut() {
                        let _ = send_msg(s, &pong).await;
                    } else {
                        let _ = reply_tx.send(pong).await;
                    }
                    continue;
                }

                if let Some(handle) = &attached {
                    if handle
                        .input_tx
                        .send(PlayerInput {
                            user_id,
                            msg: client_msg,
                            received_at: unix_millis(),
                        })
                        .await
                        .is_err()
                    {
                        debug!(user_id = %user_id, "Input channel closed");
                        break;
                    }
                    continue;
                }

                match client_msg {
                    ClientMsg::JoinArena {
                        arena_id,
                        team,
                        display_name: name_override,
                    } => {
                        let handle = resolve_arena(&state, arena_id);
                        let event_rx = handle.event_tx.subscribe();

                        if let (Some(moved_sink), Some(rx)) = (sink.take(), reply_rx.take()) {
                            writer = Some(tokio::spawn(write_loop(
                                user_id, moved_sink, event_rx, rx,
                            )));
                        }

                        let join = ClientMsg::JoinArena {
                            arena_id: Some(handle.id),
                            team,
                            display_name: name_override.or_else(|| display_name.clone()),
                        };
                        if handle
                            .input_tx
                            .send(PlayerInput {
                                user_id,
                                msg: join,
                                received_at: unix_millis(),
                            })
                            .await
                            .is_err()
                        {
                            debug!(user_id = %user_id, "Arena refused join, channel closed");
                            break;
                        }
                        attached = Some(handle);
                    }
                    _ => {
                        if let Some(s) = sink.as_mut() {
                            let _ = send_msg(
                                s,
                                &ServerMsg::Error {
                                    code: "not_in_arena".to_string(),
                                    message: "Join an arena first".to_string(),
                                },
                            )
                            .await;
                        }
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(user_id = %user_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(user_id = %user_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(user_id = %user_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(user_id = %user_id, "Client initiated close");
                break;
            }
            Err(e) => {
                error!(user_id = %user_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Signal disconnect to the arena loop
    if let Some(handle) = &attached {
        let _ = handle
            .input_tx
            .send(PlayerInput {
                user_id,
                msg: ClientMsg::LeaveArena,
                received_at: unix_millis(),
            })
            .await;
    }

    if let Some(writer) = writer {
        writer.abort();
    }
}

/// Writer task: arena broadcast plus session replies -> WebSocket
async fn write_loop(
    user_id: Uuid,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut event_rx: broadcast::Receiver<ServerMsg>,
    mut reply_rx: mpsc::Receiver<ServerMsg>,
) {
    loop {
        let msg = tokio::select! {
            event = event_rx.recv() => match event {
                Ok(msg) => msg,
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    // Don't disconnect for lag, newer snapshots supersede
                    warn!(
                        user_id = %user_id,
                        lagged_count = n,
                        "Client lagged, skipping {} messages", n
                    );
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!(user_id = %user_id, "Arena event channel closed");
                    break;
                }
            },
            reply = reply_rx.recv() => match reply {
                Some(msg) => msg,
                None => break,
            },
        };
        if let Err(e) = send_msg(&mut ws_sink, &msg).await {
            debug!(user_id = %user_id, error = %e, "WebSocket send failed");
            break;
        }
    }
}

/// Find the requested arena, fall back to any open one, or spin up a fresh
/// arena task.
fn resolve_arena(state: &AppState, arena_id: Option<Uuid>) -> ArenaHandle {
    if let Some(id) = arena_id {
        if let Some(handle) = state.registry.get(&id) {
            return handle;
        }
    }

    if let Some(handle) = state
        .registry
        .find_available(state.config.max_players_per_arena)
    {
        return handle;
    }

    let (arena, handle) = GameArena::new(
        Uuid::new_v4(),
        ArenaLayout::standard(),
        state.config.match_time_secs as f32,
        state.config.min_players,
        state.config.max_players_per_arena,
    );
    state.registry.insert(handle.clone());

    let registry = state.registry.clone();
    let id = handle.id;
    tokio::spawn(async move {
        arena.run().await;
        registry.remove(&id);
        info!(arena_id = %id, "Arena task finished");
    });

    handle
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
