// [apps/gateway/src/handlers/ws.rs]
/*!
 * =================================================================
 * APARATO: AUTHENTICATED REALTIME SOCKET
 * CLASIFICACIÓN: API HANDLER (L4)
 * RESPONSABILIDAD: PROTOCOLO DE AUTENTICACIÓN POST-UPGRADE Y DIFUSIÓN
 *                  DE EVENTOS DEL BUS INTERNO
 *
 * Browser WebSocket clients can't attach an Authorization header to the
 * upgrade request, so this route sits outside `auth_guard`: the socket
 * opens unauthenticated and the first frame it must send is AUTHENTICATE.
 * Everything before that succeeds is rejected.
 * =================================================================
 */

use crate::state::AppState;
use crate::ws_hub::WsEvent;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use chrono::Utc;
use futures::{sink::SinkExt, stream::StreamExt};
use meridian_crypto::token::validate_token;
use meridian_domain::identity::Identity;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::time::{interval, Duration, Instant};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

/// Ping cadence. A missed pong past `PONG_TIMEOUT_SECONDS` closes the link.
const PING_INTERVAL_SECONDS: u64 = 30;
const PONG_TIMEOUT_SECONDS: u64 = 60;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", content = "data")]
enum ClientFrame {
    #[serde(rename = "AUTHENTICATE")]
    Authenticate { token: String },
    #[serde(rename = "SUBSCRIBE_SESSION")]
    SubscribeSession { session_id: Uuid },
    #[serde(rename = "UNSUBSCRIBE_SESSION")]
    UnsubscribeSession { session_id: Uuid },
    #[serde(rename = "SUBSCRIBE_COMMAND")]
    SubscribeCommand { execution_id: Uuid },
    #[serde(rename = "UNSUBSCRIBE_COMMAND")]
    UnsubscribeCommand { execution_id: Uuid },
    #[serde(rename = "JOIN_COLLABORATION")]
    JoinCollaboration { session_id: Uuid },
    #[serde(rename = "TYPING_INDICATOR")]
    TypingIndicator { session_id: Uuid, is_typing: bool },
    #[serde(rename = "SEND_MESSAGE")]
    SendMessage { session_id: Uuid, text: String },
    #[serde(rename = "PING")]
    Ping,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", content = "data")]
enum ServerFrame {
    #[serde(rename = "AUTH_SUCCESS")]
    AuthSuccess { principal_id: Uuid, display_name: String },
    #[serde(rename = "AUTH_FAILED")]
    AuthFailed { reason: String },
    #[serde(rename = "PONG")]
    Pong,
}

/// What a connection has subscribed to, shared between the inbound and
/// outbound halves of the socket.
#[derive(Default)]
struct ConnectionState {
    identity: Option<Identity>,
    subscribed_sessions: HashSet<Uuid>,
    subscribed_executions: HashSet<Uuid>,
    last_pong: Option<Instant>,
}

pub async fn handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

#[instrument(skip(socket, state))]
async fn handle_socket(socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();
    info!(%connection_id, "websocket connection opened");

    let (socket_sender, mut socket_receiver) = socket.split();
    let socket_sender = Arc::new(Mutex::new(socket_sender));
    let connection_state = Arc::new(Mutex::new(ConnectionState::default()));

    let downstream_state = Arc::clone(&connection_state);
    let downstream_sender = Arc::clone(&socket_sender);
    let mut event_bus_subscriber = state.ws_hub.subscribe();
    let mut downstream_task = tokio::spawn(async move {
        let mut ping_timer = interval(Duration::from_secs(PING_INTERVAL_SECONDS));
        loop {
            tokio::select! {
                _ = ping_timer.tick() => {
                    let stale = {
                        let guard = downstream_state.lock().await;
                        guard
                            .last_pong
                            .map(|t| t.elapsed() > Duration::from_secs(PONG_TIMEOUT_SECONDS))
                            .unwrap_or(false)
                    };
                    if stale {
                        warn!(%connection_id, "missed pong past timeout, closing socket");
                        break;
                    }
                    if downstream_sender.lock().await.send(Message::Ping(vec![])).await.is_err() {
                        break;
                    }
                },
                received = event_bus_subscriber.recv() => {
                    match received {
                        Ok(event) => {
                            if !event_matches_subscription(&event, &*downstream_state.lock().await) {
                                continue;
                            }
                            let payload = match wrap_envelope(&event, event.session_id(), event.user_id()) {
                                Some(payload) => payload,
                                None => continue,
                            };
                            if downstream_sender.lock().await.send(Message::Text(payload)).await.is_err() {
                                break;
                            }
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(%connection_id, missed, "event bus lagged for this connection");
                        }
                        Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                            break;
                        }
                    }
                },
            }
        }
    });

    let upstream_state = Arc::clone(&connection_state);
    let upstream_sender = Arc::clone(&socket_sender);
    let upstream_app_state = state.clone();
    let mut upstream_task = tokio::spawn(async move {
        while let Some(message) = socket_receiver.next().await {
            match message {
                Ok(Message::Text(raw)) => {
                    let should_close =
                        handle_client_frame(&raw, &upstream_app_state, &upstream_state, &upstream_sender, connection_id).await;
                    if should_close {
                        let _ = upstream_sender.lock().await.send(Message::Close(None)).await;
                        break;
                    }
                }
                Ok(Message::Pong(_)) => {
                    upstream_state.lock().await.last_pong = Some(Instant::now());
                }
                Ok(Message::Close(_)) => {
                    debug!(%connection_id, "client closed socket");
                    break;
                }
                Err(err) => {
                    warn!(%connection_id, error = %err, "websocket transport error");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut downstream_task) => { upstream_task.abort(); }
        _ = (&mut upstream_task) => { downstream_task.abort(); }
    }

    info!(%connection_id, "websocket connection closed");
}

fn event_matches_subscription(event: &WsEvent, state: &ConnectionState) -> bool {
    if state.identity.is_none() {
        return false;
    }
    match (event.execution_id(), event.session_id()) {
        (Some(execution_id), _) => state.subscribed_executions.contains(&execution_id),
        (_, Some(session_id)) => state.subscribed_sessions.contains(&session_id),
        (None, None) => matches!(event, WsEvent::SystemNotification { .. }),
    }
}

/// Returns `true` when the connection must be torn down after this frame —
/// currently only a failed `AUTHENTICATE`, per the protocol's "connection
/// closed on failure" contract.
async fn handle_client_frame(
    raw: &str,
    app_state: &AppState,
    connection_state: &Arc<Mutex<ConnectionState>>,
    sender: &Arc<Mutex<futures::stream::SplitSink<WebSocket, Message>>>,
    connection_id: Uuid,
) -> bool {
    let frame: ClientFrame = match serde_json::from_str(raw) {
        Ok(frame) => frame,
        Err(err) => {
            debug!(%connection_id, error = %err, "dropped malformed websocket frame");
            return false;
        }
    };

    match frame {
        ClientFrame::Authenticate { token } => {
            match authenticate(app_state, &token).await {
                Ok(identity) => {
                    let response = ServerFrame::AuthSuccess {
                        principal_id: identity.id,
                        display_name: identity.display_name.clone(),
                    };
                    let principal_id = identity.id;
                    connection_state.lock().await.identity = Some(identity);
                    send_frame(sender, &response, None, Some(principal_id)).await;
                    false
                }
                Err(reason) => {
                    warn!(%connection_id, %reason, "websocket authentication failed, closing socket");
                    send_frame(sender, &ServerFrame::AuthFailed { reason }, None, None).await;
                    true
                }
            }
        }
        ClientFrame::SubscribeSession { session_id } => {
            connection_state.lock().await.subscribed_sessions.insert(session_id);
            false
        }
        ClientFrame::UnsubscribeSession { session_id } => {
            connection_state.lock().await.subscribed_sessions.remove(&session_id);
            false
        }
        ClientFrame::SubscribeCommand { execution_id } => {
            connection_state.lock().await.subscribed_executions.insert(execution_id);
            false
        }
        ClientFrame::UnsubscribeCommand { execution_id } => {
            connection_state.lock().await.subscribed_executions.remove(&execution_id);
            false
        }
        ClientFrame::JoinCollaboration { session_id } => {
            let guard = connection_state.lock().await;
            if let Some(identity) = &guard.identity {
                app_state.ws_hub.publish(WsEvent::UserJoined { session_id, user_id: identity.id });
            }
            false
        }
        ClientFrame::TypingIndicator { session_id, is_typing } => {
            let guard = connection_state.lock().await;
            if let Some(identity) = &guard.identity {
                app_state.ws_hub.publish(WsEvent::TypingIndicator {
                    session_id,
                    user_id: identity.id,
                    is_typing,
                });
            }
            false
        }
        ClientFrame::SendMessage { session_id, text } => {
            let guard = connection_state.lock().await;
            if let Some(identity) = &guard.identity {
                app_state.ws_hub.publish(WsEvent::NewMessage {
                    session_id,
                    user_id: identity.id,
                    text,
                });
            }
            false
        }
        ClientFrame::Ping => {
            let user_id = connection_state.lock().await.identity.as_ref().map(|identity| identity.id);
            send_frame(sender, &ServerFrame::Pong, None, user_id).await;
            false
        }
    }
}

async fn authenticate(state: &AppState, token: &str) -> Result<Identity, String> {
    let claims = validate_token(token, &state.token_secret, Utc::now().timestamp()).map_err(|e| e.to_string())?;

    let session = state
        .sessions
        .get_session(claims.sid)
        .await
        .map_err(|_| "session not found".to_string())?;

    if session.revoked || session.is_expired(Utc::now()) || session.id != claims.sid {
        return Err("session no longer valid".to_string());
    }

    state
        .sessions
        .get_identity(claims.sub)
        .await
        .map_err(|_| "identity not found".to_string())
}

async fn send_frame(
    sender: &Arc<Mutex<futures::stream::SplitSink<WebSocket, Message>>>,
    frame: &ServerFrame,
    session_id: Option<Uuid>,
    user_id: Option<Uuid>,
) {
    if let Some(payload) = wrap_envelope(frame, session_id, user_id) {
        let _ = sender.lock().await.send(Message::Text(payload)).await;
    }
}

/// Folds the wire envelope the protocol documents — `{type, data, timestamp,
/// sessionId?, userId?}` — around an adjacently-tagged frame enum. Both
/// `ServerFrame` and `WsEvent` serialize to a `{type, data}` object already;
/// this flattens `timestamp`/`session_id`/`user_id` alongside those keys
/// rather than nesting them inside `data`.
fn wrap_envelope<T: Serialize>(frame: &T, session_id: Option<Uuid>, user_id: Option<Uuid>) -> Option<String> {
    let mut value = serde_json::to_value(frame).ok()?;
    if let serde_json::Value::Object(ref mut map) = value {
        map.insert("timestamp".to_string(), serde_json::Value::String(Utc::now().to_rfc3339()));
        if let Some(session_id) = session_id {
            map.insert("session_id".to_string(), serde_json::Value::String(session_id.to_string()));
        }
        if let Some(user_id) = user_id {
            map.insert("user_id".to_string(), serde_json::Value::String(user_id.to_string()));
        }
    }
    serde_json::to_string(&value).ok()
}
