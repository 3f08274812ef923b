//! Post-accept authentication handshake and the per-connection read loop.
//!
//! The WebSocket is accepted before the client is identified: some clients
//! cannot set headers on the upgrade request, so the token arrives in the
//! first frame instead. This leaves unauthenticated sockets open for up to
//! the handshake timeout — an accepted exposure, bounded by that timeout.
//!
//! State machine per connection:
//! accepted -> awaiting auth frame -> validating -> registered | rejected.
//! Every rejection looks the same from the peer's side: the socket closes
//! with no detail, so token failures, malformed frames, and a full
//! connection quota cannot be distinguished from outside.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::response::Response;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::auth::jwt;
use crate::db::users;
use crate::error::HandshakeError;
use crate::state::AppState;
use crate::ws::registry::ConnectionRegistry;

/// GET /ws
/// Upgrade unconditionally; identity is established by the first frame.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, addr))
}

/// Drive one connection from accept to teardown.
async fn handle_socket(mut socket: WebSocket, state: AppState, addr: SocketAddr) {
    tracing::info!(peer = %addr, "accepted websocket connection");

    let user_id = match authenticate(&mut socket, &state).await {
        Ok(user_id) => user_id,
        Err(err) => {
            tracing::info!(peer = %addr, error = %err, "websocket handshake rejected");
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let (ws_sender, mut ws_receiver) = socket.split();
    let (tx, rx) = mpsc::unbounded_channel::<Message>();

    // Atomic check+insert: either we get a slot or the user is at capacity.
    // At-capacity closes exactly like an auth failure.
    let slot = match state.registry.add(user_id, tx.clone()) {
        Some(slot) => slot,
        None => {
            tracing::info!(
                peer = %addr,
                error = %HandshakeError::CapacityExceeded(user_id),
                "websocket handshake rejected"
            );
            let mut ws_sender = ws_sender;
            let _ = ws_sender.send(Message::Close(None)).await;
            return;
        }
    };

    tracing::info!(user_id, slot, peer = %addr, "websocket registered");

    // The guard is the single release point for this {user, slot} pair:
    // whichever way the read loop exits, the entry is removed exactly once.
    let _guard = RegistryGuard {
        registry: state.registry.clone(),
        user_id,
        slot,
    };

    // Writer task owns the sink. All outbound frames for this connection
    // funnel through one channel, so writes are never interleaved and
    // dispatch order is preserved.
    let writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Read loop: a registered connection is a delivery sink. Application
    // messages are posted over REST, not the socket, so inbound Text and
    // Binary frames are ignored.
    loop {
        match ws_receiver.next().await {
            Some(Ok(msg)) => match msg {
                Message::Ping(data) => {
                    let _ = tx.send(Message::Pong(data));
                }
                Message::Pong(_) => {}
                Message::Text(_) | Message::Binary(_) => {
                    tracing::debug!(user_id, "ignoring inbound frame on registered connection");
                }
                Message::Close(frame) => {
                    tracing::info!(user_id, slot, reason = ?frame, "client initiated close");
                    break;
                }
            },
            Some(Err(e)) => {
                tracing::warn!(user_id, slot, error = %e, "websocket receive error, dropping user");
                break;
            }
            None => {
                tracing::info!(user_id, slot, "websocket stream ended");
                break;
            }
        }
    }

    writer_handle.abort();
    // _guard drops here and removes {user_id, slot} from the registry.
}

/// Wait for the auth frame and validate it. Bounded by the handshake
/// timeout; any failure collapses to a silent close at the call site.
async fn authenticate(socket: &mut WebSocket, state: &AppState) -> Result<i64, HandshakeError> {
    let frame = match timeout(state.handshake_timeout, socket.recv()).await {
        Ok(Some(Ok(frame))) => frame,
        Ok(Some(Err(_))) | Ok(None) => return Err(HandshakeError::ConnectionClosed),
        Err(_) => return Err(HandshakeError::Timeout),
    };

    // Not logging the frame contents: it carries the bearer token.
    let payload = match &frame {
        Message::Text(text) => text.as_bytes(),
        Message::Binary(bytes) => bytes.as_ref(),
        _ => return Err(HandshakeError::MalformedEnvelope),
    };
    tracing::debug!("got auth frame, {} bytes", payload.len());

    let token = parse_auth_envelope(payload)?;

    let user_id =
        jwt::verify_token(&state.jwt_secret, &token).map_err(|_| HandshakeError::InvalidToken)?;

    // The token may outlive the user row; re-check identity against storage.
    let db = state.db.clone();
    let user = tokio::task::spawn_blocking(move || {
        let conn = db.lock().ok()?;
        users::find_user_by_id(&conn, user_id).ok().flatten()
    })
    .await
    .ok()
    .flatten();

    match user {
        Some(user) => {
            tracing::info!(user_id, name = %user.name, "websocket handshake validated");
            Ok(user_id)
        }
        None => Err(HandshakeError::UnknownUser(user_id)),
    }
}

/// The auth envelope is a two-element JSON array:
/// `[arbitrary-tag, "Authorization: Bearer <token>"]`.
/// Any other shape is a handshake failure.
fn parse_auth_envelope(payload: &[u8]) -> Result<String, HandshakeError> {
    let (_tag, auth_line): (serde_json::Value, String) =
        serde_json::from_slice(payload).map_err(|_| HandshakeError::MalformedEnvelope)?;

    if !auth_line.starts_with("Authorization:") {
        return Err(HandshakeError::MalformedEnvelope);
    }

    match auth_line.rsplit(' ').next() {
        Some(token) if !token.is_empty() => Ok(token.to_string()),
        _ => Err(HandshakeError::MalformedEnvelope),
    }
}

/// Writer task: receives frames from the connection's channel and forwards
/// them to the WebSocket sink. Exits when the channel closes or a send
/// fails; a broken sink only ever stalls this one connection.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(msg) = rx.recv().await {
        if ws_sender.send(msg).await.is_err() {
            break;
        }
    }
}

/// Scoped release of a registry entry. Removal is idempotent, but the
/// guard guarantees it fires exactly once per connection, on every exit
/// path of the read loop, and from that single owner only.
struct RegistryGuard {
    registry: Arc<ConnectionRegistry>,
    user_id: i64,
    slot: u64,
}

impl Drop for RegistryGuard {
    fn drop(&mut self) {
        self.registry.remove(self.user_id, self.slot);
        tracing::debug!(user_id = self.user_id, slot = self.slot, "connection unregistered");
    }
}

#[cfg(test)]
mod tests {
    use super::parse_auth_envelope;

    #[test]
    fn parses_bearer_envelope() {
        let token =
            parse_auth_envelope(br#"["x", "Authorization: Bearer abc.def.ghi"]"#).unwrap();
        assert_eq!(token, "abc.def.ghi");
    }

    #[test]
    fn rejects_wrong_shapes() {
        assert!(parse_auth_envelope(b"not json").is_err());
        assert!(parse_auth_envelope(br#"{"token": "abc"}"#).is_err());
        assert!(parse_auth_envelope(br#"["only-one"]"#).is_err());
        assert!(parse_auth_envelope(br#"["x", "Bearer abc"]"#).is_err());
        assert!(parse_auth_envelope(br#"["x", "Authorization: Bearer "]"#).is_err());
    }
}
