//! Fanout dispatcher: one stored message event becomes N point-to-point
//! deliveries, without ever blocking the posting request path.

use std::sync::Arc;

use axum::extract::ws::Message;

use crate::schema::MessageFrame;
use crate::ws::registry::ConnectionRegistry;

/// Broadcast a posted message to every live connection of every target
/// user. Fire-and-forget: the frame is serialized once, the target set is
/// resolved to a snapshot of senders, and delivery runs in a spawned task
/// so the caller returns as soon as fanout is initiated.
///
/// Each connection's writer task drains its own channel, so a slow or dead
/// socket only backs up its own queue and cannot delay a sibling delivery.
/// A failed push (the receiver is gone) is swallowed: teardown belongs to
/// that connection's read loop, never to the dispatcher.
pub fn broadcast_message_to_users(
    registry: &Arc<ConnectionRegistry>,
    from_user_id: i64,
    convo_id: i64,
    user_ids: &[i64],
    content: &str,
) {
    let frame = MessageFrame {
        convo_id,
        content: content.to_string(),
        originator: from_user_id,
    };
    let payload = match serde_json::to_string(&frame) {
        Ok(payload) => payload,
        Err(e) => {
            // Frames are plain {id, string, id} records; this should not happen.
            tracing::error!(convo_id, error = %e, "failed to serialize message frame");
            return;
        }
    };

    let senders = registry.connections_for_many(user_ids);
    if senders.is_empty() {
        return;
    }

    tracing::debug!(
        convo_id,
        from_user_id,
        targets = user_ids.len(),
        connections = senders.len(),
        "dispatching message fanout"
    );

    tokio::spawn(async move {
        let msg = Message::Text(payload.into());
        for sender in senders {
            if sender.send(msg.clone()).is_err() {
                // Receiver dropped between snapshot and delivery; its read
                // loop owns the registry cleanup.
                tracing::debug!(convo_id, "skipped delivery to closed connection");
            }
        }
    });
}
