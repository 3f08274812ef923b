//! The message-posting pipeline: authorize, append durably, resolve the
//! member list, then hand off to fanout.

use axum::{extract::State, http::StatusCode, Json};

use crate::auth::middleware::Claims;
use crate::db::{conversations, messages, DbPool};
use crate::error::PostError;
use crate::schema::{MsgInput, MsgOutput};
use crate::state::AppState;
use crate::ws::fanout;

/// POST /usermsg
/// Store a new message and propagate it to every connected member.
/// Storage failures surface to the caller before any fanout happens;
/// fanout failures never do.
pub async fn post_message(
    State(state): State<AppState>,
    claims: Claims,
    Json(msg): Json<MsgInput>,
) -> Result<Json<MsgOutput>, StatusCode> {
    let sender_id = claims.user_id;
    let conversation_id = msg.conversation_id;

    let (message_id, members) =
        store_message(state.db.clone(), sender_id, conversation_id, msg.content.clone())
            .await
            .map_err(|err| match err {
                PostError::NotAMember(convo) => {
                    tracing::info!(sender_id, convo, "rejected post from non-member");
                    StatusCode::FORBIDDEN
                }
                PostError::Storage(_) | PostError::Internal(_) => {
                    tracing::error!(sender_id, conversation_id, error = %err, "message append failed");
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            })?;

    // Everything durable; initiate fanout and return without awaiting it.
    // The member list includes the sender, so their other devices echo.
    fanout::broadcast_message_to_users(
        &state.registry,
        sender_id,
        conversation_id,
        &members,
        &msg.content,
    );

    Ok(Json(MsgOutput {
        status: "ok".to_string(),
        messageid: message_id,
    }))
}

/// Authorization check, transactional append, and member resolution.
/// No side effects happen before the membership check passes.
async fn store_message(
    db: DbPool,
    sender_id: i64,
    conversation_id: i64,
    content: String,
) -> Result<(i64, Vec<i64>), PostError> {
    tokio::task::spawn_blocking(move || {
        let mut conn = db
            .lock()
            .map_err(|e| PostError::Internal(format!("DB lock error: {}", e)))?;

        if !conversations::is_member(&conn, sender_id, conversation_id)? {
            return Err(PostError::NotAMember(conversation_id));
        }

        let ts = messages::now_ts();
        let message_id =
            messages::append_message(&mut conn, conversation_id, sender_id, &content, ts)?;

        let members = conversations::members_of(&conn, conversation_id)?;
        Ok((message_id, members))
    })
    .await
    .map_err(|e| PostError::Internal(format!("blocking task failed: {}", e)))?
}
