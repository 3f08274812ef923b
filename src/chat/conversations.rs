//! Conversation listing and message history.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::middleware::Claims;
use crate::db::{conversations, messages};
use crate::schema::{ConvSummary, MessageRecord};
use crate::state::AppState;

/// Default page size for message history.
const DEFAULT_LIMIT: u32 = 1000;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<u32>,
}

/// GET /conv
/// List the conversations accessible to the caller.
pub async fn list_conversations(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<ConvSummary>>, StatusCode> {
    tracing::info!(user_id = claims.user_id, "fetching conversations");

    let db = state.db.clone();
    let user_id = claims.user_id;
    let result = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        conversations::conversations_for_user(&conn, user_id)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(Json(result))
}

/// GET /conv/{id}?limit=N
/// Last messages of one conversation, oldest-to-newest. The membership
/// check fails closed: non-members get an error that does not reveal
/// whether the conversation exists.
pub async fn get_conversation(
    State(state): State<AppState>,
    claims: Claims,
    Path(conversation_id): Path<i64>,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageRecord>>, StatusCode> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT);
    let db = state.db.clone();
    let user_id = claims.user_id;

    let result = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

        let allowed = conversations::is_member(&conn, user_id, conversation_id)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        if !allowed {
            return Err(StatusCode::FORBIDDEN);
        }

        messages::recent_messages(&conn, conversation_id, limit)
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(Json(result))
}
