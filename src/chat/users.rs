//! GET /users — directory listing for authenticated users.

use axum::{extract::State, http::StatusCode, Json};

use crate::auth::middleware::Claims;
use crate::db::users;
use crate::schema::UserSummary;
use crate::state::AppState;

/// GET /users
/// List all users. JWT auth required.
pub async fn list_users(
    State(state): State<AppState>,
    claims: Claims,
) -> Result<Json<Vec<UserSummary>>, StatusCode> {
    tracing::info!(user_id = claims.user_id, "fetching all users");

    let db = state.db.clone();
    let result = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        users::all_users(&conn).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    Ok(Json(result))
}
