//! POST /token — OAuth2 password-flow login.

use axum::{extract::State, http::StatusCode, Form, Json};
use serde::Deserialize;

use crate::auth::{jwt, password};
use crate::db::users;
use crate::schema::TokenResponse;
use crate::state::AppState;

/// OAuth2 password request form body.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

/// POST /token
/// Verify username/password and issue an access token.
/// Unknown user and wrong password produce the same response.
pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, StatusCode> {
    let db = state.db.clone();
    let username = form.username.clone();

    let user = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        users::find_user_by_name(&conn, &username).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
    })
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)??;

    // bcrypt verify runs on a blocking thread too — it is deliberately slow.
    let user = match user {
        Some(u) => u,
        None => return Err(StatusCode::BAD_REQUEST),
    };
    let supplied = form.password.clone();
    let hash = user.password_hash.clone();
    let passcheck = tokio::task::spawn_blocking(move || password::verify_password(&supplied, &hash))
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    if !passcheck {
        tracing::info!(user = %user.name, "failed login attempt");
        return Err(StatusCode::BAD_REQUEST);
    }

    let token = jwt::issue_token(&state.jwt_secret, user.id, state.token_ttl_secs)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(TokenResponse {
        access_token: token,
        token_type: "bearer".to_string(),
    }))
}
