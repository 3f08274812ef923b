use std::sync::Arc;
use std::time::Duration;

use crate::db::DbPool;
use crate::ws::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// JWT signing secret (256-bit random key)
    pub jwt_secret: Vec<u8>,
    /// Access token lifetime in seconds
    pub token_ttl_secs: i64,
    /// Live WebSocket connections per user, capped per user
    pub registry: Arc<ConnectionRegistry>,
    /// How long an accepted socket may stay anonymous before it is closed
    pub handshake_timeout: Duration,
}
