//! Error types for the chat service.

use thiserror::Error;

/// Why a post-accept handshake ended in a closed connection.
///
/// Every variant results in the same observable behavior for the peer —
/// the socket is closed with no detail — so that capacity exhaustion,
/// bad tokens, and malformed frames cannot be told apart from outside.
/// The variant only feeds the server log.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// No auth frame arrived within the handshake window.
    #[error("no auth frame within the handshake window")]
    Timeout,

    /// First frame was not a two-element `[tag, "Authorization: Bearer ..."]` array.
    #[error("malformed auth envelope")]
    MalformedEnvelope,

    /// Token did not verify (bad signature, expired, wrong shape).
    #[error("invalid token")]
    InvalidToken,

    /// Token verified but the user no longer exists in storage.
    #[error("unknown user {0}")]
    UnknownUser(i64),

    /// Per-user connection limit reached.
    #[error("connection limit reached for user {0}")]
    CapacityExceeded(i64),

    /// Peer went away before completing the handshake.
    #[error("connection closed during handshake")]
    ConnectionClosed,
}

/// Failures on the message-posting path. Surfaced to the HTTP caller;
/// fanout failures are never represented here by design.
#[derive(Debug, Error)]
pub enum PostError {
    /// Sender is not a member of the target conversation.
    #[error("sender is not a member of conversation {0}")]
    NotAMember(i64),

    /// Storage append or member resolution failed; nothing was fanned out.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Lock poisoning or a lost blocking task. Also aborts before fanout.
    #[error("internal error: {0}")]
    Internal(String),
}
