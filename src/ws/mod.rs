pub mod fanout;
pub mod handshake;
pub mod registry;

use tokio::sync::mpsc;

/// Type alias for the sender half of a WebSocket connection's channel.
/// Other parts of the system can clone this to push frames to a specific
/// client; the sink itself is owned by that connection's writer task.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

pub use registry::ConnectionRegistry;
