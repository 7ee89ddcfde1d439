pub mod actor;
pub mod completion;
pub mod handler;
pub mod presence;
pub mod protocol;
pub mod rooms;

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Ephemeral identifier for one live WebSocket connection.
/// Assigned at upgrade time, valid until disconnect.
pub type ConnectionId = String;

/// Sender half of a connection's outbound channel.
/// Anything holding a clone can push messages to that client.
pub type ConnectionSender = mpsc::UnboundedSender<axum::extract::ws::Message>;

/// Connection registry: all active WebSocket connections by connection id.
pub type ConnectionRegistry = Arc<DashMap<ConnectionId, ConnectionSender>>;

/// Create a new empty connection registry.
pub fn new_connection_registry() -> ConnectionRegistry {
    Arc::new(DashMap::new())
}
