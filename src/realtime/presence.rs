//! Live student presence: email -> active connection id.
//!
//! One active connection per student; a second session from the same student
//! overwrites the first (last writer wins). Entries live only for the process
//! lifetime. Removal on disconnect scans values — O(n) in online-student
//! count, which stays small at classroom scale.

use dashmap::DashMap;
use std::sync::Arc;

use super::ConnectionId;

pub type PresenceRegistry = Arc<DashMap<String, ConnectionId>>;

pub fn new_presence_registry() -> PresenceRegistry {
    Arc::new(DashMap::new())
}

/// Register a student as online, replacing any prior mapping.
pub fn set_online(presence: &PresenceRegistry, student: &str, conn_id: &str) {
    presence.insert(student.to_string(), conn_id.to_string());
}

/// Remove every entry owned by the given connection. Called on disconnect.
pub fn remove_connection(presence: &PresenceRegistry, conn_id: &str) {
    presence.retain(|_, v| v != conn_id);
}

/// Reverse lookup: which student owns this connection?
/// Used to resolve identity server-side instead of trusting event payloads.
pub fn student_for(presence: &PresenceRegistry, conn_id: &str) -> Option<String> {
    presence
        .iter()
        .find(|entry| entry.value() == conn_id)
        .map(|entry| entry.key().clone())
}

/// The connection id a student is reachable at, if online.
pub fn connection_for(presence: &PresenceRegistry, student: &str) -> Option<ConnectionId> {
    presence.get(student).map(|entry| entry.value().clone())
}
