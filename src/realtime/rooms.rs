//! Room membership and scoped broadcast.
//!
//! A room is a named broadcast scope. Room names are always built through the
//! `RoomId` constructors below so that emitters and joiners cannot drift apart
//! on the naming convention. Delivery is best-effort: a connection that is
//! offline or not yet joined simply misses the event.

use dashmap::DashMap;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::protocol::ServerEvent;
use super::{ConnectionId, ConnectionRegistry};

/// Deterministic room address. Group rooms are keyed by the composite
/// (group, class) pair — a bare group id collides across classes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RoomId(String);

impl RoomId {
    /// Room shared by one group within one class: `group_<g>_class_<crn>`.
    pub fn group(group_id: i64, crn: i64) -> Self {
        RoomId(format!("group_{}_class_{}", group_id, crn))
    }

    /// Room shared by everyone in a class: `class_<crn>`.
    pub fn class(crn: i64) -> Self {
        RoomId(format!("class_{}", crn))
    }

    /// A moderator's private room, addressed by email.
    pub fn moderator(email: &str) -> Self {
        RoomId(email.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Room registry: room id -> set of joined connection ids.
pub type RoomRegistry = Arc<DashMap<RoomId, HashSet<ConnectionId>>>;

pub fn new_room_registry() -> RoomRegistry {
    Arc::new(DashMap::new())
}

/// Join a connection to a room. Idempotent; a connection may join many rooms.
pub fn join(rooms: &RoomRegistry, room: RoomId, conn_id: &str) {
    rooms.entry(room).or_default().insert(conn_id.to_string());
}

/// Remove a connection from every room it joined. Called on disconnect.
/// Empty rooms are dropped from the registry.
pub fn leave_all(rooms: &RoomRegistry, conn_id: &str) {
    let mut emptied = Vec::new();
    for mut entry in rooms.iter_mut() {
        entry.value_mut().remove(conn_id);
        if entry.value().is_empty() {
            emptied.push(entry.key().clone());
        }
    }
    for room in emptied {
        rooms.remove_if(&room, |_, members| members.is_empty());
    }
}

/// Emit an event to every connection currently joined to a room.
/// The payload is serialized once; closed senders are skipped.
pub fn emit_to_room(
    rooms: &RoomRegistry,
    connections: &ConnectionRegistry,
    room: &RoomId,
    event: &ServerEvent,
) {
    let Some(msg) = event.to_message() else {
        return;
    };

    if let Some(members) = rooms.get(room) {
        for conn_id in members.iter() {
            if let Some(sender) = connections.get(conn_id) {
                let _ = sender.send(msg.clone());
            }
        }
    }
}

/// Send an event to one specific connection.
pub fn send_to_connection(
    connections: &ConnectionRegistry,
    conn_id: &str,
    event: &ServerEvent,
) {
    let Some(msg) = event.to_message() else {
        return;
    };
    if let Some(sender) = connections.get(conn_id) {
        let _ = sender.send(msg);
    }
}
