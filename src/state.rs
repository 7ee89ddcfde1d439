use crate::db::DbPool;
use crate::realtime::completion::CompletionTracker;
use crate::realtime::presence::PresenceRegistry;
use crate::realtime::rooms::RoomRegistry;
use crate::realtime::ConnectionRegistry;

/// Shared application state passed to all handlers via axum State extractor.
///
/// The presence, room, and completion maps are process-local: they are lost on
/// restart and not shared across instances. Running more than one server
/// instance would break delivery and completion tracking.
#[derive(Clone)]
pub struct AppState {
    /// SQLite connection wrapped in Arc<Mutex>
    pub db: DbPool,
    /// Active WebSocket connections by connection id
    pub connections: ConnectionRegistry,
    /// Online students: email -> connection id (last writer wins)
    pub presence: PresenceRegistry,
    /// Room membership: room id -> joined connection ids
    pub rooms: RoomRegistry,
    /// Per-group resume-review completion sets
    pub completion: CompletionTracker,
}

impl AppState {
    pub fn new(db: DbPool) -> Self {
        Self {
            db,
            connections: crate::realtime::new_connection_registry(),
            presence: crate::realtime::presence::new_presence_registry(),
            rooms: crate::realtime::rooms::new_room_registry(),
            completion: crate::realtime::completion::new_completion_tracker(),
        }
    }
}
