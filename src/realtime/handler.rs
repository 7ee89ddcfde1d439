use axum::{
    extract::{ws::WebSocketUpgrade, State},
    response::Response,
};

use crate::state::AppState;

use super::actor;

/// GET /ws
/// WebSocket upgrade endpoint. Identity is established after connect via the
/// `studentOnline` event; there is no auth handshake on this surface.
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.on_upgrade(move |socket| actor::run_connection(socket, state))
}
