//! Free-text notes, one per student.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub email: String,
    pub content: String,
}

/// GET /api/notes/{email} — a student with no saved note reads as empty.
pub async fn get_note(
    State(state): State<AppState>,
    Path(email): Path<String>,
) -> ApiResult<Json<NoteResponse>> {
    let db = state.db.clone();
    let lookup = email.clone();

    let content = tokio::task::spawn_blocking(move || -> Result<String, ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        match conn.query_row(
            "SELECT content FROM notes WHERE email = ?1",
            [&lookup],
            |row| row.get(0),
        ) {
            Ok(content) => Ok(content),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(String::new()),
            Err(e) => Err(ApiError::db("query note", e)),
        }
    })
    .await??;

    Ok(Json(NoteResponse { email, content }))
}

#[derive(Debug, Deserialize)]
pub struct PutNoteRequest {
    pub content: String,
}

/// PUT /api/notes/{email}
pub async fn put_note(
    State(state): State<AppState>,
    Path(email): Path<String>,
    Json(req): Json<PutNoteRequest>,
) -> ApiResult<StatusCode> {
    let db = state.db.clone();

    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        conn.execute(
            "INSERT INTO notes (email, content) VALUES (?1, ?2)
             ON CONFLICT(email) DO UPDATE SET content = excluded.content",
            rusqlite::params![email, req.content],
        )
        .map_err(|e| ApiError::db("upsert note", e))?;
        Ok(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}
