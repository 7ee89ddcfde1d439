//! Hiring offers. One row per submission; status moves through
//! pending -> accepted/rejected via explicit update. The API never deletes an
//! offer — only the group job reset clears them.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::db::models::Offer;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

const OFFER_STATUSES: [&str; 3] = ["pending", "accepted", "rejected"];

#[derive(Debug, Deserialize)]
pub struct CreateOfferRequest {
    pub crn: i64,
    pub group_id: i64,
    pub candidate_id: i64,
}

/// POST /api/offers — submit a pending offer.
pub async fn create_offer(
    State(state): State<AppState>,
    Json(req): Json<CreateOfferRequest>,
) -> ApiResult<(StatusCode, Json<Offer>)> {
    let db = state.db.clone();

    let offer = tokio::task::spawn_blocking(move || -> Result<Offer, ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        let offer = Offer {
            id: Uuid::new_v4().to_string(),
            crn: req.crn,
            group_id: req.group_id,
            candidate_id: req.candidate_id,
            status: "pending".to_string(),
            created_at: Utc::now().to_rfc3339(),
        };
        conn.execute(
            "INSERT INTO offers (id, crn, group_id, candidate_id, status, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                offer.id,
                offer.crn,
                offer.group_id,
                offer.candidate_id,
                offer.status,
                offer.created_at
            ],
        )
        .map_err(|e| ApiError::db("insert offer", e))?;
        Ok(offer)
    })
    .await??;

    Ok((StatusCode::CREATED, Json(offer)))
}

/// GET /api/classes/{crn}/groups/{gid}/offers
pub async fn list_group_offers(
    State(state): State<AppState>,
    Path((crn, group_id)): Path<(i64, i64)>,
) -> ApiResult<Json<Vec<Offer>>> {
    let db = state.db.clone();

    let offers = tokio::task::spawn_blocking(move || -> Result<Vec<Offer>, ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        let mut stmt = conn
            .prepare(
                "SELECT id, crn, group_id, candidate_id, status, created_at FROM offers
                 WHERE crn = ?1 AND group_id = ?2 ORDER BY created_at",
            )
            .map_err(|e| ApiError::db("prepare offers query", e))?;
        let rows = stmt
            .query_map(rusqlite::params![crn, group_id], |row| {
                Ok(Offer {
                    id: row.get(0)?,
                    crn: row.get(1)?,
                    group_id: row.get(2)?,
                    candidate_id: row.get(3)?,
                    status: row.get(4)?,
                    created_at: row.get(5)?,
                })
            })
            .map_err(|e| ApiError::db("query offers", e))?;
        rows.collect::<rusqlite::Result<Vec<Offer>>>()
            .map_err(|e| ApiError::db("read offer rows", e))
    })
    .await??;

    Ok(Json(offers))
}

#[derive(Debug, Deserialize)]
pub struct UpdateOfferStatusRequest {
    pub status: String,
}

/// PUT /api/offers/{id}/status — pending, accepted, or rejected.
pub async fn update_offer_status(
    State(state): State<AppState>,
    Path(offer_id): Path<String>,
    Json(req): Json<UpdateOfferStatusRequest>,
) -> ApiResult<StatusCode> {
    if !OFFER_STATUSES.contains(&req.status.as_str()) {
        return Err(ApiError::bad_request(format!(
            "Unknown offer status: {}",
            req.status
        )));
    }

    let db = state.db.clone();
    let updated = tokio::task::spawn_blocking(move || -> Result<usize, ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        conn.execute(
            "UPDATE offers SET status = ?1 WHERE id = ?2",
            rusqlite::params![req.status, offer_id],
        )
        .map_err(|e| ApiError::db("update offer status", e))
    })
    .await??;

    if updated == 0 {
        return Err(ApiError::not_found("No such offer"));
    }
    Ok(StatusCode::NO_CONTENT)
}
