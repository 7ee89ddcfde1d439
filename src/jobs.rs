//! Job postings, candidates, and the job (re)assignment workflow.
//!
//! Assigning a job to a group is the one transactional operation in the
//! system: it wipes everything the group produced under its previous job and
//! points every member back at the job description. Either all of it happens
//! or none of it does.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::models::{Candidate, GroupJob, Job};
use crate::error::{ApiError, ApiResult};
use crate::realtime::completion;
use crate::realtime::presence;
use crate::realtime::protocol::ServerEvent;
use crate::realtime::rooms::{self, RoomId};
use crate::state::AppState;

/// GET /api/jobs
pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<Vec<Job>>> {
    let db = state.db.clone();

    let jobs = tokio::task::spawn_blocking(move || -> Result<Vec<Job>, ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        let mut stmt = conn
            .prepare("SELECT id, title, description FROM jobs ORDER BY id")
            .map_err(|e| ApiError::db("prepare jobs query", e))?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Job {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                })
            })
            .map_err(|e| ApiError::db("query jobs", e))?;
        rows.collect::<rusqlite::Result<Vec<Job>>>()
            .map_err(|e| ApiError::db("read job rows", e))
    })
    .await??;

    Ok(Json(jobs))
}

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> ApiResult<Json<Job>> {
    let db = state.db.clone();

    let job = tokio::task::spawn_blocking(move || -> Result<Option<Job>, ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        match conn.query_row(
            "SELECT id, title, description FROM jobs WHERE id = ?1",
            [job_id],
            |row| {
                Ok(Job {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    description: row.get(2)?,
                })
            },
        ) {
            Ok(job) => Ok(Some(job)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ApiError::db("query job", e)),
        }
    })
    .await??;

    job.map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No job: {}", job_id)))
}

/// GET /api/jobs/{id}/candidates
pub async fn list_candidates(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> ApiResult<Json<Vec<Candidate>>> {
    let db = state.db.clone();

    let candidates = tokio::task::spawn_blocking(move || -> Result<Vec<Candidate>, ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        let mut stmt = conn
            .prepare("SELECT id, job_id, name FROM candidates WHERE job_id = ?1 ORDER BY id")
            .map_err(|e| ApiError::db("prepare candidates query", e))?;
        let rows = stmt
            .query_map([job_id], |row| {
                Ok(Candidate {
                    id: row.get(0)?,
                    job_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })
            .map_err(|e| ApiError::db("query candidates", e))?;
        rows.collect::<rusqlite::Result<Vec<Candidate>>>()
            .map_err(|e| ApiError::db("read candidate rows", e))
    })
    .await??;

    Ok(Json(candidates))
}

/// GET /api/classes/{crn}/groups/{gid}/job
pub async fn get_assignment(
    State(state): State<AppState>,
    Path((crn, group_id)): Path<(i64, i64)>,
) -> ApiResult<Json<GroupJob>> {
    let db = state.db.clone();

    let assignment = tokio::task::spawn_blocking(move || -> Result<Option<GroupJob>, ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        match conn.query_row(
            "SELECT crn, group_id, job_id, assigned_at FROM group_jobs
             WHERE crn = ?1 AND group_id = ?2",
            rusqlite::params![crn, group_id],
            |row| {
                Ok(GroupJob {
                    crn: row.get(0)?,
                    group_id: row.get(1)?,
                    job_id: row.get(2)?,
                    assigned_at: row.get(3)?,
                })
            },
        ) {
            Ok(assignment) => Ok(Some(assignment)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(ApiError::db("query assignment", e)),
        }
    })
    .await??;

    assignment
        .map(Json)
        .ok_or_else(|| ApiError::not_found("No job assigned to this group"))
}

#[derive(Debug, Deserialize)]
pub struct AssignJobRequest {
    pub job_id: i64,
}

#[derive(Debug, Serialize)]
pub struct AssignJobResponse {
    pub crn: i64,
    pub group_id: i64,
    pub job_id: i64,
    pub members_reset: usize,
}

/// Apply the job assignment and progress reset as one transaction.
///
/// Steps, all-or-nothing:
/// 1. Upsert the group's job assignment row.
/// 2. Point every member's current page back at the job description.
/// 3. Reset every member's progress step to `job_description`.
/// 4. Delete the group's rows from the dependent tables: interview pages,
///    offer pages, both resume-vote variants, offers, interview status,
///    interview tallies, and the members' free-text notes.
///
/// Returns the affected member emails for post-commit notification.
pub fn run_job_reset(
    conn: &mut Connection,
    crn: i64,
    group_id: i64,
    job_id: i64,
) -> rusqlite::Result<Vec<String>> {
    let tx = conn.transaction()?;

    let now = Utc::now().to_rfc3339();
    tx.execute(
        "INSERT INTO group_jobs (crn, group_id, job_id, assigned_at) VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(crn, group_id) DO UPDATE SET job_id = excluded.job_id,
                                                  assigned_at = excluded.assigned_at",
        rusqlite::params![crn, group_id, job_id, now],
    )?;

    let members: Vec<String> = {
        let mut stmt = tx.prepare(
            "SELECT email FROM users WHERE crn = ?1 AND group_id = ?2 AND role = 'student'",
        )?;
        let rows = stmt.query_map(rusqlite::params![crn, group_id], |row| row.get(0))?;
        rows.collect::<rusqlite::Result<Vec<String>>>()?
    };

    tx.execute(
        "UPDATE users SET current_page = 'job_description'
         WHERE crn = ?1 AND group_id = ?2 AND role = 'student'",
        rusqlite::params![crn, group_id],
    )?;

    for email in &members {
        tx.execute(
            "INSERT INTO progress (crn, group_id, email, step)
             VALUES (?1, ?2, ?3, 'job_description')
             ON CONFLICT(crn, group_id, email) DO UPDATE SET step = 'job_description'",
            rusqlite::params![crn, group_id, email],
        )?;
    }

    let scoped_deletes = [
        "DELETE FROM interview_pages WHERE crn = ?1 AND group_id = ?2",
        "DELETE FROM offer_pages WHERE crn = ?1 AND group_id = ?2",
        "DELETE FROM resume_votes WHERE crn = ?1 AND group_id = ?2",
        "DELETE FROM resume_review_votes WHERE crn = ?1 AND group_id = ?2",
        "DELETE FROM offers WHERE crn = ?1 AND group_id = ?2",
        "DELETE FROM interview_status WHERE crn = ?1 AND group_id = ?2",
        "DELETE FROM interview_tallies WHERE crn = ?1 AND group_id = ?2",
    ];
    for sql in scoped_deletes {
        tx.execute(sql, rusqlite::params![crn, group_id])?;
    }
    tx.execute(
        "DELETE FROM notes WHERE email IN
         (SELECT email FROM users WHERE crn = ?1 AND group_id = ?2 AND role = 'student')",
        rusqlite::params![crn, group_id],
    )?;

    tx.commit()?;
    Ok(members)
}

/// POST /api/classes/{crn}/groups/{gid}/job — assign (or reassign) a job.
///
/// On success the group's in-memory completion state is cleared, each online
/// member is notified individually with `jobUpdated`, and the group room gets
/// a `groupJobUpdated` notice.
pub async fn assign_job(
    State(state): State<AppState>,
    Path((crn, group_id)): Path<(i64, i64)>,
    Json(req): Json<AssignJobRequest>,
) -> ApiResult<(StatusCode, Json<AssignJobResponse>)> {
    let job_id = req.job_id;

    let db = state.db.clone();
    let members = tokio::task::spawn_blocking(move || -> Result<Vec<String>, ApiError> {
        let mut conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;

        let job_exists: bool = conn
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM jobs WHERE id = ?1)",
                [job_id],
                |row| row.get(0),
            )
            .map_err(|e| ApiError::db("check job", e))?;
        if !job_exists {
            return Err(ApiError::not_found(format!("No job: {}", job_id)));
        }

        run_job_reset(&mut conn, crn, group_id, job_id)
            .map_err(|e| ApiError::db("job reset transaction", e))
    })
    .await??;

    // Post-commit effects: re-arm the completion cycle and notify.
    completion::reset(&state.completion, crn, group_id);

    let job_event = ServerEvent::JobUpdated { job_id };
    for member in &members {
        if let Some(conn_id) = presence::connection_for(&state.presence, member) {
            rooms::send_to_connection(&state.connections, &conn_id, &job_event);
        }
    }
    rooms::emit_to_room(
        &state.rooms,
        &state.connections,
        &RoomId::group(group_id, crn),
        &ServerEvent::GroupJobUpdated { group_id, job_id },
    );

    tracing::info!(crn, group_id, job_id, members = members.len(), "Group job reassigned");

    Ok((
        StatusCode::OK,
        Json(AssignJobResponse {
            crn,
            group_id,
            job_id,
            members_reset: members.len(),
        }),
    ))
}
