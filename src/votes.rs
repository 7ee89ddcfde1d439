//! Resume votes (two variant tables) and the interview preset-vote tally.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use rusqlite::Connection;
use serde::Deserialize;

use crate::db::models::ResumeVote;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// The two resume-vote tables. The exercise records an initial pass and a
/// review pass separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteVariant {
    Resume,
    ResumeReview,
}

impl VoteVariant {
    fn table(&self) -> &'static str {
        match self {
            VoteVariant::Resume => "resume_votes",
            VoteVariant::ResumeReview => "resume_review_votes",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "resume" => Some(VoteVariant::Resume),
            "resume_review" => Some(VoteVariant::ResumeReview),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CastVoteRequest {
    pub crn: i64,
    pub group_id: i64,
    pub email: String,
    pub resume_number: i64,
    pub vote: String,
    pub variant: VoteVariant,
}

/// POST /api/votes/resume — upsert one student's vote on one resume.
pub async fn cast_resume_vote(
    State(state): State<AppState>,
    Json(req): Json<CastVoteRequest>,
) -> ApiResult<StatusCode> {
    let db = state.db.clone();

    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        conn.execute(
            &format!(
                "INSERT INTO {} (crn, group_id, email, resume_number, vote)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(crn, group_id, email, resume_number)
                 DO UPDATE SET vote = excluded.vote",
                req.variant.table()
            ),
            rusqlite::params![req.crn, req.group_id, req.email, req.resume_number, req.vote],
        )
        .map_err(|e| ApiError::db("upsert resume vote", e))?;
        Ok(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/classes/{crn}/groups/{gid}/votes/{variant}
pub async fn list_group_votes(
    State(state): State<AppState>,
    Path((crn, group_id, variant)): Path<(i64, i64, String)>,
) -> ApiResult<Json<Vec<ResumeVote>>> {
    let Some(variant) = VoteVariant::parse(&variant) else {
        return Err(ApiError::bad_request(format!("Unknown vote variant: {}", variant)));
    };

    let db = state.db.clone();
    let votes = tokio::task::spawn_blocking(move || -> Result<Vec<ResumeVote>, ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT crn, group_id, email, resume_number, vote FROM {}
                 WHERE crn = ?1 AND group_id = ?2 ORDER BY resume_number, email",
                variant.table()
            ))
            .map_err(|e| ApiError::db("prepare votes query", e))?;
        let rows = stmt
            .query_map(rusqlite::params![crn, group_id], |row| {
                Ok(ResumeVote {
                    crn: row.get(0)?,
                    group_id: row.get(1)?,
                    email: row.get(2)?,
                    resume_number: row.get(3)?,
                    vote: row.get(4)?,
                })
            })
            .map_err(|e| ApiError::db("query votes", e))?;
        rows.collect::<rusqlite::Result<Vec<ResumeVote>>>()
            .map_err(|e| ApiError::db("read vote rows", e))
    })
    .await??;

    Ok(Json(votes))
}

/// Additive upsert for the interview preset-vote tally: each submission adds
/// its four question values to the stored counters rather than overwriting
/// them. Shared by the `sentPresetVotes` realtime event.
pub fn record_preset_tally(
    conn: &Connection,
    crn: i64,
    group_id: i64,
    candidate_id: i64,
    questions: [i64; 4],
    voter: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "INSERT INTO interview_tallies
             (crn, group_id, candidate_id, question1, question2, question3, question4, last_voter)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(crn, group_id, candidate_id) DO UPDATE SET
             question1 = question1 + excluded.question1,
             question2 = question2 + excluded.question2,
             question3 = question3 + excluded.question3,
             question4 = question4 + excluded.question4,
             last_voter = excluded.last_voter",
        rusqlite::params![
            crn,
            group_id,
            candidate_id,
            questions[0],
            questions[1],
            questions[2],
            questions[3],
            voter
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_db;

    #[test]
    fn preset_tally_is_additive() {
        let db = init_memory_db().unwrap();
        let conn = db.lock().unwrap();

        record_preset_tally(&conn, 100, 5, 1, [1, 0, 2, 1], "a@x.edu").unwrap();
        record_preset_tally(&conn, 100, 5, 1, [1, 3, 0, 1], "b@x.edu").unwrap();

        let (q1, q2, q3, q4, voter): (i64, i64, i64, i64, String) = conn
            .query_row(
                "SELECT question1, question2, question3, question4, last_voter
                 FROM interview_tallies WHERE crn = 100 AND group_id = 5 AND candidate_id = 1",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .unwrap();

        assert_eq!((q1, q2, q3, q4), (2, 3, 2, 2));
        assert_eq!(voter, "b@x.edu");
    }

    #[test]
    fn tallies_are_scoped_per_candidate() {
        let db = init_memory_db().unwrap();
        let conn = db.lock().unwrap();

        record_preset_tally(&conn, 100, 5, 1, [1, 1, 1, 1], "a@x.edu").unwrap();
        record_preset_tally(&conn, 100, 5, 2, [4, 0, 0, 0], "a@x.edu").unwrap();

        let q1_candidate_2: i64 = conn
            .query_row(
                "SELECT question1 FROM interview_tallies
                 WHERE crn = 100 AND group_id = 5 AND candidate_id = 2",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(q1_candidate_2, 4);
    }
}
