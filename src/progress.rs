//! Group progress tracking.
//!
//! Each student carries one upserted progress row; the group's displayed
//! progress is the minimum (leftmost) non-`none` step among its members — a
//! group is only as advanced as its least-advanced member.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Ordinal stage in a group's progression through the exercise.
/// Derived ordering follows declaration order, so `min` over steps gives the
/// leftmost stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Step {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "job_description")]
    JobDescription,
    #[serde(rename = "res_1")]
    Res1,
    #[serde(rename = "res_2")]
    Res2,
    #[serde(rename = "interview")]
    Interview,
    #[serde(rename = "offer")]
    Offer,
    #[serde(rename = "employer")]
    Employer,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::None => "none",
            Step::JobDescription => "job_description",
            Step::Res1 => "res_1",
            Step::Res2 => "res_2",
            Step::Interview => "interview",
            Step::Offer => "offer",
            Step::Employer => "employer",
        }
    }

    pub fn parse(s: &str) -> Option<Step> {
        match s {
            "none" => Some(Step::None),
            "job_description" => Some(Step::JobDescription),
            "res_1" => Some(Step::Res1),
            "res_2" => Some(Step::Res2),
            "interview" => Some(Step::Interview),
            "offer" => Some(Step::Offer),
            "employer" => Some(Step::Employer),
            _ => None,
        }
    }
}

/// The group's effective step: minimum non-`none` step among members.
/// All-`none` (or no members) collapses to `none`.
pub fn effective_step(steps: &[Step]) -> Step {
    steps
        .iter()
        .copied()
        .filter(|s| *s != Step::None)
        .min()
        .unwrap_or(Step::None)
}

#[derive(Debug, Serialize)]
pub struct MemberProgress {
    pub email: String,
    pub step: Step,
}

#[derive(Debug, Serialize)]
pub struct GroupProgressResponse {
    pub crn: i64,
    pub group_id: i64,
    pub effective_step: Step,
    pub members: Vec<MemberProgress>,
}

/// GET /api/classes/{crn}/groups/{gid}/progress
pub async fn get_group_progress(
    State(state): State<AppState>,
    Path((crn, group_id)): Path<(i64, i64)>,
) -> ApiResult<Json<GroupProgressResponse>> {
    let db = state.db.clone();

    let members = tokio::task::spawn_blocking(move || -> Result<Vec<MemberProgress>, ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        let mut stmt = conn
            .prepare("SELECT email, step FROM progress WHERE crn = ?1 AND group_id = ?2")
            .map_err(|e| ApiError::db("prepare progress query", e))?;
        let rows = stmt
            .query_map(rusqlite::params![crn, group_id], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| ApiError::db("query progress", e))?;

        let mut members = Vec::new();
        for row in rows {
            let (email, raw_step) = row.map_err(|e| ApiError::db("read progress row", e))?;
            // Unknown step strings in storage are treated as none
            let step = Step::parse(&raw_step).unwrap_or(Step::None);
            members.push(MemberProgress { email, step });
        }
        Ok(members)
    })
    .await??;

    let steps: Vec<Step> = members.iter().map(|m| m.step).collect();
    Ok(Json(GroupProgressResponse {
        crn,
        group_id,
        effective_step: effective_step(&steps),
        members,
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpsertProgressRequest {
    pub crn: i64,
    pub group_id: i64,
    pub email: String,
    pub step: String,
}

/// PUT /api/progress — upsert one student's step.
pub async fn upsert_progress(
    State(state): State<AppState>,
    Json(req): Json<UpsertProgressRequest>,
) -> ApiResult<StatusCode> {
    let Some(step) = Step::parse(&req.step) else {
        return Err(ApiError::bad_request(format!("Unknown step: {}", req.step)));
    };

    let db = state.db.clone();
    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        let conn = db.lock().map_err(|_| ApiError::internal("DB lock"))?;
        conn.execute(
            "INSERT INTO progress (crn, group_id, email, step) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(crn, group_id, email) DO UPDATE SET step = excluded.step",
            rusqlite::params![req.crn, req.group_id, req.email, step.as_str()],
        )
        .map_err(|e| ApiError::db("upsert progress", e))?;
        Ok(())
    })
    .await??;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_order_left_to_right() {
        assert!(Step::None < Step::JobDescription);
        assert!(Step::JobDescription < Step::Res1);
        assert!(Step::Res1 < Step::Res2);
        assert!(Step::Res2 < Step::Interview);
        assert!(Step::Interview < Step::Offer);
        assert!(Step::Offer < Step::Employer);
    }

    #[test]
    fn effective_step_is_leftmost_non_none() {
        let steps = [Step::Res1, Step::None, Step::JobDescription];
        assert_eq!(effective_step(&steps), Step::JobDescription);
    }

    #[test]
    fn effective_step_of_all_none_is_none() {
        assert_eq!(effective_step(&[Step::None, Step::None]), Step::None);
        assert_eq!(effective_step(&[]), Step::None);
    }

    #[test]
    fn step_round_trips_through_storage_names() {
        for step in [
            Step::None,
            Step::JobDescription,
            Step::Res1,
            Step::Res2,
            Step::Interview,
            Step::Offer,
            Step::Employer,
        ] {
            assert_eq!(Step::parse(step.as_str()), Some(step));
        }
        assert_eq!(Step::parse("resume"), None);
    }
}
