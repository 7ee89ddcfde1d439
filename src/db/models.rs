/// Database row types for all tables.
/// These correspond 1:1 to the SQLite schema defined in migrations.rs.
use serde::Serialize;

/// Student or moderator record in the users table
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub crn: i64,
    pub group_id: i64,
    pub current_page: String,
    pub role: String,
}

/// Job posting handed to a group
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: i64,
    pub title: String,
    pub description: String,
}

/// Interview candidate attached to a job
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub id: i64,
    pub job_id: i64,
    pub name: String,
}

/// Current job assignment for a (class, group) pair
#[derive(Debug, Clone, Serialize)]
pub struct GroupJob {
    pub crn: i64,
    pub group_id: i64,
    pub job_id: i64,
    pub assigned_at: String,
}

/// Hiring offer submission. Never deleted through the API;
/// only the bulk reset clears offers for a group.
#[derive(Debug, Clone, Serialize)]
pub struct Offer {
    pub id: String,
    pub crn: i64,
    pub group_id: i64,
    pub candidate_id: i64,
    pub status: String,
    pub created_at: String,
}

/// One resume vote row (either variant table)
#[derive(Debug, Clone, Serialize)]
pub struct ResumeVote {
    pub crn: i64,
    pub group_id: i64,
    pub email: String,
    pub resume_number: i64,
    pub vote: String,
}
