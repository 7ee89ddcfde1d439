use rusqlite_migration::{Migrations, M};

/// Define all schema migrations.
/// Uses SQLite user_version pragma for tracking — no migration table needed.
pub fn migrations() -> Migrations<'static> {
    Migrations::new(vec![
        M::up(
            "-- Migration 1: Initial schema

CREATE TABLE users (
    email TEXT PRIMARY KEY,
    first_name TEXT NOT NULL,
    last_name TEXT NOT NULL,
    crn INTEGER NOT NULL,
    group_id INTEGER NOT NULL DEFAULT 0,
    current_page TEXT NOT NULL DEFAULT 'none',
    role TEXT NOT NULL DEFAULT 'student'
);

CREATE INDEX idx_users_class_group ON users(crn, group_id);

CREATE TABLE class_moderators (
    crn INTEGER NOT NULL,
    email TEXT NOT NULL,
    PRIMARY KEY (crn, email)
);

CREATE TABLE jobs (
    id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT ''
);

CREATE TABLE candidates (
    id INTEGER PRIMARY KEY,
    job_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    FOREIGN KEY (job_id) REFERENCES jobs(id)
);

CREATE INDEX idx_candidates_job ON candidates(job_id);

CREATE TABLE group_jobs (
    crn INTEGER NOT NULL,
    group_id INTEGER NOT NULL,
    job_id INTEGER NOT NULL,
    assigned_at TEXT NOT NULL,
    PRIMARY KEY (crn, group_id)
);

CREATE TABLE progress (
    crn INTEGER NOT NULL,
    group_id INTEGER NOT NULL,
    email TEXT NOT NULL,
    step TEXT NOT NULL DEFAULT 'none',
    PRIMARY KEY (crn, group_id, email)
);

CREATE TABLE resume_checks (
    crn INTEGER NOT NULL DEFAULT 0,
    group_id INTEGER NOT NULL,
    resume_number INTEGER NOT NULL,
    checked INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (crn, group_id, resume_number)
);

CREATE TABLE resume_votes (
    crn INTEGER NOT NULL,
    group_id INTEGER NOT NULL,
    email TEXT NOT NULL,
    resume_number INTEGER NOT NULL,
    vote TEXT NOT NULL,
    PRIMARY KEY (crn, group_id, email, resume_number)
);

CREATE TABLE resume_review_votes (
    crn INTEGER NOT NULL,
    group_id INTEGER NOT NULL,
    email TEXT NOT NULL,
    resume_number INTEGER NOT NULL,
    vote TEXT NOT NULL,
    PRIMARY KEY (crn, group_id, email, resume_number)
);

CREATE TABLE offers (
    id TEXT PRIMARY KEY,
    crn INTEGER NOT NULL,
    group_id INTEGER NOT NULL,
    candidate_id INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    created_at TEXT NOT NULL
);

CREATE INDEX idx_offers_class_group ON offers(crn, group_id);

CREATE TABLE interview_pages (
    crn INTEGER NOT NULL,
    group_id INTEGER NOT NULL,
    candidate_id INTEGER NOT NULL,
    page INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (crn, group_id, candidate_id)
);

CREATE TABLE offer_pages (
    crn INTEGER NOT NULL,
    group_id INTEGER NOT NULL,
    page INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (crn, group_id)
);

CREATE TABLE interview_status (
    crn INTEGER NOT NULL,
    group_id INTEGER NOT NULL,
    candidate_id INTEGER NOT NULL,
    status TEXT NOT NULL DEFAULT 'pending',
    PRIMARY KEY (crn, group_id, candidate_id)
);

CREATE TABLE interview_tallies (
    crn INTEGER NOT NULL,
    group_id INTEGER NOT NULL,
    candidate_id INTEGER NOT NULL,
    question1 INTEGER NOT NULL DEFAULT 0,
    question2 INTEGER NOT NULL DEFAULT 0,
    question3 INTEGER NOT NULL DEFAULT 0,
    question4 INTEGER NOT NULL DEFAULT 0,
    last_voter TEXT,
    PRIMARY KEY (crn, group_id, candidate_id)
);

CREATE TABLE notes (
    email TEXT PRIMARY KEY,
    content TEXT NOT NULL DEFAULT ''
);
",
        ),
    ])
}
