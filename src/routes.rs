use axum::{
    routing::{get, post, put},
    Router,
};

use crate::realtime::handler as ws_handler;
use crate::state::AppState;
use crate::{jobs, notes, offers, progress, users, votes};

/// Build the full axum Router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        // Users and rosters
        .route("/api/users/{email}", get(users::get_user))
        .route("/api/users/{email}/page", put(users::update_current_page))
        .route("/api/classes/{crn}/students", get(users::list_class_students))
        // Jobs, candidates, and assignment (bulk reset lives behind POST)
        .route("/api/jobs", get(jobs::list_jobs))
        .route("/api/jobs/{id}", get(jobs::get_job))
        .route("/api/jobs/{id}/candidates", get(jobs::list_candidates))
        .route(
            "/api/classes/{crn}/groups/{gid}/job",
            get(jobs::get_assignment).post(jobs::assign_job),
        )
        // Progress
        .route(
            "/api/classes/{crn}/groups/{gid}/progress",
            get(progress::get_group_progress),
        )
        .route("/api/progress", put(progress::upsert_progress))
        // Offers
        .route("/api/offers", post(offers::create_offer))
        .route(
            "/api/classes/{crn}/groups/{gid}/offers",
            get(offers::list_group_offers),
        )
        .route("/api/offers/{id}/status", put(offers::update_offer_status))
        // Resume votes
        .route("/api/votes/resume", post(votes::cast_resume_vote))
        .route(
            "/api/classes/{crn}/groups/{gid}/votes/{variant}",
            get(votes::list_group_votes),
        )
        // Notes
        .route("/api/notes/{email}", get(notes::get_note).put(notes::put_note))
        // Realtime
        .route("/ws", get(ws_handler::ws_upgrade))
        .with_state(state)
}
