//! Group resume-review completion tracking.
//!
//! Per (class, group): the set of students who have signaled completion, plus
//! a flag recording whether this cycle's broadcast already went out. When the
//! last member completes, `groupCompletedResReview` is sent individually to
//! each online member — exactly once per cycle, however many redundant
//! signals arrive. The bulk reset clears the entry and re-arms the cycle.
//!
//! The source of this design relied on single-threaded callback atomicity for
//! its check-then-insert; here the same guarantee is made explicit by doing
//! the idempotence check, insertion, and fired-flag transition under the
//! DashMap entry lock.

use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;

use crate::state::AppState;

use super::presence;
use super::protocol::ServerEvent;
use super::rooms::send_to_connection;

/// Completion state for one (crn, group_id) pair.
#[derive(Debug, Default)]
pub struct GroupCompletion {
    pub completed: HashSet<String>,
    pub fired: bool,
}

/// (crn, group_id) -> completion state. Created lazily, never persisted.
pub type CompletionTracker = Arc<DashMap<(i64, i64), GroupCompletion>>;

pub fn new_completion_tracker() -> CompletionTracker {
    Arc::new(DashMap::new())
}

/// Clear a group's completion state back to empty. Called by the bulk reset.
pub fn reset(tracker: &CompletionTracker, crn: i64, group_id: i64) {
    tracker.remove(&(crn, group_id));
}

/// Handle one inbound "member completed resume review" signal.
///
/// The emitting connection is resolved to a student through the presence
/// registry — the client-supplied group id is informational only, and the
/// student's own (crn, group) row decides which group is credited, so a
/// spoofed payload cannot target another group. Membership is read fresh from
/// the database on every event so roster changes take effect immediately.
/// Persistence failures abort silently (log only): no retry, no broadcast.
pub async fn handle_member_completed(state: &AppState, conn_id: &str, claimed_group_id: i64) {
    let Some(student) = presence::student_for(&state.presence, conn_id) else {
        tracing::warn!(
            conn_id = %conn_id,
            "Completion signal from connection with no registered student"
        );
        return;
    };

    // Fresh membership lookup: the student's own group and its full roster.
    let db = state.db.clone();
    let email = student.clone();
    let lookup = tokio::task::spawn_blocking(move || -> rusqlite::Result<(i64, i64, Vec<String>)> {
        let conn = match db.lock() {
            Ok(conn) => conn,
            Err(_) => return Err(rusqlite::Error::InvalidQuery),
        };
        let (crn, group_id): (i64, i64) = conn.query_row(
            "SELECT crn, group_id FROM users WHERE email = ?1",
            [&email],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let mut stmt = conn.prepare(
            "SELECT email FROM users WHERE crn = ?1 AND group_id = ?2 AND role = 'student'",
        )?;
        let members = stmt
            .query_map(rusqlite::params![crn, group_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok((crn, group_id, members))
    })
    .await;

    let (crn, group_id, members) = match lookup {
        Ok(Ok(found)) => found,
        Ok(Err(e)) => {
            tracing::warn!(student = %student, error = %e, "Group membership lookup failed");
            return;
        }
        Err(e) => {
            tracing::warn!(student = %student, error = %e, "Membership lookup task failed");
            return;
        }
    };

    if claimed_group_id != group_id {
        tracing::debug!(
            student = %student,
            claimed = claimed_group_id,
            actual = group_id,
            "Completion signal carried a different group id than the roster; using roster"
        );
    }

    let total = members.len();
    if total == 0 {
        tracing::warn!(crn, group_id, "Completion signal for group with no members");
        return;
    }

    // Idempotence check, insertion, and the exactly-once decision all happen
    // under this entry lock.
    let counts = {
        let mut entry = state.completion.entry((crn, group_id)).or_default();
        if !entry.completed.insert(student.clone()) {
            // Redundant signal from the same student
            return;
        }
        let completed = entry.completed.len();
        if completed >= total && !entry.fired {
            entry.fired = true;
            Some((completed, total))
        } else {
            None
        }
    };

    let Some((completed_count, total_count)) = counts else {
        tracing::debug!(crn, group_id, student = %student, "Partial completion recorded");
        return;
    };

    // Individually address each currently-online member. Not a room
    // broadcast: offline members simply miss it.
    let event = ServerEvent::GroupCompletedResReview {
        completed_count: completed_count as i64,
        total_count: total_count as i64,
    };
    for member in &members {
        if let Some(member_conn) = presence::connection_for(&state.presence, member) {
            send_to_connection(&state.connections, &member_conn, &event);
        }
    }

    tracing::info!(crn, group_id, completed_count, total_count, "Group completed resume review");
}
