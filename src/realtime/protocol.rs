//! Realtime event routing.
//!
//! Messages are JSON text frames shaped `{"event": "...", "data": {...}}`,
//! one tagged variant per event name. Frames that fail to decode (unknown
//! event, missing field) are logged and dropped — no error event goes back to
//! the client. Where an event performs a persistence write, the broadcast is
//! emitted only after the write succeeds; a failed write is logged and the
//! event goes silent.

use axum::extract::ws::Message;
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use crate::votes;

use super::completion;
use super::presence;
use super::rooms::{self, RoomId};

/// Inbound (client -> server) events.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "studentOnline")]
    StudentOnline {
        #[serde(rename = "studentId")]
        student_id: String,
    },
    /// Joins the composite (group, class) room. The source keyed this room by
    /// group id alone, which collides across classes; classId is required
    /// here.
    #[serde(rename = "joinGroup")]
    JoinGroup {
        group_id: i64,
        #[serde(rename = "classId")]
        class_id: i64,
    },
    #[serde(rename = "joinClass")]
    JoinClass {
        #[serde(rename = "classId")]
        class_id: i64,
    },
    #[serde(rename = "joinModerator")]
    JoinModerator { email: String },
    #[serde(rename = "check")]
    Check {
        group_id: i64,
        resume_number: i64,
        checked: bool,
        #[serde(rename = "classId", default)]
        class_id: Option<i64>,
    },
    #[serde(rename = "sendPopupToGroups")]
    SendPopupToGroups {
        groups: Vec<i64>,
        headline: String,
        message: String,
        #[serde(default)]
        class: Option<i64>,
        #[serde(rename = "candidateId")]
        candidate_id: i64,
    },
    #[serde(rename = "makeOfferRequest")]
    MakeOfferRequest {
        #[serde(rename = "classId")]
        class_id: i64,
        #[serde(rename = "groupId")]
        group_id: i64,
        #[serde(rename = "candidateId")]
        candidate_id: i64,
    },
    #[serde(rename = "userCompletedResReview")]
    UserCompletedResReview {
        #[serde(rename = "groupId")]
        group_id: i64,
    },
    #[serde(rename = "sentPresetVotes")]
    SentPresetVotes {
        student_id: String,
        group_id: i64,
        class: i64,
        question1: i64,
        question2: i64,
        question3: i64,
        question4: i64,
        candidate_id: i64,
    },
    #[serde(rename = "allowGroupAssignment")]
    AllowGroupAssignment {
        #[serde(rename = "classId")]
        class_id: i64,
        message: String,
    },
    #[serde(rename = "groupAssignmentClosed")]
    GroupAssignmentClosed {
        #[serde(rename = "classId")]
        class_id: i64,
        message: String,
    },
}

/// Outbound (server -> client) events.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerEvent {
    #[serde(rename = "updateOnlineStudents")]
    UpdateOnlineStudents {
        #[serde(rename = "studentId")]
        student_id: String,
        group_id: i64,
        current_page: String,
    },
    #[serde(rename = "checkboxUpdated")]
    CheckboxUpdated {
        group_id: i64,
        resume_number: i64,
        checked: bool,
    },
    #[serde(rename = "receivePopup")]
    ReceivePopup {
        headline: String,
        message: String,
        #[serde(rename = "candidateId")]
        candidate_id: i64,
    },
    #[serde(rename = "makeOfferRequest")]
    MakeOfferRequest {
        #[serde(rename = "classId")]
        class_id: i64,
        #[serde(rename = "groupId")]
        group_id: i64,
        #[serde(rename = "candidateId")]
        candidate_id: i64,
    },
    #[serde(rename = "groupMemberOffer")]
    GroupMemberOffer {
        #[serde(rename = "groupId")]
        group_id: i64,
        #[serde(rename = "candidateId")]
        candidate_id: i64,
    },
    #[serde(rename = "groupCompletedResReview")]
    GroupCompletedResReview {
        #[serde(rename = "completedCount")]
        completed_count: i64,
        #[serde(rename = "totalCount")]
        total_count: i64,
    },
    #[serde(rename = "allowGroupAssignmentStudent")]
    AllowGroupAssignmentStudent { message: String },
    #[serde(rename = "groupAssignmentClosedStudent")]
    GroupAssignmentClosedStudent { message: String },
    #[serde(rename = "jobUpdated")]
    JobUpdated {
        #[serde(rename = "jobId")]
        job_id: i64,
    },
    #[serde(rename = "groupJobUpdated")]
    GroupJobUpdated {
        group_id: i64,
        #[serde(rename = "jobId")]
        job_id: i64,
    },
}

impl ServerEvent {
    /// Serialize to a WebSocket text frame. Serialization of these variants
    /// cannot realistically fail; a failure is logged and the event dropped.
    pub fn to_message(&self) -> Option<Message> {
        match serde_json::to_string(self) {
            Ok(json) => Some(Message::Text(json.into())),
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize outbound event");
                None
            }
        }
    }
}

/// Decode and route one inbound text frame.
pub async fn handle_text(state: &AppState, conn_id: &str, text: &str) {
    let event: ClientEvent = match serde_json::from_str(text) {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(
                conn_id = %conn_id,
                error = %e,
                "Dropping undecodable realtime event"
            );
            return;
        }
    };

    match event {
        ClientEvent::StudentOnline { student_id } => {
            handle_student_online(state, conn_id, student_id).await;
        }
        ClientEvent::JoinGroup { group_id, class_id } => {
            rooms::join(&state.rooms, RoomId::group(group_id, class_id), conn_id);
        }
        ClientEvent::JoinClass { class_id } => {
            rooms::join(&state.rooms, RoomId::class(class_id), conn_id);
        }
        ClientEvent::JoinModerator { email } => {
            rooms::join(&state.rooms, RoomId::moderator(&email), conn_id);
        }
        ClientEvent::Check {
            group_id,
            resume_number,
            checked,
            class_id,
        } => {
            handle_check(state, group_id, resume_number, checked, class_id).await;
        }
        ClientEvent::SendPopupToGroups {
            groups,
            headline,
            message,
            class,
            candidate_id,
        } => {
            handle_send_popup(state, groups, headline, message, class, candidate_id).await;
        }
        ClientEvent::MakeOfferRequest {
            class_id,
            group_id,
            candidate_id,
        } => {
            handle_offer_request(state, class_id, group_id, candidate_id).await;
        }
        ClientEvent::UserCompletedResReview { group_id } => {
            completion::handle_member_completed(state, conn_id, group_id).await;
        }
        ClientEvent::SentPresetVotes {
            student_id,
            group_id,
            class,
            question1,
            question2,
            question3,
            question4,
            candidate_id,
        } => {
            // Additive tally; no broadcast for this event.
            let db = state.db.clone();
            let result = tokio::task::spawn_blocking(move || {
                let conn = db.lock().map_err(|_| rusqlite::Error::InvalidQuery)?;
                votes::record_preset_tally(
                    &conn,
                    class,
                    group_id,
                    candidate_id,
                    [question1, question2, question3, question4],
                    &student_id,
                )
            })
            .await;
            if let Ok(Err(e)) = result {
                tracing::warn!(error = %e, group_id, "Preset vote tally failed");
            }
        }
        ClientEvent::AllowGroupAssignment { class_id, message } => {
            rooms::emit_to_room(
                &state.rooms,
                &state.connections,
                &RoomId::class(class_id),
                &ServerEvent::AllowGroupAssignmentStudent { message },
            );
        }
        ClientEvent::GroupAssignmentClosed { class_id, message } => {
            rooms::emit_to_room(
                &state.rooms,
                &state.connections,
                &RoomId::class(class_id),
                &ServerEvent::GroupAssignmentClosedStudent { message },
            );
        }
    }
}

/// Register presence, then announce the student's group and current page to
/// their class room. Presence is registered before any database call so the
/// student is addressable even if the roster lookup fails.
async fn handle_student_online(state: &AppState, conn_id: &str, student_id: String) {
    presence::set_online(&state.presence, &student_id, conn_id);

    let db = state.db.clone();
    let email = student_id.clone();
    let row = tokio::task::spawn_blocking(move || -> rusqlite::Result<(i64, i64, String)> {
        let conn = db.lock().map_err(|_| rusqlite::Error::InvalidQuery)?;
        conn.query_row(
            "SELECT crn, group_id, current_page FROM users WHERE email = ?1",
            [&email],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
    })
    .await;

    match row {
        Ok(Ok((crn, group_id, current_page))) => {
            rooms::emit_to_room(
                &state.rooms,
                &state.connections,
                &RoomId::class(crn),
                &ServerEvent::UpdateOnlineStudents {
                    student_id,
                    group_id,
                    current_page,
                },
            );
        }
        Ok(Err(e)) => {
            tracing::warn!(student = %student_id, error = %e, "Online student not in roster");
        }
        Err(e) => {
            tracing::warn!(student = %student_id, error = %e, "Roster lookup task failed");
        }
    }
}

/// Upsert the checkbox flag, then rebroadcast to the owning group room —
/// including the sender, so all members converge on the stored state.
async fn handle_check(
    state: &AppState,
    group_id: i64,
    resume_number: i64,
    checked: bool,
    class_id: Option<i64>,
) {
    // Flags without a class scope live under crn 0.
    let crn = class_id.unwrap_or(0);

    let db = state.db.clone();
    let result = tokio::task::spawn_blocking(move || {
        let conn = db.lock().map_err(|_| rusqlite::Error::InvalidQuery)?;
        conn.execute(
            "INSERT INTO resume_checks (crn, group_id, resume_number, checked)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(crn, group_id, resume_number) DO UPDATE SET checked = excluded.checked",
            rusqlite::params![crn, group_id, resume_number, checked],
        )
    })
    .await;

    match result {
        Ok(Ok(_)) => {
            rooms::emit_to_room(
                &state.rooms,
                &state.connections,
                &RoomId::group(group_id, crn),
                &ServerEvent::CheckboxUpdated {
                    group_id,
                    resume_number,
                    checked,
                },
            );
        }
        Ok(Err(e)) => {
            tracing::warn!(group_id, resume_number, error = %e, "Checkbox upsert failed");
        }
        Err(e) => {
            tracing::warn!(group_id, resume_number, error = %e, "Checkbox task failed");
        }
    }
}

/// Resolve the target groups to student emails (optional class filter) and
/// privately notify exactly the subset that is currently online.
async fn handle_send_popup(
    state: &AppState,
    groups: Vec<i64>,
    headline: String,
    message: String,
    class: Option<i64>,
    candidate_id: i64,
) {
    if groups.is_empty() {
        tracing::warn!("Popup requested with no target groups");
        return;
    }

    let db = state.db.clone();
    let target_groups = groups.clone();
    let emails = tokio::task::spawn_blocking(move || -> rusqlite::Result<Vec<String>> {
        let conn = db.lock().map_err(|_| rusqlite::Error::InvalidQuery)?;
        let placeholders = vec!["?"; target_groups.len()].join(", ");
        let mut sql = format!(
            "SELECT email FROM users WHERE role = 'student' AND group_id IN ({})",
            placeholders
        );
        let mut params: Vec<Box<dyn rusqlite::types::ToSql>> = target_groups
            .iter()
            .map(|g| Box::new(*g) as Box<dyn rusqlite::types::ToSql>)
            .collect();
        if let Some(crn) = class {
            sql.push_str(" AND crn = ?");
            params.push(Box::new(crn));
        }
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(
            rusqlite::params_from_iter(params.iter().map(|p| p.as_ref())),
            |row| row.get(0),
        )?;
        rows.collect()
    })
    .await;

    let emails = match emails {
        Ok(Ok(emails)) => emails,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "Popup target lookup failed");
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, "Popup target task failed");
            return;
        }
    };

    let event = ServerEvent::ReceivePopup {
        headline,
        message,
        candidate_id,
    };
    let mut delivered = 0usize;
    for email in &emails {
        if let Some(conn_id) = presence::connection_for(&state.presence, email) {
            rooms::send_to_connection(&state.connections, &conn_id, &event);
            delivered += 1;
        }
    }
    tracing::debug!(targets = emails.len(), delivered, "Popup delivered to online students");
}

/// Notify every moderator of the class privately, then post a room-wide
/// "member made an offer" notice to the group.
async fn handle_offer_request(state: &AppState, class_id: i64, group_id: i64, candidate_id: i64) {
    let db = state.db.clone();
    let moderators = tokio::task::spawn_blocking(move || -> rusqlite::Result<Vec<String>> {
        let conn = db.lock().map_err(|_| rusqlite::Error::InvalidQuery)?;
        let mut stmt = conn.prepare("SELECT email FROM class_moderators WHERE crn = ?1")?;
        let rows = stmt.query_map([class_id], |row| row.get(0))?;
        rows.collect()
    })
    .await;

    let moderators = match moderators {
        Ok(Ok(moderators)) => moderators,
        Ok(Err(e)) => {
            tracing::warn!(class_id, error = %e, "Moderator lookup failed");
            return;
        }
        Err(e) => {
            tracing::warn!(class_id, error = %e, "Moderator lookup task failed");
            return;
        }
    };

    let notice = ServerEvent::MakeOfferRequest {
        class_id,
        group_id,
        candidate_id,
    };
    for moderator in &moderators {
        rooms::emit_to_room(
            &state.rooms,
            &state.connections,
            &RoomId::moderator(moderator),
            &notice,
        );
    }

    rooms::emit_to_room(
        &state.rooms,
        &state.connections,
        &RoomId::group(group_id, class_id),
        &ServerEvent::GroupMemberOffer {
            group_id,
            candidate_id,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_events_decode_by_tag() {
        let event: ClientEvent = serde_json::from_str(
            r#"{"event":"check","data":{"group_id":5,"resume_number":2,"checked":true}}"#,
        )
        .unwrap();
        match event {
            ClientEvent::Check {
                group_id,
                resume_number,
                checked,
                class_id,
            } => {
                assert_eq!(group_id, 5);
                assert_eq!(resume_number, 2);
                assert!(checked);
                assert_eq!(class_id, None);
            }
            other => panic!("wrong variant: {:?}", other),
        }
    }

    #[test]
    fn missing_required_field_fails_to_decode() {
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"event":"joinClass","data":{}}"#);
        assert!(result.is_err());
    }

    #[test]
    fn popup_without_candidate_fails_to_decode() {
        // class is the only optional field of sendPopupToGroups
        let result: Result<ClientEvent, _> = serde_json::from_str(
            r#"{"event":"sendPopupToGroups","data":{"groups":[5],"headline":"h","message":"m"}}"#,
        );
        assert!(result.is_err());

        let result: Result<ClientEvent, _> = serde_json::from_str(
            r#"{"event":"sendPopupToGroups","data":{"groups":[5],"headline":"h","message":"m","candidateId":3}}"#,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn server_events_serialize_with_event_tag() {
        let event = ServerEvent::GroupCompletedResReview {
            completed_count: 2,
            total_count: 2,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "groupCompletedResReview");
        assert_eq!(json["data"]["completedCount"], 2);
        assert_eq!(json["data"]["totalCount"], 2);
    }
}
