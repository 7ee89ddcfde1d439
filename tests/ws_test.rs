//! Integration tests for the realtime layer: presence, rooms, popup
//! delivery, and the group resume-review completion broadcast.

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use nuhire_server::db::DbPool;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start_test_server() -> (SocketAddr, DbPool) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = nuhire_server::db::init_db(&data_dir).expect("Failed to init DB");
    let state = nuhire_server::state::AppState::new(db.clone());
    let app = nuhire_server::routes::build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        let _keep = tmp_dir;
    });

    (addr, db)
}

fn seed(db: &DbPool, batch: &str) {
    db.lock().unwrap().execute_batch(batch).unwrap();
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
        .await
        .expect("WebSocket connect failed");
    ws
}

async fn send_event(ws: &mut WsClient, event: serde_json::Value) {
    ws.send(Message::Text(event.to_string())).await.unwrap();
}

/// Receive the next event with the given name, skipping unrelated frames.
/// Returns its data payload, or None if nothing arrives in time.
async fn recv_named(ws: &mut WsClient, name: &str, ms: u64) -> Option<serde_json::Value> {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(ms);
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match tokio::time::timeout(remaining, ws.next()).await {
            Ok(Some(Ok(Message::Text(text)))) => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                if value["event"] == name {
                    return Some(value["data"].clone());
                }
            }
            Ok(Some(Ok(_))) => continue, // ping/pong
            _ => return None,
        }
    }
}

/// Assert that no event with the given name arrives within the window.
async fn expect_silence(ws: &mut WsClient, name: &str, ms: u64) {
    assert!(
        recv_named(ws, name, ms).await.is_none(),
        "unexpected {} event",
        name
    );
}

const TWO_MEMBER_GROUP: &str =
    "INSERT INTO users (email, first_name, last_name, crn, group_id, current_page, role) VALUES
         ('a@x.edu', 'A', 'One', 100, 5, 'res_1', 'student'),
         ('b@x.edu', 'B', 'Two', 100, 5, 'res_1', 'student');
     INSERT INTO jobs (id, title, description) VALUES (1, 'Engineer', ''), (2, 'Analyst', '');";

#[tokio::test]
async fn completion_broadcast_fires_once_when_last_member_finishes() {
    let (addr, db) = start_test_server().await;
    seed(&db, TWO_MEMBER_GROUP);

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    send_event(&mut a, serde_json::json!({"event": "studentOnline", "data": {"studentId": "a@x.edu"}})).await;
    send_event(&mut b, serde_json::json!({"event": "studentOnline", "data": {"studentId": "b@x.edu"}})).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    // First member alone: partial state, no broadcast
    send_event(&mut a, serde_json::json!({"event": "userCompletedResReview", "data": {"groupId": 5}})).await;
    expect_silence(&mut a, "groupCompletedResReview", 300).await;
    expect_silence(&mut b, "groupCompletedResReview", 100).await;

    // Redundant signal from the same member must not complete the group
    send_event(&mut a, serde_json::json!({"event": "userCompletedResReview", "data": {"groupId": 5}})).await;
    expect_silence(&mut b, "groupCompletedResReview", 300).await;

    // Last member completes: both online members get exactly one broadcast
    send_event(&mut b, serde_json::json!({"event": "userCompletedResReview", "data": {"groupId": 5}})).await;
    let data_a = recv_named(&mut a, "groupCompletedResReview", 1000).await.unwrap();
    let data_b = recv_named(&mut b, "groupCompletedResReview", 1000).await.unwrap();
    assert_eq!(data_a["completedCount"], 2);
    assert_eq!(data_a["totalCount"], 2);
    assert_eq!(data_b, data_a);

    // No duplicate broadcast afterwards, even with another redundant signal
    send_event(&mut b, serde_json::json!({"event": "userCompletedResReview", "data": {"groupId": 5}})).await;
    expect_silence(&mut a, "groupCompletedResReview", 300).await;
    expect_silence(&mut b, "groupCompletedResReview", 100).await;
}

#[tokio::test]
async fn job_reassignment_rearms_the_completion_cycle() {
    let (addr, db) = start_test_server().await;
    seed(&db, TWO_MEMBER_GROUP);

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    send_event(&mut a, serde_json::json!({"event": "studentOnline", "data": {"studentId": "a@x.edu"}})).await;
    send_event(&mut b, serde_json::json!({"event": "studentOnline", "data": {"studentId": "b@x.edu"}})).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    for ws in [&mut a, &mut b] {
        send_event(ws, serde_json::json!({"event": "userCompletedResReview", "data": {"groupId": 5}})).await;
    }
    assert!(recv_named(&mut a, "groupCompletedResReview", 1000).await.is_some());

    // Instructor assigns a new job: online members are notified individually
    let resp = reqwest::Client::new()
        .post(format!("http://{}/api/classes/100/groups/5/job", addr))
        .json(&serde_json::json!({ "job_id": 2 }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let job_a = recv_named(&mut a, "jobUpdated", 1000).await.unwrap();
    assert_eq!(job_a["jobId"], 2);
    assert!(recv_named(&mut b, "jobUpdated", 1000).await.is_some());

    // The cycle is re-armed: one completion is partial again...
    send_event(&mut a, serde_json::json!({"event": "userCompletedResReview", "data": {"groupId": 5}})).await;
    expect_silence(&mut b, "groupCompletedResReview", 300).await;

    // ...and the second fires exactly one fresh broadcast
    send_event(&mut b, serde_json::json!({"event": "userCompletedResReview", "data": {"groupId": 5}})).await;
    let data = recv_named(&mut a, "groupCompletedResReview", 1000).await.unwrap();
    assert_eq!(data["completedCount"], 2);
    assert!(recv_named(&mut b, "groupCompletedResReview", 1000).await.is_some());
    expect_silence(&mut a, "groupCompletedResReview", 300).await;
}

#[tokio::test]
async fn completion_condition_tracks_roster_changes_between_signals() {
    let (addr, db) = start_test_server().await;
    seed(&db, TWO_MEMBER_GROUP);

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    send_event(&mut a, serde_json::json!({"event": "studentOnline", "data": {"studentId": "a@x.edu"}})).await;
    send_event(&mut b, serde_json::json!({"event": "studentOnline", "data": {"studentId": "b@x.edu"}})).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    send_event(&mut a, serde_json::json!({"event": "userCompletedResReview", "data": {"groupId": 5}})).await;
    expect_silence(&mut b, "groupCompletedResReview", 300).await;

    // A third member joins the group mid-cycle; the count is read fresh from
    // the roster, so the second completion is no longer the last one
    seed(
        &db,
        "INSERT INTO users (email, first_name, last_name, crn, group_id, current_page, role)
             VALUES ('c@x.edu', 'C', 'Three', 100, 5, 'res_1', 'student');",
    );
    send_event(&mut b, serde_json::json!({"event": "userCompletedResReview", "data": {"groupId": 5}})).await;
    expect_silence(&mut a, "groupCompletedResReview", 300).await;
    expect_silence(&mut b, "groupCompletedResReview", 100).await;

    // Once the newcomer completes, the broadcast fires with the grown total
    let mut c = connect(addr).await;
    send_event(&mut c, serde_json::json!({"event": "studentOnline", "data": {"studentId": "c@x.edu"}})).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    send_event(&mut c, serde_json::json!({"event": "userCompletedResReview", "data": {"groupId": 5}})).await;

    for ws in [&mut a, &mut b, &mut c] {
        let data = recv_named(ws, "groupCompletedResReview", 1000).await.unwrap();
        assert_eq!(data["completedCount"], 3);
        assert_eq!(data["totalCount"], 3);
    }
}

#[tokio::test]
async fn popup_reaches_only_online_students_in_target_groups() {
    let (addr, db) = start_test_server().await;
    seed(
        &db,
        "INSERT INTO users (email, first_name, last_name, crn, group_id, current_page, role) VALUES
             ('a@x.edu', 'A', 'One', 100, 5, 'none', 'student'),
             ('b@x.edu', 'B', 'Two', 100, 6, 'none', 'student'),
             ('c@x.edu', 'C', 'Three', 100, 7, 'none', 'student'),
             ('d@x.edu', 'D', 'Four', 100, 9, 'none', 'student');",
    );

    // a and b are online in target groups; c is targeted but offline;
    // d is online but not targeted.
    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    let mut d = connect(addr).await;
    send_event(&mut a, serde_json::json!({"event": "studentOnline", "data": {"studentId": "a@x.edu"}})).await;
    send_event(&mut b, serde_json::json!({"event": "studentOnline", "data": {"studentId": "b@x.edu"}})).await;
    send_event(&mut d, serde_json::json!({"event": "studentOnline", "data": {"studentId": "d@x.edu"}})).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut moderator = connect(addr).await;
    send_event(
        &mut moderator,
        serde_json::json!({"event": "sendPopupToGroups", "data": {
            "groups": [5, 6, 7],
            "headline": "Interview starting",
            "message": "Head to the interview room",
            "class": 100,
            "candidateId": 3
        }}),
    )
    .await;

    let popup_a = recv_named(&mut a, "receivePopup", 1000).await.unwrap();
    assert_eq!(popup_a["headline"], "Interview starting");
    assert_eq!(popup_a["candidateId"], 3);
    assert!(recv_named(&mut b, "receivePopup", 1000).await.is_some());

    // Exactly one each, and nothing for the untargeted student
    expect_silence(&mut a, "receivePopup", 200).await;
    expect_silence(&mut b, "receivePopup", 100).await;
    expect_silence(&mut d, "receivePopup", 100).await;
}

#[tokio::test]
async fn checkbox_update_reaches_the_whole_group_room_including_sender() {
    let (addr, db) = start_test_server().await;
    seed(&db, TWO_MEMBER_GROUP);

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    for ws in [&mut a, &mut b] {
        send_event(ws, serde_json::json!({"event": "joinGroup", "data": {"group_id": 5, "classId": 100}})).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    send_event(
        &mut a,
        serde_json::json!({"event": "check", "data": {
            "group_id": 5, "resume_number": 3, "checked": true, "classId": 100
        }}),
    )
    .await;

    for ws in [&mut a, &mut b] {
        let data = recv_named(ws, "checkboxUpdated", 1000).await.unwrap();
        assert_eq!(data["resume_number"], 3);
        assert_eq!(data["checked"], true);
    }

    // The flag is persisted
    tokio::time::sleep(Duration::from_millis(50)).await;
    let checked: bool = db
        .lock()
        .unwrap()
        .query_row(
            "SELECT checked FROM resume_checks WHERE crn = 100 AND group_id = 5 AND resume_number = 3",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert!(checked);
}

#[tokio::test]
async fn offer_request_notifies_every_class_moderator_and_the_group() {
    let (addr, db) = start_test_server().await;
    seed(&db, TWO_MEMBER_GROUP);
    seed(
        &db,
        "INSERT INTO class_moderators (crn, email) VALUES (100, 'prof@x.edu'), (100, 'ta@x.edu');",
    );

    let mut prof = connect(addr).await;
    let mut ta = connect(addr).await;
    send_event(&mut prof, serde_json::json!({"event": "joinModerator", "data": {"email": "prof@x.edu"}})).await;
    send_event(&mut ta, serde_json::json!({"event": "joinModerator", "data": {"email": "ta@x.edu"}})).await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    for ws in [&mut a, &mut b] {
        send_event(ws, serde_json::json!({"event": "joinGroup", "data": {"group_id": 5, "classId": 100}})).await;
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    send_event(
        &mut a,
        serde_json::json!({"event": "makeOfferRequest", "data": {
            "classId": 100, "groupId": 5, "candidateId": 7
        }}),
    )
    .await;

    for ws in [&mut prof, &mut ta] {
        let data = recv_named(ws, "makeOfferRequest", 1000).await.unwrap();
        assert_eq!(data["groupId"], 5);
        assert_eq!(data["candidateId"], 7);
    }
    for ws in [&mut a, &mut b] {
        let data = recv_named(ws, "groupMemberOffer", 1000).await.unwrap();
        assert_eq!(data["candidateId"], 7);
    }
}

#[tokio::test]
async fn class_room_receives_assignment_window_events() {
    let (addr, db) = start_test_server().await;
    seed(&db, TWO_MEMBER_GROUP);

    let mut a = connect(addr).await;
    send_event(&mut a, serde_json::json!({"event": "joinClass", "data": {"classId": 100}})).await;
    // Students in a different class room stay out of scope
    let mut other = connect(addr).await;
    send_event(&mut other, serde_json::json!({"event": "joinClass", "data": {"classId": 200}})).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut moderator = connect(addr).await;
    send_event(
        &mut moderator,
        serde_json::json!({"event": "allowGroupAssignment", "data": {
            "classId": 100, "message": "Pick your groups now"
        }}),
    )
    .await;

    let data = recv_named(&mut a, "allowGroupAssignmentStudent", 1000).await.unwrap();
    assert_eq!(data["message"], "Pick your groups now");
    expect_silence(&mut other, "allowGroupAssignmentStudent", 200).await;

    send_event(
        &mut moderator,
        serde_json::json!({"event": "groupAssignmentClosed", "data": {
            "classId": 100, "message": "Closed"
        }}),
    )
    .await;
    assert!(recv_named(&mut a, "groupAssignmentClosedStudent", 1000).await.is_some());
}

#[tokio::test]
async fn preset_votes_accumulate_without_broadcast() {
    let (addr, db) = start_test_server().await;
    seed(&db, TWO_MEMBER_GROUP);

    let mut a = connect(addr).await;
    send_event(&mut a, serde_json::json!({"event": "studentOnline", "data": {"studentId": "a@x.edu"}})).await;

    for _ in 0..2 {
        send_event(
            &mut a,
            serde_json::json!({"event": "sentPresetVotes", "data": {
                "student_id": "a@x.edu", "group_id": 5, "class": 100,
                "question1": 1, "question2": 0, "question3": 2, "question4": 0,
                "candidate_id": 4
            }}),
        )
        .await;
    }
    tokio::time::sleep(Duration::from_millis(200)).await;

    let (q1, q3): (i64, i64) = db
        .lock()
        .unwrap()
        .query_row(
            "SELECT question1, question3 FROM interview_tallies
             WHERE crn = 100 AND group_id = 5 AND candidate_id = 4",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!((q1, q3), (2, 4));
}

#[tokio::test]
async fn undecodable_events_are_dropped_without_killing_the_connection() {
    let (addr, db) = start_test_server().await;
    seed(&db, TWO_MEMBER_GROUP);

    let mut a = connect(addr).await;
    send_event(&mut a, serde_json::json!({"event": "studentOnline", "data": {"studentId": "a@x.edu"}})).await;
    // Unknown event name, then missing required fields
    send_event(&mut a, serde_json::json!({"event": "warpDrive", "data": {}})).await;
    send_event(&mut a, serde_json::json!({"event": "joinClass", "data": {}})).await;
    // sendPopupToGroups without candidateId is dropped, not delivered as null
    send_event(
        &mut a,
        serde_json::json!({"event": "sendPopupToGroups", "data": {
            "groups": [5], "headline": "h", "message": "m"
        }}),
    )
    .await;
    expect_silence(&mut a, "receivePopup", 300).await;

    // The connection still works afterwards
    send_event(&mut a, serde_json::json!({"event": "joinClass", "data": {"classId": 100}})).await;
    let mut moderator = connect(addr).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    send_event(
        &mut moderator,
        serde_json::json!({"event": "allowGroupAssignment", "data": {"classId": 100, "message": "hi"}}),
    )
    .await;
    assert!(recv_named(&mut a, "allowGroupAssignmentStudent", 1000).await.is_some());
}

#[tokio::test]
async fn student_online_announces_group_and_page_to_class_room() {
    let (addr, db) = start_test_server().await;
    seed(&db, TWO_MEMBER_GROUP);

    let mut watcher = connect(addr).await;
    send_event(&mut watcher, serde_json::json!({"event": "joinClass", "data": {"classId": 100}})).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut a = connect(addr).await;
    send_event(&mut a, serde_json::json!({"event": "studentOnline", "data": {"studentId": "a@x.edu"}})).await;

    let data = recv_named(&mut watcher, "updateOnlineStudents", 1000).await.unwrap();
    assert_eq!(data["studentId"], "a@x.edu");
    assert_eq!(data["group_id"], 5);
    assert_eq!(data["current_page"], "res_1");
}
