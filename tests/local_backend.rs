//! Local Backend Integration Tests
//!
//! Full intake runs against the SQLite store and local audio directory, and
//! follow-up scheduling on stored calls.

mod common;

use std::sync::Arc;

use chrono::{NaiveDate, TimeZone, Utc};
use serde_json::json;
use tempfile::TempDir;

use callintake::adapters::{Collaborators, DataStore, LocalBlobStorage, SqliteStore};
use callintake::core::{
    close_deal, default_meeting_start, draft_proposal, schedule_meeting, Orchestrator,
    ProspectChoice, UploadLimits,
};
use callintake::domain::{CallRecord, ProspectType, TaskDecision};

use common::{
    ingest_replies, task_reply, wav_upload, FakeSpeech, ScriptedChat, ScriptedOperator, TWO_MIB,
};

struct LocalBackend {
    _temp: TempDir,
    store: Arc<SqliteStore>,
    orchestrator: Orchestrator,
}

fn local_backend(tasks: &[&str]) -> LocalBackend {
    let temp = TempDir::new().unwrap();
    let store = Arc::new(SqliteStore::open(&temp.path().join("callintake.db")).unwrap());

    let mut replies = ingest_replies("Good Prospect");
    replies.push(task_reply(tasks));

    let collaborators = Collaborators {
        storage: Arc::new(LocalBlobStorage::new(temp.path().join("audio"))),
        speech: Arc::new(FakeSpeech::returning("hello")),
        chat: Arc::new(ScriptedChat::new(replies)),
        store: store.clone(),
    };
    let orchestrator = Orchestrator::new(
        collaborators,
        temp.path().join("runs"),
        UploadLimits::default(),
    );

    LocalBackend {
        _temp: temp,
        store,
        orchestrator,
    }
}

#[tokio::test]
async fn test_intake_against_sqlite() {
    let backend = local_backend(&["Follow up", "Send quote"]);
    let lead_id = backend.store.add_lead("Dana", "Acme", None).await.unwrap();
    let operator = ScriptedOperator::new(
        ProspectChoice::Good,
        vec![TaskDecision::Approved, TaskDecision::Denied],
    );

    let outcome = backend
        .orchestrator
        .run(wav_upload(TWO_MIB), Some(&lead_id), &operator)
        .await
        .unwrap();

    assert_eq!(outcome.tasks_stored, 1);
    assert_eq!(outcome.lead_updated, Some(true));
    assert_eq!(backend.store.call_count().await.unwrap(), 1);

    let call = backend.store.get_call(&outcome.call_id).await.unwrap().unwrap();
    assert_eq!(call.prospect_type, ProspectType::Good);
    assert_eq!(call.transcription, "A: hello");
    assert_eq!(call.duration_seconds, 66);
    assert!(call.audio_url.starts_with("file://"));

    let tasks = backend.store.tasks_for_call(&outcome.call_id).await.unwrap();
    let titles: Vec<&str> = tasks.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["Follow up"]);

    assert_eq!(
        backend.store.lead_status(&lead_id).await.unwrap().as_deref(),
        Some("interested")
    );
}

#[tokio::test]
async fn test_schedule_meeting_for_stored_call() {
    let backend = local_backend(&["Follow up"]);
    let lead_id = backend.store.add_lead("Dana", "Acme", Some("spring")).await.unwrap();
    let operator = ScriptedOperator::new(ProspectChoice::Good, vec![TaskDecision::Approved]);

    let outcome = backend
        .orchestrator
        .run(wav_upload(4096), None, &operator)
        .await
        .unwrap();

    let start = default_meeting_start(NaiveDate::from_ymd_opt(2026, 11, 2).unwrap());
    let event = schedule_meeting(backend.store.as_ref(), &outcome.call_id, start)
        .await
        .unwrap();

    assert_eq!(event.title, "Meeting with Dana");
    assert_eq!(event.call_id, outcome.call_id);
    assert_eq!(event.start_time, Utc.with_ymd_and_hms(2026, 11, 2, 10, 0, 0).unwrap());
    assert_eq!(event.end_time, Utc.with_ymd_and_hms(2026, 11, 2, 11, 0, 0).unwrap());

    assert_eq!(
        backend.store.calendar_event_count(&outcome.call_id).await.unwrap(),
        1
    );
    assert_eq!(
        backend.store.lead_status(&lead_id).await.unwrap().as_deref(),
        Some("meeting")
    );
}

#[tokio::test]
async fn test_schedule_meeting_requires_a_matching_lead() {
    let store = SqliteStore::open_in_memory().unwrap();
    let record = CallRecord {
        id: None,
        transcription: "A: hello".to_string(),
        audio_url: "file:///tmp/call.wav".to_string(),
        call_type: None,
        operator_name: None,
        client_name: Some("Dana".to_string()),
        company_name: Some("Acme".to_string()),
        duration_seconds: 12,
        summary: "S".to_string(),
        key_points: vec![],
        prospect_type: ProspectType::Uncertain,
        next_action: String::new(),
    };
    let call_id = store.insert_call(&record).await.unwrap();
    let start = Utc::now();

    let err = schedule_meeting(&store, &call_id, start).await.unwrap_err();
    assert!(err.to_string().contains("No lead found"));
    assert_eq!(store.calendar_event_count(&call_id).await.unwrap(), 0);

    let err = schedule_meeting(&store, "no-such-call", start).await.unwrap_err();
    assert!(err.to_string().contains("Call not found"));
}

#[tokio::test]
async fn test_schedule_meeting_requires_client_details() {
    let store = SqliteStore::open_in_memory().unwrap();
    store.add_lead("Dana", "Acme", None).await.unwrap();
    let record = CallRecord {
        id: None,
        transcription: "A: hello".to_string(),
        audio_url: "file:///tmp/call.wav".to_string(),
        call_type: None,
        operator_name: None,
        client_name: None,
        company_name: Some("Acme".to_string()),
        duration_seconds: 12,
        summary: "S".to_string(),
        key_points: vec![],
        prospect_type: ProspectType::Good,
        next_action: String::new(),
    };
    let call_id = store.insert_call(&record).await.unwrap();

    let err = schedule_meeting(&store, &call_id, Utc::now()).await.unwrap_err();
    assert!(err.to_string().contains("has no client name"));
}

#[tokio::test]
async fn test_draft_proposal_from_stored_call() {
    let backend = local_backend(&["Follow up"]);
    let operator = ScriptedOperator::new(ProspectChoice::Good, vec![TaskDecision::Approved]);
    let outcome = backend
        .orchestrator
        .run(wav_upload(4096), None, &operator)
        .await
        .unwrap();

    let chat = ScriptedChat::new(vec![json!({
        "proposalType": "Pilot",
        "estimatedValue": 4800,
        "proposalDate": "2026-11-09",
        "keyPoints": ["Two teams"],
        "nextSteps": ["Send pricing"]
    })]);
    let proposal = draft_proposal(&chat, backend.store.as_ref(), &outcome.call_id)
        .await
        .unwrap();

    assert_eq!(proposal.proposal_type, "Pilot");
    assert_eq!(proposal.estimated_value, Some(4800.0));
    assert_eq!(proposal.next_steps, vec!["Send pricing"]);

    let requests = chat.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].input, "A: hello");
    assert!((requests[0].temperature - 0.1).abs() < f32::EPSILON);
    drop(requests);

    let err = draft_proposal(&chat, backend.store.as_ref(), "no-such-call")
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Call not found"));
    assert_eq!(chat.call_count(), 1);
}

#[tokio::test]
async fn test_close_deal_marks_the_lead_closed() {
    let store = SqliteStore::open_in_memory().unwrap();
    let lead_id = store.add_lead("Dana", "Acme", None).await.unwrap();

    close_deal(&store, &lead_id).await.unwrap();

    assert_eq!(
        store.lead_status(&lead_id).await.unwrap().as_deref(),
        Some("closed")
    );
    assert!(store.lead_last_contacted(&lead_id).await.unwrap().is_some());
}
