//! Journal events for intake runs.
//!
//! Every state change of a run is recorded as an immutable event in an
//! append-only log. The run summary can be rebuilt by replaying the log.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single event in the append-only run journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique identifier for this event
    pub id: Uuid,

    /// When this event occurred (ISO 8601)
    pub timestamp: DateTime<Utc>,

    /// The run this event belongs to
    pub run_id: Uuid,

    /// Workflow stage (if applicable)
    pub stage: Option<Stage>,

    /// Type of event
    pub event_type: EventType,

    /// Idempotency key format: "{run_id}:{stage}:{input_hash}"
    pub idempotency_key: String,

    /// Human-readable summary (NO transcript text, NO secrets)
    pub payload_summary: String,

    /// Structured payload (file name, call id, decision counts...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Time taken in milliseconds (for completed stages)
    pub duration_ms: Option<u64>,

    /// Error message if failed
    pub error: Option<String>,
}

impl Event {
    /// Create a new event with the current timestamp
    pub fn new(
        run_id: Uuid,
        stage: Option<Stage>,
        event_type: EventType,
        idempotency_key: String,
        payload_summary: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            run_id,
            stage,
            event_type,
            idempotency_key,
            payload_summary,
            data: None,
            duration_ms: None,
            error: None,
        }
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_error(mut self, error: String) -> Self {
        self.error = Some(error);
        self
    }
}

/// Types of events that can occur during an intake run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// An upload was accepted for processing
    RunStarted,

    /// A stage began calling its collaborator
    StageStarted,

    /// A stage finished successfully
    StageCompleted,

    /// A stage failed; the run aborts
    StageFailed,

    /// The operator confirmed (or overrode) the classification
    ProspectClassified,

    /// A proposed task was approved
    TaskApproved,

    /// A proposed task was denied
    TaskDenied,

    /// The call record was stored
    CallStored,

    /// Approved tasks were stored
    TasksStored,

    /// A stored call was deleted after a later insert failed
    CompensationApplied,

    /// The run finished with everything stored
    RunCompleted,

    /// The run aborted
    RunFailed,
}

/// Workflow stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Validating,
    Uploading,
    Transcribing,
    ExtractingMetadata,
    Formatting,
    Analyzing,
    Classifying,
    Debriefing,
    ExtractingTasks,
    ReviewingTasks,
    Persisting,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validating => "validating",
            Self::Uploading => "uploading",
            Self::Transcribing => "transcribing",
            Self::ExtractingMetadata => "extracting_metadata",
            Self::Formatting => "formatting",
            Self::Analyzing => "analyzing",
            Self::Classifying => "classifying",
            Self::Debriefing => "debriefing",
            Self::ExtractingTasks => "extracting_tasks",
            Self::ReviewingTasks => "reviewing_tasks",
            Self::Persisting => "persisting",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
