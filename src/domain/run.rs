//! Run summary reconstructed from journal events.
//!
//! An `IntakeRun` is what `status` and `runs` show: where a run got to and
//! what it stored. The live workflow state lives in `core::session`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::call::ProspectType;
use super::events::{Event, EventType, Stage};

/// Summary of one intake run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntakeRun {
    /// Unique identifier for this run
    pub id: Uuid,

    /// Uploaded file name
    pub file_name: String,

    /// Current state of the run
    pub state: RunState,

    /// Last stage that started
    pub stage: Option<Stage>,

    /// When the run started
    pub started_at: DateTime<Utc>,

    /// When the run finished (if applicable)
    pub completed_at: Option<DateTime<Utc>>,

    /// Confirmed classification
    pub prospect_type: Option<ProspectType>,

    /// Review decisions so far
    pub approved: usize,
    pub denied: usize,

    /// Store-assigned call id, once stored
    pub call_id: Option<String>,

    /// Status of each stage
    pub stage_statuses: HashMap<Stage, StageStatus>,
}

impl IntakeRun {
    /// Reconstruct run state from a sequence of events
    pub fn from_events(events: &[Event]) -> Option<Self> {
        let first_event = events.first()?;

        let mut run = Self {
            id: first_event.run_id,
            file_name: String::new(),
            state: RunState::Running,
            stage: None,
            started_at: first_event.timestamp,
            completed_at: None,
            prospect_type: None,
            approved: 0,
            denied: 0,
            call_id: None,
            stage_statuses: HashMap::new(),
        };

        for event in events {
            run.apply_event(event);
        }

        Some(run)
    }

    /// Apply a single event to update run state
    pub fn apply_event(&mut self, event: &Event) {
        let data_str = |key: &str| {
            event
                .data
                .as_ref()
                .and_then(|d| d.get(key))
                .and_then(|v| v.as_str())
                .map(str::to_string)
        };

        match event.event_type {
            EventType::RunStarted => {
                self.state = RunState::Running;
                self.started_at = event.timestamp;
                if let Some(name) = data_str("file_name") {
                    self.file_name = name;
                }
            }
            EventType::StageStarted => {
                if let Some(stage) = event.stage {
                    self.stage = Some(stage);
                    self.stage_statuses.insert(stage, StageStatus::Running);
                }
            }
            EventType::StageCompleted => {
                if let Some(stage) = event.stage {
                    self.stage_statuses.insert(stage, StageStatus::Completed);
                }
            }
            EventType::StageFailed => {
                if let Some(stage) = event.stage {
                    self.stage_statuses.insert(stage, StageStatus::Failed);
                }
            }
            EventType::ProspectClassified => {
                self.prospect_type = data_str("prospect_type").and_then(|s| s.parse().ok());
            }
            EventType::TaskApproved => self.approved += 1,
            EventType::TaskDenied => self.denied += 1,
            EventType::CallStored => {
                self.call_id = data_str("call_id");
            }
            EventType::TasksStored => {}
            EventType::CompensationApplied => {
                self.call_id = None;
            }
            EventType::RunCompleted => {
                self.state = RunState::Completed;
                self.completed_at = Some(event.timestamp);
            }
            EventType::RunFailed => {
                self.state = RunState::Failed {
                    error: event.error.clone().unwrap_or_default(),
                };
                self.completed_at = Some(event.timestamp);
            }
        }
    }

    /// Check if the run is still in progress
    pub fn is_running(&self) -> bool {
        matches!(self.state, RunState::Running)
    }

    /// Check if a specific stage is completed
    pub fn is_stage_completed(&self, stage: Stage) -> bool {
        self.stage_statuses
            .get(&stage)
            .map(|s| *s == StageStatus::Completed)
            .unwrap_or(false)
    }
}

/// State of an intake run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunState {
    Running,
    Completed,
    Failed { error: String },
}

impl Default for RunState {
    fn default() -> Self {
        Self::Running
    }
}

/// Status of a single stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageStatus {
    Running,
    Completed,
    Failed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(run_id: Uuid, stage: Option<Stage>, event_type: EventType) -> Event {
        Event::new(
            run_id,
            stage,
            event_type,
            format!("{}:test", run_id),
            "test".to_string(),
        )
    }

    #[test]
    fn test_run_from_events() {
        let run_id = Uuid::new_v4();

        let events = vec![
            event(run_id, None, EventType::RunStarted)
                .with_data(serde_json::json!({ "file_name": "call.wav" })),
            event(run_id, Some(Stage::Transcribing), EventType::StageStarted),
            event(run_id, Some(Stage::Transcribing), EventType::StageCompleted),
            event(run_id, None, EventType::ProspectClassified)
                .with_data(serde_json::json!({ "prospect_type": "Good Prospect" })),
            event(run_id, None, EventType::TaskApproved),
            event(run_id, None, EventType::TaskDenied),
            event(run_id, None, EventType::CallStored)
                .with_data(serde_json::json!({ "call_id": "call-42" })),
            event(run_id, None, EventType::RunCompleted),
        ];

        let run = IntakeRun::from_events(&events).unwrap();

        assert_eq!(run.id, run_id);
        assert_eq!(run.file_name, "call.wav");
        assert_eq!(run.state, RunState::Completed);
        assert!(run.is_stage_completed(Stage::Transcribing));
        assert_eq!(run.prospect_type, Some(ProspectType::Good));
        assert_eq!((run.approved, run.denied), (1, 1));
        assert_eq!(run.call_id.as_deref(), Some("call-42"));
    }

    #[test]
    fn test_failed_run_keeps_error() {
        let run_id = Uuid::new_v4();
        let events = vec![
            event(run_id, None, EventType::RunStarted),
            event(run_id, Some(Stage::Formatting), EventType::StageStarted),
            event(run_id, Some(Stage::Formatting), EventType::StageFailed),
            event(run_id, None, EventType::RunFailed).with_error("HTTP 500".to_string()),
        ];

        let run = IntakeRun::from_events(&events).unwrap();

        assert_eq!(run.stage, Some(Stage::Formatting));
        assert_eq!(
            run.state,
            RunState::Failed {
                error: "HTTP 500".to_string()
            }
        );
        assert!(!run.is_running());
    }

    #[test]
    fn test_empty_events() {
        assert!(IntakeRun::from_events(&[]).is_none());
    }
}
