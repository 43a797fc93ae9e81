//! Intake session: the call-intake workflow as an explicit state machine.
//!
//! ```text
//! Idle -> Validating -> Uploading -> Transcribing -> Formatting -> Analyzing
//!      -> Classifying -> ExtractingTasks -> ReviewingTasks -> Persisting -> Done
//! ```
//!
//! Any stage may move the session to `Failed`, which is terminal. Operator
//! input arrives through explicit transitions (`classify`, `decide`,
//! `persist`), so the workflow runs the same way from a terminal, a test, or
//! any other front end.
//!
//! Every transition is journaled; the call record is written once, by
//! `persist`, after the review is complete.

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{CommitError, Collaborators};
use crate::domain::{
    AudioAsset, AudioUpload, CallAnalysis, CallMetadata, CallRecord, Event, EventType,
    FormattedTranscript, LeadPatch, LeadStatus, ProposedTask, ProspectDebrief, ProspectType,
    RawTranscript, Stage, TaskDecision,
};

use super::analysis;
use super::classification::{ClassificationError, ProspectChoice, ProspectClassification};
use super::event_store::{generate_idempotency_key, EventStore};
use super::review::{ReviewError, ReviewSequencer};
use super::validator::{UploadLimits, ValidationError};

/// Operator-facing message for any failed processing stage
pub const PROCESSING_FAILED_MESSAGE: &str = "Failed to process audio. Please try again.";

/// Operator-facing message for a failed save
pub const SAVE_FAILED_MESSAGE: &str = "Failed to save the call. Please try again.";

/// Bytes per second of 16 kHz, 16-bit mono audio; used to estimate duration
const BYTES_PER_SECOND: f64 = 16_000.0 * 2.0;

/// Workflow state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    Idle,
    Validating,
    Uploading,
    Transcribing,
    Formatting,
    Analyzing,

    /// Waiting for the operator to confirm or override the suggestion
    Classifying { suggested: ProspectType },

    ExtractingTasks,
    ReviewingTasks(ReviewSequencer),
    Persisting,
    Done(IntakeOutcome),
    Failed { reason: String },
}

impl WorkflowState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Uploading => "uploading",
            Self::Transcribing => "transcribing",
            Self::Formatting => "formatting",
            Self::Analyzing => "analyzing",
            Self::Classifying { .. } => "classifying",
            Self::ExtractingTasks => "extracting_tasks",
            Self::ReviewingTasks(_) => "reviewing_tasks",
            Self::Persisting => "persisting",
            Self::Done(_) => "done",
            Self::Failed { .. } => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed { .. })
    }
}

/// What a completed run stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntakeOutcome {
    pub run_id: Uuid,
    pub call_id: String,
    pub prospect_type: ProspectType,
    pub tasks_stored: usize,
    pub tasks_denied: usize,

    /// Present for bad prospects when the debrief succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debrief: Option<ProspectDebrief>,

    /// `None` when no lead was given; `Some(false)` when the update failed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_updated: Option<bool>,
}

/// Workflow errors
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("{stage} failed: {message}")]
    Collaborator { stage: Stage, message: String },

    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: Stage, seconds: u64 },

    #[error(transparent)]
    Persistence(#[from] CommitError),

    #[error("Cannot {action} while {state}")]
    InvalidTransition {
        action: &'static str,
        state: &'static str,
    },

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error("Operator input failed: {0}")]
    Operator(String),

    #[error("Run journal error: {0}")]
    Journal(String),
}

impl IntakeError {
    /// Short message for the operator; details go to the log
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(e) => e.to_string(),
            Self::Collaborator { .. } => PROCESSING_FAILED_MESSAGE.to_string(),
            Self::Timeout { stage, .. } if *stage == Stage::Persisting => {
                SAVE_FAILED_MESSAGE.to_string()
            }
            Self::Timeout { .. } => PROCESSING_FAILED_MESSAGE.to_string(),
            Self::Persistence(_) => SAVE_FAILED_MESSAGE.to_string(),
            Self::Journal(_) | Self::Operator(_) | Self::InvalidTransition { .. } => {
                PROCESSING_FAILED_MESSAGE.to_string()
            }
            Self::Classification(e) => e.to_string(),
            Self::Review(e) => e.to_string(),
        }
    }
}

/// Stage outputs accumulated until the call record is assembled
#[derive(Debug, Default)]
struct StageOutputs {
    asset: Option<AudioAsset>,
    raw: Option<RawTranscript>,
    metadata: Option<CallMetadata>,
    transcript: Option<FormattedTranscript>,
    analysis: Option<CallAnalysis>,
    debrief: Option<ProspectDebrief>,
}

/// Estimated duration from file size, assuming 16 kHz 16-bit mono
pub fn estimate_duration_seconds(size_bytes: u64) -> u64 {
    (size_bytes as f64 / BYTES_PER_SECOND).round() as u64
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Storage object path for an upload: `{unix_millis}-{file_name}`
pub fn object_path(file_name: &str, unix_millis: i64) -> String {
    format!("{}-{}", unix_millis, file_name)
}

/// One intake run
pub struct IntakeSession {
    run_id: Uuid,
    collaborators: Collaborators,
    journal: EventStore,
    limits: UploadLimits,
    state: WorkflowState,
    classification: ProspectClassification,
    outputs: StageOutputs,
}

impl IntakeSession {
    pub fn new(
        run_id: Uuid,
        collaborators: Collaborators,
        journal: EventStore,
        limits: UploadLimits,
    ) -> Self {
        Self {
            run_id,
            collaborators,
            journal,
            limits,
            state: WorkflowState::Idle,
            classification: ProspectClassification::default(),
            outputs: StageOutputs::default(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn journal(&self) -> &EventStore {
        &self.journal
    }

    /// The analyzer's output, once available
    pub fn analysis(&self) -> Option<&CallAnalysis> {
        self.outputs.analysis.as_ref()
    }

    pub fn metadata(&self) -> Option<&CallMetadata> {
        self.outputs.metadata.as_ref()
    }

    pub fn debrief(&self) -> Option<&ProspectDebrief> {
        self.outputs.debrief.as_ref()
    }

    pub fn classification(&self) -> &ProspectClassification {
        &self.classification
    }

    /// The review, while tasks are being reviewed
    pub fn review(&self) -> Option<&ReviewSequencer> {
        match &self.state {
            WorkflowState::ReviewingTasks(review) => Some(review),
            _ => None,
        }
    }

    fn stage_timeout(&self) -> Duration {
        Duration::from_secs(self.limits.stage_timeout_seconds)
    }

    fn invalid(&self, action: &'static str) -> IntakeError {
        IntakeError::InvalidTransition {
            action,
            state: self.state.name(),
        }
    }

    /// Append to the journal
    async fn record(&self, event: Event) -> Result<(), IntakeError> {
        self.journal
            .append(&event)
            .await
            .map_err(|e| IntakeError::Journal(format!("{:#}", e)))
    }

    /// Append once the call is stored; the store is the record of truth, so
    /// failures are logged only
    async fn record_stored(&self, event: Event) {
        if let Err(e) = self.record(event).await {
            warn!(error = %e, "Failed to journal a stored result");
        }
    }

    fn event(&self, stage: Option<Stage>, event_type: EventType, key: String, summary: String) -> Event {
        Event::new(self.run_id, stage, event_type, key, summary)
    }

    /// Store a stage output next to the journal; failures are logged only
    async fn store_artifact<T: Serialize>(&self, name: &str, value: &T) {
        if let Err(e) = self.journal.store_artifact(name, value).await {
            warn!(artifact = name, error = %e, "Failed to store artifact");
        }
    }

    /// Move to `Failed` and journal the run failure
    async fn fail(&mut self, err: IntakeError) -> IntakeError {
        let detail = err.to_string();
        error!(run_id = %self.run_id, error = %detail, "Intake run failed");

        self.state = WorkflowState::Failed {
            reason: detail.clone(),
        };

        let event = self
            .event(
                None,
                EventType::RunFailed,
                format!("{}:complete", self.run_id),
                format!("Run failed: {}", err.user_message()),
            )
            .with_error(detail);
        if let Err(journal_err) = self.record(event).await {
            warn!(error = %journal_err, "Failed to journal run failure");
        }

        err
    }

    /// Abandon the run (operator went away, input failed)
    pub async fn abandon(&mut self, reason: String) -> IntakeError {
        if self.state.is_terminal() {
            return IntakeError::Operator(reason);
        }
        self.fail(IntakeError::Operator(reason)).await
    }

    /// Run one collaborator-backed stage under the stage timeout
    async fn run_stage<T, F>(&self, stage: Stage, key_input: &str, work: F) -> Result<T, IntakeError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        let key = generate_idempotency_key(self.run_id, stage.as_str(), key_input);
        self.record(self.event(
            Some(stage),
            EventType::StageStarted,
            key.clone(),
            format!("Stage '{}' started", stage),
        ))
        .await?;

        let started = Instant::now();
        let timeout = self.stage_timeout();
        let result = tokio::time::timeout(timeout, work).await;
        let duration_ms = elapsed_ms(started);

        let err = match result {
            Ok(Ok(value)) => {
                info!(%stage, duration_ms, "Stage completed");
                self.record(
                    self.event(
                        Some(stage),
                        EventType::StageCompleted,
                        key,
                        format!("Stage '{}' completed in {}ms", stage, duration_ms),
                    )
                    .with_duration(duration_ms),
                )
                .await?;
                return Ok(value);
            }
            Ok(Err(e)) => IntakeError::Collaborator {
                stage,
                message: format!("{:#}", e),
            },
            Err(_) => IntakeError::Timeout {
                stage,
                seconds: timeout.as_secs(),
            },
        };

        self.record(
            self.event(
                Some(stage),
                EventType::StageFailed,
                key,
                format!("Stage '{}' failed", stage),
            )
            .with_duration(duration_ms)
            .with_error(err.to_string()),
        )
        .await?;

        Err(err)
    }

    /// Validate, upload, transcribe, format and analyze an upload.
    ///
    /// Ends in `Classifying` with the analyzer's suggestion. A rejected
    /// upload fails the run before any collaborator is called.
    #[instrument(skip(self, upload), fields(run_id = %self.run_id, file = %upload.file_name))]
    pub async fn ingest(&mut self, upload: AudioUpload) -> Result<CallAnalysis, IntakeError> {
        if !matches!(self.state, WorkflowState::Idle) {
            return Err(self.invalid("ingest an upload"));
        }

        let started = self
            .event(
                None,
                EventType::RunStarted,
                format!("{}:start", self.run_id),
                format!("Intake of '{}' started", upload.file_name),
            )
            .with_data(json!({
                "file_name": upload.file_name,
                "mime_type": upload.mime_type,
                "size_bytes": upload.size_bytes(),
            }));
        if let Err(e) = self.record(started).await {
            return Err(self.fail(e).await);
        }

        match self.process(upload).await {
            Ok(analysis) => Ok(analysis),
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn process(&mut self, upload: AudioUpload) -> Result<CallAnalysis, IntakeError> {
        self.state = WorkflowState::Validating;
        if let Err(rejection) = self.limits.validate(&upload) {
            warn!(reason = %rejection, "Upload rejected");
            self.record(
                self.event(
                    Some(Stage::Validating),
                    EventType::StageFailed,
                    format!("{}:validating", self.run_id),
                    "Upload rejected".to_string(),
                )
                .with_error(rejection.to_string()),
            )
            .await?;
            return Err(rejection.into());
        }

        let storage = self.collaborators.storage.clone();
        let speech = self.collaborators.speech.clone();
        let chat = self.collaborators.chat.clone();

        self.state = WorkflowState::Uploading;
        let path = object_path(&upload.file_name, Utc::now().timestamp_millis());
        let stored_path = self
            .run_stage(
                Stage::Uploading,
                &path,
                storage.upload(&path, upload.bytes.clone(), &upload.mime_type),
            )
            .await?;
        let asset = AudioAsset {
            file_name: upload.file_name.clone(),
            mime_type: upload.mime_type.clone(),
            size_bytes: upload.size_bytes(),
            storage_url: storage.public_url(&stored_path),
        };

        self.state = WorkflowState::Transcribing;
        let text = self
            .run_stage(Stage::Transcribing, &stored_path, speech.transcribe(&upload))
            .await?;
        let raw = RawTranscript {
            text,
            duration_seconds: estimate_duration_seconds(upload.size_bytes()),
        };
        self.store_artifact("raw_transcript", &raw).await;

        let metadata = self
            .run_stage(
                Stage::ExtractingMetadata,
                &raw.text,
                analysis::extract_metadata(chat.as_ref(), &raw.text),
            )
            .await?;
        self.store_artifact("metadata", &metadata).await;

        self.state = WorkflowState::Formatting;
        let transcript = self
            .run_stage(
                Stage::Formatting,
                &raw.text,
                analysis::format_transcript(chat.as_ref(), &raw.text),
            )
            .await?;
        self.store_artifact("transcript", &transcript).await;

        self.state = WorkflowState::Analyzing;
        let rendered = transcript.render();
        let call_analysis = self
            .run_stage(
                Stage::Analyzing,
                &rendered,
                analysis::analyze_call(chat.as_ref(), &transcript),
            )
            .await?;
        self.store_artifact("analysis", &call_analysis).await;

        self.classification.begin(call_analysis.prospect_type)?;
        self.state = WorkflowState::Classifying {
            suggested: call_analysis.prospect_type,
        };

        self.outputs.asset = Some(asset);
        self.outputs.raw = Some(raw);
        self.outputs.metadata = Some(metadata);
        self.outputs.transcript = Some(transcript);
        self.outputs.analysis = Some(call_analysis.clone());

        info!(suggested = %call_analysis.prospect_type, "Awaiting classification");
        Ok(call_analysis)
    }

    /// Confirm or override the classification, then extract tasks for review.
    ///
    /// Every classification proceeds to review. A bad prospect additionally
    /// gets a debrief; a failed debrief is logged and skipped.
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    pub async fn classify(&mut self, choice: ProspectChoice) -> Result<Vec<ProposedTask>, IntakeError> {
        if !matches!(self.state, WorkflowState::Classifying { .. }) {
            return Err(self.invalid("classify the call"));
        }

        let prospect_type = self.classification.classify(choice)?;
        let overridden = self.classification.overridden();
        info!(%prospect_type, overridden, "Call classified");

        let classified = self
            .event(
                Some(Stage::Classifying),
                EventType::ProspectClassified,
                format!("{}:classifying", self.run_id),
                format!("Classified as {}", prospect_type),
            )
            .with_data(json!({
                "prospect_type": prospect_type.label(),
                "suggested": self.classification.suggested().map(|s| s.label()),
                "overridden": overridden,
            }));
        if let Err(e) = self.record(classified).await {
            return Err(self.fail(e).await);
        }

        let transcript_text = self
            .outputs
            .transcript
            .as_ref()
            .map(FormattedTranscript::render)
            .unwrap_or_default();
        let chat = self.collaborators.chat.clone();

        if prospect_type == ProspectType::Bad {
            match self
                .run_stage(
                    Stage::Debriefing,
                    &transcript_text,
                    analysis::debrief(chat.as_ref(), &transcript_text),
                )
                .await
            {
                Ok(debrief) => {
                    self.store_artifact("debrief", &debrief).await;
                    self.outputs.debrief = Some(debrief);
                }
                Err(IntakeError::Journal(e)) => return Err(self.fail(IntakeError::Journal(e)).await),
                Err(e) => warn!(error = %e, "Debrief unavailable, continuing"),
            }
        }

        self.state = WorkflowState::ExtractingTasks;
        let now = Utc::now();
        let horizon = self.limits.task_horizon_days;
        let tasks = match self
            .run_stage(
                Stage::ExtractingTasks,
                &transcript_text,
                analysis::extract_tasks(chat.as_ref(), &transcript_text, now, horizon),
            )
            .await
        {
            Ok(tasks) => tasks,
            Err(e) => return Err(self.fail(e).await),
        };
        self.store_artifact("proposed_tasks", &tasks).await;

        let mut review = ReviewSequencer::new();
        if let Err(e) = review.load(tasks.clone()) {
            return Err(self.fail(e.into()).await);
        }
        self.state = WorkflowState::ReviewingTasks(review);
        Ok(tasks)
    }

    /// Accept the analyzer's suggestion
    pub async fn accept_suggestion(&mut self) -> Result<Vec<ProposedTask>, IntakeError> {
        let suggested = match self.state {
            WorkflowState::Classifying { suggested } => suggested,
            _ => return Err(self.invalid("accept the suggested classification")),
        };
        self.classify(suggested.into()).await
    }

    /// Decide the active task
    pub async fn decide(&mut self, decision: TaskDecision) -> Result<ProposedTask, IntakeError> {
        let state = self.state.name();
        let review = match &mut self.state {
            WorkflowState::ReviewingTasks(review) => review,
            _ => {
                return Err(IntakeError::InvalidTransition {
                    action: "review tasks",
                    state,
                })
            }
        };
        let task = review.decide_active(decision)?;
        if let Err(e) = self.record_decision(&task, decision).await {
            return Err(self.fail(e).await);
        }
        Ok(task)
    }

    /// Decide a task by id; only the active task is accepted
    pub async fn decide_task(&mut self, task_id: Uuid, decision: TaskDecision) -> Result<ProposedTask, IntakeError> {
        let state = self.state.name();
        let review = match &mut self.state {
            WorkflowState::ReviewingTasks(review) => review,
            _ => {
                return Err(IntakeError::InvalidTransition {
                    action: "review tasks",
                    state,
                })
            }
        };
        let task = review.decide(task_id, decision)?;
        if let Err(e) = self.record_decision(&task, decision).await {
            return Err(self.fail(e).await);
        }
        Ok(task)
    }

    async fn record_decision(&self, task: &ProposedTask, decision: TaskDecision) -> Result<(), IntakeError> {
        let (event_type, verb) = match decision {
            TaskDecision::Approved => (EventType::TaskApproved, "approved"),
            TaskDecision::Denied => (EventType::TaskDenied, "denied"),
        };
        self.record(
            self.event(
                Some(Stage::ReviewingTasks),
                event_type,
                format!("{}:review:{}", self.run_id, task.id),
                format!("Task '{}' {}", task.title, verb),
            )
            .with_data(json!({ "task_id": task.id, "title": task.title })),
        )
        .await
    }

    /// Store the call and approved tasks, then update the lead.
    ///
    /// Requires every proposed task to be decided. The lead update is a side
    /// effect: its failure is reported in the outcome, not as an error.
    #[instrument(skip(self), fields(run_id = %self.run_id))]
    pub async fn persist(&mut self, lead_id: Option<&str>) -> Result<IntakeOutcome, IntakeError> {
        let review = match &self.state {
            WorkflowState::ReviewingTasks(review) => review,
            _ => return Err(self.invalid("save the call")),
        };
        review.close()?;

        let (prospect_type, record) = match (self.classification.confirmed(), self.call_record()) {
            (Some(prospect_type), Some(record)) => (prospect_type, record),
            _ => return Err(self.invalid("save an incomplete call")),
        };

        let mut review = match std::mem::replace(&mut self.state, WorkflowState::Persisting) {
            WorkflowState::ReviewingTasks(review) => review,
            other => {
                self.state = other;
                return Err(self.invalid("save the call"));
            }
        };
        let approved = match review.begin_save() {
            Ok(approved) => approved,
            Err(e) => return Err(self.fail(e.into()).await),
        };
        let (_, denied) = review.decisions();

        let key = generate_idempotency_key(self.run_id, Stage::Persisting.as_str(), &record.transcription);
        let saving = self.event(
            Some(Stage::Persisting),
            EventType::StageStarted,
            key.clone(),
            format!("Saving call with {} approved task(s)", approved.len()),
        );
        if let Err(e) = self.record(saving).await {
            return Err(self.fail(e).await);
        }

        let store = self.collaborators.store.clone();
        let started = Instant::now();
        let result = store
            .commit_intake(&record, approved, self.stage_timeout())
            .await;
        let duration_ms = elapsed_ms(started);

        let receipt = match result {
            Ok(receipt) => receipt,
            Err(commit_err) => {
                if let CommitError::TaskInsert {
                    call_id,
                    compensated: true,
                    ..
                } = &commit_err
                {
                    self.record_stored(
                        self.event(
                            Some(Stage::Persisting),
                            EventType::CompensationApplied,
                            format!("{}:compensate", self.run_id),
                            "Stored call removed after task insert failed".to_string(),
                        )
                        .with_data(json!({ "call_id": call_id })),
                    )
                    .await;
                }
                return Err(self.fail_persist(key, duration_ms, commit_err.into()).await);
            }
        };

        self.record_stored(
            self.event(
                Some(Stage::Persisting),
                EventType::CallStored,
                key.clone(),
                "Call stored".to_string(),
            )
            .with_data(json!({ "call_id": receipt.call_id })),
        )
        .await;
        if receipt.tasks_stored > 0 {
            self.record_stored(
                self.event(
                    Some(Stage::Persisting),
                    EventType::TasksStored,
                    key.clone(),
                    format!("{} task(s) stored", receipt.tasks_stored),
                )
                .with_data(json!({ "count": receipt.tasks_stored })),
            )
            .await;
        }
        self.record_stored(
            self.event(
                Some(Stage::Persisting),
                EventType::StageCompleted,
                key,
                format!("Call saved in {}ms", duration_ms),
            )
            .with_duration(duration_ms),
        )
        .await;
        if let Err(e) = review.finish() {
            warn!(error = %e, "Review did not close after save");
        }

        let lead_updated = match lead_id {
            Some(lead_id) => Some(self.update_lead(lead_id, prospect_type).await),
            None => None,
        };

        let outcome = IntakeOutcome {
            run_id: self.run_id,
            call_id: receipt.call_id,
            prospect_type,
            tasks_stored: receipt.tasks_stored,
            tasks_denied: denied,
            debrief: self.outputs.debrief.clone(),
            lead_updated,
        };

        self.record_stored(
            self.event(
                None,
                EventType::RunCompleted,
                format!("{}:complete", self.run_id),
                format!(
                    "Call {} saved with {} task(s)",
                    outcome.call_id, outcome.tasks_stored
                ),
            )
            .with_data(json!({ "lead_updated": outcome.lead_updated })),
        )
        .await;

        info!(call_id = %outcome.call_id, tasks = outcome.tasks_stored, "Intake completed");
        self.state = WorkflowState::Done(outcome.clone());
        Ok(outcome)
    }

    async fn fail_persist(&mut self, key: String, duration_ms: u64, err: IntakeError) -> IntakeError {
        let event = self
            .event(
                Some(Stage::Persisting),
                EventType::StageFailed,
                key,
                "Saving the call failed".to_string(),
            )
            .with_duration(duration_ms)
            .with_error(err.to_string());
        if let Err(journal_err) = self.record(event).await {
            warn!(error = %journal_err, "Failed to journal persistence failure");
        }
        self.fail(err).await
    }

    /// Patch the lead's status; returns whether it succeeded
    async fn update_lead(&self, lead_id: &str, prospect_type: ProspectType) -> bool {
        let patch = LeadPatch::new(LeadStatus::from(prospect_type));
        let store = self.collaborators.store.clone();

        match tokio::time::timeout(self.stage_timeout(), store.update_lead(lead_id, &patch)).await {
            Ok(Ok(())) => {
                info!(lead_id, status = patch.status.as_str(), "Lead updated");
                true
            }
            Ok(Err(e)) => {
                warn!(lead_id, error = %format!("{:#}", e), "Lead update failed");
                false
            }
            Err(_) => {
                warn!(lead_id, "Lead update timed out");
                false
            }
        }
    }

    fn call_record(&self) -> Option<CallRecord> {
        let outputs = &self.outputs;
        Some(CallRecord::assemble(
            outputs.asset.as_ref()?,
            outputs.raw.as_ref()?,
            outputs.metadata.as_ref()?,
            outputs.transcript.as_ref()?,
            outputs.analysis.as_ref()?,
            self.classification.confirmed()?,
        ))
    }
}
