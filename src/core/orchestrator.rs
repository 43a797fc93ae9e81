//! Runs intake sessions end to end.
//!
//! The orchestrator owns the collaborators and the runs directory. It opens a
//! journal per run, drives an `IntakeSession` through every stage, and asks an
//! `Operator` for the two human decisions: the classification and the
//! one-at-a-time task review.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::adapters::Collaborators;
use crate::domain::{AudioUpload, CallAnalysis, IntakeRun, ProposedTask, TaskDecision};

use super::classification::ProspectChoice;
use super::event_store::EventStore;
use super::session::{IntakeError, IntakeOutcome, IntakeSession};
use super::validator::UploadLimits;

/// The human side of a run
#[async_trait]
pub trait Operator: Send + Sync {
    /// Confirm or override the analyzer's classification
    async fn confirm_prospect(&self, analysis: &CallAnalysis) -> Result<ProspectChoice>;

    /// Decide one proposed task (`position` is 1-based)
    async fn review_task(
        &self,
        task: &ProposedTask,
        position: usize,
        total: usize,
    ) -> Result<TaskDecision>;
}

/// Intake orchestrator
pub struct Orchestrator {
    collaborators: Collaborators,
    runs_dir: PathBuf,
    limits: UploadLimits,
    auto_accept: bool,
}

impl Orchestrator {
    pub fn new(collaborators: Collaborators, runs_dir: PathBuf, limits: UploadLimits) -> Self {
        Self {
            collaborators,
            runs_dir,
            limits,
            auto_accept: false,
        }
    }

    /// Accept the analyzer's classification without asking the operator
    pub fn with_auto_accept(mut self, auto_accept: bool) -> Self {
        self.auto_accept = auto_accept;
        self
    }

    /// Open a fresh session with its own journal
    pub async fn start_session(&self) -> Result<IntakeSession> {
        let run_id = Uuid::new_v4();
        let journal = EventStore::open_in(&self.runs_dir, run_id).await?;
        Ok(IntakeSession::new(
            run_id,
            self.collaborators.clone(),
            journal,
            self.limits.clone(),
        ))
    }

    /// Process one upload from validation to storage
    #[instrument(skip(self, upload, operator), fields(file = %upload.file_name))]
    pub async fn run(
        &self,
        upload: AudioUpload,
        lead_id: Option<&str>,
        operator: &dyn Operator,
    ) -> Result<IntakeOutcome, IntakeError> {
        let mut session = self
            .start_session()
            .await
            .map_err(|e| IntakeError::Journal(format!("{:#}", e)))?;
        info!(run_id = %session.run_id(), "Starting intake run");

        let analysis = session.ingest(upload).await?;

        let tasks = if self.auto_accept {
            session.accept_suggestion().await?
        } else {
            let choice = match operator.confirm_prospect(&analysis).await {
                Ok(choice) => choice,
                Err(e) => return Err(session.abandon(format!("{:#}", e)).await),
            };
            session.classify(choice).await?
        };

        let total = tasks.len();
        for (index, task) in tasks.iter().enumerate() {
            let decision = match operator.review_task(task, index + 1, total).await {
                Ok(decision) => decision,
                Err(e) => return Err(session.abandon(format!("{:#}", e)).await),
            };
            session.decide_task(task.id, decision).await?;
        }

        session.persist(lead_id).await
    }

    /// Get status of a run by ID
    pub async fn get_run_status(&self, run_id: Uuid) -> Result<IntakeRun> {
        get_run_status(&self.runs_dir, run_id).await
    }

    /// List recent runs, most recent first
    pub async fn list_runs(&self, limit: usize) -> Result<Vec<IntakeRun>> {
        list_runs(&self.runs_dir, limit).await
    }
}

/// Rebuild a run summary from its journal under `runs_dir`
pub async fn get_run_status(runs_dir: &Path, run_id: Uuid) -> Result<IntakeRun> {
    if !runs_dir.join(run_id.to_string()).is_dir() {
        anyhow::bail!("Run {} not found", run_id);
    }

    let store = EventStore::open_in(runs_dir, run_id).await?;
    let events = store.replay().await?;

    if events.is_empty() {
        anyhow::bail!("Run {} not found", run_id);
    }

    IntakeRun::from_events(&events).context("Failed to reconstruct run state")
}

/// List runs under `runs_dir`, most recent first
pub async fn list_runs(runs_dir: &Path, limit: usize) -> Result<Vec<IntakeRun>> {
    let run_ids = EventStore::list_runs_in(runs_dir).await?;
    let mut runs = Vec::new();

    for run_id in run_ids {
        if let Ok(run) = get_run_status(runs_dir, run_id).await {
            runs.push(run);
        }
    }

    runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    runs.truncate(limit);

    Ok(runs)
}
