//! Collaborator interfaces for external systems.
//!
//! The intake workflow talks to four collaborators:
//! - Blob storage for the uploaded audio
//! - A speech-to-text service
//! - A chat-completion service (JSON-object responses)
//! - A relational data store for calls, tasks, leads and calendar events
//!
//! Each is a trait so the workflow can run against hosted services, a local
//! SQLite database, or in-process fakes.

pub mod groq;
pub mod local;
pub mod sqlite;
pub mod supabase;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;
use tracing::{error, warn};

use crate::domain::{
    AudioUpload, CalendarEvent, CallRecord, LeadPatch, LeadRef, NewTask, ProposedTask,
};

pub use groq::GroqClient;
pub use local::LocalBlobStorage;
pub use sqlite::SqliteStore;
pub use supabase::SupabaseClient;

/// Blob storage for uploaded audio
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Store bytes under `path`, returning the stored object path
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    /// Public URL of a stored object
    fn public_url(&self, path: &str) -> String;
}

/// Speech-to-text collaborator
#[async_trait]
pub trait SpeechToText: Send + Sync {
    /// Transcribe an audio file to plain text
    async fn transcribe(&self, upload: &AudioUpload) -> Result<String>;
}

/// One completion request: a system instruction applied to an input text
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub instruction: String,
    pub input: String,
    pub temperature: f32,
}

/// Chat-completion collaborator that answers with a JSON object
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    /// Human-readable collaborator name
    fn name(&self) -> &str;

    /// Run the instruction over the input and parse the reply as JSON
    async fn complete_json(&self, request: &CompletionRequest) -> Result<serde_json::Value>;
}

/// What a successful `commit_intake` stored
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitReceipt {
    pub call_id: String,
    pub tasks_stored: usize,
}

/// Failure while storing a finished intake
#[derive(Debug, Clone, Error)]
pub enum CommitError {
    #[error("Failed to store call: {message}")]
    CallInsert { message: String },

    #[error("Failed to store tasks for call {call_id} (call removed: {compensated}): {message}")]
    TaskInsert {
        call_id: String,
        compensated: bool,
        message: String,
    },
}

impl CommitError {
    /// Call id left behind without its tasks, if compensation failed
    pub fn orphaned_call(&self) -> Option<&str> {
        match self {
            Self::TaskInsert {
                call_id,
                compensated: false,
                ..
            } => Some(call_id),
            _ => None,
        }
    }
}

/// Relational data store (tables `calls`, `tasks`, `leads`, `calendar_events`)
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Insert a call, returning the store-assigned id
    async fn insert_call(&self, record: &CallRecord) -> Result<String>;

    /// Insert tasks in one batch
    async fn insert_tasks(&self, tasks: &[NewTask]) -> Result<()>;

    /// Delete a call (compensating action)
    async fn delete_call(&self, call_id: &str) -> Result<()>;

    async fn get_call(&self, call_id: &str) -> Result<Option<CallRecord>>;

    async fn update_lead(&self, lead_id: &str, patch: &LeadPatch) -> Result<()>;

    /// Find a lead by exact name and company
    async fn find_lead(&self, name: &str, company: &str) -> Result<Option<LeadRef>>;

    async fn insert_calendar_event(&self, event: &CalendarEvent) -> Result<()>;

    /// Store a finished intake: the call, then its approved tasks.
    ///
    /// The default is best-effort across separate requests, each bounded by
    /// `step_timeout`: if the task insert fails or times out, the call is
    /// deleted again. Stores with transactions override this.
    async fn commit_intake(
        &self,
        record: &CallRecord,
        approved: Vec<ProposedTask>,
        step_timeout: Duration,
    ) -> Result<CommitReceipt, CommitError> {
        let call_id = bounded(step_timeout, self.insert_call(record))
            .await
            .map_err(|e| CommitError::CallInsert {
                message: format!("{:#}", e),
            })?;

        if approved.is_empty() {
            return Ok(CommitReceipt {
                call_id,
                tasks_stored: 0,
            });
        }

        let tasks: Vec<NewTask> = approved
            .into_iter()
            .map(|t| t.into_new_task(&call_id))
            .collect();

        if let Err(e) = bounded(step_timeout, self.insert_tasks(&tasks)).await {
            warn!(%call_id, error = %e, "Task insert failed, removing stored call");
            let compensated = match bounded(step_timeout, self.delete_call(&call_id)).await {
                Ok(()) => true,
                Err(del_err) => {
                    error!(%call_id, error = %del_err, "Compensating delete failed, call is orphaned");
                    false
                }
            };
            return Err(CommitError::TaskInsert {
                call_id,
                compensated,
                message: format!("{:#}", e),
            });
        }

        Ok(CommitReceipt {
            call_id,
            tasks_stored: tasks.len(),
        })
    }
}

/// Await one store request, failing it once `limit` has passed
async fn bounded<T, F>(limit: Duration, request: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, request).await {
        Ok(result) => result,
        Err(_) => anyhow::bail!("timed out after {}s", limit.as_secs()),
    }
}

/// The full set of collaborators a workflow run needs
#[derive(Clone)]
pub struct Collaborators {
    pub storage: Arc<dyn BlobStorage>,
    pub speech: Arc<dyn SpeechToText>,
    pub chat: Arc<dyn ChatCompletion>,
    pub store: Arc<dyn DataStore>,
}
