//! Append-only run journal with file-based persistence.
//!
//! Layout under the runs directory:
//! - `{run_id}/events.jsonl`: one JSON event per line, appended under an
//!   exclusive file lock
//! - `{run_id}/artifacts/{name}.json`: stage outputs (transcript, analysis,
//!   proposed tasks) for inspection after the run

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::fs::{self, File};
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use crate::domain::{Event, EventType, IntakeRun};

/// File-based run journal using JSONL format
pub struct EventStore {
    /// Directory containing the run
    run_dir: PathBuf,

    /// Path to the events.jsonl file
    events_path: PathBuf,

    /// Path to artifacts directory
    artifacts_dir: PathBuf,
}

impl EventStore {
    /// Create or open the journal for a run under `base_dir`
    pub async fn open_in(base_dir: &Path, run_id: Uuid) -> Result<Self> {
        let run_dir = base_dir.join(run_id.to_string());
        let artifacts_dir = run_dir.join("artifacts");

        fs::create_dir_all(&artifacts_dir)
            .await
            .with_context(|| format!("Failed to create artifacts directory: {}", artifacts_dir.display()))?;

        let events_path = run_dir.join("events.jsonl");

        Ok(Self {
            run_dir,
            events_path,
            artifacts_dir,
        })
    }

    pub fn events_path(&self) -> &Path {
        &self.events_path
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn artifacts_dir(&self) -> &Path {
        &self.artifacts_dir
    }

    /// Store a stage output as pretty JSON
    pub async fn store_artifact<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        let artifact_path = self.artifacts_dir.join(format!("{}.json", name));
        let content = serde_json::to_string_pretty(value)
            .with_context(|| format!("Failed to serialize artifact: {}", name))?;

        fs::write(&artifact_path, content)
            .await
            .with_context(|| format!("Failed to write artifact: {}", artifact_path.display()))?;

        Ok(artifact_path)
    }

    /// Load a stage output, if it was stored
    pub async fn load_artifact<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>> {
        let artifact_path = self.artifacts_dir.join(format!("{}.json", name));

        if !artifact_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&artifact_path)
            .await
            .with_context(|| format!("Failed to read artifact: {}", artifact_path.display()))?;

        let value = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact: {}", artifact_path.display()))?;

        Ok(Some(value))
    }

    /// List stored artifact names (sorted)
    pub async fn list_artifacts(&self) -> Result<Vec<String>> {
        let mut artifacts = Vec::new();

        if !self.artifacts_dir.exists() {
            return Ok(artifacts);
        }

        let mut entries = fs::read_dir(&self.artifacts_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".json") {
                    artifacts.push(stem.to_string());
                }
            }
        }

        artifacts.sort();
        Ok(artifacts)
    }

    /// Append an event to the log
    pub async fn append(&self, event: &Event) -> Result<()> {
        let json = serde_json::to_string(event).context("Failed to serialize event")?;
        let events_path = self.events_path.clone();

        tokio::task::spawn_blocking(move || append_line(&events_path, &json))
            .await
            .context("Journal append task panicked")?
    }

    /// Replay all events in order
    pub async fn replay(&self) -> Result<Vec<Event>> {
        replay_file(&self.events_path).await
    }

    /// Rebuild the run summary from the journal
    pub async fn summary(&self) -> Result<Option<IntakeRun>> {
        let events = self.replay().await?;
        Ok(IntakeRun::from_events(&events))
    }

    /// Get the last event of a specific type
    pub async fn last_event_of_type(&self, event_type: EventType) -> Result<Option<Event>> {
        let events = self.replay().await?;
        Ok(events.into_iter().rev().find(|e| e.event_type == event_type))
    }

    /// List all run IDs under `base_dir`
    pub async fn list_runs_in(base_dir: &Path) -> Result<Vec<Uuid>> {
        if !base_dir.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        let mut entries = fs::read_dir(base_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    if let Ok(uuid) = Uuid::parse_str(name) {
                        runs.push(uuid);
                    }
                }
            }
        }

        Ok(runs)
    }
}

/// Append one line to a JSONL file while holding an exclusive lock
fn append_line(events_path: &Path, json: &str) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(events_path)
        .with_context(|| format!("Failed to open events file: {}", events_path.display()))?;

    file.lock_exclusive()
        .context("Failed to acquire file lock on events.jsonl")?;

    writeln!(file, "{}", json).context("Failed to write event")?;
    file.flush().context("Failed to flush event")?;

    // Lock is released when file is dropped
    Ok(())
}

async fn replay_file(events_path: &Path) -> Result<Vec<Event>> {
    if !events_path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(events_path)
        .await
        .with_context(|| format!("Failed to open events file: {}", events_path.display()))?;

    let reader = BufReader::new(file);
    let mut lines = reader.lines();
    let mut events = Vec::new();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = serde_json::from_str(&line)
            .with_context(|| format!("Failed to parse event in {}", events_path.display()))?;
        events.push(event);
    }

    Ok(events)
}

/// Generate an idempotency key for a stage
pub fn generate_idempotency_key(run_id: Uuid, stage: &str, input: &str) -> String {
    format!("{}:{}:{}", run_id, stage, hash_input(input))
}

/// Hash input content (first 16 hex chars of SHA256)
pub fn hash_input(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    hex::encode(&digest[..8])
}
