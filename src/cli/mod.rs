//! Command-line interface for callintake.
//!
//! Provides commands for processing a call recording, checking run status,
//! listing runs, next actions on a stored call (meeting, proposal, closed
//! deal), and showing configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use uuid::Uuid;

use crate::adapters::{
    BlobStorage, Collaborators, DataStore, GroqClient, LocalBlobStorage, SqliteStore,
    SupabaseClient,
};
use crate::config::{self, ResolvedConfig, StoreBackend};
use crate::core::validator::mime_from_path;
use crate::core::{
    close_deal, draft_proposal, orchestrator, parse_meeting_start, schedule_meeting, EventStore,
    IntakeError, Orchestrator,
};
use crate::domain::{AudioUpload, CallAnalysis, RunState};

pub mod operator;

pub use operator::TerminalOperator;

/// callintake - call-intake workflow for sales CRMs
#[derive(Parser, Debug)]
#[command(name = "callintake")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Process a call recording: transcribe, analyze, classify, review tasks, save
    Process {
        /// Audio file (mp3, mp4, wav, webm)
        audio: PathBuf,

        /// Lead to update once the call is saved
        #[arg(long)]
        lead_id: Option<String>,

        /// MIME type (guessed from the extension if not given)
        #[arg(long)]
        mime: Option<String>,

        /// Accept the analyzer's classification without asking
        #[arg(long)]
        auto_accept: bool,
    },

    /// Check the status of a run
    Status {
        /// Run ID (UUID)
        run_id: String,
    },

    /// List recent runs
    Runs {
        /// Maximum number of runs to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Schedule a follow-up meeting for a stored call
    Schedule {
        /// Stored call ID
        call_id: String,

        /// Meeting start: YYYY-MM-DD (10:00 UTC) or RFC 3339
        start: String,
    },

    /// Draft a proposal from a stored call
    Proposal {
        /// Stored call ID
        call_id: String,
    },

    /// Mark a lead's deal as closed
    Close {
        /// Lead ID
        lead_id: String,
    },

    /// Add a lead to the local SQLite store
    AddLead {
        /// Contact name, as it will appear on calls
        name: String,

        /// Company name
        company: String,

        /// Campaign the lead belongs to
        #[arg(long)]
        campaign_id: Option<String>,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Process {
                audio,
                lead_id,
                mime,
                auto_accept,
            } => process(&audio, lead_id.as_deref(), mime, auto_accept).await,
            Commands::Status { run_id } => show_status(&run_id).await,
            Commands::Runs { limit } => list_runs(limit).await,
            Commands::Schedule { call_id, start } => schedule(&call_id, &start).await,
            Commands::Proposal { call_id } => proposal(&call_id).await,
            Commands::Close { lead_id } => close(&lead_id).await,
            Commands::AddLead {
                name,
                company,
                campaign_id,
            } => add_lead(&name, &company, campaign_id.as_deref()).await,
            Commands::Config => show_config(),
        }
    }
}

fn stage_timeout(cfg: &ResolvedConfig) -> Duration {
    Duration::from_secs(cfg.limits.stage_timeout_seconds)
}

/// Blob storage and data store for the configured backend
fn build_storage(cfg: &ResolvedConfig) -> Result<(Arc<dyn BlobStorage>, Arc<dyn DataStore>)> {
    match cfg.store.backend {
        StoreBackend::Supabase => {
            let client = Arc::new(SupabaseClient::new(&cfg.supabase, stage_timeout(cfg))?);
            let storage: Arc<dyn BlobStorage> = client.clone();
            let store: Arc<dyn DataStore> = client;
            Ok((storage, store))
        }
        StoreBackend::Sqlite => {
            let storage: Arc<dyn BlobStorage> =
                Arc::new(LocalBlobStorage::new(cfg.home.join("audio")));
            let store: Arc<dyn DataStore> = Arc::new(SqliteStore::open(&cfg.store.sqlite_path)?);
            Ok((storage, store))
        }
    }
}

fn build_collaborators(cfg: &ResolvedConfig) -> Result<Collaborators> {
    let groq = Arc::new(GroqClient::new(&cfg.groq, stage_timeout(cfg))?);
    let (storage, store) = build_storage(cfg)?;

    Ok(Collaborators {
        storage,
        speech: groq.clone(),
        chat: groq,
        store,
    })
}

/// Read an audio file into an upload
async fn read_upload(path: &Path, mime: Option<String>) -> Result<AudioUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read audio file: {}", path.display()))?;

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid audio file name: {}", path.display()))?
        .to_string();

    let mime_type = mime
        .or_else(|| mime_from_path(path).map(str::to_string))
        .unwrap_or_else(|| "application/octet-stream".to_string());

    Ok(AudioUpload::new(file_name, mime_type, bytes))
}

/// Process one recording interactively
async fn process(
    audio: &Path,
    lead_id: Option<&str>,
    mime: Option<String>,
    auto_accept: bool,
) -> Result<()> {
    let cfg = config::config()?;
    let upload = read_upload(audio, mime).await?;

    let orchestrator = Orchestrator::new(build_collaborators(cfg)?, cfg.runs_dir(), cfg.limits.clone())
        .with_auto_accept(auto_accept || cfg.auto_accept_classification);
    let operator = TerminalOperator::new();

    let outcome = match orchestrator.run(upload, lead_id, &operator).await {
        Ok(outcome) => outcome,
        Err(e) => {
            debug!(error = %e, "Intake run ended with an error");
            if let IntakeError::Persistence(commit) = &e {
                if let Some(call_id) = commit.orphaned_call() {
                    eprintln!("Call {} was stored without its tasks", call_id);
                }
            }
            anyhow::bail!("{}", e.user_message())
        }
    };

    println!();
    println!("Call saved");
    println!("  Run ID:         {}", outcome.run_id);
    println!("  Call ID:        {}", outcome.call_id);
    println!("  Classification: {}", outcome.prospect_type);
    println!(
        "  Tasks:          {} saved, {} denied",
        outcome.tasks_stored, outcome.tasks_denied
    );
    match outcome.lead_updated {
        Some(true) => println!("  Lead:           updated"),
        Some(false) => println!("  Lead:           update failed (see log)"),
        None => {}
    }

    if let Some(debrief) = &outcome.debrief {
        println!();
        println!("Debrief:");
        for reason in &debrief.reasons {
            println!("  - {}", reason);
        }
        if !debrief.improvements.is_empty() {
            println!("Improvements:");
            for tip in &debrief.improvements {
                println!("  - {}", tip);
            }
        }
        let follow_up = &debrief.suggested_follow_up;
        if follow_up.should_follow_up {
            println!("Follow up {}: {}", follow_up.timeframe, follow_up.reason);
        }
    }

    Ok(())
}

fn state_label(state: &RunState) -> &'static str {
    match state {
        RunState::Running => "running",
        RunState::Completed => "completed",
        RunState::Failed { .. } => "failed",
    }
}

/// Show status of a specific run
async fn show_status(run_id_str: &str) -> Result<()> {
    let run_id = Uuid::parse_str(run_id_str)
        .with_context(|| format!("Invalid run ID: {}", run_id_str))?;

    let cfg = config::config()?;
    let run = orchestrator::get_run_status(&cfg.runs_dir(), run_id).await?;

    println!("Run ID: {}", run.id);
    println!("File: {}", run.file_name);
    println!("State: {}", state_label(&run.state));
    if let RunState::Failed { error } = &run.state {
        println!("Error: {}", error);
    }
    println!("Started: {}", run.started_at);
    if let Some(completed) = run.completed_at {
        println!("Completed: {}", completed);
    }
    if let Some(stage) = run.stage {
        println!("Last stage: {}", stage);
    }
    if let Some(prospect) = run.prospect_type {
        println!("Classification: {}", prospect);
    }
    println!("Decisions: {} approved, {} denied", run.approved, run.denied);
    if let Some(call_id) = &run.call_id {
        println!("Call ID: {}", call_id);
    }

    let journal = EventStore::open_in(&cfg.runs_dir(), run_id).await?;
    if let Some(analysis) = journal.load_artifact::<CallAnalysis>("analysis").await? {
        println!("Summary: {}", analysis.summary);
    }
    let artifacts = journal.list_artifacts().await?;
    if !artifacts.is_empty() {
        println!("Artifacts: {}", artifacts.join(", "));
    }

    let mut stages: Vec<_> = run.stage_statuses.iter().collect();
    stages.sort_by_key(|(stage, _)| **stage as u8);
    println!("\nStage statuses:");
    for (stage, status) in stages {
        println!("  {}: {:?}", stage, status);
    }

    Ok(())
}

/// List recent runs
async fn list_runs(limit: usize) -> Result<()> {
    let cfg = config::config()?;
    let runs = orchestrator::list_runs(&cfg.runs_dir(), limit).await?;

    if runs.is_empty() {
        println!("No runs found");
        return Ok(());
    }

    println!("{:<38} {:<30} {:<12} {:<20}", "RUN ID", "FILE", "STATE", "CLASSIFICATION");
    println!("{}", "-".repeat(100));

    for run in runs {
        println!(
            "{:<38} {:<30} {:<12} {:<20}",
            run.id,
            run.file_name,
            state_label(&run.state),
            run.prospect_type.map(|p| p.label()).unwrap_or("-")
        );
    }

    Ok(())
}

/// Schedule a follow-up meeting
async fn schedule(call_id: &str, start: &str) -> Result<()> {
    let cfg = config::config()?;
    let start = parse_meeting_start(start)?;
    let (_, store) = build_storage(cfg)?;

    let event = schedule_meeting(store.as_ref(), call_id, start).await?;

    println!("Scheduled: {}", event.title);
    println!("  {}", event.description);
    println!(
        "  {} - {}",
        event.start_time.format("%Y-%m-%d %H:%M UTC"),
        event.end_time.format("%H:%M UTC")
    );

    Ok(())
}

/// Draft a proposal from a stored call
async fn proposal(call_id: &str) -> Result<()> {
    let cfg = config::config()?;
    let chat = GroqClient::new(&cfg.groq, stage_timeout(cfg))?;
    let (_, store) = build_storage(cfg)?;

    let proposal = draft_proposal(&chat, store.as_ref(), call_id).await?;

    println!("Proposal: {}", proposal.proposal_type);
    if let Some(value) = proposal.estimated_value {
        println!("  Estimated value: {:.2}", value);
    }
    if let Some(date) = proposal.proposal_date {
        println!("  Date: {}", date.format("%Y-%m-%d"));
    }
    if !proposal.key_points.is_empty() {
        println!("Key points:");
        for point in &proposal.key_points {
            println!("  - {}", point);
        }
    }
    if !proposal.next_steps.is_empty() {
        println!("Next steps:");
        for step in &proposal.next_steps {
            println!("  - {}", step);
        }
    }

    Ok(())
}

/// Mark a lead's deal as closed
async fn close(lead_id: &str) -> Result<()> {
    let cfg = config::config()?;
    let (_, store) = build_storage(cfg)?;

    close_deal(store.as_ref(), lead_id).await?;

    println!("Deal closed for lead {}", lead_id);
    Ok(())
}

/// Add a lead to the local store
async fn add_lead(name: &str, company: &str, campaign_id: Option<&str>) -> Result<()> {
    let cfg = config::config()?;
    if cfg.store.backend != StoreBackend::Sqlite {
        anyhow::bail!("Leads are managed in Supabase; add-lead applies to the sqlite store only");
    }

    let store = SqliteStore::open(&cfg.store.sqlite_path)?;
    let lead_id = store.add_lead(name, company, campaign_id).await?;

    println!("Lead added: {}", lead_id);
    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("callintake configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home: {}", cfg.home.display());
    println!("  Runs: {}", cfg.runs_dir().display());
    println!();
    println!("Groq:");
    println!("  Base URL:            {}", cfg.groq.base_url);
    println!("  API key:             {}", if cfg.groq.api_key.is_some() { "set" } else { "(not set)" });
    println!("  Transcription model: {}", cfg.groq.transcription_model);
    println!("  Completion model:    {}", cfg.groq.completion_model);
    println!();
    println!("Store:");
    match cfg.store.backend {
        StoreBackend::Sqlite => {
            println!("  Backend:  sqlite");
            println!("  Database: {}", cfg.store.sqlite_path.display());
        }
        StoreBackend::Supabase => {
            println!("  Backend: supabase");
            println!("  URL:     {}", cfg.supabase.url.as_deref().unwrap_or("(not set)"));
            println!("  Key:     {}", if cfg.supabase.key.is_some() { "set" } else { "(not set)" });
            println!("  Bucket:  {}", cfg.supabase.audio_bucket);
        }
    }
    println!();
    println!("Limits:");
    println!("  Max upload:    {} bytes", cfg.limits.max_upload_bytes);
    println!("  MIME types:    {}", cfg.limits.allowed_mime_types.join(", "));
    println!("  Stage timeout: {}s", cfg.limits.stage_timeout_seconds);
    println!("  Task horizon:  {} days", cfg.limits.task_horizon_days);
    println!();
    println!("Auto-accept classification: {}", cfg.auto_accept_classification);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_process() {
        let cli = Cli::try_parse_from([
            "callintake",
            "process",
            "call.wav",
            "--lead-id",
            "lead-7",
            "--auto-accept",
        ])
        .unwrap();

        match cli.command {
            Commands::Process {
                audio,
                lead_id,
                mime,
                auto_accept,
            } => {
                assert_eq!(audio, PathBuf::from("call.wav"));
                assert_eq!(lead_id.as_deref(), Some("lead-7"));
                assert!(mime.is_none());
                assert!(auto_accept);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_next_actions() {
        let cli = Cli::try_parse_from(["callintake", "proposal", "call-1"]).unwrap();
        assert!(matches!(cli.command, Commands::Proposal { call_id } if call_id == "call-1"));

        let cli = Cli::try_parse_from(["callintake", "close", "lead-7"]).unwrap();
        assert!(matches!(cli.command, Commands::Close { lead_id } if lead_id == "lead-7"));

        assert!(Cli::try_parse_from(["callintake", "close"]).is_err());

        let cli = Cli::try_parse_from(["callintake", "add-lead", "Dana", "Acme", "--campaign-id", "spring"])
            .unwrap();
        match cli.command {
            Commands::AddLead {
                name,
                company,
                campaign_id,
            } => {
                assert_eq!((name.as_str(), company.as_str()), ("Dana", "Acme"));
                assert_eq!(campaign_id.as_deref(), Some("spring"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_upload_guesses_mime() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("memo.m4a");
        std::fs::write(&path, b"audio").unwrap();

        let upload = read_upload(&path, None).await.unwrap();
        assert_eq!(upload.file_name, "memo.m4a");
        assert_eq!(upload.mime_type, "audio/mp4");
        assert_eq!(upload.size_bytes(), 5);

        let text = temp.path().join("notes.txt");
        std::fs::write(&text, b"x").unwrap();
        let upload = read_upload(&text, None).await.unwrap();
        assert_eq!(upload.mime_type, "application/octet-stream");

        let forced = read_upload(&text, Some("audio/wav".to_string())).await.unwrap();
        assert_eq!(forced.mime_type, "audio/wav");
    }
}
