//! callintake - call-intake workflow for sales CRMs
//!
//! Takes a recorded sales call from upload to stored call record:
//! validate, upload, transcribe, format, analyze, classify, review the
//! proposed follow-up tasks one at a time, then save the call and the
//! approved tasks.
//!
//! # Architecture
//!
//! - The workflow is an explicit state machine (`core::session`), driven by
//!   an `Operator` for the two human decisions
//! - External systems sit behind traits (`adapters`): blob storage,
//!   speech-to-text, chat completion, and the data store
//! - Every run is journaled to an append-only JSONL log; run status is
//!   rebuilt by replaying it
//!
//! # Modules
//!
//! - `adapters`: Groq, Supabase, SQLite and local-file collaborators
//! - `core`: Validator, analysis stages, classification, review, session, orchestrator
//! - `domain`: Data structures (CallRecord, ProposedTask, Event, IntakeRun)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Process a recording
//! callintake process call.wav --lead-id 42
//!
//! # Check run status
//! callintake status <run-id>
//!
//! # Schedule a follow-up meeting
//! callintake schedule <call-id> 2026-10-22
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use adapters::{BlobStorage, ChatCompletion, Collaborators, DataStore, SpeechToText};
pub use core::{IntakeError, IntakeOutcome, IntakeSession, Operator, Orchestrator, WorkflowState};
pub use domain::{CallRecord, Event, EventType, IntakeRun, ProposedTask, RunState};
