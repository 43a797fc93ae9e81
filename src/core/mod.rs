//! Core workflow logic.
//!
//! This module contains:
//! - Validator: upload type and size checks
//! - Analysis: language-model stages and reply parsing
//! - Classification / Review: the two operator-driven steps
//! - Session: the intake workflow state machine
//! - Orchestrator: drives sessions against an operator
//! - EventStore: append-only run journal
//! - Scheduler: next actions on stored calls (meeting, proposal, closed deal)

pub mod analysis;
pub mod classification;
pub mod event_store;
pub mod orchestrator;
pub mod review;
pub mod scheduler;
pub mod session;
pub mod validator;

// Re-export commonly used types
pub use classification::{ClassificationError, ProspectChoice, ProspectClassification};
pub use event_store::{generate_idempotency_key, hash_input, EventStore};
pub use orchestrator::{Operator, Orchestrator};
pub use review::{ReviewError, ReviewPhase, ReviewSequencer};
pub use scheduler::{
    close_deal, default_meeting_start, draft_proposal, parse_meeting_start, schedule_meeting,
};
pub use session::{IntakeError, IntakeOutcome, IntakeSession, WorkflowState};
pub use validator::{UploadLimits, ValidationError};
