//! Domain types for the call-intake workflow.
//!
//! This module contains the core data structures:
//! - Call: uploads, transcripts, analysis and the stored call record
//! - Task: proposed follow-up tasks and their insert shape
//! - Lead: lead patches and calendar events
//! - Events/Run: the run journal and its replayed summary

pub mod call;
pub mod events;
pub mod lead;
pub mod run;
pub mod task;

// Re-export commonly used types
pub use call::{
    AudioAsset, AudioUpload, CallAnalysis, CallMetadata, CallRecord, CallType,
    FollowUpSuggestion, FormattedTranscript, ProposalAnalysis, ProspectDebrief, ProspectType,
    RawTranscript, TranscriptSegment,
};
pub use events::{Event, EventType, Stage};
pub use lead::{CalendarEvent, LeadPatch, LeadRef, LeadStatus};
pub use run::{IntakeRun, RunState, StageStatus};
pub use task::{NewTask, ProposedTask, TaskDecision, TaskPriority};
