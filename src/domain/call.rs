//! Call records and the intermediate outputs that build them.
//!
//! A `CallRecord` is assembled from the outputs of each intake stage and is
//! written to the data store exactly once, at the end of a completed run.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An uploaded audio file, as handed to the validator
#[derive(Debug, Clone)]
pub struct AudioUpload {
    /// Original file name (used to build the storage path)
    pub file_name: String,

    /// Declared MIME type, e.g. "audio/wav"
    pub mime_type: String,

    /// Raw audio bytes
    pub bytes: Vec<u8>,
}

impl AudioUpload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Size in bytes
    pub fn size_bytes(&self) -> u64 {
        u64::try_from(self.bytes.len()).unwrap_or(u64::MAX)
    }
}

/// An audio file after it has been written to blob storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioAsset {
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    pub storage_url: String,
}

/// Direction of a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallType {
    Inbound,
    Outbound,
}

impl CallType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inbound => "inbound",
            Self::Outbound => "outbound",
        }
    }
}

/// Prospect classification of a call.
///
/// Serialized with the labels the analyzer emits and the calls table stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProspectType {
    #[serde(rename = "Good Prospect")]
    Good,

    #[serde(rename = "Bad Prospect")]
    Bad,

    #[serde(rename = "Uncertain Prospect")]
    Uncertain,
}

impl ProspectType {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Good => "Good Prospect",
            Self::Bad => "Bad Prospect",
            Self::Uncertain => "Uncertain Prospect",
        }
    }
}

impl fmt::Display for ProspectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ProspectType {
    type Err = String;

    /// Lenient parse: accepts the full labels as well as "good"/"bad"/"none"/"uncertain"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let head = normalized
            .strip_suffix("prospect")
            .unwrap_or(&normalized)
            .trim();

        match head {
            "good" => Ok(Self::Good),
            "bad" => Ok(Self::Bad),
            "uncertain" | "none" | "no" | "" => Ok(Self::Uncertain),
            other => Err(format!("Unknown prospect type: {}", other)),
        }
    }
}

/// A single speaker turn in a formatted transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub speaker: String,
    pub text: String,
}

/// Speaker-labeled transcript produced by the formatter
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedTranscript {
    #[serde(rename = "formatted_transcript", default)]
    pub segments: Vec<TranscriptSegment>,

    #[serde(default)]
    pub speakers: Vec<String>,
}

impl FormattedTranscript {
    /// Render as `speaker: text` lines
    pub fn render(&self) -> String {
        self.segments
            .iter()
            .map(|s| format!("{}: {}", s.speaker, s.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// Raw speech-to-text output plus the size-derived duration estimate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTranscript {
    pub text: String,
    pub duration_seconds: u64,
}

/// Who was on the call, extracted from the raw transcript
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallMetadata {
    #[serde(default)]
    pub operator_name: Option<String>,
    #[serde(default)]
    pub client_name: Option<String>,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub call_type: Option<CallType>,
}

/// Advisory analysis of a call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallAnalysis {
    pub prospect_type: ProspectType,
    pub summary: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub next_action: String,
}

/// Follow-up suggestion attached to a debrief
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpSuggestion {
    #[serde(default)]
    pub should_follow_up: bool,
    #[serde(default)]
    pub timeframe: String,
    #[serde(default)]
    pub reason: String,
}

/// Proposal details drawn from a call where a proposal is the next step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalAnalysis {
    #[serde(default)]
    pub proposal_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proposal_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub next_steps: Vec<String>,
}

/// What went wrong on a call classified as a bad prospect
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProspectDebrief {
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub improvements: Vec<String>,
    #[serde(default)]
    pub suggested_follow_up: FollowUpSuggestion,
}

/// A call as written to the `calls` table.
///
/// `id` is assigned by the store and is absent until the record is inserted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub transcription: String,
    pub audio_url: String,
    pub call_type: Option<CallType>,
    pub operator_name: Option<String>,
    pub client_name: Option<String>,
    pub company_name: Option<String>,
    #[serde(rename = "duration")]
    pub duration_seconds: u64,
    pub summary: String,
    pub key_points: Vec<String>,
    pub prospect_type: ProspectType,
    pub next_action: String,
}

impl CallRecord {
    /// Assemble a record from accumulated stage outputs
    pub fn assemble(
        asset: &AudioAsset,
        raw: &RawTranscript,
        metadata: &CallMetadata,
        transcript: &FormattedTranscript,
        analysis: &CallAnalysis,
        prospect_type: ProspectType,
    ) -> Self {
        Self {
            id: None,
            transcription: transcript.render(),
            audio_url: asset.storage_url.clone(),
            call_type: metadata.call_type,
            operator_name: metadata.operator_name.clone(),
            client_name: metadata.client_name.clone(),
            company_name: metadata.company_name.clone(),
            duration_seconds: raw.duration_seconds,
            summary: analysis.summary.clone(),
            key_points: analysis.key_points.clone(),
            prospect_type,
            next_action: analysis.next_action.clone(),
        }
    }
}
