//! Upload validation.
//!
//! Rejects audio files before any collaborator is contacted:
//! - MIME type must be one of the accepted audio types
//! - Size must not exceed the upload limit (25 MiB by default)

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::AudioUpload;

/// Limits applied to uploads and stage execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadLimits {
    /// Maximum upload size in bytes (default: 25 MiB)
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Accepted MIME types
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,

    /// Per-stage collaborator timeout in seconds (default: 600)
    #[serde(default = "default_stage_timeout")]
    pub stage_timeout_seconds: u64,

    /// Latest allowed due date for proposed tasks, in days from extraction (default: 14)
    #[serde(default = "default_task_horizon_days")]
    pub task_horizon_days: i64,
}

fn default_max_upload_bytes() -> u64 {
    25 * 1024 * 1024
}

fn default_allowed_mime_types() -> Vec<String> {
    ["audio/mp3", "audio/mp4", "audio/mpeg", "audio/wav", "audio/webm"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_stage_timeout() -> u64 {
    600
}

fn default_task_horizon_days() -> i64 {
    14
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_upload_bytes: default_max_upload_bytes(),
            allowed_mime_types: default_allowed_mime_types(),
            stage_timeout_seconds: default_stage_timeout(),
            task_horizon_days: default_task_horizon_days(),
        }
    }
}

impl UploadLimits {
    /// Check an upload against type and size limits.
    ///
    /// Type is checked first, so a file that is both oversized and of the
    /// wrong type reports the type problem.
    pub fn validate(&self, upload: &AudioUpload) -> Result<(), ValidationError> {
        let mime = upload.mime_type.trim().to_ascii_lowercase();
        if !self.allowed_mime_types.iter().any(|m| *m == mime) {
            return Err(ValidationError::UnsupportedType {
                mime_type: upload.mime_type.clone(),
            });
        }

        let size = upload.size_bytes();
        if size == 0 {
            return Err(ValidationError::Empty);
        }
        if size > self.max_upload_bytes {
            return Err(ValidationError::TooLarge {
                actual: size,
                limit: self.max_upload_bytes,
            });
        }

        Ok(())
    }
}

/// Guess an audio MIME type from a file extension
pub fn mime_from_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "mp3" => Some("audio/mpeg"),
        "mp4" | "m4a" => Some("audio/mp4"),
        "wav" => Some("audio/wav"),
        "webm" => Some("audio/webm"),
        _ => None,
    }
}

/// Upload rejections. Messages are shown to the operator as-is.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid file type ({mime_type}). Please upload an audio file (MP3, MP4, WAV, or WebM)")]
    UnsupportedType { mime_type: String },

    #[error(
        "File too large ({actual} bytes). Please upload an audio file smaller than {}MB",
        limit / (1024 * 1024)
    )]
    TooLarge { actual: u64, limit: u64 },

    #[error("The audio file is empty")]
    Empty,
}
