//! Configuration for callintake.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (CALLINTAKE_HOME, GROQ_API_KEY, GROQ_BASE_URL,
//!    SUPABASE_URL, SUPABASE_KEY, CALLINTAKE_STORE)
//! 2. Config file (.callintake/config.yaml)
//! 3. Defaults (~/.callintake, Groq endpoints, local SQLite store)
//!
//! Config file discovery:
//! - Searches current directory and parents for .callintake/config.yaml
//! - Relative paths in the config file resolve against the .callintake/ directory

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::validator::UploadLimits;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_TRANSCRIPTION_MODEL: &str = "whisper-large-v3-turbo";
pub const DEFAULT_COMPLETION_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_AUDIO_BUCKET: &str = "audio";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub home: Option<String>,
    #[serde(default)]
    pub groq: Option<GroqConfig>,
    #[serde(default)]
    pub supabase: Option<SupabaseConfig>,
    #[serde(default)]
    pub store: Option<StoreConfig>,
    #[serde(default)]
    pub limits: Option<UploadLimits>,
    #[serde(default)]
    pub workflow: Option<WorkflowConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GroqConfig {
    pub base_url: Option<String>,
    pub transcription_model: Option<String>,
    pub completion_model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SupabaseConfig {
    pub url: Option<String>,
    pub audio_bucket: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StoreConfig {
    pub backend: Option<StoreBackend>,
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkflowConfig {
    #[serde(default)]
    pub auto_accept_classification: bool,
}

/// Where calls, tasks and leads are stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Hosted Supabase project (storage + PostgREST)
    Supabase,
    /// Local SQLite database
    Sqlite,
}

impl std::str::FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supabase" => Ok(Self::Supabase),
            "sqlite" => Ok(Self::Sqlite),
            other => anyhow::bail!("Unknown store backend: {}", other),
        }
    }
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to callintake home (run journals, local store)
    pub home: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
    pub groq: GroqSettings,
    pub supabase: SupabaseSettings,
    pub store: StoreSettings,
    pub limits: UploadLimits,
    pub auto_accept_classification: bool,
}

#[derive(Debug, Clone)]
pub struct GroqSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    pub transcription_model: String,
    pub completion_model: String,
}

#[derive(Debug, Clone)]
pub struct SupabaseSettings {
    pub url: Option<String>,
    pub key: Option<String>,
    pub audio_bucket: String,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub backend: StoreBackend,
    pub sqlite_path: PathBuf,
}

impl ResolvedConfig {
    /// Directory holding one journal directory per run
    pub fn runs_dir(&self) -> PathBuf {
        self.home.join("runs")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".callintake").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config directory
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Merge a parsed config file (if any) with environment lookups and defaults
fn resolve<F>(
    config_file: Option<(PathBuf, ConfigFile)>,
    default_home: PathBuf,
    env: F,
) -> Result<ResolvedConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let (config_path, file) = match config_file {
        Some((path, file)) => (Some(path), file),
        None => (None, ConfigFile::default()),
    };
    let config_dir = config_path
        .as_deref()
        .and_then(Path::parent)
        .unwrap_or(Path::new("."));

    let home = if let Some(env_home) = env("CALLINTAKE_HOME") {
        PathBuf::from(env_home)
    } else if let Some(ref home_path) = file.home {
        resolve_path(config_dir, home_path)
    } else {
        default_home
    };

    let groq_file = file.groq.unwrap_or_default();
    let groq = GroqSettings {
        base_url: env("GROQ_BASE_URL")
            .or(groq_file.base_url)
            .unwrap_or_else(|| DEFAULT_GROQ_BASE_URL.to_string()),
        api_key: env("GROQ_API_KEY"),
        transcription_model: groq_file
            .transcription_model
            .unwrap_or_else(|| DEFAULT_TRANSCRIPTION_MODEL.to_string()),
        completion_model: groq_file
            .completion_model
            .unwrap_or_else(|| DEFAULT_COMPLETION_MODEL.to_string()),
    };

    let supabase_file = file.supabase.unwrap_or_default();
    let supabase = SupabaseSettings {
        url: env("SUPABASE_URL").or(supabase_file.url),
        key: env("SUPABASE_KEY"),
        audio_bucket: supabase_file
            .audio_bucket
            .unwrap_or_else(|| DEFAULT_AUDIO_BUCKET.to_string()),
    };

    let store_file = file.store.unwrap_or_default();
    let backend = match env("CALLINTAKE_STORE") {
        Some(value) => value.parse()?,
        None => store_file.backend.unwrap_or(StoreBackend::Sqlite),
    };
    let sqlite_path = store_file
        .sqlite_path
        .map(|p| resolve_path(config_dir, &p))
        .unwrap_or_else(|| home.join("callintake.db"));

    Ok(ResolvedConfig {
        home,
        config_file: config_path,
        groq,
        supabase,
        store: StoreSettings {
            backend,
            sqlite_path,
        },
        limits: file.limits.unwrap_or_default(),
        auto_accept_classification: file
            .workflow
            .map(|w| w.auto_accept_classification)
            .unwrap_or(false),
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".callintake");

    let config_file = match find_config_file() {
        Some(path) => {
            let file = load_config_file(&path)?;
            Some((path, file))
        }
        None => None,
    };

    resolve(config_file, default_home, |key| std::env::var(key).ok())
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
