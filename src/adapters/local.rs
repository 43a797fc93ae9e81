//! Local-directory blob storage, paired with the SQLite store.
//!
//! Objects are written under `{root}/{path}`; public URLs are `file://` URLs.

use std::path::{Component, Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Url;
use tokio::fs;
use tracing::debug;

use super::BlobStorage;

/// Blob storage backed by a local directory
pub struct LocalBlobStorage {
    root: PathBuf,
}

impl LocalBlobStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve an object path, refusing anything that escapes the root
    fn object_path(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if path.is_empty() || escapes {
            anyhow::bail!("Invalid object path: {}", path);
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStorage for LocalBlobStorage {
    async fn upload(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String> {
        let target = self.object_path(path)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        fs::write(&target, bytes)
            .await
            .with_context(|| format!("Failed to write audio: {}", target.display()))?;

        debug!(path = %target.display(), "Audio stored locally");
        Ok(path.to_string())
    }

    fn public_url(&self, path: &str) -> String {
        let target = self.root.join(path);
        let absolute = if target.is_absolute() {
            target
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(&target))
                .unwrap_or(target)
        };
        Url::from_file_path(&absolute)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| absolute.display().to_string())
    }
}
