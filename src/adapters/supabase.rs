//! Supabase client: storage for audio, PostgREST for tables.
//!
//! Storage: POST {url}/storage/v1/object/{bucket}/{path}
//! Tables:  {url}/rest/v1/{table} with PostgREST filters (`id=eq.{id}`)
//! Auth: `apikey` header plus Bearer token (service key)
//!
//! Requests are independent; there is no cross-request transaction. The
//! default `commit_intake` compensates a failed task insert by deleting the call.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::Deserialize;
use tracing::debug;

use super::{BlobStorage, DataStore};
use crate::config::SupabaseSettings;
use crate::domain::{
    CalendarEvent, CallRecord, CallType, LeadPatch, LeadRef, NewTask, ProspectType,
};

/// Supabase project client
pub struct SupabaseClient {
    base_url: Url,
    key: String,
    bucket: String,
    client: reqwest::Client,
}

/// Row returned by inserts with `return=representation`
#[derive(Debug, Deserialize)]
struct IdRow {
    id: serde_json::Value,
}

/// `calls` row as stored; every column is nullable
#[derive(Debug, Deserialize)]
struct CallRow {
    id: serde_json::Value,
    transcription: Option<String>,
    audio_url: Option<String>,
    call_type: Option<String>,
    operator_name: Option<String>,
    client_name: Option<String>,
    company_name: Option<String>,
    duration: Option<u64>,
    summary: Option<String>,
    key_points: Option<Vec<String>>,
    prospect_type: Option<String>,
    next_action: Option<String>,
}

impl CallRow {
    fn into_record(self) -> CallRecord {
        CallRecord {
            id: Some(id_to_string(&self.id)),
            transcription: self.transcription.unwrap_or_default(),
            audio_url: self.audio_url.unwrap_or_default(),
            call_type: match self.call_type.as_deref() {
                Some("inbound") => Some(CallType::Inbound),
                Some("outbound") => Some(CallType::Outbound),
                _ => None,
            },
            operator_name: self.operator_name,
            client_name: self.client_name,
            company_name: self.company_name,
            duration_seconds: self.duration.unwrap_or(0),
            summary: self.summary.unwrap_or_default(),
            key_points: self.key_points.unwrap_or_default(),
            prospect_type: self
                .prospect_type
                .and_then(|p| p.parse().ok())
                .unwrap_or(ProspectType::Uncertain),
            next_action: self.next_action.unwrap_or_default(),
        }
    }
}

fn id_to_string(id: &serde_json::Value) -> String {
    match id {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

impl SupabaseClient {
    /// Create a client from resolved settings
    pub fn new(settings: &SupabaseSettings, timeout: Duration) -> Result<Self> {
        let url = settings.url.as_deref().context("SUPABASE_URL not set")?;
        let key = settings.key.clone().context("SUPABASE_KEY not set")?;

        let base_url = Url::parse(url)
            .with_context(|| format!("Invalid Supabase URL: {}", url))?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build Supabase HTTP client")?;

        Ok(Self {
            base_url,
            key,
            bucket: settings.audio_bucket.clone(),
            client,
        })
    }

    /// Build a URL from path segments (each segment is percent-encoded)
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("Supabase URL cannot be a base"))?;
            path.pop_if_empty();
            for segment in segments {
                for part in segment.split('/') {
                    path.push(part);
                }
            }
        }
        Ok(url)
    }

    fn table_url(&self, table: &str) -> Result<Url> {
        self.url(&["rest", "v1", table])
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("apikey", &self.key).bearer_auth(&self.key)
    }

    /// Fail on non-2xx with the response body attached
    async fn check(response: Response, action: &str) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("Supabase {} failed: {} - {}", action, status, error_text)
    }
}

#[async_trait]
impl BlobStorage for SupabaseClient {
    async fn upload(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        let url = self.url(&["storage", "v1", "object", self.bucket.as_str(), path])?;

        let response = self
            .authorized(self.client.post(url))
            .header("content-type", content_type)
            .body(bytes)
            .send()
            .await
            .context("Failed to upload audio")?;
        Self::check(response, "upload").await?;

        debug!(path, bucket = %self.bucket, "Audio uploaded");
        Ok(path.to_string())
    }

    fn public_url(&self, path: &str) -> String {
        self.url(&["storage", "v1", "object", "public", self.bucket.as_str(), path])
            .map(|u| u.to_string())
            .unwrap_or_default()
    }
}

#[async_trait]
impl DataStore for SupabaseClient {
    async fn insert_call(&self, record: &CallRecord) -> Result<String> {
        let response = self
            .authorized(self.client.post(self.table_url("calls")?))
            .header("Prefer", "return=representation")
            .json(record)
            .send()
            .await
            .context("Failed to insert call")?;

        let rows: Vec<IdRow> = Self::check(response, "call insert")
            .await?
            .json()
            .await
            .context("Failed to parse call insert response")?;

        rows.first()
            .map(|r| id_to_string(&r.id))
            .context("Call insert returned no rows")
    }

    async fn insert_tasks(&self, tasks: &[NewTask]) -> Result<()> {
        let response = self
            .authorized(self.client.post(self.table_url("tasks")?))
            .header("Prefer", "return=minimal")
            .json(tasks)
            .send()
            .await
            .context("Failed to insert tasks")?;
        Self::check(response, "task insert").await?;
        Ok(())
    }

    async fn delete_call(&self, call_id: &str) -> Result<()> {
        let response = self
            .authorized(self.client.delete(self.table_url("calls")?))
            .query(&[("id", format!("eq.{}", call_id))])
            .send()
            .await
            .context("Failed to delete call")?;
        Self::check(response, "call delete").await?;
        Ok(())
    }

    async fn get_call(&self, call_id: &str) -> Result<Option<CallRecord>> {
        let response = self
            .authorized(self.client.get(self.table_url("calls")?))
            .query(&[("id", format!("eq.{}", call_id)), ("select", "*".to_string())])
            .send()
            .await
            .context("Failed to fetch call")?;

        let rows: Vec<CallRow> = Self::check(response, "call select")
            .await?
            .json()
            .await
            .context("Failed to parse call row")?;

        Ok(rows.into_iter().next().map(CallRow::into_record))
    }

    async fn update_lead(&self, lead_id: &str, patch: &LeadPatch) -> Result<()> {
        let response = self
            .authorized(self.client.patch(self.table_url("leads")?))
            .query(&[("id", format!("eq.{}", lead_id))])
            .json(patch)
            .send()
            .await
            .context("Failed to update lead")?;
        Self::check(response, "lead update").await?;
        Ok(())
    }

    async fn find_lead(&self, name: &str, company: &str) -> Result<Option<LeadRef>> {
        let response = self
            .authorized(self.client.get(self.table_url("leads")?))
            .query(&[
                ("select", "id,campaign_id".to_string()),
                ("name", format!("eq.{}", name)),
                ("company", format!("eq.{}", company)),
            ])
            .send()
            .await
            .context("Failed to look up lead")?;

        let rows: Vec<serde_json::Value> = Self::check(response, "lead select")
            .await?
            .json()
            .await
            .context("Failed to parse lead rows")?;

        Ok(rows.into_iter().next().and_then(|row| {
            let id = row.get("id").map(id_to_string)?;
            let campaign_id = row
                .get("campaign_id")
                .filter(|v| !v.is_null())
                .map(id_to_string);
            Some(LeadRef { id, campaign_id })
        }))
    }

    async fn insert_calendar_event(&self, event: &CalendarEvent) -> Result<()> {
        let response = self
            .authorized(self.client.post(self.table_url("calendar_events")?))
            .header("Prefer", "return=minimal")
            .json(event)
            .send()
            .await
            .context("Failed to insert calendar event")?;
        Self::check(response, "calendar event insert").await?;
        Ok(())
    }
}
