//! Local SQLite data store.
//!
//! Mirrors the hosted tables (`calls`, `tasks`, `leads`, `calendar_events`)
//! in a single database file. Unlike the hosted store, a finished intake is
//! committed in one transaction: the call and its tasks land together or
//! not at all.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{CommitError, CommitReceipt, DataStore};
use crate::domain::{
    CalendarEvent, CallRecord, CallType, LeadPatch, LeadRef, NewTask, ProposedTask,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS calls (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    transcription TEXT,
    audio_url TEXT,
    call_type TEXT,
    operator_name TEXT,
    client_name TEXT,
    company_name TEXT,
    duration INTEGER,
    summary TEXT,
    key_points TEXT,
    prospect_type TEXT,
    next_action TEXT
);
CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    call_id TEXT REFERENCES calls(id) ON DELETE CASCADE,
    title TEXT NOT NULL,
    description TEXT,
    priority TEXT,
    due_date TEXT,
    assignee TEXT,
    status TEXT,
    active_status TEXT NOT NULL DEFAULT 'active'
);
CREATE TABLE IF NOT EXISTS leads (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    company TEXT,
    campaign_id TEXT,
    status TEXT NOT NULL DEFAULT 'not_contacted',
    last_contacted TEXT
);
CREATE TABLE IF NOT EXISTS calendar_events (
    id TEXT PRIMARY KEY,
    title TEXT NOT NULL,
    description TEXT,
    start_time TEXT NOT NULL,
    end_time TEXT NOT NULL,
    call_id TEXT REFERENCES calls(id)
);
";

/// SQLite-backed data store
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

/// A stored task row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRow {
    pub id: String,
    pub call_id: Option<String>,
    pub title: String,
    pub priority: Option<String>,
    pub status: Option<String>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        Self::init(conn)
    }

    /// In-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        conn.execute_batch(SCHEMA)
            .context("Failed to create schema")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| anyhow::anyhow!("Database connection lock poisoned"))?;
            f(&mut *guard)
        })
        .await
        .context("Database task panicked")?
    }

    /// Add a lead (leads are managed outside the intake workflow)
    pub async fn add_lead(
        &self,
        name: &str,
        company: &str,
        campaign_id: Option<&str>,
    ) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let (name, company) = (name.to_string(), company.to_string());
        let campaign_id = campaign_id.map(str::to_string);
        let lead_id = id.clone();

        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO leads (id, name, company, campaign_id) VALUES (?1, ?2, ?3, ?4)",
                params![lead_id, name, company, campaign_id],
            )
            .context("Failed to insert lead")?;
            Ok(())
        })
        .await?;

        Ok(id)
    }

    /// Current status of a lead
    pub async fn lead_status(&self, lead_id: &str) -> Result<Option<String>> {
        let lead_id = lead_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT status FROM leads WHERE id = ?1",
                params![lead_id],
                |row| row.get(0),
            )
            .optional()
            .context("Failed to read lead")
        })
        .await
    }

    /// Last-contacted timestamp of a lead
    pub async fn lead_last_contacted(&self, lead_id: &str) -> Result<Option<DateTime<Utc>>> {
        let lead_id = lead_id.to_string();
        self.with_conn(move |conn| {
            let value: Option<Option<String>> = conn
                .query_row(
                    "SELECT last_contacted FROM leads WHERE id = ?1",
                    params![lead_id],
                    |row| row.get(0),
                )
                .optional()?;
            Ok(parse_timestamp(value.flatten()))
        })
        .await
    }

    /// Tasks stored for a call, in insertion order
    pub async fn tasks_for_call(&self, call_id: &str) -> Result<Vec<TaskRow>> {
        let call_id = call_id.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, call_id, title, priority, status FROM tasks
                 WHERE call_id = ?1 ORDER BY rowid",
            )?;
            let rows = stmt
                .query_map(params![call_id], |row| {
                    Ok(TaskRow {
                        id: row.get(0)?,
                        call_id: row.get(1)?,
                        title: row.get(2)?,
                        priority: row.get(3)?,
                        status: row.get(4)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()
                .context("Failed to read tasks")?;
            Ok(rows)
        })
        .await
    }

    /// Number of stored calls
    pub async fn call_count(&self) -> Result<usize> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM calls", [], |row| row.get(0))?;
            Ok(usize::try_from(count)?)
        })
        .await
    }

    /// Number of calendar events referencing a call
    pub async fn calendar_event_count(&self, call_id: &str) -> Result<usize> {
        let call_id = call_id.to_string();
        self.with_conn(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM calendar_events WHERE call_id = ?1",
                params![call_id],
                |row| row.get(0),
            )?;
            Ok(usize::try_from(count)?)
        })
        .await
    }
}

fn insert_call_row(conn: &Connection, record: &CallRecord) -> Result<String> {
    let id = Uuid::new_v4().to_string();
    let key_points = serde_json::to_string(&record.key_points)?;

    conn.execute(
        "INSERT INTO calls (id, created_at, transcription, audio_url, call_type, operator_name,
            client_name, company_name, duration, summary, key_points, prospect_type, next_action)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            id,
            Utc::now().to_rfc3339(),
            record.transcription,
            record.audio_url,
            record.call_type.map(|t| t.as_str()),
            record.operator_name,
            record.client_name,
            record.company_name,
            i64::try_from(record.duration_seconds).unwrap_or(i64::MAX),
            record.summary,
            key_points,
            record.prospect_type.label(),
            record.next_action,
        ],
    )
    .context("Failed to insert call")?;

    Ok(id)
}

fn insert_task_rows(conn: &Connection, tasks: &[NewTask]) -> Result<()> {
    let mut stmt = conn.prepare(
        "INSERT INTO tasks (id, created_at, call_id, title, description, priority, due_date,
            status, active_status)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    )?;
    let now = Utc::now().to_rfc3339();

    for task in tasks {
        stmt.execute(params![
            Uuid::new_v4().to_string(),
            now,
            task.call_id,
            task.title,
            task.description,
            task.priority.as_str(),
            task.due_date.map(|d| d.to_rfc3339()),
            task.status,
            task.active_status,
        ])
        .with_context(|| format!("Failed to insert task '{}'", task.title))?;
    }

    Ok(())
}

fn parse_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(&v).ok())
        .map(|d| d.with_timezone(&Utc))
}

#[async_trait]
impl DataStore for SqliteStore {
    async fn insert_call(&self, record: &CallRecord) -> Result<String> {
        let record = record.clone();
        self.with_conn(move |conn| insert_call_row(conn, &record)).await
    }

    async fn insert_tasks(&self, tasks: &[NewTask]) -> Result<()> {
        let tasks = tasks.to_vec();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            insert_task_rows(&tx, &tasks)?;
            tx.commit().context("Failed to commit tasks")
        })
        .await
    }

    async fn delete_call(&self, call_id: &str) -> Result<()> {
        let call_id = call_id.to_string();
        self.with_conn(move |conn| {
            conn.execute("DELETE FROM calls WHERE id = ?1", params![call_id])
                .context("Failed to delete call")?;
            Ok(())
        })
        .await
    }

    async fn get_call(&self, call_id: &str) -> Result<Option<CallRecord>> {
        let call_id = call_id.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, transcription, audio_url, call_type, operator_name, client_name,
                    company_name, duration, summary, key_points, prospect_type, next_action
                 FROM calls WHERE id = ?1",
                params![call_id],
                |row| {
                    let call_type: Option<String> = row.get(3)?;
                    let key_points: Option<String> = row.get(9)?;
                    let prospect_type: Option<String> = row.get(10)?;
                    let duration: Option<i64> = row.get(7)?;
                    Ok(CallRecord {
                        id: Some(row.get(0)?),
                        transcription: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                        audio_url: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                        call_type: match call_type.as_deref() {
                            Some("inbound") => Some(CallType::Inbound),
                            Some("outbound") => Some(CallType::Outbound),
                            _ => None,
                        },
                        operator_name: row.get(4)?,
                        client_name: row.get(5)?,
                        company_name: row.get(6)?,
                        duration_seconds: u64::try_from(duration.unwrap_or(0)).unwrap_or(0),
                        summary: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
                        key_points: key_points
                            .and_then(|k| serde_json::from_str(&k).ok())
                            .unwrap_or_default(),
                        prospect_type: prospect_type
                            .and_then(|p| p.parse().ok())
                            .unwrap_or(crate::domain::ProspectType::Uncertain),
                        next_action: row.get::<_, Option<String>>(11)?.unwrap_or_default(),
                    })
                },
            )
            .optional()
            .context("Failed to read call")
        })
        .await
    }

    async fn update_lead(&self, lead_id: &str, patch: &LeadPatch) -> Result<()> {
        let lead_id = lead_id.to_string();
        let patch = patch.clone();
        self.with_conn(move |conn| {
            let updated = conn
                .execute(
                    "UPDATE leads SET status = ?1, last_contacted = ?2 WHERE id = ?3",
                    params![
                        patch.status.as_str(),
                        patch.last_contacted.to_rfc3339(),
                        lead_id
                    ],
                )
                .context("Failed to update lead")?;
            if updated == 0 {
                anyhow::bail!("Lead {} not found", lead_id);
            }
            Ok(())
        })
        .await
    }

    async fn find_lead(&self, name: &str, company: &str) -> Result<Option<LeadRef>> {
        let (name, company) = (name.to_string(), company.to_string());
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT id, campaign_id FROM leads WHERE name = ?1 AND company = ?2",
                params![name, company],
                |row| {
                    Ok(LeadRef {
                        id: row.get(0)?,
                        campaign_id: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("Failed to look up lead")
        })
        .await
    }

    async fn insert_calendar_event(&self, event: &CalendarEvent) -> Result<()> {
        let event = event.clone();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO calendar_events (id, title, description, start_time, end_time, call_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    Uuid::new_v4().to_string(),
                    event.title,
                    event.description,
                    event.start_time.to_rfc3339(),
                    event.end_time.to_rfc3339(),
                    event.call_id,
                ],
            )
            .context("Failed to insert calendar event")?;
            Ok(())
        })
        .await
    }

    /// One transaction for the call and its tasks.
    ///
    /// Not bounded by `step_timeout`: the blocking transaction cannot be
    /// cancelled once started.
    async fn commit_intake(
        &self,
        record: &CallRecord,
        approved: Vec<ProposedTask>,
        _step_timeout: Duration,
    ) -> Result<CommitReceipt, CommitError> {
        let record = record.clone();
        let result = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                let call_id = insert_call_row(&tx, &record)?;
                let tasks: Vec<NewTask> = approved
                    .into_iter()
                    .map(|t| t.into_new_task(&call_id))
                    .collect();
                insert_task_rows(&tx, &tasks)?;
                tx.commit().context("Failed to commit intake")?;
                Ok(CommitReceipt {
                    call_id,
                    tasks_stored: tasks.len(),
                })
            })
            .await;

        result.map_err(|e| CommitError::CallInsert {
            message: format!("{:#}", e),
        })
    }
}
