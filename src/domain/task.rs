//! Proposed follow-up tasks and their persisted form.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Task priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    High,
    Medium,
    Low,
}

impl TaskPriority {
    /// Case-insensitive parse; anything unrecognized is medium
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Medium
    }
}

/// A follow-up task suggested by the extractor, pending operator review.
///
/// `id` is a client-side identity for the review list only. It never reaches
/// the data store: see [`ProposedTask::into_new_task`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedTask {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
}

impl ProposedTask {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: String::new(),
            priority: TaskPriority::default(),
            due_date: None,
        }
    }

    /// Strip the transient id and attach the stored call
    pub fn into_new_task(self, call_id: &str) -> NewTask {
        NewTask {
            title: self.title,
            description: if self.description.is_empty() {
                None
            } else {
                Some(self.description)
            },
            priority: self.priority,
            due_date: self.due_date,
            call_id: call_id.to_string(),
            status: "pending".to_string(),
            active_status: "active".to_string(),
        }
    }
}

/// Insert shape for the `tasks` table. Identity is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub call_id: String,
    pub status: String,
    pub active_status: String,
}

/// Operator decision on a proposed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskDecision {
    Approved,
    Denied,
}

/// Parse a model-emitted due date (RFC 3339 or plain `YYYY-MM-DD`)
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// Clamp a due date into the window from the start of `now`'s day to
/// `horizon_days` after `now`
pub fn clamp_due_date(
    due: DateTime<Utc>,
    now: DateTime<Utc>,
    horizon_days: i64,
) -> DateTime<Utc> {
    let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    let horizon = now + Duration::days(horizon_days);
    due.max(today).min(horizon)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_priority_parse() {
        assert_eq!(TaskPriority::parse_lenient("HIGH"), TaskPriority::High);
        assert_eq!(TaskPriority::parse_lenient("low"), TaskPriority::Low);
        assert_eq!(TaskPriority::parse_lenient("urgent"), TaskPriority::Medium);
    }

    #[test]
    fn test_new_task_has_no_client_id() {
        let mut task = ProposedTask::new("Follow up");
        task.description = "Call Dana on Monday".to_string();

        let new_task = task.into_new_task("call-1");
        let value = serde_json::to_value(&new_task).unwrap();

        assert!(value.get("id").is_none());
        assert_eq!(value["call_id"], "call-1");
        assert_eq!(value["status"], "pending");
        assert_eq!(value["active_status"], "active");
        assert_eq!(value["priority"], "medium");
    }

    #[test]
    fn test_parse_due_date_formats() {
        assert!(parse_due_date("2026-10-21T09:00:00Z").is_some());
        assert!(parse_due_date("2026-10-21").is_some());
        assert!(parse_due_date("next tuesday").is_none());
        assert!(parse_due_date("").is_none());
    }

    #[test]
    fn test_clamp_due_date() {
        let now = Utc::now();
        let far = now + Duration::days(60);
        let near = now + Duration::days(3);

        assert_eq!(clamp_due_date(far, now, 14), now + Duration::days(14));
        assert_eq!(clamp_due_date(near, now, 14), near);
    }

    #[test]
    fn test_clamp_past_due_date_to_today() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 9, 30, 0).unwrap();
        let today = Utc.with_ymd_and_hms(2026, 10, 19, 0, 0, 0).unwrap();

        let stale = parse_due_date("2020-01-01").unwrap();
        assert_eq!(clamp_due_date(stale, now, 14), today);

        let yesterday = now - Duration::days(1);
        assert_eq!(clamp_due_date(yesterday, now, 14), today);

        // Due today (date only) stays as given
        assert_eq!(clamp_due_date(today, now, 14), today);
    }
}
