//! Leads and calendar events touched as side effects of a call.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::call::ProspectType;

/// Lead pipeline status values written by the intake workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    Interested,
    NotInterested,
    FollowUp,
    Meeting,
    Closed,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Interested => "interested",
            Self::NotInterested => "not_interested",
            Self::FollowUp => "follow_up",
            Self::Meeting => "meeting",
            Self::Closed => "closed",
        }
    }
}

impl From<ProspectType> for LeadStatus {
    fn from(prospect: ProspectType) -> Self {
        match prospect {
            ProspectType::Good => Self::Interested,
            ProspectType::Bad => Self::NotInterested,
            ProspectType::Uncertain => Self::FollowUp,
        }
    }
}

/// Partial update applied to a lead row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadPatch {
    pub status: LeadStatus,
    pub last_contacted: DateTime<Utc>,
}

impl LeadPatch {
    pub fn new(status: LeadStatus) -> Self {
        Self {
            status,
            last_contacted: Utc::now(),
        }
    }
}

/// Minimal lead reference returned by lookups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadRef {
    pub id: String,
    #[serde(default)]
    pub campaign_id: Option<String>,
}

/// A scheduled follow-up meeting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub title: String,
    pub description: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub call_id: String,
}

impl CalendarEvent {
    /// One-hour follow-up meeting with the call's client
    pub fn follow_up(call_id: &str, client: &str, company: &str, start: DateTime<Utc>) -> Self {
        Self {
            title: format!("Meeting with {}", client),
            description: format!("Follow-up meeting with {} from {}", client, company),
            start_time: start,
            end_time: start + Duration::hours(1),
            call_id: call_id.to_string(),
        }
    }
}
