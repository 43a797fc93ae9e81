//! Next actions on a stored call: schedule a meeting, draft a proposal, or
//! mark the deal closed.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tracing::info;

use crate::adapters::{ChatCompletion, DataStore};
use crate::domain::{CalendarEvent, LeadPatch, LeadStatus, ProposalAnalysis};

use super::analysis;

/// Default meeting time when only a date is given (10:00 UTC)
pub fn default_meeting_start(date: NaiveDate) -> DateTime<Utc> {
    let ten = NaiveTime::from_hms_opt(10, 0, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(ten).and_utc()
}

/// Parse a meeting start: RFC 3339, or `YYYY-MM-DD` at the default time
pub fn parse_meeting_start(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("Invalid meeting date: {} (expected YYYY-MM-DD or RFC 3339)", raw))?;
    Ok(default_meeting_start(date))
}

/// Schedule a one-hour follow-up meeting with the call's client.
///
/// The lead is found by the call's client and company names; the lead moves
/// to `meeting` once the calendar event is stored.
pub async fn schedule_meeting(
    store: &dyn DataStore,
    call_id: &str,
    start: DateTime<Utc>,
) -> Result<CalendarEvent> {
    let call = store
        .get_call(call_id)
        .await?
        .with_context(|| format!("Call not found: {}", call_id))?;

    let client = call
        .client_name
        .as_deref()
        .with_context(|| format!("Call {} has no client name", call_id))?;
    let company = call
        .company_name
        .as_deref()
        .with_context(|| format!("Call {} has no company name", call_id))?;

    let lead = store
        .find_lead(client, company)
        .await?
        .with_context(|| format!("No lead found for {} at {}", client, company))?;

    let event = CalendarEvent::follow_up(call_id, client, company, start);
    store
        .insert_calendar_event(&event)
        .await
        .context("Failed to create calendar event")?;

    store
        .update_lead(&lead.id, &LeadPatch::new(LeadStatus::Meeting))
        .await
        .context("Failed to update lead status")?;

    info!(call_id, lead_id = %lead.id, start = %start, "Meeting scheduled");
    Ok(event)
}

/// Draw proposal details from a stored call's transcript
pub async fn draft_proposal(
    chat: &dyn ChatCompletion,
    store: &dyn DataStore,
    call_id: &str,
) -> Result<ProposalAnalysis> {
    let call = store
        .get_call(call_id)
        .await?
        .with_context(|| format!("Call not found: {}", call_id))?;

    let proposal = analysis::analyze_proposal(chat, &call.transcription)
        .await
        .context("Proposal analysis failed")?;

    info!(call_id, proposal_type = %proposal.proposal_type, "Proposal drafted");
    Ok(proposal)
}

/// Mark a lead's deal as closed
pub async fn close_deal(store: &dyn DataStore, lead_id: &str) -> Result<()> {
    store
        .update_lead(lead_id, &LeadPatch::new(LeadStatus::Closed))
        .await
        .with_context(|| format!("Failed to close lead {}", lead_id))?;

    info!(lead_id, "Deal closed");
    Ok(())
}
