//! Language-model stages of the intake workflow.
//!
//! Each stage sends one instruction plus the call text to the chat-completion
//! collaborator and parses the JSON reply into a typed value:
//! - `extract_metadata`: operator, client, company and call direction
//! - `format_transcript`: speaker-labeled segments
//! - `analyze_call`: advisory classification, summary, key points, next action
//! - `debrief`: what went wrong on a bad-prospect call
//! - `analyze_proposal`: proposal details when a proposal is the next step
//! - `extract_tasks`: proposed follow-up tasks
//!
//! Replies are parsed leniently: missing fields fall back to empty values,
//! unknown labels fall back to the neutral variant. A reply that is not a
//! JSON object of roughly the right shape is an error.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::adapters::{ChatCompletion, CompletionRequest};
use crate::domain::task::{clamp_due_date, parse_due_date};
use crate::domain::{
    CallAnalysis, CallMetadata, CallType, FormattedTranscript, ProposalAnalysis, ProposedTask,
    ProspectDebrief, ProspectType, TaskPriority,
};

/// Sampling temperature for deterministic extraction stages
pub const EXTRACTION_TEMPERATURE: f32 = 0.1;

/// Sampling temperature for task suggestions
pub const TASK_TEMPERATURE: f32 = 0.7;

const METADATA_INSTRUCTION: &str = "You extract participant details from sales call transcripts. \
Identify the operator's name, the client's name, the client's company, and whether the call was \
inbound or outbound. Reply with a JSON object using exactly these keys: operator_name, \
client_name, company_name, call_type (either \"inbound\" or \"outbound\"). Use null for anything \
the transcript does not mention.";

const FORMAT_INSTRUCTION: &str = "You format raw call transcripts. Split the text into speaker \
turns and label each turn with its speaker. Reply with a JSON object using exactly these keys: \
formatted_transcript (array of objects with \"speaker\" and \"text\"), speakers (array of the \
distinct speaker names).";

const ANALYSIS_INSTRUCTION: &str = "You analyze sales call transcripts. Reply with a JSON object \
using these keys: prospectType (one of \"Good Prospect\", \"Uncertain Prospect\", \
\"Bad Prospect\"), summary (a short summary of the call), keyPoints (array of the main \
discussion points), nextAction (the recommended next step given the prospect type).";

const DEBRIEF_INSTRUCTION: &str = "You review sales calls that did not convert. Reply with a JSON \
object using these keys: reasons (array of what went wrong), improvements (array of concrete \
tips for future calls), suggestedFollowUp (object with shouldFollowUp boolean, timeframe \
string, reason string).";

const PROPOSAL_INSTRUCTION: &str = "You extract proposal details from sales call transcripts. \
Reply with a JSON object using these keys: proposalType (string), estimatedValue (number), \
proposalDate (ISO 8601 date), keyPoints (array of strings), nextSteps (array of strings).";

const TASK_INSTRUCTION: &str = "You extract follow-up work from sales call transcripts. List the \
actionable tasks the operator should do next. Each task has a title, a description, a priority \
(high, medium or low) and a due_date (YYYY-MM-DD) no more than two weeks from today. Reply with \
a JSON object: {\"tasks\": [{\"title\", \"description\", \"priority\", \"due_date\"}]}.";

/// Analyzer reply as emitted; the label is parsed leniently
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    #[serde(default)]
    prospect_type: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default)]
    next_action: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawMetadata {
    #[serde(default)]
    operator_name: Option<String>,
    #[serde(default)]
    client_name: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    call_type: Option<String>,
}

/// Proposal reply; the value and date arrive in whatever form the model picks
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawProposal {
    #[serde(default)]
    proposal_type: Option<String>,
    #[serde(default)]
    estimated_value: Option<serde_json::Value>,
    #[serde(default)]
    proposal_date: Option<String>,
    #[serde(default)]
    key_points: Vec<String>,
    #[serde(default)]
    next_steps: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawTaskList {
    #[serde(default)]
    tasks: Vec<RawTask>,
}

#[derive(Debug, Deserialize)]
struct RawTask {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    priority: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
}

async fn complete(
    chat: &dyn ChatCompletion,
    instruction: &str,
    input: &str,
    temperature: f32,
) -> Result<serde_json::Value> {
    let request = CompletionRequest {
        instruction: instruction.to_string(),
        input: input.to_string(),
        temperature,
    };
    chat.complete_json(&request).await
}

/// Drop blank strings, trim the rest
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty() && !v.eq_ignore_ascii_case("null"))
}

/// Extract participant names and call direction from the raw transcript
pub async fn extract_metadata(chat: &dyn ChatCompletion, raw_text: &str) -> Result<CallMetadata> {
    let value = complete(chat, METADATA_INSTRUCTION, raw_text, EXTRACTION_TEMPERATURE).await?;
    parse_metadata(value)
}

fn parse_metadata(value: serde_json::Value) -> Result<CallMetadata> {
    let raw: RawMetadata =
        serde_json::from_value(value).context("Metadata reply has an unexpected shape")?;

    let call_type = match non_blank(raw.call_type).map(|t| t.to_ascii_lowercase()).as_deref() {
        Some("inbound") => Some(CallType::Inbound),
        Some("outbound") => Some(CallType::Outbound),
        _ => None,
    };

    Ok(CallMetadata {
        operator_name: non_blank(raw.operator_name),
        client_name: non_blank(raw.client_name),
        company_name: non_blank(raw.company_name),
        call_type,
    })
}

/// Split the raw transcript into speaker-labeled segments
pub async fn format_transcript(
    chat: &dyn ChatCompletion,
    raw_text: &str,
) -> Result<FormattedTranscript> {
    let value = complete(chat, FORMAT_INSTRUCTION, raw_text, EXTRACTION_TEMPERATURE).await?;
    let transcript: FormattedTranscript =
        serde_json::from_value(value).context("Formatter reply has an unexpected shape")?;

    debug!(
        segments = transcript.segments.len(),
        speakers = transcript.speakers.len(),
        "Transcript formatted"
    );
    Ok(transcript)
}

/// Advisory analysis of the formatted transcript
pub async fn analyze_call(
    chat: &dyn ChatCompletion,
    transcript: &FormattedTranscript,
) -> Result<CallAnalysis> {
    let value = complete(
        chat,
        ANALYSIS_INSTRUCTION,
        &transcript.render(),
        EXTRACTION_TEMPERATURE,
    )
    .await?;
    parse_analysis(value)
}

fn parse_analysis(value: serde_json::Value) -> Result<CallAnalysis> {
    let raw: RawAnalysis =
        serde_json::from_value(value).context("Analysis reply has an unexpected shape")?;

    let prospect_type = match raw.prospect_type.as_deref() {
        Some(label) => label.parse().unwrap_or_else(|_| {
            warn!(label, "Unrecognized prospect label, treating as uncertain");
            ProspectType::Uncertain
        }),
        None => ProspectType::Uncertain,
    };

    Ok(CallAnalysis {
        prospect_type,
        summary: raw.summary.unwrap_or_default(),
        key_points: raw.key_points,
        next_action: raw.next_action.unwrap_or_default(),
    })
}

/// Explain a bad-prospect call
pub async fn debrief(chat: &dyn ChatCompletion, transcript_text: &str) -> Result<ProspectDebrief> {
    let value = complete(chat, DEBRIEF_INSTRUCTION, transcript_text, EXTRACTION_TEMPERATURE).await?;
    serde_json::from_value(value).context("Debrief reply has an unexpected shape")
}

/// Draw proposal details from a stored call's transcript
pub async fn analyze_proposal(
    chat: &dyn ChatCompletion,
    transcript_text: &str,
) -> Result<ProposalAnalysis> {
    let value = complete(chat, PROPOSAL_INSTRUCTION, transcript_text, EXTRACTION_TEMPERATURE).await?;
    parse_proposal(value)
}

fn parse_proposal(value: serde_json::Value) -> Result<ProposalAnalysis> {
    let raw: RawProposal =
        serde_json::from_value(value).context("Proposal reply has an unexpected shape")?;

    // "$12,500" and 12500 both count
    let estimated_value = match raw.estimated_value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .trim_start_matches('$')
            .replace(',', "")
            .parse()
            .ok(),
        _ => None,
    };

    Ok(ProposalAnalysis {
        proposal_type: non_blank(raw.proposal_type).unwrap_or_default(),
        estimated_value,
        proposal_date: raw.proposal_date.as_deref().and_then(parse_due_date),
        key_points: raw.key_points,
        next_steps: raw.next_steps,
    })
}

/// Propose follow-up tasks for the call.
///
/// Order is preserved. Priorities are normalized, due dates are clamped to
/// the window from today to `horizon_days` after `now`, and tasks without a
/// title are dropped.
pub async fn extract_tasks(
    chat: &dyn ChatCompletion,
    transcript_text: &str,
    now: DateTime<Utc>,
    horizon_days: i64,
) -> Result<Vec<ProposedTask>> {
    let input = format!("Today is {}.\n\n{}", now.format("%Y-%m-%d"), transcript_text);
    let value = complete(chat, TASK_INSTRUCTION, &input, TASK_TEMPERATURE).await?;
    parse_tasks(value, now, horizon_days)
}

fn parse_tasks(
    value: serde_json::Value,
    now: DateTime<Utc>,
    horizon_days: i64,
) -> Result<Vec<ProposedTask>> {
    let raw: RawTaskList =
        serde_json::from_value(value).context("Task reply has an unexpected shape")?;

    let tasks: Vec<ProposedTask> = raw
        .tasks
        .into_iter()
        .filter_map(|t| {
            let title = non_blank(t.title)?;
            let mut task = ProposedTask::new(title);
            task.description = non_blank(t.description).unwrap_or_default();
            task.priority = t
                .priority
                .as_deref()
                .map(TaskPriority::parse_lenient)
                .unwrap_or_default();
            task.due_date = t
                .due_date
                .as_deref()
                .and_then(parse_due_date)
                .map(|due| clamp_due_date(due, now, horizon_days));
            Some(task)
        })
        .collect();

    debug!(count = tasks.len(), "Tasks proposed");
    Ok(tasks)
}
