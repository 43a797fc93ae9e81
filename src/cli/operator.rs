//! Terminal operator: classification and task review on stdin/stdout.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;

use crate::core::{Operator, ProspectChoice};
use crate::domain::{CallAnalysis, ProposedTask, ProspectType, TaskDecision};

/// Operator that prompts on the terminal
pub struct TerminalOperator {
    lines: Mutex<Lines<BufReader<Stdin>>>,
}

impl Default for TerminalOperator {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalOperator {
    pub fn new() -> Self {
        Self {
            lines: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    async fn read_line(&self) -> Result<String> {
        let mut lines = self.lines.lock().await;
        lines
            .next_line()
            .await
            .context("Failed to read from stdin")?
            .context("Input closed before the review finished")
    }
}

/// Parse a classification answer; empty input keeps the suggestion
pub fn parse_choice(input: &str, suggested: ProspectType) -> Option<ProspectChoice> {
    match input.trim().to_ascii_lowercase().as_str() {
        "" | "y" | "yes" => Some(suggested.into()),
        "g" | "good" => Some(ProspectChoice::Good),
        "b" | "bad" => Some(ProspectChoice::Bad),
        "n" | "none" | "u" | "uncertain" => Some(ProspectChoice::None),
        _ => None,
    }
}

/// Parse a review answer
pub fn parse_decision(input: &str) -> Option<TaskDecision> {
    match input.trim().to_ascii_lowercase().as_str() {
        "a" | "approve" | "y" | "yes" => Some(TaskDecision::Approved),
        "d" | "deny" | "n" | "no" => Some(TaskDecision::Denied),
        _ => None,
    }
}

#[async_trait]
impl Operator for TerminalOperator {
    async fn confirm_prospect(&self, analysis: &CallAnalysis) -> Result<ProspectChoice> {
        println!();
        println!("Summary: {}", analysis.summary);
        if !analysis.key_points.is_empty() {
            println!("Key points:");
            for point in &analysis.key_points {
                println!("  - {}", point);
            }
        }
        if !analysis.next_action.is_empty() {
            println!("Next action: {}", analysis.next_action);
        }
        println!();
        println!("Suggested classification: {}", analysis.prospect_type);

        loop {
            println!("Classify as [g]ood / [b]ad / [n]one (Enter keeps the suggestion):");
            let line = self.read_line().await?;
            if let Some(choice) = parse_choice(&line, analysis.prospect_type) {
                return Ok(choice);
            }
            println!("Unrecognized answer: {}", line.trim());
        }
    }

    async fn review_task(
        &self,
        task: &ProposedTask,
        position: usize,
        total: usize,
    ) -> Result<TaskDecision> {
        println!();
        println!("Task {}/{}: {}", position, total, task.title);
        println!("  Priority: {}", task.priority.as_str());
        if let Some(due) = task.due_date {
            println!("  Due:      {}", due.format("%Y-%m-%d"));
        }
        if !task.description.is_empty() {
            println!("  {}", task.description);
        }

        loop {
            println!("[a]pprove / [d]eny:");
            let line = self.read_line().await?;
            if let Some(decision) = parse_decision(&line) {
                return Ok(decision);
            }
            println!("Unrecognized answer: {}", line.trim());
        }
    }
}
