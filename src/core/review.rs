//! Task review sequencer.
//!
//! Walks the operator through proposed tasks one at a time:
//! `Loading -> Reviewing { remaining, approved, denied } -> Saving -> Done`.
//!
//! Only the head of `remaining` can be decided. Every decision moves exactly
//! one task out of `remaining`, so a list of N tasks takes N decisions and
//! ends with `approved.len() + denied.len() == N`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::domain::{ProposedTask, TaskDecision};

/// Review phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewPhase {
    Loading,
    Reviewing,
    Saving,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReviewError {
    #[error("Tasks are not under review (phase: {0:?})")]
    NotReviewing(ReviewPhase),

    #[error("No task is awaiting a decision")]
    NothingToReview,

    #[error("Task {requested} is not the active task ({active})")]
    NotActive { requested: Uuid, active: Uuid },

    #[error("{remaining} task(s) still need a decision")]
    Incomplete { remaining: usize },

    #[error("Review is not saving (phase: {0:?})")]
    NotSaving(ReviewPhase),
}

/// One-at-a-time approve/deny sequencer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReviewSequencer {
    phase: ReviewPhase,
    remaining: Vec<ProposedTask>,
    approved: Vec<ProposedTask>,
    denied: Vec<ProposedTask>,
}

impl Default for ReviewSequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewSequencer {
    /// Sequencer waiting for extracted tasks
    pub fn new() -> Self {
        Self {
            phase: ReviewPhase::Loading,
            remaining: Vec::new(),
            approved: Vec::new(),
            denied: Vec::new(),
        }
    }

    /// Load extracted tasks; their order becomes the review order
    pub fn load(&mut self, tasks: Vec<ProposedTask>) -> Result<(), ReviewError> {
        if self.phase != ReviewPhase::Loading {
            return Err(ReviewError::NotReviewing(self.phase));
        }
        self.remaining = tasks;
        self.phase = ReviewPhase::Reviewing;
        Ok(())
    }

    pub fn phase(&self) -> ReviewPhase {
        self.phase
    }

    /// The task awaiting a decision (`remaining[0]`)
    pub fn active(&self) -> Option<&ProposedTask> {
        match self.phase {
            ReviewPhase::Reviewing => self.remaining.first(),
            _ => None,
        }
    }

    /// Tasks still queued, the active one first
    pub fn remaining(&self) -> &[ProposedTask] {
        &self.remaining
    }

    pub fn approved(&self) -> &[ProposedTask] {
        &self.approved
    }

    pub fn denied(&self) -> &[ProposedTask] {
        &self.denied
    }

    /// Total tasks under review
    pub fn total(&self) -> usize {
        self.remaining.len() + self.approved.len() + self.denied.len()
    }

    /// All tasks decided
    pub fn is_terminal(&self) -> bool {
        self.phase != ReviewPhase::Loading && self.remaining.is_empty()
    }

    /// Decide the active task
    pub fn decide_active(&mut self, decision: TaskDecision) -> Result<ProposedTask, ReviewError> {
        if self.phase != ReviewPhase::Reviewing {
            return Err(ReviewError::NotReviewing(self.phase));
        }
        if self.remaining.is_empty() {
            return Err(ReviewError::NothingToReview);
        }

        let task = self.remaining.remove(0);
        match decision {
            TaskDecision::Approved => self.approved.push(task.clone()),
            TaskDecision::Denied => self.denied.push(task.clone()),
        }
        Ok(task)
    }

    /// Decide a task by id; only the active task is accepted
    pub fn decide(&mut self, task_id: Uuid, decision: TaskDecision) -> Result<ProposedTask, ReviewError> {
        let active = self.active().map(|t| t.id).ok_or(match self.phase {
            ReviewPhase::Reviewing => ReviewError::NothingToReview,
            phase => ReviewError::NotReviewing(phase),
        })?;

        if active != task_id {
            return Err(ReviewError::NotActive {
                requested: task_id,
                active,
            });
        }
        self.decide_active(decision)
    }

    pub fn approve(&mut self, task_id: Uuid) -> Result<ProposedTask, ReviewError> {
        self.decide(task_id, TaskDecision::Approved)
    }

    pub fn deny(&mut self, task_id: Uuid) -> Result<ProposedTask, ReviewError> {
        self.decide(task_id, TaskDecision::Denied)
    }

    /// Close the review; rejected while any task is undecided
    pub fn close(&self) -> Result<(), ReviewError> {
        if !self.is_terminal() {
            return Err(ReviewError::Incomplete {
                remaining: self.remaining.len(),
            });
        }
        Ok(())
    }

    /// Enter `Saving` and hand out the approved tasks, in decision order
    pub fn begin_save(&mut self) -> Result<Vec<ProposedTask>, ReviewError> {
        if self.phase != ReviewPhase::Reviewing {
            return Err(ReviewError::NotReviewing(self.phase));
        }
        self.close()?;
        self.phase = ReviewPhase::Saving;
        Ok(self.approved.clone())
    }

    /// Mark the approved tasks as stored
    pub fn finish(&mut self) -> Result<(), ReviewError> {
        if self.phase != ReviewPhase::Saving {
            return Err(ReviewError::NotSaving(self.phase));
        }
        self.phase = ReviewPhase::Done;
        Ok(())
    }

    /// (approved, denied) counts
    pub fn decisions(&self) -> (usize, usize) {
        (self.approved.len(), self.denied.len())
    }
}
