//! Prospect classification step.
//!
//! `Unclassified -> Classifying -> Classified`. The analyzer's label is only a
//! suggestion: the operator confirms it or picks another.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::ProspectType;

/// Operator choice when classifying a call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProspectChoice {
    Good,
    Bad,
    None,
}

impl From<ProspectChoice> for ProspectType {
    fn from(choice: ProspectChoice) -> Self {
        match choice {
            ProspectChoice::Good => ProspectType::Good,
            ProspectChoice::Bad => ProspectType::Bad,
            ProspectChoice::None => ProspectType::Uncertain,
        }
    }
}

impl From<ProspectType> for ProspectChoice {
    fn from(prospect: ProspectType) -> Self {
        match prospect {
            ProspectType::Good => ProspectChoice::Good,
            ProspectType::Bad => ProspectChoice::Bad,
            ProspectType::Uncertain => ProspectChoice::None,
        }
    }
}

/// Classification state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProspectClassification {
    Unclassified,

    /// Waiting on the operator, with the analyzer's suggestion
    Classifying { suggested: ProspectType },

    Classified {
        prospect_type: ProspectType,
        suggested: ProspectType,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("Classification has not started")]
    NotStarted,

    #[error("Classification already started")]
    AlreadyStarted,

    #[error("Call already classified as {0}")]
    AlreadyClassified(ProspectType),
}

impl Default for ProspectClassification {
    fn default() -> Self {
        Self::Unclassified
    }
}

impl ProspectClassification {
    /// Present the analyzer's suggestion to the operator
    pub fn begin(&mut self, suggested: ProspectType) -> Result<(), ClassificationError> {
        match self {
            Self::Unclassified => {
                *self = Self::Classifying { suggested };
                Ok(())
            }
            Self::Classifying { .. } => Err(ClassificationError::AlreadyStarted),
            Self::Classified { prospect_type, .. } => {
                Err(ClassificationError::AlreadyClassified(*prospect_type))
            }
        }
    }

    /// Record the operator's choice
    pub fn classify(&mut self, choice: ProspectChoice) -> Result<ProspectType, ClassificationError> {
        match self {
            Self::Classifying { suggested } => {
                let prospect_type = ProspectType::from(choice);
                *self = Self::Classified {
                    prospect_type,
                    suggested: *suggested,
                };
                Ok(prospect_type)
            }
            Self::Unclassified => Err(ClassificationError::NotStarted),
            Self::Classified { prospect_type, .. } => {
                Err(ClassificationError::AlreadyClassified(*prospect_type))
            }
        }
    }

    /// Accept the analyzer's suggestion as-is
    pub fn accept_suggestion(&mut self) -> Result<ProspectType, ClassificationError> {
        let suggested = self.suggested().ok_or(ClassificationError::NotStarted)?;
        self.classify(suggested.into())
    }

    pub fn suggested(&self) -> Option<ProspectType> {
        match self {
            Self::Unclassified => None,
            Self::Classifying { suggested } | Self::Classified { suggested, .. } => Some(*suggested),
        }
    }

    /// Confirmed classification, once classified
    pub fn confirmed(&self) -> Option<ProspectType> {
        match self {
            Self::Classified { prospect_type, .. } => Some(*prospect_type),
            _ => None,
        }
    }

    /// Whether the operator picked something other than the suggestion
    pub fn overridden(&self) -> bool {
        matches!(self, Self::Classified { prospect_type, suggested } if prospect_type != suggested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confirm_suggestion() {
        let mut step = ProspectClassification::default();
        step.begin(ProspectType::Good).unwrap();

        assert_eq!(step.accept_suggestion().unwrap(), ProspectType::Good);
        assert_eq!(step.confirmed(), Some(ProspectType::Good));
        assert!(!step.overridden());
    }

    #[test]
    fn test_operator_override() {
        let mut step = ProspectClassification::default();
        step.begin(ProspectType::Good).unwrap();

        assert_eq!(step.classify(ProspectChoice::None).unwrap(), ProspectType::Uncertain);
        assert!(step.overridden());
        assert_eq!(step.suggested(), Some(ProspectType::Good));
    }

    #[test]
    fn test_invalid_transitions() {
        let mut step = ProspectClassification::default();
        assert_eq!(
            step.classify(ProspectChoice::Bad),
            Err(ClassificationError::NotStarted)
        );
        assert_eq!(step.accept_suggestion(), Err(ClassificationError::NotStarted));

        step.begin(ProspectType::Bad).unwrap();
        assert_eq!(
            step.begin(ProspectType::Good),
            Err(ClassificationError::AlreadyStarted)
        );

        step.classify(ProspectChoice::Bad).unwrap();
        assert_eq!(
            step.classify(ProspectChoice::Good),
            Err(ClassificationError::AlreadyClassified(ProspectType::Bad))
        );
    }
}
