use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::IndexError;

/// Lifecycle of a construction run.
///
/// ```text
/// Uninitialized -> Initializing -> Iterating -> Complete
///                       |              |
///                       v              v
///                    Failed      Failed | Cancelled
/// ```
///
/// A resumed run enters `Iterating` straight from `Uninitialized`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstructionState {
    Uninitialized,
    Initializing,
    Iterating,
    Complete,
    Failed,
    Cancelled,
}

impl ConstructionState {
    pub fn can_transition_to(self, next: ConstructionState) -> bool {
        use ConstructionState::*;
        matches!(
            (self, next),
            (Uninitialized, Initializing)
                | (Uninitialized, Iterating)
                | (Initializing, Iterating)
                | (Initializing, Failed)
                | (Initializing, Cancelled)
                | (Iterating, Complete)
                | (Iterating, Failed)
                | (Iterating, Cancelled)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ConstructionState::Complete | ConstructionState::Failed | ConstructionState::Cancelled
        )
    }

    /// Whether a persisted run in this state can be picked up again.
    pub fn is_resumable(self) -> bool {
        matches!(
            self,
            ConstructionState::Iterating
                | ConstructionState::Failed
                | ConstructionState::Cancelled
                | ConstructionState::Complete
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConstructionState::Uninitialized => "UNINITIALIZED",
            ConstructionState::Initializing => "INITIALIZING",
            ConstructionState::Iterating => "ITERATING",
            ConstructionState::Complete => "COMPLETE",
            ConstructionState::Failed => "FAILED",
            ConstructionState::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for ConstructionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConstructionState {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNINITIALIZED" => Ok(ConstructionState::Uninitialized),
            "INITIALIZING" => Ok(ConstructionState::Initializing),
            "ITERATING" => Ok(ConstructionState::Iterating),
            "COMPLETE" => Ok(ConstructionState::Complete),
            "FAILED" => Ok(ConstructionState::Failed),
            "CANCELLED" => Ok(ConstructionState::Cancelled),
            other => Err(IndexError::InvalidRequest(format!(
                "unknown construction state '{}'",
                other
            ))),
        }
    }
}
