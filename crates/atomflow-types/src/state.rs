//! Persisted atom states and intentions.
//!
//! Both enumerations are owned by the state store: the engine writes them,
//! the analyzer only reads them. They serialize as the upper-case strings
//! the logbook stores (`"PENDING"`, `"REVERT"`, ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseStateError;

// ---------------------------------------------------------------------------
// AtomState
// ---------------------------------------------------------------------------

/// Lifecycle position of an atom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AtomState {
    Pending,
    Running,
    Success,
    Failure,
    Reverting,
    Reverted,
    Retrying,
}

impl AtomState {
    /// All states, in lifecycle order.
    pub const ALL: [AtomState; 7] = [
        AtomState::Pending,
        AtomState::Running,
        AtomState::Success,
        AtomState::Failure,
        AtomState::Reverting,
        AtomState::Reverted,
        AtomState::Retrying,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AtomState::Pending => "PENDING",
            AtomState::Running => "RUNNING",
            AtomState::Success => "SUCCESS",
            AtomState::Failure => "FAILURE",
            AtomState::Reverting => "REVERTING",
            AtomState::Reverted => "REVERTED",
            AtomState::Retrying => "RETRYING",
        }
    }

    /// Whether an attempt in this state was started but not finished.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, AtomState::Running | AtomState::Reverting)
    }
}

impl Default for AtomState {
    fn default() -> Self {
        AtomState::Pending
    }
}

impl fmt::Display for AtomState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AtomState {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AtomState::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStateError::UnknownState(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// AtomIntention
// ---------------------------------------------------------------------------

/// Desired direction of travel for an atom, independent of its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AtomIntention {
    /// Move forward.
    Execute,
    /// Undo.
    Revert,
    /// Re-attempt after a retry controller requested it.
    Retry,
}

impl AtomIntention {
    pub const ALL: [AtomIntention; 3] = [
        AtomIntention::Execute,
        AtomIntention::Revert,
        AtomIntention::Retry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AtomIntention::Execute => "EXECUTE",
            AtomIntention::Revert => "REVERT",
            AtomIntention::Retry => "RETRY",
        }
    }
}

impl Default for AtomIntention {
    fn default() -> Self {
        AtomIntention::Execute
    }
}

impl fmt::Display for AtomIntention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AtomIntention {
    type Err = ParseStateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AtomIntention::ALL
            .into_iter()
            .find(|intention| intention.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ParseStateError::UnknownIntention(s.to_string()))
    }
}
