/// Request state definitions for the frontier
///
/// This module defines the lifecycle states of a task inside the frontier.
use std::fmt;

/// Represents the current state of a request in the frontier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestState {
    // ===== Active States =====
    /// Waiting to be dispatched
    Pending,

    /// Handed to a worker and not yet finished
    InProgress,

    // ===== Terminal States =====
    /// Page was fetched and classified
    Handled,

    /// Retries exhausted, the request was abandoned
    Failed,
}

impl RequestState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Handled | Self::Failed)
    }

    /// Converts the request state to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Handled => "handled",
            Self::Failed => "failed",
        }
    }

    /// Parses a request state from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "handled" => Some(Self::Handled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all possible request states
    pub fn all_states() -> Vec<Self> {
        vec![Self::Pending, Self::InProgress, Self::Handled, Self::Failed]
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
