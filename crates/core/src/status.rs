// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent and task status enums.
//!
//! Agent statuses form a closed set; tool calls submit them as strings
//! and they are validated at the bus boundary via `FromStr`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Raised when a status string outside the closed set is submitted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid status '{0}', must be one of: idle, working, blocked, waiting_review, done, error")]
pub struct InvalidStatusError(pub String);

/// Status of an agent, as reported by its own tool calls or its
/// supervisor's exit handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Idle,
    Working,
    Blocked,
    WaitingReview,
    Done,
    Error,
}

impl AgentStatus {
    /// Terminal statuses never transition again and do not count
    /// against concurrency caps.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error)
    }
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Working => "working",
            Self::Blocked => "blocked",
            Self::WaitingReview => "waiting_review",
            Self::Done => "done",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

impl FromStr for AgentStatus {
    type Err = InvalidStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "idle" => Ok(Self::Idle),
            "working" => Ok(Self::Working),
            "blocked" => Ok(Self::Blocked),
            "waiting_review" => Ok(Self::WaitingReview),
            "done" => Ok(Self::Done),
            "error" => Ok(Self::Error),
            other => Err(InvalidStatusError(other.to_string())),
        }
    }
}

/// Status of a task assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Done,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Done => "done",
        };
        write!(f, "{s}")
    }
}

impl FromStr for TaskStatus {
    type Err = InvalidStatusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "done" => Ok(Self::Done),
            other => Err(InvalidStatusError(other.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "status_tests.rs"]
mod tests;
