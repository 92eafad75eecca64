//! Deployment status state machine
//!
//! A deployment record only ever moves forward:
//! `pending -> queued -> {success | failed}` (a pending record may also be
//! finished directly). Terminal records are never reused.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Deployment status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    /// Created, not yet picked up
    Pending,

    /// Accepted by the orchestrator, process chain not finished
    Queued,

    /// Process chain finished successfully
    Success,

    /// Process chain failed or timed out
    Failed,
}

/// Deployment event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentEvent {
    /// Handed to the orchestrator
    Queue,

    /// Process chain succeeded
    Succeed,

    /// Process chain failed
    Fail,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Pending => "pending",
            DeploymentStatus::Queued => "queued",
            DeploymentStatus::Success => "success",
            DeploymentStatus::Failed => "failed",
        }
    }

    /// Whether no further transition is allowed
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Success | DeploymentStatus::Failed)
    }

    /// Check whether moving to `next` respects forward-only ordering
    pub fn can_transition_to(&self, next: DeploymentStatus) -> bool {
        matches!(
            (self, next),
            (DeploymentStatus::Pending, DeploymentStatus::Queued)
                | (DeploymentStatus::Pending, DeploymentStatus::Success)
                | (DeploymentStatus::Pending, DeploymentStatus::Failed)
                | (DeploymentStatus::Queued, DeploymentStatus::Success)
                | (DeploymentStatus::Queued, DeploymentStatus::Failed)
        )
    }

    /// Process an event and return the resulting status
    pub fn process(&self, event: DeploymentEvent) -> Result<DeploymentStatus, String> {
        let next = match event {
            DeploymentEvent::Queue => DeploymentStatus::Queued,
            DeploymentEvent::Succeed => DeploymentStatus::Success,
            DeploymentEvent::Fail => DeploymentStatus::Failed,
        };

        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(format!("Invalid transition: {:?} -> {:?}", self, event))
        }
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
