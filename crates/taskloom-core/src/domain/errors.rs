//! Errors and their operational classification.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ids::WorkerId;

/// Operational classification of an error.
///
/// - Transient: retrying may help (timeouts, failures raised by a task body)
/// - Permanent: retrying is pointless (bad input, cancellation, queue full)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    Permanent,
}

/// Errors surfaced by the scheduler and by task bodies.
///
/// Terminal task records keep the error that ended them, so the type is
/// `Clone` and serializable.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SchedulerError {
    /// Malformed definition, cyclic dependency, duplicate id or failed validator.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Queue is full.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// `execute` exceeded its time budget.
    #[error("task timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Raised by a task body.
    #[error("execution failed: {0}")]
    Execution(String),

    /// Explicit cancellation, deadlock resolution, shutdown or shedding.
    #[error("operation cancelled: {0}")]
    Cancelled(String),

    #[error("worker not found: {0}")]
    WorkerNotFound(WorkerId),

    /// Call is not valid in the scheduler's current lifecycle state.
    #[error("invalid state: {0}")]
    InvalidState(String),
}

impl SchedulerError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    pub fn cancelled(reason: impl Into<String>) -> Self {
        Self::Cancelled(reason.into())
    }

    pub fn timeout(timeout: Duration) -> Self {
        Self::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SchedulerError::Timeout { .. } | SchedulerError::Execution(_) => ErrorKind::Transient,
            _ => ErrorKind::Permanent,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::timeout(SchedulerError::timeout(Duration::from_secs(1)), true)]
    #[case::execution(SchedulerError::execution("boom"), true)]
    #[case::invalid(SchedulerError::invalid_input("bad"), false)]
    #[case::exhausted(SchedulerError::ResourceExhausted("full".into()), false)]
    #[case::cancelled(SchedulerError::cancelled("user"), false)]
    fn only_timeouts_and_execution_errors_retry(
        #[case] err: SchedulerError,
        #[case] retryable: bool,
    ) {
        assert_eq!(err.is_retryable(), retryable);
    }

    #[test]
    fn display_keeps_reason() {
        let err = SchedulerError::cancelled("deadlock resolution");
        assert!(err.to_string().contains("deadlock resolution"));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let v = serde_json::to_value(SchedulerError::timeout(Duration::from_millis(250))).unwrap();
        assert_eq!(v["kind"], "timeout");
        assert_eq!(v["detail"]["timeout_ms"], 250);
    }
}
