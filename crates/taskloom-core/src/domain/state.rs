//! TaskStatus - タスク状態の状態機械
//!
//! 終端状態（Completed / Failed / Cancelled）からは遷移しない。

use serde::{Deserialize, Serialize};

/// Status of a task instance.
///
/// State transitions:
/// - Pending -> Running -> Completed
/// - Pending -> Running -> Retrying -> Pending (loop until retries run out)
/// - Pending -> Running -> Failed
/// - any non-terminal state -> Cancelled
///
/// Completed, Failed and Cancelled are absorbing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Waiting in the queue (possibly for dependencies).
    Pending,

    /// Owned by a worker, body executing.
    Running,

    /// Finished successfully.
    Completed,

    /// Retries exhausted, or a permanent error.
    Failed,

    /// Cancelled explicitly, by deadlock resolution, shutdown or shedding.
    Cancelled,

    /// Failed attempt waiting out its retry delay.
    Retrying,
}

impl TaskStatus {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}
