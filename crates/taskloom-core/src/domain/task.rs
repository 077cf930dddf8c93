//! TaskInstance - スケジューラが保持するタスクの可変レコード

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::SchedulerError;
use super::ids::{TaskId, WorkerId};
use super::priority::Priority;
use super::resources::Resources;
use super::state::TaskStatus;

/// Record of one submitted task.
///
/// Design:
/// - Single source of truth for a task's state. Queue structures hold ids.
/// - All transitions go through the methods below so timestamps and the
///   owning worker stay consistent.
/// - This is also the snapshot returned by `Scheduler::get_task_status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInstance {
    pub id: TaskId,
    pub name: String,
    pub status: TaskStatus,

    /// Working priority; aging may promote it above `base_priority`.
    pub priority: Priority,
    pub base_priority: Priority,

    pub scheduled_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,

    /// Attempts started so far (including the current one while running).
    pub attempts: u32,
    pub max_retries: u32,

    /// Percent, in `[0, 100]`.
    pub progress: f64,
    pub last_error: Option<SchedulerError>,

    /// Resources granted to the current attempt (empty when not running).
    pub allocation: Resources,
    pub worker_id: Option<WorkerId>,

    pub dependencies: Vec<TaskId>,
    pub tags: Vec<String>,

    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub result: Option<serde_json::Value>,
}

impl TaskInstance {
    pub(crate) fn new(
        id: TaskId,
        name: String,
        priority: Priority,
        max_retries: u32,
        dependencies: Vec<TaskId>,
        tags: Vec<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            status: TaskStatus::Pending,
            priority,
            base_priority: priority,
            scheduled_at: now,
            started_at: None,
            completed_at: None,
            attempts: 0,
            max_retries,
            progress: 0.0,
            last_error: None,
            allocation: Resources::new(),
            worker_id: None,
            dependencies,
            tags,
            metadata: serde_json::Map::new(),
            result: None,
        }
    }

    /// Attempts used beyond the first one.
    pub fn retries_used(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }

    /// Pending -> Running.
    pub(crate) fn start_attempt(&mut self, worker_id: WorkerId, allocation: Resources, now: DateTime<Utc>) {
        self.status = TaskStatus::Running;
        self.attempts += 1;
        self.progress = 0.0;
        self.worker_id = Some(worker_id);
        self.allocation = allocation;
        self.started_at = Some(now.max(self.scheduled_at));
    }

    /// Drop the owning worker and the allocation; returns what was held.
    pub(crate) fn release(&mut self) -> (Option<WorkerId>, Resources) {
        let worker = self.worker_id.take();
        let allocation = std::mem::take(&mut self.allocation);
        (worker, allocation)
    }

    pub(crate) fn mark_completed(&mut self, result: serde_json::Value, now: DateTime<Utc>) {
        self.status = TaskStatus::Completed;
        self.progress = 100.0;
        self.result = Some(result);
        self.finish_at(now);
    }

    pub(crate) fn mark_failed(&mut self, error: SchedulerError, now: DateTime<Utc>) {
        self.status = TaskStatus::Failed;
        self.last_error = Some(error);
        self.finish_at(now);
    }

    pub(crate) fn mark_cancelled(&mut self, reason: &str, now: DateTime<Utc>) {
        self.status = TaskStatus::Cancelled;
        self.last_error = Some(SchedulerError::cancelled(reason));
        self.finish_at(now);
    }

    /// Running -> Retrying.
    pub(crate) fn schedule_retry(&mut self, error: SchedulerError) {
        self.status = TaskStatus::Retrying;
        self.last_error = Some(error);
    }

    /// Retrying -> Pending.
    pub(crate) fn requeue(&mut self) {
        self.status = TaskStatus::Pending;
    }

    fn finish_at(&mut self, now: DateTime<Utc>) {
        let floor = self.started_at.unwrap_or(self.scheduled_at);
        self.completed_at = Some(now.max(floor));
    }
}
