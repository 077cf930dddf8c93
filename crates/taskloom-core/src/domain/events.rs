//! Scheduler events published to subscribers and event sinks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::SchedulerError;
use super::ids::{TaskId, WorkerId};
use super::pressure::PressureLevel;
use super::priority::Priority;

/// Something observable that happened inside the scheduler.
///
/// Events are collected while the scheduler state is locked and published
/// after the lock is released, so a slow subscriber never stalls a tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerEvent {
    SchedulerStarted {
        at: DateTime<Utc>,
    },
    SchedulerStopped {
        at: DateTime<Utc>,
        /// Tasks cancelled by the shutdown.
        cancelled: usize,
    },
    TaskSubmitted {
        task_id: TaskId,
        name: String,
        priority: Priority,
    },
    TaskStarted {
        task_id: TaskId,
        worker_id: WorkerId,
        attempt: u32,
    },
    TaskProgress {
        task_id: TaskId,
        progress: f64,
    },
    TaskRetrying {
        task_id: TaskId,
        attempt: u32,
        delay_ms: u64,
        error: SchedulerError,
    },
    TaskCompleted {
        task_id: TaskId,
        worker_id: WorkerId,
        duration_ms: u64,
    },
    TaskFailed {
        task_id: TaskId,
        attempts: u32,
        error: SchedulerError,
    },
    TaskCancelled {
        task_id: TaskId,
        reason: String,
    },
    WorkerRegistered {
        worker_id: WorkerId,
    },
    WorkerUnregistered {
        worker_id: WorkerId,
        /// Tasks force-cancelled because the grace period ran out.
        cancelled: usize,
    },
    /// Warning: a dependency cycle among queued tasks was broken.
    DeadlockResolved {
        cycle: Vec<TaskId>,
        cancelled: TaskId,
    },
    TasksShed {
        level: PressureLevel,
        task_ids: Vec<TaskId>,
    },
}

impl SchedulerEvent {
    /// Task the event is about, if any.
    pub fn task_id(&self) -> Option<TaskId> {
        match self {
            SchedulerEvent::TaskSubmitted { task_id, .. }
            | SchedulerEvent::TaskStarted { task_id, .. }
            | SchedulerEvent::TaskProgress { task_id, .. }
            | SchedulerEvent::TaskRetrying { task_id, .. }
            | SchedulerEvent::TaskCompleted { task_id, .. }
            | SchedulerEvent::TaskFailed { task_id, .. }
            | SchedulerEvent::TaskCancelled { task_id, .. } => Some(*task_id),
            SchedulerEvent::DeadlockResolved { cancelled, .. } => Some(*cancelled),
            _ => None,
        }
    }

    /// Does this event put `task_id` into a terminal state?
    pub fn finishes(&self, task_id: TaskId) -> bool {
        match self {
            SchedulerEvent::TaskCompleted { task_id: id, .. }
            | SchedulerEvent::TaskFailed { task_id: id, .. }
            | SchedulerEvent::TaskCancelled { task_id: id, .. } => *id == task_id,
            SchedulerEvent::TasksShed { task_ids, .. } => task_ids.contains(&task_id),
            _ => false,
        }
    }

    /// Short name, used as the log target field.
    pub fn name(&self) -> &'static str {
        match self {
            SchedulerEvent::SchedulerStarted { .. } => "scheduler_started",
            SchedulerEvent::SchedulerStopped { .. } => "scheduler_stopped",
            SchedulerEvent::TaskSubmitted { .. } => "task_submitted",
            SchedulerEvent::TaskStarted { .. } => "task_started",
            SchedulerEvent::TaskProgress { .. } => "task_progress",
            SchedulerEvent::TaskRetrying { .. } => "task_retrying",
            SchedulerEvent::TaskCompleted { .. } => "task_completed",
            SchedulerEvent::TaskFailed { .. } => "task_failed",
            SchedulerEvent::TaskCancelled { .. } => "task_cancelled",
            SchedulerEvent::WorkerRegistered { .. } => "worker_registered",
            SchedulerEvent::WorkerUnregistered { .. } => "worker_unregistered",
            SchedulerEvent::DeadlockResolved { .. } => "deadlock_resolved",
            SchedulerEvent::TasksShed { .. } => "tasks_shed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_events_finish_their_task() {
        let id = TaskId::generate();
        let other = TaskId::generate();

        let done = SchedulerEvent::TaskCompleted {
            task_id: id,
            worker_id: WorkerId::from("w"),
            duration_ms: 3,
        };
        assert!(done.finishes(id));
        assert!(!done.finishes(other));

        let progress = SchedulerEvent::TaskProgress {
            task_id: id,
            progress: 50.0,
        };
        assert!(!progress.finishes(id));

        let shed = SchedulerEvent::TasksShed {
            level: PressureLevel::High,
            task_ids: vec![other],
        };
        assert!(shed.finishes(other));
    }

    #[test]
    fn serializes_with_type_tag() {
        let ev = SchedulerEvent::WorkerRegistered {
            worker_id: WorkerId::from("w1"),
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "worker_registered");
        assert_eq!(v["worker_id"], "w1");
        assert_eq!(ev.name(), "worker_registered");
    }
}
