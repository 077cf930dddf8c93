//! PendingQueue - 待ち行列のエントリ

use std::cmp::Ordering;
use std::collections::HashSet;

use chrono::{DateTime, Utc};

use crate::domain::TaskId;

/// Queue metadata of one pending task.
///
/// Exists only while the task is pending. The task record itself stays in
/// the scheduler's task map.
#[derive(Debug, Clone)]
pub struct QueuedTask {
    pub task_id: TaskId,
    pub enqueued_at: DateTime<Utc>,
    pub priority_score: f64,
    pub resource_score: f64,
    /// Dependencies not yet completed.
    pub unresolved: HashSet<TaskId>,
    /// Submission sequence; earlier wins on equal score.
    pub seq: u64,
}

impl QueuedTask {
    pub fn combined_score(&self) -> f64 {
        self.priority_score + self.resource_score
    }

    pub fn is_ready(&self) -> bool {
        self.unresolved.is_empty()
    }
}

/// Dispatch order: combined score descending, then submission order.
pub fn dispatch_order(a: &QueuedTask, b: &QueuedTask) -> Ordering {
    b.combined_score()
        .total_cmp(&a.combined_score())
        .then_with(|| a.seq.cmp(&b.seq))
}

/// PendingQueue は待機中のタスクをディスパッチ順に保持する
#[derive(Debug, Default)]
pub struct PendingQueue {
    entries: Vec<QueuedTask>,
}

impl PendingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, task_id: TaskId) -> bool {
        self.entries.iter().any(|e| e.task_id == task_id)
    }

    /// Insert keeping the queue sorted.
    pub fn insert(&mut self, entry: QueuedTask) {
        let pos = self
            .entries
            .partition_point(|e| dispatch_order(e, &entry) != Ordering::Greater);
        self.entries.insert(pos, entry);
    }

    pub fn remove(&mut self, task_id: TaskId) -> Option<QueuedTask> {
        let pos = self.entries.iter().position(|e| e.task_id == task_id)?;
        Some(self.entries.remove(pos))
    }

    pub fn get(&self, task_id: TaskId) -> Option<&QueuedTask> {
        self.entries.iter().find(|e| e.task_id == task_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &QueuedTask> {
        self.entries.iter()
    }

    /// Mutate entries in place; call `resort` afterwards if scores changed.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut QueuedTask> {
        self.entries.iter_mut()
    }

    pub fn resort(&mut self) {
        self.entries.sort_by(dispatch_order);
    }

    /// Mark `dep` resolved in every entry waiting on it.
    pub fn resolve(&mut self, dep: TaskId) {
        for entry in &mut self.entries {
            entry.unresolved.remove(&dep);
        }
    }
}
