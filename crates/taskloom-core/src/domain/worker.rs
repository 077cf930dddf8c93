//! Worker registration config.

use serde::{Deserialize, Serialize};

use super::errors::SchedulerError;
use super::ids::WorkerId;
use super::priority::Priority;
use super::resources::{ResourceKind, Resources};

/// Static description of a worker slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    pub id: WorkerId,

    pub max_concurrent_tasks: usize,

    /// Priorities this worker prefers. Empty means all.
    #[serde(default)]
    pub supported_priorities: Vec<Priority>,

    #[serde(default)]
    pub capacity: Resources,

    #[serde(default)]
    pub specializations: Vec<String>,
}

impl WorkerConfig {
    pub fn new(id: impl Into<WorkerId>, max_concurrent_tasks: usize) -> Self {
        Self {
            id: id.into(),
            max_concurrent_tasks,
            supported_priorities: Vec::new(),
            capacity: Resources::new(),
            specializations: Vec::new(),
        }
    }

    pub fn with_priorities(mut self, priorities: impl IntoIterator<Item = Priority>) -> Self {
        self.supported_priorities = priorities.into_iter().collect();
        self
    }

    pub fn with_capacity(mut self, kind: ResourceKind, amount: f64) -> Self {
        self.capacity.set(kind, amount);
        self
    }

    pub fn with_specialization(mut self, tag: impl Into<String>) -> Self {
        self.specializations.push(tag.into());
        self
    }

    /// Does the priority list name `priority`? An empty list names everything.
    pub fn lists_priority(&self, priority: Priority) -> bool {
        self.supported_priorities.is_empty() || self.supported_priorities.contains(&priority)
    }

    pub fn validate(&self) -> Result<(), SchedulerError> {
        if self.id.as_str().trim().is_empty() {
            return Err(SchedulerError::invalid_input("worker id must not be empty"));
        }
        if self.max_concurrent_tasks == 0 {
            return Err(SchedulerError::invalid_input(format!(
                "worker '{}' must accept at least one task",
                self.id
            )));
        }
        if !self.capacity.is_well_formed() {
            return Err(SchedulerError::invalid_input(format!(
                "worker '{}' has negative or non-finite capacity",
                self.id
            )));
        }
        Ok(())
    }
}
