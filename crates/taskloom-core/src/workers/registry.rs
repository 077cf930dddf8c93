//! Worker registry: registered slots and their live state.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ResourceKind, Resources, SchedulerError, TaskId, WorkerConfig, WorkerId};
use crate::queue::ResourceLedger;
use crate::queue::scoring::WorkerView;

/// Successful attempts the rolling average duration looks back over.
pub const DURATION_WINDOW: usize = 20;

/// A registered worker.
///
/// Invariant: `current.len() <= config.max_concurrent_tasks`, and the ledger
/// holds exactly the allocations of the tasks in `current`.
#[derive(Debug)]
pub struct Worker {
    pub config: WorkerConfig,
    ledger: ResourceLedger,
    current: HashSet<TaskId>,
    processed: u64,
    failed: u64,
    /// Durations of the last `DURATION_WINDOW` successful attempts.
    recent: VecDeque<Duration>,
    draining: bool,
}

impl Worker {
    pub fn new(config: WorkerConfig) -> Self {
        let ledger = ResourceLedger::with_capacity(config.capacity.clone());
        Self {
            config,
            ledger,
            current: HashSet::new(),
            processed: 0,
            failed: 0,
            recent: VecDeque::with_capacity(DURATION_WINDOW),
            draining: false,
        }
    }

    pub fn id(&self) -> &WorkerId {
        &self.config.id
    }

    pub fn active(&self) -> usize {
        self.current.len()
    }

    pub fn current_tasks(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.current.iter().copied()
    }

    pub fn is_draining(&self) -> bool {
        self.draining
    }

    pub fn start_draining(&mut self) {
        self.draining = true;
    }

    pub fn has_free_slot(&self) -> bool {
        !self.draining && self.current.len() < self.config.max_concurrent_tasks
    }

    /// Not draining, below its concurrency limit and the request fits its ledger.
    pub fn can_accept(&self, request: &Resources) -> bool {
        self.has_free_slot() && self.ledger.can_allocate(request)
    }

    pub fn ledger(&self) -> &ResourceLedger {
        &self.ledger
    }

    pub fn view(&self) -> WorkerView<'_> {
        WorkerView {
            config: &self.config,
            ledger: &self.ledger,
            active: self.current.len(),
        }
    }

    pub(crate) fn assign(&mut self, task_id: TaskId, request: &Resources) -> Result<(), SchedulerError> {
        if !self.has_free_slot() {
            return Err(SchedulerError::ResourceExhausted(format!(
                "worker '{}' has no free slot",
                self.config.id
            )));
        }
        self.ledger.allocate(request)?;
        self.current.insert(task_id);
        Ok(())
    }

    /// Free the slot and allocation of `task_id`. Returns false if the task
    /// was not running here.
    pub(crate) fn release(&mut self, task_id: TaskId, allocation: &Resources) -> bool {
        if !self.current.remove(&task_id) {
            return false;
        }
        self.ledger.release(allocation);
        true
    }

    pub(crate) fn record_success(&mut self, duration: Duration) {
        self.processed += 1;
        if self.recent.len() == DURATION_WINDOW {
            self.recent.pop_front();
        }
        self.recent.push_back(duration);
    }

    pub(crate) fn record_failure(&mut self) {
        self.failed += 1;
    }

    /// Rolling mean over the last `DURATION_WINDOW` successful attempts.
    pub fn avg_duration(&self) -> Duration {
        if self.recent.is_empty() {
            return Duration::ZERO;
        }
        let total: u128 = self.recent.iter().map(Duration::as_nanos).sum();
        let nanos = total / self.recent.len() as u128;
        Duration::from_nanos(nanos.min(u64::MAX as u128) as u64)
    }

    pub fn load(&self) -> WorkerLoad {
        WorkerLoad {
            worker_id: self.config.id.clone(),
            active_tasks: self.current.len(),
            max_concurrent_tasks: self.config.max_concurrent_tasks,
            load: self.current.len() as f64 / self.config.max_concurrent_tasks.max(1) as f64,
            processed: self.processed,
            failed: self.failed,
            avg_duration_ms: self.avg_duration().as_millis() as u64,
            utilization: self.ledger.utilization_by_kind(),
            draining: self.draining,
        }
    }
}

/// Per-worker line of the performance report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerLoad {
    pub worker_id: WorkerId,
    pub active_tasks: usize,
    pub max_concurrent_tasks: usize,
    /// `active_tasks / max_concurrent_tasks`
    pub load: f64,
    pub processed: u64,
    pub failed: u64,
    pub avg_duration_ms: u64,
    pub utilization: BTreeMap<ResourceKind, f64>,
    pub draining: bool,
}

/// All registered workers, keyed by id.
#[derive(Debug, Default)]
pub struct WorkerRegistry {
    workers: BTreeMap<WorkerId, Worker>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and add. Duplicate ids are rejected.
    pub fn register(&mut self, config: WorkerConfig) -> Result<&Worker, SchedulerError> {
        config.validate()?;
        if self.workers.contains_key(&config.id) {
            return Err(SchedulerError::invalid_input(format!(
                "worker '{}' is already registered",
                config.id
            )));
        }
        let id = config.id.clone();
        Ok(self.workers.entry(id).or_insert(Worker::new(config)))
    }

    pub fn remove(&mut self, id: &WorkerId) -> Option<Worker> {
        self.workers.remove(id)
    }

    pub fn get(&self, id: &WorkerId) -> Option<&Worker> {
        self.workers.get(id)
    }

    pub fn get_mut(&mut self, id: &WorkerId) -> Option<&mut Worker> {
        self.workers.get_mut(id)
    }

    pub fn contains(&self, id: &WorkerId) -> bool {
        self.workers.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Worker> {
        self.workers.values()
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn any_free_slot(&self) -> bool {
        self.workers.values().any(Worker::has_free_slot)
    }

    pub fn loads(&self) -> Vec<WorkerLoad> {
        self.workers.values().map(Worker::load).collect()
    }
}
