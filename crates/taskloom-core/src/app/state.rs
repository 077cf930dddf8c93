//! SchedulerState - スケジューラの状態と遷移
//!
//! Design:
//! - `tasks` holds every non-terminal task (pending, running, retrying) and is
//!   the single source of truth for them. The pending queue holds ids plus
//!   queue metadata only.
//! - `finished` holds terminal records until retention evicts them.
//! - Every method runs to completion under the scheduler lock and never
//!   awaits. Side effects toward the outside world are pushed into an
//!   `Outbox`, spawns are returned to the caller.
//! - Allocation and release are paired: a running task's allocation is
//!   recorded on its instance and released exactly once by `release_attempt`.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::config::SchedulerConfig;
use super::metrics::{Gauges, MetricsCollector};
use super::outbox::{HookCall, Outbox};
use crate::domain::{
    ContextUpdate, Decider, Decision, Priority, SchedulerError, SchedulerEvent, TaskDefinition,
    TaskId, TaskInstance, TaskStatus, WorkerConfig, WorkerId,
};
use crate::queue::scoring::{priority_score, resource_score};
use crate::queue::{DependencyGraph, PendingQueue, QueuedTask, ResourceLedger};
use crate::workers::WorkerRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Created,
    Running,
    Stopping,
    Stopped,
}

/// A task that has not reached a terminal state.
pub(crate) struct LiveTask {
    pub instance: TaskInstance,
    pub definition: Arc<TaskDefinition>,
    pub input: Value,
    /// Token of the current attempt. Replaced on every re-enqueue.
    pub token: CancellationToken,
    pub seq: u64,
}

/// ロック解放後に仕掛けるリトライタイマー
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct RetryTimer {
    pub task_id: TaskId,
    pub attempt: u32,
    pub delay: Duration,
}

/// What a submission asks for, after definition checks and validation.
pub(crate) struct Admission {
    pub task_id: TaskId,
    pub definition: Arc<TaskDefinition>,
    pub input: Value,
    pub priority: Priority,
    pub dependencies: Vec<TaskId>,
}

/// SchedulerState はスケジューラの全可変状態（ロック下でのみ触る）
pub(crate) struct SchedulerState {
    pub lifecycle: Lifecycle,
    pub tasks: HashMap<TaskId, LiveTask>,
    pub finished: HashMap<TaskId, TaskInstance>,
    pub finished_order: VecDeque<TaskId>,
    pub queue: PendingQueue,
    pub graph: DependencyGraph,
    pub workers: WorkerRegistry,
    pub global: ResourceLedger,
    pub metrics: MetricsCollector,
    pub updates: mpsc::UnboundedReceiver<ContextUpdate>,
    pub loops: Vec<JoinHandle<()>>,
    next_seq: u64,
}

pub(crate) const STOPPED_REASON: &str = "scheduler stopped";
pub(crate) const SHUTDOWN_REASON: &str = "scheduler shutdown";
pub(crate) const UNREGISTERED_REASON: &str = "worker unregistered";

/// `now - since`, zero if the clock reads earlier.
pub(crate) fn elapsed(since: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    now.signed_duration_since(since)
        .to_std()
        .unwrap_or(Duration::ZERO)
}

impl SchedulerState {
    pub fn new(updates: mpsc::UnboundedReceiver<ContextUpdate>) -> Self {
        Self {
            lifecycle: Lifecycle::Created,
            tasks: HashMap::new(),
            finished: HashMap::new(),
            finished_order: VecDeque::new(),
            queue: PendingQueue::new(),
            graph: DependencyGraph::new(),
            workers: WorkerRegistry::new(),
            global: ResourceLedger::new(),
            metrics: MetricsCollector::default(),
            updates,
            loops: Vec::new(),
            next_seq: 0,
        }
    }

    pub fn accepts_submissions(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Created | Lifecycle::Running)
    }

    /// Reject early when the scheduler is shutting down or the queue is full.
    pub fn check_capacity(&self, config: &SchedulerConfig) -> Result<(), SchedulerError> {
        if !self.accepts_submissions() {
            return Err(SchedulerError::InvalidState(
                "scheduler is stopping or stopped".into(),
            ));
        }
        if self.queue.len() >= config.max_queue_size {
            return Err(SchedulerError::ResourceExhausted(format!(
                "queue is full ({} tasks)",
                self.queue.len()
            )));
        }
        Ok(())
    }

    pub fn status(&self, task_id: TaskId) -> Option<TaskInstance> {
        self.tasks
            .get(&task_id)
            .map(|live| live.instance.clone())
            .or_else(|| self.finished.get(&task_id).cloned())
    }

    pub fn is_completed(&self, task_id: TaskId) -> bool {
        self.finished
            .get(&task_id)
            .is_some_and(|t| t.status == TaskStatus::Completed)
    }

    /// Admit a task: duplicate and cycle checks first, then mutation.
    pub fn admit(
        &mut self,
        admission: Admission,
        config: &SchedulerConfig,
        now: DateTime<Utc>,
        outbox: &mut Outbox,
    ) -> Result<TaskId, SchedulerError> {
        self.check_capacity(config)?;

        let Admission {
            task_id,
            definition,
            input,
            priority,
            dependencies,
        } = admission;

        if self.tasks.contains_key(&task_id) || self.finished.contains_key(&task_id) {
            return Err(SchedulerError::invalid_input(format!(
                "task id {task_id} is already in use"
            )));
        }
        if let Some(cycle) = self.graph.would_create_cycle(task_id, &dependencies) {
            let path: Vec<String> = cycle.iter().map(ToString::to_string).collect();
            return Err(SchedulerError::invalid_input(format!(
                "dependency cycle: {}",
                path.join(" -> ")
            )));
        }

        let instance = TaskInstance::new(
            task_id,
            definition.name.clone(),
            priority,
            definition.max_retries,
            dependencies.clone(),
            definition.tags.clone(),
            now,
        );

        self.graph.add_task(task_id, &dependencies);
        let seq = self.next_seq;
        self.next_seq += 1;
        self.tasks.insert(
            task_id,
            LiveTask {
                instance,
                definition,
                input,
                token: CancellationToken::new(),
                seq,
            },
        );
        self.enqueue(task_id, now);
        self.metrics.submitted += 1;

        debug!(%task_id, ?priority, deps = dependencies.len(), "task submitted");
        if let Some(live) = self.tasks.get(&task_id) {
            outbox.event(SchedulerEvent::TaskSubmitted {
                task_id,
                name: live.instance.name.clone(),
                priority,
            });
        }
        Ok(task_id)
    }

    /// Put a pending task into the queue with freshly computed scores.
    fn enqueue(&mut self, task_id: TaskId, now: DateTime<Utc>) {
        let Some(live) = self.tasks.get(&task_id) else {
            return;
        };
        let unresolved: HashSet<TaskId> = live
            .instance
            .dependencies
            .iter()
            .copied()
            .filter(|dep| !self.is_completed(*dep))
            .collect();
        let entry = QueuedTask {
            task_id,
            enqueued_at: now,
            priority_score: priority_score(
                live.instance.priority,
                elapsed(live.instance.scheduled_at, now),
                live.instance.attempts,
            ),
            resource_score: resource_score(&live.definition.resources, &self.global),
            unresolved,
            seq: live.seq,
        };
        self.queue.insert(entry);
    }

    /// Recompute resource scores after global capacity changed.
    pub fn refresh_resource_scores(&mut self) {
        let tasks = &self.tasks;
        let global = &self.global;
        for entry in self.queue.iter_mut() {
            if let Some(live) = tasks.get(&entry.task_id) {
                entry.resource_score = resource_score(&live.definition.resources, global);
            }
        }
        self.queue.resort();
    }

    pub fn register_worker(
        &mut self,
        config: WorkerConfig,
        outbox: &mut Outbox,
    ) -> Result<(), SchedulerError> {
        let worker = self.workers.register(config)?;
        let worker_id = worker.id().clone();
        let capacity = worker.config.capacity.clone();
        self.global.add_capacity(&capacity);
        self.refresh_resource_scores();

        info!(%worker_id, "worker registered");
        outbox.event(SchedulerEvent::WorkerRegistered { worker_id });
        Ok(())
    }

    /// Apply progress and metadata buffered by running bodies.
    ///
    /// Updates from stale attempts are dropped.
    pub fn apply_updates(&mut self, outbox: &mut Outbox) {
        while let Ok(update) = self.updates.try_recv() {
            let Some(live) = self.tasks.get_mut(&update.task_id()) else {
                continue;
            };
            if live.instance.status != TaskStatus::Running
                || live.instance.attempts != update.attempt()
            {
                continue;
            }
            match update {
                ContextUpdate::Progress {
                    task_id, progress, ..
                } => {
                    live.instance.progress = progress;
                    if let Some(hooks) = &live.definition.hooks {
                        outbox.hook(HookCall::Progress {
                            hooks: Arc::clone(hooks),
                            task_id,
                            progress,
                        });
                    }
                    outbox.event(SchedulerEvent::TaskProgress { task_id, progress });
                }
                ContextUpdate::Metadata { key, value, .. } => {
                    live.instance.metadata.insert(key, value);
                }
            }
        }
    }

    /// Free the slot and allocation held by a running task, in both ledgers.
    fn release_attempt(&mut self, task_id: TaskId) {
        let Some(live) = self.tasks.get_mut(&task_id) else {
            return;
        };
        let (worker_id, allocation) = live.instance.release();
        if let Some(worker_id) = worker_id {
            if let Some(worker) = self.workers.get_mut(&worker_id) {
                worker.release(task_id, &allocation);
            }
            self.global.release(&allocation);
        }
    }

    /// Move a task that just reached a terminal state into `finished`.
    fn retire(&mut self, task_id: TaskId) {
        let Some(live) = self.tasks.remove(&task_id) else {
            return;
        };
        self.graph.remove_task(task_id);
        if live.instance.status == TaskStatus::Completed {
            self.queue.resolve(task_id);
        }
        self.finished.insert(task_id, live.instance);
        self.finished_order.push_back(task_id);
    }

    /// Cancel a non-terminal task. Returns false for unknown or terminal ids.
    pub fn cancel(
        &mut self,
        task_id: TaskId,
        reason: &str,
        now: DateTime<Utc>,
        outbox: &mut Outbox,
    ) -> bool {
        if !self.tasks.contains_key(&task_id) {
            return false;
        }

        self.queue.remove(task_id);
        self.release_attempt(task_id);
        if let Some(live) = self.tasks.get_mut(&task_id) {
            live.token.cancel();
            live.instance.mark_cancelled(reason, now);
        }
        self.metrics.record_cancellation();
        self.retire(task_id);

        debug!(%task_id, reason, "task cancelled");
        outbox.event(SchedulerEvent::TaskCancelled {
            task_id,
            reason: reason.to_string(),
        });
        true
    }

    /// Apply the result of an attempt.
    ///
    /// Buffered context updates are applied first, so whatever the body
    /// reported before returning lands on the record. Results of stale
    /// attempts (task cancelled, or already re-dispatched) are ignored.
    /// Returns a retry timer to arm when the decider retries.
    #[allow(clippy::too_many_arguments)]
    pub fn finish_attempt(
        &mut self,
        task_id: TaskId,
        attempt: u32,
        result: Result<Value, SchedulerError>,
        took: Duration,
        now: DateTime<Utc>,
        decider: &dyn Decider,
        outbox: &mut Outbox,
    ) -> Option<RetryTimer> {
        // the body may have reported right before returning
        self.apply_updates(outbox);

        let live = self.tasks.get(&task_id)?;
        if live.instance.status != TaskStatus::Running || live.instance.attempts != attempt {
            debug!(%task_id, attempt, "ignoring result of stale attempt");
            return None;
        }
        let worker_id = live.instance.worker_id.clone();

        self.release_attempt(task_id);

        let error = match result {
            Ok(value) => {
                if let Some(worker) = worker_id.as_ref().and_then(|w| self.workers.get_mut(w)) {
                    worker.record_success(took);
                }
                let live = self.tasks.get_mut(&task_id)?;
                live.instance.mark_completed(value, now);
                self.metrics.record_completion(now, took);
                self.retire(task_id);

                debug!(%task_id, attempt, took_ms = took.as_millis() as u64, "task completed");
                outbox.event(SchedulerEvent::TaskCompleted {
                    task_id,
                    worker_id: worker_id.unwrap_or_else(|| "unknown".into()),
                    duration_ms: took.as_millis() as u64,
                });
                return None;
            }
            Err(error) => error,
        };

        if let Some(worker) = worker_id.as_ref().and_then(|w| self.workers.get_mut(w)) {
            worker.record_failure();
        }

        let live = self.tasks.get_mut(&task_id)?;
        let mut decision = decider.decide(&live.instance, &error, live.definition.retry_delay);
        if matches!(decision, Decision::Retry { .. })
            && matches!(self.lifecycle, Lifecycle::Stopping | Lifecycle::Stopped)
        {
            decision = Decision::Cancel {
                reason: STOPPED_REASON.to_string(),
            };
        }
        match decision {
            Decision::Retry { delay } => {
                live.instance.schedule_retry(error.clone());
                self.metrics.retried += 1;
                if let Some(hooks) = &live.definition.hooks {
                    outbox.hook(HookCall::Retry {
                        hooks: Arc::clone(hooks),
                        task_id,
                        attempt,
                        error: error.clone(),
                    });
                }

                debug!(%task_id, attempt, delay_ms = delay.as_millis() as u64, %error, "task will retry");
                outbox.event(SchedulerEvent::TaskRetrying {
                    task_id,
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    error,
                });
                Some(RetryTimer {
                    task_id,
                    attempt,
                    delay,
                })
            }
            Decision::Fail { reason } => {
                live.instance.mark_failed(error.clone(), now);
                self.metrics.record_failure();
                self.retire(task_id);

                warn!(%task_id, attempts = attempt, %reason, "task failed");
                outbox.event(SchedulerEvent::TaskFailed {
                    task_id,
                    attempts: attempt,
                    error,
                });
                None
            }
            Decision::Cancel { reason } => {
                live.token.cancel();
                live.instance.mark_cancelled(&reason, now);
                self.metrics.record_cancellation();
                self.retire(task_id);

                outbox.event(SchedulerEvent::TaskCancelled { task_id, reason });
                None
            }
        }
    }

    /// Retry delay elapsed: put the task back into the queue.
    ///
    /// No-op if the task was cancelled (or otherwise moved on) meanwhile.
    pub fn requeue(&mut self, task_id: TaskId, attempt: u32, now: DateTime<Utc>) -> bool {
        let Some(live) = self.tasks.get_mut(&task_id) else {
            return false;
        };
        if live.instance.status != TaskStatus::Retrying || live.instance.attempts != attempt {
            return false;
        }
        live.instance.requeue();
        live.token = CancellationToken::new();
        self.enqueue(task_id, now);
        true
    }

    /// Force-cancel what is left on a draining worker, then drop it and its
    /// capacity. Returns how many tasks were cancelled.
    pub fn remove_worker(
        &mut self,
        worker_id: &WorkerId,
        now: DateTime<Utc>,
        outbox: &mut Outbox,
    ) -> Result<usize, SchedulerError> {
        let worker = self
            .workers
            .get(worker_id)
            .ok_or_else(|| SchedulerError::WorkerNotFound(worker_id.clone()))?;
        let mut remaining: Vec<TaskId> = worker.current_tasks().collect();
        remaining.sort();

        if !remaining.is_empty() {
            warn!(%worker_id, tasks = remaining.len(), "force-cancelling tasks of unregistered worker");
        }
        for task_id in &remaining {
            self.cancel(*task_id, UNREGISTERED_REASON, now, outbox);
        }

        if let Some(worker) = self.workers.remove(worker_id) {
            self.global.remove_capacity(&worker.config.capacity);
        }
        self.refresh_resource_scores();

        info!(%worker_id, cancelled = remaining.len(), "worker unregistered");
        outbox.event(SchedulerEvent::WorkerUnregistered {
            worker_id: worker_id.clone(),
            cancelled: remaining.len(),
        });
        Ok(remaining.len())
    }

    /// Cancel every task in `statuses`, oldest submission first.
    pub fn cancel_all(
        &mut self,
        statuses: &[TaskStatus],
        reason: &str,
        now: DateTime<Utc>,
        outbox: &mut Outbox,
    ) -> usize {
        let ids: Vec<TaskId> = statuses
            .iter()
            .flat_map(|status| self.ids_with_status(*status))
            .collect();
        for task_id in &ids {
            self.cancel(*task_id, reason, now, outbox);
        }
        ids.len()
    }

    pub fn running_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.instance.status == TaskStatus::Running)
            .count()
    }

    fn retrying_count(&self) -> usize {
        self.tasks
            .values()
            .filter(|t| t.instance.status == TaskStatus::Retrying)
            .count()
    }

    /// Ids of tasks in `status`, in submission order.
    pub fn ids_with_status(&self, status: TaskStatus) -> Vec<TaskId> {
        let mut ids: Vec<(u64, TaskId)> = self
            .tasks
            .iter()
            .filter(|(_, t)| t.instance.status == status)
            .map(|(id, t)| (t.seq, *id))
            .collect();
        ids.sort();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    pub fn gauges(&self) -> Gauges {
        Gauges {
            queue_length: self.queue.len(),
            running: self.running_count(),
            retrying: self.retrying_count(),
            resource_utilization: self.global.utilization_by_kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{DefaultDecider, ResourceKind};
    use serde_json::json;

    fn state() -> SchedulerState {
        let (_tx, rx) = mpsc::unbounded_channel();
        SchedulerState::new(rx)
    }

    fn admission(def: TaskDefinition, deps: Vec<TaskId>) -> Admission {
        Admission {
            task_id: TaskId::generate(),
            priority: def.priority,
            definition: Arc::new(def),
            input: json!(null),
            dependencies: deps,
        }
    }

    fn noop(name: &str) -> TaskDefinition {
        TaskDefinition::from_fn(name, |_, _| async { Ok(json!(null)) })
    }

    #[test]
    fn admitted_task_is_pending_and_queued() {
        let mut s = state();
        let mut outbox = Outbox::new();
        let id = s
            .admit(admission(noop("a"), vec![]), &SchedulerConfig::default(), Utc::now(), &mut outbox)
            .unwrap();

        assert_eq!(s.status(id).unwrap().status, TaskStatus::Pending);
        assert!(s.queue.contains(id));
        assert_eq!(s.metrics.submitted, 1);
    }

    #[test]
    fn cyclic_admission_leaves_state_untouched() {
        let mut s = state();
        let config = SchedulerConfig::default();
        let mut outbox = Outbox::new();
        let b = TaskId::generate();

        let first = admission(noop("a"), vec![b]);
        let a = first.task_id;
        s.admit(first, &config, Utc::now(), &mut outbox).unwrap();

        let mut second = admission(noop("b"), vec![a]);
        second.task_id = b;
        let err = s.admit(second, &config, Utc::now(), &mut outbox).unwrap_err();

        assert!(matches!(err, SchedulerError::InvalidInput(_)));
        assert!(s.status(b).is_none());
        assert!(s.graph.dependencies(b).is_empty());
        assert_eq!(s.queue.len(), 1);
    }

    #[test]
    fn duplicate_id_is_rejected() {
        let mut s = state();
        let config = SchedulerConfig::default();
        let mut outbox = Outbox::new();
        let first = admission(noop("a"), vec![]);
        let id = first.task_id;
        s.admit(first, &config, Utc::now(), &mut outbox).unwrap();

        let mut again = admission(noop("a"), vec![]);
        again.task_id = id;
        assert!(s.admit(again, &config, Utc::now(), &mut outbox).is_err());
    }

    #[test]
    fn full_queue_is_resource_exhausted() {
        let mut s = state();
        let config = SchedulerConfig::default().with_max_queue_size(1);
        let mut outbox = Outbox::new();
        s.admit(admission(noop("a"), vec![]), &config, Utc::now(), &mut outbox)
            .unwrap();

        let err = s
            .admit(admission(noop("b"), vec![]), &config, Utc::now(), &mut outbox)
            .unwrap_err();
        assert!(matches!(err, SchedulerError::ResourceExhausted(_)));
    }

    #[test]
    fn stale_attempt_result_is_ignored() {
        let mut s = state();
        let mut outbox = Outbox::new();
        let id = s
            .admit(admission(noop("a"), vec![]), &SchedulerConfig::default(), Utc::now(), &mut outbox)
            .unwrap();

        // never dispatched: attempt 1 is stale
        let timer = s.finish_attempt(
            id,
            1,
            Ok(json!(1)),
            Duration::ZERO,
            Utc::now(),
            &DefaultDecider::default(),
            &mut outbox,
        );
        assert!(timer.is_none());
        assert_eq!(s.status(id).unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn cancel_frees_queue_and_is_not_repeatable() {
        let mut s = state();
        let mut outbox = Outbox::new();
        let id = s
            .admit(admission(noop("a"), vec![]), &SchedulerConfig::default(), Utc::now(), &mut outbox)
            .unwrap();
        let token = s.tasks[&id].token.clone();

        assert!(s.cancel(id, "user", Utc::now(), &mut outbox));
        assert!(token.is_cancelled());
        assert!(s.queue.is_empty());
        assert_eq!(s.status(id).unwrap().status, TaskStatus::Cancelled);

        assert!(!s.cancel(id, "user", Utc::now(), &mut outbox));
        assert_eq!(s.metrics.cancelled, 1);
    }

    #[test]
    fn retry_turns_into_cancel_while_stopping() {
        let (updates, rx) = mpsc::unbounded_channel();
        let mut s = SchedulerState::new(rx);
        let mut outbox = Outbox::new();
        s.register_worker(WorkerConfig::new("w", 1), &mut outbox).unwrap();
        let id = s
            .admit(admission(noop("a"), vec![]), &SchedulerConfig::default(), Utc::now(), &mut outbox)
            .unwrap();
        s.dispatch(Utc::now(), &updates, &mut outbox);
        s.lifecycle = Lifecycle::Stopping;

        let timer = s.finish_attempt(
            id,
            1,
            Err(SchedulerError::execution("boom")),
            Duration::ZERO,
            Utc::now(),
            &DefaultDecider::default(),
            &mut outbox,
        );

        assert!(timer.is_none());
        let task = s.status(id).unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert_eq!(task.last_error, Some(SchedulerError::cancelled(STOPPED_REASON)));
    }

    #[test]
    fn updates_sent_just_before_returning_reach_the_record() {
        let (updates, rx) = mpsc::unbounded_channel();
        let mut s = SchedulerState::new(rx);
        let mut outbox = Outbox::new();
        s.register_worker(WorkerConfig::new("w", 1), &mut outbox).unwrap();
        let id = s
            .admit(admission(noop("quick"), vec![]), &SchedulerConfig::default(), Utc::now(), &mut outbox)
            .unwrap();
        s.dispatch(Utc::now(), &updates, &mut outbox);

        // no tick in between: the result arrives right behind the updates
        updates
            .send(ContextUpdate::Progress { task_id: id, attempt: 1, progress: 50.0 })
            .unwrap();
        updates
            .send(ContextUpdate::Metadata {
                task_id: id,
                attempt: 1,
                key: "rows".into(),
                value: json!(7),
            })
            .unwrap();
        let mut outbox = Outbox::new();
        s.finish_attempt(
            id,
            1,
            Ok(json!("done")),
            Duration::ZERO,
            Utc::now(),
            &DefaultDecider::default(),
            &mut outbox,
        );

        let task = s.status(id).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.metadata.get("rows"), Some(&json!(7)));

        let (tx, mut events) = tokio::sync::broadcast::channel(8);
        outbox.publish(&tx, &[]);
        let mut names = Vec::new();
        while let Ok(event) = events.try_recv() {
            names.push(event.name());
        }
        assert_eq!(names, vec!["task_progress", "task_completed"]);
    }

    #[test]
    fn removing_worker_cancels_its_tasks_and_capacity() {
        let (updates, rx) = mpsc::unbounded_channel();
        let mut s = SchedulerState::new(rx);
        let config = SchedulerConfig::default();
        let mut outbox = Outbox::new();
        s.register_worker(
            WorkerConfig::new("w", 2).with_capacity(ResourceKind::Cpu, 2.0),
            &mut outbox,
        )
        .unwrap();
        for name in ["a", "b"] {
            let def = noop(name).with_resource(ResourceKind::Cpu, 1.0);
            s.admit(admission(def, vec![]), &config, Utc::now(), &mut outbox)
                .unwrap();
        }
        assert_eq!(s.dispatch(Utc::now(), &updates, &mut outbox).len(), 2);

        let cancelled = s
            .remove_worker(&WorkerId::from("w"), Utc::now(), &mut outbox)
            .unwrap();

        assert_eq!(cancelled, 2);
        assert_eq!(s.running_count(), 0);
        assert_eq!(s.global.usage().get(ResourceKind::Cpu), 0.0);
        assert_eq!(s.global.capacity().get(ResourceKind::Cpu), 0.0);
        assert!(matches!(
            s.remove_worker(&WorkerId::from("w"), Utc::now(), &mut outbox),
            Err(SchedulerError::WorkerNotFound(_))
        ));
    }

    #[test]
    fn worker_registration_refreshes_resource_scores() {
        let mut s = state();
        let mut outbox = Outbox::new();
        let def = noop("gpu").with_resource(ResourceKind::Gpu, 1.0);
        let id = s
            .admit(admission(def, vec![]), &SchedulerConfig::default(), Utc::now(), &mut outbox)
            .unwrap();
        assert_eq!(s.queue.get(id).unwrap().resource_score, -50.0);

        s.register_worker(
            WorkerConfig::new("w", 1).with_capacity(ResourceKind::Gpu, 1.0),
            &mut outbox,
        )
        .unwrap();
        assert_eq!(s.queue.get(id).unwrap().resource_score, 10.0);
    }
}
