//! The scheduler aggregate and its public API.
//!
//! `Scheduler` is a cheap handle (`Clone` around an `Arc`). All mutable
//! state sits in one `SchedulerState` behind a `tokio::sync::Mutex`; every
//! operation locks, runs a synchronous transition, unlocks, and only then
//! publishes events, runs hooks and spawns bodies.

use std::collections::HashSet;
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::{broadcast, mpsc, Mutex, Notify};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use super::builder::SchedulerBuilder;
use super::config::SchedulerConfig;
use super::dispatch::Launch;
use super::loops;
use super::metrics::{MetricsCollector, SchedulerMetrics};
use super::outbox::Outbox;
use super::report::PerformanceReport;
use super::state::{
    Admission, Lifecycle, RetryTimer, SchedulerState, SHUTDOWN_REASON, STOPPED_REASON,
};
use crate::domain::{
    ContextUpdate, Decider, SchedulerError, SchedulerEvent, SubmitOptions, TaskDefinition, TaskId,
    TaskInstance, TaskStatus, WorkerConfig, WorkerId,
};
use crate::ports::{Clock, EventSink, IdGenerator, MemoryPressureProbe};
use crate::queue::QueuedTask;

/// Handle to a running (or not yet started) scheduler.
///
/// # Example
/// ```ignore
/// let scheduler = Scheduler::builder()
///     .worker(WorkerConfig::new("w1", 4).with_capacity(ResourceKind::Cpu, 4.0))
///     .build()?;
/// scheduler.start().await?;
///
/// let id = scheduler
///     .submit_task(definition, json!({"n": 1}), SubmitOptions::new())
///     .await?;
/// let done = scheduler.wait_for_task(id).await?;
/// ```
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<SchedulerInner>,
}

pub(crate) struct SchedulerInner {
    pub config: SchedulerConfig,
    pub state: Mutex<SchedulerState>,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub decider: Arc<dyn Decider>,
    pub sinks: Vec<Arc<dyn EventSink>>,
    pub pressure: Option<Arc<dyn MemoryPressureProbe>>,
    pub events: broadcast::Sender<SchedulerEvent>,
    pub updates: mpsc::UnboundedSender<ContextUpdate>,
    /// Signalled after every committed transition; graceful waits poll on it.
    pub changed: Notify,
    pub shutdown: CancellationToken,
}

/// Collaborators assembled by the builder.
pub(crate) struct Parts {
    pub config: SchedulerConfig,
    pub clock: Arc<dyn Clock>,
    pub ids: Arc<dyn IdGenerator>,
    pub decider: Arc<dyn Decider>,
    pub sinks: Vec<Arc<dyn EventSink>>,
    pub pressure: Option<Arc<dyn MemoryPressureProbe>>,
}

impl Scheduler {
    pub fn builder() -> SchedulerBuilder {
        SchedulerBuilder::new()
    }

    pub(crate) fn from_parts(
        parts: Parts,
        workers: Vec<WorkerConfig>,
    ) -> Result<Self, SchedulerError> {
        let (updates, updates_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(parts.config.event_channel_capacity);

        let mut state = SchedulerState::new(updates_rx);
        state.metrics = MetricsCollector::with_window(parts.config.throughput_window());
        let mut outbox = Outbox::new();
        for worker in workers {
            state.register_worker(worker, &mut outbox)?;
        }

        let scheduler = Self {
            inner: Arc::new(SchedulerInner {
                state: Mutex::new(state),
                config: parts.config,
                clock: parts.clock,
                ids: parts.ids,
                decider: parts.decider,
                sinks: parts.sinks,
                pressure: parts.pressure,
                events,
                updates,
                changed: Notify::new(),
                shutdown: CancellationToken::new(),
            }),
        };
        scheduler.inner.commit(outbox);
        Ok(scheduler)
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.inner.config
    }

    /// Start the background loops. A scheduler starts once.
    pub async fn start(&self) -> Result<(), SchedulerError> {
        let mut outbox = Outbox::new();
        {
            let mut state = self.inner.state.lock().await;
            if state.lifecycle != Lifecycle::Created {
                return Err(SchedulerError::InvalidState(format!(
                    "cannot start a scheduler in state {:?}",
                    state.lifecycle
                )));
            }
            state.lifecycle = Lifecycle::Running;
            state.loops = loops::spawn_all(&self.inner);
            outbox.event(SchedulerEvent::SchedulerStarted {
                at: self.inner.clock.now(),
            });
        }
        info!(
            tick_ms = self.inner.config.tick_interval_ms,
            "scheduler started"
        );
        self.inner.commit(outbox);
        Ok(())
    }

    /// Stop the scheduler.
    ///
    /// Queued and retrying tasks are cancelled at once. Running tasks get
    /// `graceful_timeout` to finish; whatever is still running afterwards is
    /// force-cancelled.
    pub async fn stop(&self, graceful_timeout: Duration) -> Result<(), SchedulerError> {
        let inner = &self.inner;
        let mut outbox = Outbox::new();
        let mut cancelled;
        {
            let mut state = inner.state.lock().await;
            if matches!(state.lifecycle, Lifecycle::Stopping | Lifecycle::Stopped) {
                return Err(SchedulerError::InvalidState(
                    "scheduler is already stopping".into(),
                ));
            }
            state.lifecycle = Lifecycle::Stopping;
            cancelled = state.cancel_all(
                &[TaskStatus::Pending, TaskStatus::Retrying],
                STOPPED_REASON,
                inner.clock.now(),
                &mut outbox,
            );
        }
        inner.commit(outbox);
        inner.shutdown.cancel();

        inner
            .wait_until(grace_deadline(graceful_timeout), |s| s.running_count() == 0)
            .await;

        let mut outbox = Outbox::new();
        let handles = {
            let mut state = inner.state.lock().await;
            let forced = state.cancel_all(
                &[TaskStatus::Running],
                SHUTDOWN_REASON,
                inner.clock.now(),
                &mut outbox,
            );
            if forced > 0 {
                warn!(forced, "force-cancelled running tasks at shutdown");
            }
            cancelled += forced;
            state.lifecycle = Lifecycle::Stopped;
            outbox.event(SchedulerEvent::SchedulerStopped {
                at: inner.clock.now(),
                cancelled,
            });
            std::mem::take(&mut state.loops)
        };
        inner.commit(outbox);

        for handle in handles {
            if let Err(err) = handle.await {
                warn!(%err, "background loop ended abnormally");
            }
        }
        info!(cancelled, "scheduler stopped");
        Ok(())
    }

    pub async fn register_worker(&self, config: WorkerConfig) -> Result<(), SchedulerError> {
        let mut outbox = Outbox::new();
        self.inner
            .state
            .lock()
            .await
            .register_worker(config, &mut outbox)?;
        self.inner.commit(outbox);
        Ok(())
    }

    /// Drain and remove a worker.
    ///
    /// No new task is dispatched to it. Its running tasks get
    /// `graceful_timeout` to finish; the rest are cancelled with reason
    /// "worker unregistered".
    pub async fn unregister_worker(
        &self,
        worker_id: &WorkerId,
        graceful_timeout: Duration,
    ) -> Result<(), SchedulerError> {
        let inner = &self.inner;
        {
            let mut state = inner.state.lock().await;
            let worker = state
                .workers
                .get_mut(worker_id)
                .ok_or_else(|| SchedulerError::WorkerNotFound(worker_id.clone()))?;
            worker.start_draining();
            debug!(%worker_id, active = worker.active(), "worker draining");
        }

        inner
            .wait_until(grace_deadline(graceful_timeout), |s| {
                s.workers.get(worker_id).is_none_or(|w| w.active() == 0)
            })
            .await;

        let mut outbox = Outbox::new();
        inner
            .state
            .lock()
            .await
            .remove_worker(worker_id, inner.clock.now(), &mut outbox)?;
        inner.commit(outbox);
        Ok(())
    }

    /// Admit a task.
    ///
    /// # Errors
    /// - `InvalidInput`: malformed definition, failed validator, duplicate
    ///   id, or dependencies that would close a cycle
    /// - `ResourceExhausted`: the queue is full
    /// - `InvalidState`: the scheduler is stopping or stopped
    pub async fn submit_task(
        &self,
        definition: impl Into<Arc<TaskDefinition>>,
        input: Value,
        options: SubmitOptions,
    ) -> Result<TaskId, SchedulerError> {
        let inner = &self.inner;
        let definition: Arc<TaskDefinition> = definition.into();
        definition.check()?;
        inner.state.lock().await.check_capacity(&inner.config)?;

        // validators may be slow; never hold the lock across them
        if let Some(validator) = &definition.validator {
            validator.validate(&input).await.map_err(|reason| {
                SchedulerError::invalid_input(format!(
                    "task '{}' rejected by validator: {reason}",
                    definition.name
                ))
            })?;
        }

        let task_id = options
            .task_id
            .unwrap_or_else(|| inner.ids.generate_task_id());
        let mut seen = HashSet::new();
        let dependencies: Vec<TaskId> = definition
            .dependencies
            .iter()
            .chain(options.dependencies.iter())
            .copied()
            .filter(|dep| seen.insert(*dep))
            .collect();

        let admission = Admission {
            task_id,
            priority: options.priority.unwrap_or(definition.priority),
            definition,
            input,
            dependencies,
        };

        let mut outbox = Outbox::new();
        let task_id = inner.state.lock().await.admit(
            admission,
            &inner.config,
            inner.clock.now(),
            &mut outbox,
        )?;
        inner.commit(outbox);
        Ok(task_id)
    }

    /// Cancel a non-terminal task. Returns false for unknown or terminal ids.
    pub async fn cancel_task(&self, task_id: TaskId, reason: &str) -> bool {
        let mut outbox = Outbox::new();
        let cancelled = self.inner.state.lock().await.cancel(
            task_id,
            reason,
            self.inner.clock.now(),
            &mut outbox,
        );
        self.inner.commit(outbox);
        cancelled
    }

    /// Snapshot of a live or retained task.
    pub async fn get_task_status(&self, task_id: TaskId) -> Option<TaskInstance> {
        self.inner.state.lock().await.status(task_id)
    }

    pub async fn get_metrics(&self) -> SchedulerMetrics {
        let mut state = self.inner.state.lock().await;
        let gauges = state.gauges();
        state.metrics.snapshot(self.inner.clock.now(), gauges)
    }

    pub async fn get_performance_report(&self) -> PerformanceReport {
        let mut state = self.inner.state.lock().await;
        PerformanceReport::build(&mut state, &self.inner.config, self.inner.clock.now())
    }

    /// Subscribe to scheduler events. Slow receivers lag, they never block
    /// the scheduler.
    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.events.subscribe()
    }

    /// Wait until the task reaches a terminal state and return its record.
    ///
    /// Fails with `InvalidInput` for unknown (or already evicted) ids.
    pub async fn wait_for_task(&self, task_id: TaskId) -> Result<TaskInstance, SchedulerError> {
        let mut events = self.subscribe();
        loop {
            match self.get_task_status(task_id).await {
                None => {
                    return Err(SchedulerError::invalid_input(format!(
                        "unknown task {task_id}"
                    )));
                }
                Some(task) if task.status.is_terminal() => return Ok(task),
                Some(_) => {}
            }

            loop {
                match events.recv().await {
                    Ok(event) if event.finishes(task_id) => break,
                    Ok(_) => {}
                    // missed events; re-read the record
                    Err(broadcast::error::RecvError::Lagged(_)) => break,
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(SchedulerError::InvalidState(
                            "event channel closed".into(),
                        ));
                    }
                }
            }
        }
    }

    /// Queue entries in dispatch order.
    pub async fn queued_tasks(&self) -> Vec<QueuedTask> {
        self.inner.state.lock().await.queue.iter().cloned().collect()
    }

    /// Run one scheduling tick now.
    pub async fn tick(&self) {
        self.inner.tick().await;
    }

    /// Run one aging pass now. Returns how many tasks were promoted.
    pub async fn age_priorities(&self) -> usize {
        self.inner.age_priorities().await
    }

    /// Run one deadlock pass now. Returns the cancelled tasks.
    pub async fn detect_deadlocks(&self) -> Vec<TaskId> {
        self.inner.detect_deadlocks().await
    }

    /// Run one maintenance pass now (shedding, retention, trend sample).
    pub async fn run_maintenance(&self) {
        self.inner.maintain().await;
    }

    #[cfg(test)]
    pub(crate) fn inner(&self) -> &Arc<SchedulerInner> {
        &self.inner
    }
}

/// Deadline for a graceful wait. A grace too large to represent
/// (e.g. `Duration::MAX`) means no deadline.
fn grace_deadline(graceful_timeout: Duration) -> Option<Instant> {
    Instant::now().checked_add(graceful_timeout)
}

impl SchedulerInner {
    /// Publish what a transition produced and wake graceful waiters.
    pub fn commit(&self, outbox: Outbox) {
        if !outbox.is_empty() {
            outbox.publish(&self.events, &self.sinks);
        }
        self.changed.notify_waiters();
    }

    /// Wait until `done` holds or the deadline passes. Returns the last
    /// evaluation of `done`. `None` waits without a deadline.
    pub async fn wait_until<F>(&self, deadline: Option<Instant>, done: F) -> bool
    where
        F: Fn(&SchedulerState) -> bool,
    {
        loop {
            let mut notified = pin!(self.changed.notified());
            notified.as_mut().enable();

            if done(&*self.state.lock().await) {
                return true;
            }
            match deadline {
                Some(deadline) => {
                    if tokio::time::timeout_at(deadline, notified).await.is_err() {
                        return done(&*self.state.lock().await);
                    }
                }
                None => notified.await,
            }
        }
    }

    pub async fn tick(self: &Arc<Self>) {
        let mut outbox = Outbox::new();
        let launches = {
            let mut state = self.state.lock().await;
            state.apply_updates(&mut outbox);
            if state.accepts_submissions() {
                state.dispatch(self.clock.now(), &self.updates, &mut outbox)
            } else {
                Vec::new()
            }
        };
        self.commit(outbox);

        for launch in launches {
            self.launch(launch);
        }
    }

    fn launch(self: &Arc<Self>, launch: Launch) {
        let inner = Arc::clone(self);
        let (task_id, attempt) = (launch.task_id, launch.attempt);
        let span = tracing::debug_span!("attempt", %task_id, attempt);
        tokio::spawn(
            async move {
                let started = Instant::now();
                let result = launch.run().await;
                inner
                    .finish_attempt(task_id, attempt, result, started.elapsed())
                    .await;
            }
            .instrument(span),
        );
    }

    async fn finish_attempt(
        self: &Arc<Self>,
        task_id: TaskId,
        attempt: u32,
        result: Result<Value, SchedulerError>,
        took: Duration,
    ) {
        let mut outbox = Outbox::new();
        let retry = self.state.lock().await.finish_attempt(
            task_id,
            attempt,
            result,
            took,
            self.clock.now(),
            self.decider.as_ref(),
            &mut outbox,
        );
        self.commit(outbox);

        if let Some(timer) = retry {
            self.arm_retry(timer);
        }
    }

    /// Re-enqueue after the retry delay, then dispatch right away so the
    /// next attempt starts `delay` after the failure.
    fn arm_retry(self: &Arc<Self>, timer: RetryTimer) {
        let inner = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = tokio::time::sleep(timer.delay) => {}
            }
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let requeued = inner.state.lock().await.requeue(
                timer.task_id,
                timer.attempt,
                inner.clock.now(),
            );
            if requeued {
                debug!(task_id = %timer.task_id, "task re-enqueued");
                inner.tick().await;
            }
        });
    }

    pub async fn age_priorities(&self) -> usize {
        let promoted = self
            .state
            .lock()
            .await
            .age_priorities(&self.config, self.clock.now());
        if promoted > 0 {
            debug!(promoted, "aging pass promoted tasks");
        }
        promoted
    }

    pub async fn detect_deadlocks(&self) -> Vec<TaskId> {
        let mut outbox = Outbox::new();
        let victims = self
            .state
            .lock()
            .await
            .detect_deadlocks(self.clock.now(), &mut outbox);
        self.commit(outbox);
        victims
    }

    pub async fn maintain(&self) {
        let level = self
            .pressure
            .as_ref()
            .map(|probe| probe.level())
            .unwrap_or_default();

        let mut outbox = Outbox::new();
        {
            let mut state = self.state.lock().await;
            let now = self.clock.now();
            state.shed(level, now, &mut outbox);
            state.evict_finished(&self.config, now);
            state.sample_trend(&self.config, now);
        }
        self.commit(outbox);
    }
}

impl Drop for SchedulerInner {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
