//! Dispatch - 実行可能なタスクをワーカーに割り当て、本体を起動する
//!
//! # フロー
//! 1. 依存が解決済みのタスクをスコア順に並べる
//! 2. リソースが足りるワーカーのうち最もスコアの高いものを選ぶ
//! 3. 割り当てを記録し、ロック解放後に本体を spawn する

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use super::outbox::Outbox;
use super::state::SchedulerState;
use crate::domain::{
    ContextUpdate, SchedulerError, SchedulerEvent, TaskContext, TaskExecutor, TaskId, WorkerId,
};
use crate::queue::scoring::{worker_score, TaskView};

/// An attempt that was dispatched under the lock and must be spawned after
/// it is released.
pub(crate) struct Launch {
    pub task_id: TaskId,
    pub attempt: u32,
    pub executor: Arc<dyn TaskExecutor>,
    pub input: Value,
    pub context: TaskContext,
    pub timeout: Duration,
}

impl Launch {
    /// Run the body under its timeout.
    ///
    /// The body runs on its own task so a panic surfaces as an execution
    /// error instead of tearing down the caller. On timeout the attempt's
    /// token is cancelled; the body is not aborted.
    pub async fn run(self) -> Result<Value, SchedulerError> {
        let Launch {
            executor,
            input,
            context,
            timeout,
            ..
        } = self;
        let token = context.cancellation_token().clone();
        let body = tokio::spawn(async move { executor.execute(input, context).await });

        match tokio::time::timeout(timeout, body).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(SchedulerError::execution(format!(
                "task body panicked: {join_err}"
            ))),
            Err(_) => {
                token.cancel();
                Err(SchedulerError::timeout(timeout))
            }
        }
    }
}

impl SchedulerState {
    /// One dispatch pass over the queue, highest combined score first.
    ///
    /// A ready task goes to the best-scoring worker that has a free slot and
    /// room for its request, provided the global ledger can also grant it.
    /// Tasks that fit nowhere stay queued; lower-scored tasks behind them may
    /// still be dispatched.
    pub fn dispatch(
        &mut self,
        now: DateTime<Utc>,
        updates: &mpsc::UnboundedSender<ContextUpdate>,
        outbox: &mut Outbox,
    ) -> Vec<Launch> {
        let mut launches = Vec::new();
        if self.queue.is_empty() {
            return launches;
        }

        let ready: Vec<TaskId> = self
            .queue
            .iter()
            .filter(|e| e.is_ready())
            .map(|e| e.task_id)
            .collect();

        for task_id in ready {
            if !self.workers.any_free_slot() {
                break;
            }
            let Some(worker_id) = self.best_worker(task_id) else {
                continue;
            };
            if let Some(launch) = self.start(task_id, worker_id, now, updates, outbox) {
                launches.push(launch);
            }
        }
        launches
    }

    /// Highest `worker_score` among workers that can take the task.
    /// Ties go to the worker registered under the smallest id.
    fn best_worker(&self, task_id: TaskId) -> Option<WorkerId> {
        let live = self.tasks.get(&task_id)?;
        let request = &live.definition.resources;
        if !self.global.can_allocate(request) {
            return None;
        }
        let task = TaskView {
            priority: live.instance.priority,
            tags: &live.instance.tags,
            request,
        };

        let mut best: Option<(f64, &WorkerId)> = None;
        for worker in self.workers.iter().filter(|w| w.can_accept(request)) {
            let score = worker_score(worker.view(), task);
            if best.is_none_or(|(top, _)| score > top) {
                best = Some((score, worker.id()));
            }
        }
        best.map(|(_, id)| id.clone())
    }

    /// Pending -> Running on `worker_id`. Allocation is all-or-nothing.
    fn start(
        &mut self,
        task_id: TaskId,
        worker_id: WorkerId,
        now: DateTime<Utc>,
        updates: &mpsc::UnboundedSender<ContextUpdate>,
        outbox: &mut Outbox,
    ) -> Option<Launch> {
        let live = self.tasks.get_mut(&task_id)?;
        let request = live.definition.resources.clone();

        let worker = self.workers.get_mut(&worker_id)?;
        if let Err(err) = worker.assign(task_id, &request) {
            debug!(%task_id, %worker_id, %err, "worker refused task");
            return None;
        }
        if let Err(err) = self.global.allocate(&request) {
            worker.release(task_id, &request);
            debug!(%task_id, %worker_id, %err, "global ledger refused task");
            return None;
        }

        self.queue.remove(task_id);
        live.instance.start_attempt(worker_id.clone(), request, now);
        self.metrics.scheduled += 1;

        let attempt = live.instance.attempts;
        debug!(%task_id, %worker_id, attempt, "task dispatched");
        outbox.event(SchedulerEvent::TaskStarted {
            task_id,
            worker_id,
            attempt,
        });

        Some(Launch {
            task_id,
            attempt,
            executor: Arc::clone(&live.definition.executor),
            input: live.input.clone(),
            context: TaskContext::new(task_id, attempt, live.token.clone(), updates.clone()),
            timeout: live.definition.timeout,
        })
    }
}
