//! TaskContext - タスク本体に渡す実行コンテキスト
//!
//! タスク本体はスケジューラの状態に直接触れない。進捗とメタデータは
//! このコンテキスト経由でチャネルに積まれ、次の tick（または完了時）に反映される。
//!
//! Cancellation is advisory. The token fires on explicit cancellation,
//! timeout, worker removal or shutdown, but the scheduler does not stop the
//! body: a well-behaved body polls `is_cancelled()` or awaits `cancelled()`.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::ids::TaskId;

/// Update sent from a running body back to the scheduler.
#[derive(Debug, Clone)]
pub(crate) enum ContextUpdate {
    Progress {
        task_id: TaskId,
        attempt: u32,
        progress: f64,
    },
    Metadata {
        task_id: TaskId,
        attempt: u32,
        key: String,
        value: serde_json::Value,
    },
}

impl ContextUpdate {
    pub(crate) fn task_id(&self) -> TaskId {
        match self {
            ContextUpdate::Progress { task_id, .. } | ContextUpdate::Metadata { task_id, .. } => {
                *task_id
            }
        }
    }

    pub(crate) fn attempt(&self) -> u32 {
        match self {
            ContextUpdate::Progress { attempt, .. } | ContextUpdate::Metadata { attempt, .. } => {
                *attempt
            }
        }
    }
}

/// Per-attempt execution context.
#[derive(Debug, Clone)]
pub struct TaskContext {
    task_id: TaskId,
    attempt: u32,
    token: CancellationToken,
    updates: mpsc::UnboundedSender<ContextUpdate>,
}

impl TaskContext {
    pub(crate) fn new(
        task_id: TaskId,
        attempt: u32,
        token: CancellationToken,
        updates: mpsc::UnboundedSender<ContextUpdate>,
    ) -> Self {
        Self {
            task_id,
            attempt,
            token,
            updates,
        }
    }

    /// Context not connected to any scheduler. Updates are dropped.
    pub fn detached(task_id: TaskId) -> Self {
        let (updates, _) = mpsc::unbounded_channel();
        Self::new(task_id, 1, CancellationToken::new(), updates)
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    /// 1-based attempt number.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Report progress in percent. Values are clamped to `[0, 100]`.
    pub fn report_progress(&self, progress: f64) {
        let progress = if progress.is_nan() {
            0.0
        } else {
            progress.clamp(0.0, 100.0)
        };
        // receiver gone means the scheduler was dropped; nothing to report to
        let _ = self.updates.send(ContextUpdate::Progress {
            task_id: self.task_id,
            attempt: self.attempt,
            progress,
        });
    }

    /// Attach a metadata entry to the task record.
    pub fn set_metadata(&self, key: impl Into<String>, value: serde_json::Value) {
        let _ = self.updates.send(ContextUpdate::Metadata {
            task_id: self.task_id,
            attempt: self.attempt,
            key: key.into(),
            value,
        });
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the attempt is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_clamped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = TaskContext::new(TaskId::generate(), 2, CancellationToken::new(), tx);

        ctx.report_progress(150.0);
        ctx.report_progress(-3.0);

        let mut seen = Vec::new();
        while let Ok(ContextUpdate::Progress { progress, attempt, .. }) = rx.try_recv() {
            assert_eq!(attempt, 2);
            seen.push(progress);
        }
        assert_eq!(seen, vec![100.0, 0.0]);
    }

    #[test]
    fn detached_context_swallows_updates() {
        let ctx = TaskContext::detached(TaskId::generate());
        ctx.report_progress(10.0);
        ctx.set_metadata("k", serde_json::json!(1));
        assert!(!ctx.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_after_token_fires() {
        let token = CancellationToken::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let ctx = TaskContext::new(TaskId::generate(), 1, token.clone(), tx);

        token.cancel();
        ctx.cancelled().await;
        assert!(ctx.is_cancelled());
    }
}
