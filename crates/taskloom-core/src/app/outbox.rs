//! Outbox: events and hook calls collected during a state transition.
//!
//! Everything that notifies the outside world is queued here while the
//! state lock is held and delivered by `Outbox::publish` after it is
//! released. A slow subscriber or hook can therefore never stall a tick.

use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::domain::{SchedulerError, SchedulerEvent, TaskHooks, TaskId};
use crate::ports::EventSink;

pub(crate) enum HookCall {
    Progress {
        hooks: Arc<dyn TaskHooks>,
        task_id: TaskId,
        progress: f64,
    },
    Retry {
        hooks: Arc<dyn TaskHooks>,
        task_id: TaskId,
        attempt: u32,
        error: SchedulerError,
    },
}

#[derive(Default)]
pub(crate) struct Outbox {
    events: Vec<SchedulerEvent>,
    hooks: Vec<HookCall>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event(&mut self, event: SchedulerEvent) {
        self.events.push(event);
    }

    pub fn hook(&mut self, call: HookCall) {
        self.hooks.push(call);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty() && self.hooks.is_empty()
    }

    /// Deliver to hooks, sinks and broadcast subscribers, in that order.
    pub fn publish(self, sender: &broadcast::Sender<SchedulerEvent>, sinks: &[Arc<dyn EventSink>]) {
        for call in self.hooks {
            match call {
                HookCall::Progress {
                    hooks,
                    task_id,
                    progress,
                } => hooks.on_progress(task_id, progress),
                HookCall::Retry {
                    hooks,
                    task_id,
                    attempt,
                    error,
                } => hooks.on_retry(task_id, attempt, &error),
            }
        }

        for event in self.events {
            log_event(&event);
            for sink in sinks {
                sink.emit(&event);
            }
            // no receivers is fine
            let _ = sender.send(event);
        }
    }
}

fn log_event(event: &SchedulerEvent) {
    match event {
        SchedulerEvent::DeadlockResolved { cycle, cancelled } => {
            warn!(cycle_len = cycle.len(), %cancelled, "deadlock resolved");
        }
        SchedulerEvent::TasksShed { level, task_ids } => {
            warn!(pressure = %level, shed = task_ids.len(), "shed queued tasks under memory pressure");
        }
        SchedulerEvent::SchedulerStarted { .. } | SchedulerEvent::SchedulerStopped { .. } => {
            info!(event = event.name(), "scheduler lifecycle");
        }
        SchedulerEvent::TaskProgress { .. } => {}
        _ => debug!(event = event.name(), task_id = ?event.task_id(), "event"),
    }
}
