//! Maintenance - キューに対する定期処理
//!
//! エージング、デッドロック解消、メモリ逼迫時の間引き、終了済みレコードの
//! 保持期限管理、トレンドのサンプリングを行う。

use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::config::SchedulerConfig;
use super::outbox::Outbox;
use super::state::{elapsed, SchedulerState};
use crate::domain::{PressureLevel, SchedulerEvent, TaskId};
use crate::queue::find_cycle;
use crate::queue::scoring::{aging_boost, priority_score};

pub(crate) const DEADLOCK_REASON: &str = "deadlock resolution";

/// Promotion steps never go past `Urgent`; four steps get there from anywhere.
const MAX_PROMOTION_STEPS: u128 = 4;

impl SchedulerState {
    /// Raise scores of waiting tasks. Returns how many were promoted.
    ///
    /// Scores only move up: `max(old, fresh + boost)`.
    pub fn age_priorities(&mut self, config: &SchedulerConfig, now: DateTime<Utc>) -> usize {
        let promote_after = config.priority_promotion_after();
        let mut promoted = 0;

        let tasks = &mut self.tasks;
        for entry in self.queue.iter_mut() {
            let Some(live) = tasks.get_mut(&entry.task_id) else {
                continue;
            };
            let instance = &mut live.instance;
            let waited = elapsed(entry.enqueued_at, now);

            if let Some(after) = promote_after {
                let steps = (waited.as_millis() / after.as_millis().max(1)).min(MAX_PROMOTION_STEPS);
                let target = (0..steps).fold(instance.base_priority, |p, _| p.promoted());
                if target > instance.priority {
                    debug!(task_id = %entry.task_id, from = %instance.priority, to = %target, "priority promoted");
                    instance.priority = target;
                    promoted += 1;
                }
            }

            let fresh = priority_score(
                instance.priority,
                elapsed(instance.scheduled_at, now),
                instance.attempts,
            ) + aging_boost(waited, config.aging_boost_per_minute, config.max_aging_boost);
            entry.priority_score = entry.priority_score.max(fresh);
        }

        self.queue.resort();
        promoted
    }

    /// Break every wait-for cycle among queued tasks.
    ///
    /// One victim per cycle: the lowest working priority, then the lowest
    /// combined score, then the latest submission.
    pub fn detect_deadlocks(&mut self, now: DateTime<Utc>, outbox: &mut Outbox) -> Vec<TaskId> {
        let mut victims = Vec::new();

        while let Some(cycle) = find_cycle(&self.wait_for_graph()) {
            let Some(victim) = self.pick_victim(&cycle) else {
                break;
            };
            debug!(cycle_len = cycle.len(), task_id = %victim, "breaking dependency cycle");
            self.cancel(victim, DEADLOCK_REASON, now, outbox);
            outbox.event(SchedulerEvent::DeadlockResolved {
                cycle,
                cancelled: victim,
            });
            victims.push(victim);
        }
        victims
    }

    /// Queued task -> unresolved dependencies that are themselves queued.
    fn wait_for_graph(&self) -> HashMap<TaskId, HashSet<TaskId>> {
        let queued: HashSet<TaskId> = self.queue.iter().map(|e| e.task_id).collect();
        self.queue
            .iter()
            .filter(|e| !e.is_ready())
            .map(|e| {
                let blocked_by = e
                    .unresolved
                    .iter()
                    .copied()
                    .filter(|dep| queued.contains(dep))
                    .collect();
                (e.task_id, blocked_by)
            })
            .collect()
    }

    fn pick_victim(&self, cycle: &[TaskId]) -> Option<TaskId> {
        cycle
            .iter()
            .filter_map(|id| {
                let live = self.tasks.get(id)?;
                let entry = self.queue.get(*id)?;
                Some((live.instance.priority, entry.combined_score(), Reverse(live.seq), *id))
            })
            .min_by(|a, b| {
                a.0.cmp(&b.0)
                    .then_with(|| a.1.total_cmp(&b.1))
                    .then_with(|| a.2.cmp(&b.2))
            })
            .map(|(_, _, _, id)| id)
    }

    /// Cancel queued tasks the pressure level no longer allows.
    pub fn shed(&mut self, level: PressureLevel, now: DateTime<Utc>, outbox: &mut Outbox) -> Vec<TaskId> {
        let Some(threshold) = level.shed_up_to() else {
            return Vec::new();
        };

        let victims: Vec<TaskId> = self
            .queue
            .iter()
            .map(|e| e.task_id)
            .filter(|id| {
                self.tasks
                    .get(id)
                    .is_some_and(|live| live.instance.priority <= threshold)
            })
            .collect();
        if victims.is_empty() {
            return victims;
        }

        let reason = format!("shed under {level} memory pressure");
        for id in &victims {
            self.cancel(*id, &reason, now, outbox);
        }
        outbox.event(SchedulerEvent::TasksShed {
            level,
            task_ids: victims.clone(),
        });
        victims
    }

    /// Drop finished records past retention, oldest first, and trim the
    /// history to `max_finished_tasks`.
    ///
    /// A record some live task still depends on is kept; dependency
    /// resolution reads it when that task is re-enqueued.
    pub fn evict_finished(&mut self, config: &SchedulerConfig, now: DateTime<Utc>) -> usize {
        let retention = config.retention();
        let excess = self.finished.len().saturating_sub(config.max_finished_tasks);
        let mut evicted = 0;
        let mut kept = VecDeque::with_capacity(self.finished_order.len());

        while let Some(id) = self.finished_order.pop_front() {
            let Some(task) = self.finished.get(&id) else {
                continue;
            };
            let expired = task
                .completed_at
                .is_some_and(|at| elapsed(at, now) >= retention);
            let pinned = self
                .graph
                .get_waiting_tasks(id)
                .iter()
                .any(|waiting| self.tasks.contains_key(waiting));
            if (expired || evicted < excess) && !pinned {
                self.finished.remove(&id);
                evicted += 1;
            } else {
                kept.push_back(id);
            }
        }
        self.finished_order = kept;

        if evicted > 0 {
            debug!(evicted, kept = self.finished.len(), "evicted finished tasks");
        }
        evicted
    }

    pub fn sample_trend(&mut self, config: &SchedulerConfig, now: DateTime<Utc>) {
        let gauges = self.gauges();
        self.metrics
            .sample_trend(now, gauges, config.trend_history_size);
    }
}
