//! Performance report: metrics plus per-worker load, queue statistics,
//! bottlenecks and recent trend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::SchedulerConfig;
use super::metrics::{SchedulerMetrics, TrendPoint};
use super::state::{elapsed, SchedulerState};
use crate::domain::{ResourceKind, TaskStatus};
use crate::workers::WorkerLoad;

/// Trend points included in a report.
pub const REPORT_TREND_POINTS: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueStats {
    pub length: usize,
    /// Queued with every dependency completed.
    pub ready: usize,
    /// Queued and still waiting on a dependency.
    pub blocked: usize,
    pub retrying: usize,
    pub running: usize,
    pub avg_wait_ms: u64,
    pub oldest_wait_ms: u64,
}

/// A resource whose global utilization is above the bottleneck threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub resource: ResourceKind,
    pub utilization: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceReport {
    pub generated_at: DateTime<Utc>,
    pub metrics: SchedulerMetrics,
    pub workers: Vec<WorkerLoad>,
    pub queue: QueueStats,
    pub bottlenecks: Vec<Bottleneck>,
    pub trend: Vec<TrendPoint>,
}

impl PerformanceReport {
    pub(crate) fn build(
        state: &mut SchedulerState,
        config: &SchedulerConfig,
        now: DateTime<Utc>,
    ) -> Self {
        let gauges = state.gauges();
        let metrics = state.metrics.snapshot(now, gauges);

        let waits: Vec<u64> = state
            .queue
            .iter()
            .map(|e| elapsed(e.enqueued_at, now).as_millis() as u64)
            .collect();
        let ready = state.queue.iter().filter(|e| e.is_ready()).count();
        let queue = QueueStats {
            length: state.queue.len(),
            ready,
            blocked: state.queue.len() - ready,
            retrying: state.ids_with_status(TaskStatus::Retrying).len(),
            running: state.running_count(),
            avg_wait_ms: if waits.is_empty() {
                0
            } else {
                waits.iter().sum::<u64>() / waits.len() as u64
            },
            oldest_wait_ms: waits.iter().copied().max().unwrap_or(0),
        };

        let bottlenecks = metrics
            .resource_utilization
            .iter()
            .filter(|(_, u)| **u > config.bottleneck_threshold)
            .map(|(resource, utilization)| Bottleneck {
                resource: *resource,
                utilization: *utilization,
            })
            .collect();

        Self {
            generated_at: now,
            workers: state.workers.loads(),
            queue,
            bottlenecks,
            trend: state.metrics.recent_trend(REPORT_TREND_POINTS),
            metrics,
        }
    }
}
