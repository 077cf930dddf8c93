//! Scheduler metrics: counters, throughput window, error rate and trend
//! history.
//!
//! The collector lives inside the scheduler state and is only touched under
//! the state lock, so plain integers are enough.

use std::collections::{BTreeMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::config::SchedulerConfig;
use crate::domain::ResourceKind;

/// Point-in-time metrics snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerMetrics {
    pub submitted: u64,
    pub scheduled: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub retried: u64,
    /// Completions per second over the throughput window.
    pub throughput_per_sec: f64,
    /// `failed / (completed + failed)`, 0 when nothing finished yet.
    pub error_rate: f64,
    pub avg_execution_ms: f64,
    pub queue_length: usize,
    pub running: usize,
    pub retrying: usize,
    pub resource_utilization: BTreeMap<ResourceKind, f64>,
}

/// One sample of the trend history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub at: DateTime<Utc>,
    pub queue_length: usize,
    pub running: usize,
    pub throughput_per_sec: f64,
    pub error_rate: f64,
    pub resource_utilization: BTreeMap<ResourceKind, f64>,
}

/// Gauges that come from the rest of the scheduler state.
#[derive(Debug, Clone, Default)]
pub(crate) struct Gauges {
    pub queue_length: usize,
    pub running: usize,
    pub retrying: usize,
    pub resource_utilization: BTreeMap<ResourceKind, f64>,
}

#[derive(Debug)]
pub(crate) struct MetricsCollector {
    pub submitted: u64,
    pub scheduled: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub retried: u64,

    execution_total: Duration,
    execution_count: u64,

    /// Completion timestamps inside the throughput window.
    completions: VecDeque<DateTime<Utc>>,
    window: Duration,

    trend: VecDeque<TrendPoint>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::with_window(SchedulerConfig::default().throughput_window())
    }
}

impl MetricsCollector {
    pub fn with_window(window: Duration) -> Self {
        Self {
            submitted: 0,
            scheduled: 0,
            completed: 0,
            failed: 0,
            cancelled: 0,
            retried: 0,
            execution_total: Duration::ZERO,
            execution_count: 0,
            completions: VecDeque::new(),
            window,
            trend: VecDeque::new(),
        }
    }

    /// 完了時刻を記録し、ウィンドウ外の古い記録はここで捨てる
    pub fn record_completion(&mut self, at: DateTime<Utc>, took: Duration) {
        self.completed += 1;
        self.execution_total = self.execution_total.saturating_add(took);
        self.execution_count += 1;
        self.completions.push_back(at);
        self.prune(at);
    }

    pub fn record_failure(&mut self) {
        self.failed += 1;
    }

    pub fn record_cancellation(&mut self) {
        self.cancelled += 1;
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let window = chrono::Duration::from_std(self.window).unwrap_or(chrono::Duration::MAX);
        while let Some(front) = self.completions.front() {
            if now.signed_duration_since(*front) > window {
                self.completions.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn throughput(&mut self, now: DateTime<Utc>) -> f64 {
        self.prune(now);
        let secs = self.window.as_secs_f64();
        if secs <= 0.0 {
            return 0.0;
        }
        self.completions.len() as f64 / secs
    }

    pub fn error_rate(&self) -> f64 {
        let finished = self.completed + self.failed;
        if finished == 0 {
            0.0
        } else {
            self.failed as f64 / finished as f64
        }
    }

    pub fn avg_execution_ms(&self) -> f64 {
        if self.execution_count == 0 {
            0.0
        } else {
            self.execution_total.as_secs_f64() * 1000.0 / self.execution_count as f64
        }
    }

    pub fn snapshot(&mut self, now: DateTime<Utc>, gauges: Gauges) -> SchedulerMetrics {
        SchedulerMetrics {
            submitted: self.submitted,
            scheduled: self.scheduled,
            completed: self.completed,
            failed: self.failed,
            cancelled: self.cancelled,
            retried: self.retried,
            throughput_per_sec: self.throughput(now),
            error_rate: self.error_rate(),
            avg_execution_ms: self.avg_execution_ms(),
            queue_length: gauges.queue_length,
            running: gauges.running,
            retrying: gauges.retrying,
            resource_utilization: gauges.resource_utilization,
        }
    }

    /// Append a trend point, dropping the oldest beyond `capacity`.
    pub fn sample_trend(&mut self, now: DateTime<Utc>, gauges: Gauges, capacity: usize) {
        let point = TrendPoint {
            at: now,
            queue_length: gauges.queue_length,
            running: gauges.running,
            throughput_per_sec: self.throughput(now),
            error_rate: self.error_rate(),
            resource_utilization: gauges.resource_utilization,
        };
        self.trend.push_back(point);
        while self.trend.len() > capacity {
            self.trend.pop_front();
        }
    }

    /// Most recent `n` trend points, oldest first.
    pub fn recent_trend(&self, n: usize) -> Vec<TrendPoint> {
        let skip = self.trend.len().saturating_sub(n);
        self.trend.iter().skip(skip).cloned().collect()
    }
}
