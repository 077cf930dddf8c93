//! Scheduler configuration.
//!
//! Intervals and windows are stored in milliseconds so the JSON form stays
//! flat; the `*()` accessors return `Duration`s.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::queue::RetryPolicy;

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration for the task scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Submissions are rejected with `ResourceExhausted` once this many tasks
    /// are pending.
    ///
    /// Default: 10000
    #[serde(default = "default_max_queue_size")]
    pub max_queue_size: usize,

    /// Scheduling tick period.
    ///
    /// Default: 100ms
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Priority aging pass period.
    ///
    /// Default: 10000ms
    #[serde(default = "default_aging_interval_ms")]
    pub aging_interval_ms: u64,

    /// Deadlock detection pass period.
    ///
    /// Default: 5000ms
    #[serde(default = "default_deadlock_interval_ms")]
    pub deadlock_interval_ms: u64,

    /// Maintenance pass period (eviction, shedding, trend sampling).
    ///
    /// Default: 30000ms
    #[serde(default = "default_maintenance_interval_ms")]
    pub maintenance_interval_ms: u64,

    /// Score points added per minute of waiting by the aging pass.
    ///
    /// Default: 10.0
    #[serde(default = "default_aging_boost_per_minute")]
    pub aging_boost_per_minute: f64,

    /// Cap on the aging boost.
    ///
    /// Default: 200.0
    #[serde(default = "default_max_aging_boost")]
    pub max_aging_boost: f64,

    /// Waiting this long promotes the working priority one level.
    /// 0 disables promotion.
    ///
    /// Default: 300000ms (5 minutes)
    #[serde(default = "default_priority_promotion_after_ms")]
    pub priority_promotion_after_ms: u64,

    /// Finished records older than this are evicted.
    ///
    /// Default: 3600000ms (1 hour)
    #[serde(default = "default_retention_ms")]
    pub retention_ms: u64,

    /// At most this many finished records are kept.
    ///
    /// Default: 1000
    #[serde(default = "default_max_finished_tasks")]
    pub max_finished_tasks: usize,

    /// Window for the throughput estimate.
    ///
    /// Default: 60000ms
    #[serde(default = "default_throughput_window_ms")]
    pub throughput_window_ms: u64,

    /// Trend points kept.
    ///
    /// Default: 60
    #[serde(default = "default_trend_history_size")]
    pub trend_history_size: usize,

    /// Capacity of the broadcast channel behind `subscribe()`.
    ///
    /// Default: 1024
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Multiplier applied to `retry_delay` per retry. 1.0 keeps it constant.
    ///
    /// Default: 1.0
    #[serde(default = "default_retry_multiplier")]
    pub retry_multiplier: f64,

    /// Cap on a grown retry delay.
    ///
    /// Default: 300000ms
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Utilization above which a resource is reported as a bottleneck.
    ///
    /// Default: 0.9
    #[serde(default = "default_bottleneck_threshold")]
    pub bottleneck_threshold: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_queue_size: default_max_queue_size(),
            tick_interval_ms: default_tick_interval_ms(),
            aging_interval_ms: default_aging_interval_ms(),
            deadlock_interval_ms: default_deadlock_interval_ms(),
            maintenance_interval_ms: default_maintenance_interval_ms(),
            aging_boost_per_minute: default_aging_boost_per_minute(),
            max_aging_boost: default_max_aging_boost(),
            priority_promotion_after_ms: default_priority_promotion_after_ms(),
            retention_ms: default_retention_ms(),
            max_finished_tasks: default_max_finished_tasks(),
            throughput_window_ms: default_throughput_window_ms(),
            trend_history_size: default_trend_history_size(),
            event_channel_capacity: default_event_channel_capacity(),
            retry_multiplier: default_retry_multiplier(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            bottleneck_threshold: default_bottleneck_threshold(),
        }
    }
}

impl SchedulerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_max_queue_size(mut self, max_queue_size: usize) -> Self {
        self.max_queue_size = max_queue_size;
        self
    }

    pub fn with_tick_interval(mut self, d: Duration) -> Self {
        self.tick_interval_ms = millis(d);
        self
    }

    pub fn with_aging(mut self, boost_per_minute: f64, max_boost: f64) -> Self {
        self.aging_boost_per_minute = boost_per_minute;
        self.max_aging_boost = max_boost;
        self
    }

    pub fn with_priority_promotion_after(mut self, d: Duration) -> Self {
        self.priority_promotion_after_ms = millis(d);
        self
    }

    pub fn with_retention(mut self, window: Duration, max_finished_tasks: usize) -> Self {
        self.retention_ms = millis(window);
        self.max_finished_tasks = max_finished_tasks;
        self
    }

    pub fn with_retry_backoff(mut self, multiplier: f64, max_delay: Duration) -> Self {
        self.retry_multiplier = multiplier;
        self.retry_max_delay_ms = millis(max_delay);
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn aging_interval(&self) -> Duration {
        Duration::from_millis(self.aging_interval_ms)
    }

    pub fn deadlock_interval(&self) -> Duration {
        Duration::from_millis(self.deadlock_interval_ms)
    }

    pub fn maintenance_interval(&self) -> Duration {
        Duration::from_millis(self.maintenance_interval_ms)
    }

    /// `None` when promotion is disabled.
    pub fn priority_promotion_after(&self) -> Option<Duration> {
        (self.priority_promotion_after_ms > 0)
            .then(|| Duration::from_millis(self.priority_promotion_after_ms))
    }

    pub fn retention(&self) -> Duration {
        Duration::from_millis(self.retention_ms)
    }

    pub fn throughput_window(&self) -> Duration {
        Duration::from_millis(self.throughput_window_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::exponential(
            self.retry_multiplier,
            Duration::from_millis(self.retry_max_delay_ms),
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: &str| Err(ConfigError::Invalid(msg.to_string()));

        if self.max_queue_size == 0 {
            return invalid("max_queue_size must be > 0");
        }
        if self.tick_interval_ms == 0
            || self.aging_interval_ms == 0
            || self.deadlock_interval_ms == 0
            || self.maintenance_interval_ms == 0
        {
            return invalid("loop intervals must be > 0");
        }
        if !self.aging_boost_per_minute.is_finite() || self.aging_boost_per_minute < 0.0 {
            return invalid("aging_boost_per_minute must be a non-negative number");
        }
        if !self.max_aging_boost.is_finite() || self.max_aging_boost < 0.0 {
            return invalid("max_aging_boost must be a non-negative number");
        }
        if self.throughput_window_ms == 0 {
            return invalid("throughput_window_ms must be > 0");
        }
        if self.event_channel_capacity == 0 {
            return invalid("event_channel_capacity must be > 0");
        }
        if !self.retry_multiplier.is_finite() || self.retry_multiplier < 1.0 {
            return invalid("retry_multiplier must be >= 1.0");
        }
        if !(self.bottleneck_threshold > 0.0 && self.bottleneck_threshold <= 1.0) {
            return invalid("bottleneck_threshold must be in (0, 1]");
        }
        Ok(())
    }
}

fn millis(d: Duration) -> u64 {
    d.as_millis().min(u64::MAX as u128) as u64
}

// Default functions for serde
fn default_max_queue_size() -> usize {
    10_000
}

fn default_tick_interval_ms() -> u64 {
    100
}

fn default_aging_interval_ms() -> u64 {
    10_000
}

fn default_deadlock_interval_ms() -> u64 {
    5_000
}

fn default_maintenance_interval_ms() -> u64 {
    30_000
}

fn default_aging_boost_per_minute() -> f64 {
    10.0
}

fn default_max_aging_boost() -> f64 {
    200.0
}

fn default_priority_promotion_after_ms() -> u64 {
    300_000
}

fn default_retention_ms() -> u64 {
    3_600_000
}

fn default_max_finished_tasks() -> usize {
    1_000
}

fn default_throughput_window_ms() -> u64 {
    60_000
}

fn default_trend_history_size() -> usize {
    60
}

fn default_event_channel_capacity() -> usize {
    1_024
}

fn default_retry_multiplier() -> f64 {
    1.0
}

fn default_retry_max_delay_ms() -> u64 {
    300_000
}

fn default_bottleneck_threshold() -> f64 {
    0.9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SchedulerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
        assert_eq!(config.retry_policy(), RetryPolicy::default());
    }

    #[test]
    fn builder_pattern() {
        let config = SchedulerConfig::new()
            .with_max_queue_size(5)
            .with_tick_interval(Duration::from_millis(10))
            .with_aging(1.0, 50.0)
            .with_retention(Duration::from_secs(60), 10)
            .with_retry_backoff(2.0, Duration::from_secs(10));

        assert_eq!(config.max_queue_size, 5);
        assert_eq!(config.tick_interval_ms, 10);
        assert_eq!(config.max_aging_boost, 50.0);
        assert_eq!(config.max_finished_tasks, 10);
        assert_eq!(config.retry_policy().multiplier, 2.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_fills_in_defaults() {
        let config =
            SchedulerConfig::from_json_str(r#"{"max_queue_size": 3, "tick_interval_ms": 50}"#)
                .unwrap();
        assert_eq!(config.max_queue_size, 3);
        assert_eq!(config.tick_interval_ms, 50);
        assert_eq!(config.bottleneck_threshold, 0.9);
    }

    #[test]
    fn json_is_validated() {
        let err = SchedulerConfig::from_json_str(r#"{"max_queue_size": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = SchedulerConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn promotion_can_be_disabled() {
        let config = SchedulerConfig::new().with_priority_promotion_after(Duration::ZERO);
        assert!(config.priority_promotion_after().is_none());
    }

    #[test]
    fn validation_rejects_shrinking_backoff() {
        let config = SchedulerConfig {
            retry_multiplier: 0.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
