//! Decision - 失敗した試行の後にタスクをどうするか
//!
//! # 方針
//! - Decider は純粋関数：タスクとエラーを受け取り、次のアクションを返すだけ
//! - 決定の適用（リソース解放、再投入の予約）はスケジューラ側の責務

use std::time::Duration;

use super::errors::SchedulerError;
use super::task::TaskInstance;
use crate::queue::RetryPolicy;

/// The next action for a task whose attempt did not succeed.
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    /// Re-enqueue after `delay`.
    Retry { delay: Duration },

    /// Give up; the task ends failed.
    Fail { reason: String },

    /// The body reported cancellation; the task ends cancelled.
    Cancel { reason: String },
}

/// Decider は失敗した試行の後の次アクションを決める trait
pub trait Decider: Send + Sync {
    /// # Arguments
    /// * `task` - record of the task, `attempts` already counts the attempt that failed
    /// * `error` - what the attempt returned (or `Timeout`)
    /// * `retry_delay` - the definition's base delay
    fn decide(&self, task: &TaskInstance, error: &SchedulerError, retry_delay: Duration)
    -> Decision;
}

/// Default decider.
///
/// - `Cancelled` from the body: cancel
/// - non-retryable error: fail
/// - retry while `attempts - 1 < max_retries`, i.e. at most `max_retries + 1` attempts
/// - delay from the RetryPolicy
#[derive(Debug, Clone, Default)]
pub struct DefaultDecider {
    retry_policy: RetryPolicy,
}

impl DefaultDecider {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self { retry_policy }
    }
}

impl Decider for DefaultDecider {
    fn decide(
        &self,
        task: &TaskInstance,
        error: &SchedulerError,
        retry_delay: Duration,
    ) -> Decision {
        if let SchedulerError::Cancelled(reason) = error {
            return Decision::Cancel {
                reason: reason.clone(),
            };
        }
        if !error.is_retryable() {
            return Decision::Fail {
                reason: format!("non-retryable error: {error}"),
            };
        }

        let retries_used = task.retries_used();
        if retries_used >= task.max_retries {
            return Decision::Fail {
                reason: format!(
                    "max retries reached: {}/{} attempts",
                    task.attempts,
                    task.max_retries + 1
                ),
            };
        }

        Decision::Retry {
            delay: self.retry_policy.next_delay(retry_delay, retries_used + 1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Priority, TaskId};
    use chrono::Utc;
    use rstest::rstest;

    fn task(attempts: u32, max_retries: u32) -> TaskInstance {
        let mut t = TaskInstance::new(
            TaskId::generate(),
            "t".into(),
            Priority::Normal,
            max_retries,
            vec![],
            vec![],
            Utc::now(),
        );
        t.attempts = attempts;
        t
    }

    #[rstest]
    #[case::first_failure(1, 2, true)]
    #[case::second_failure(2, 2, true)]
    #[case::third_failure(3, 2, false)]
    #[case::no_retries(1, 0, false)]
    fn retries_until_budget_is_spent(
        #[case] attempts: u32,
        #[case] max_retries: u32,
        #[case] retry: bool,
    ) {
        let decider = DefaultDecider::default();
        let d = decider.decide(
            &task(attempts, max_retries),
            &SchedulerError::execution("boom"),
            Duration::from_millis(100),
        );
        assert_eq!(matches!(d, Decision::Retry { .. }), retry, "{d:?}");
    }

    #[test]
    fn timeout_is_retried_with_base_delay() {
        let decider = DefaultDecider::default();
        let d = decider.decide(
            &task(1, 3),
            &SchedulerError::timeout(Duration::from_secs(1)),
            Duration::from_millis(500),
        );
        assert_eq!(
            d,
            Decision::Retry {
                delay: Duration::from_millis(500)
            }
        );
    }

    #[test]
    fn backoff_grows_with_retries_used() {
        let decider = DefaultDecider::new(RetryPolicy::exponential(2.0, Duration::from_secs(60)));
        let d = decider.decide(
            &task(3, 5),
            &SchedulerError::execution("boom"),
            Duration::from_secs(1),
        );
        // third attempt failed -> third retry -> 1s * 2^2
        assert_eq!(
            d,
            Decision::Retry {
                delay: Duration::from_secs(4)
            }
        );
    }

    #[test]
    fn cancellation_from_body_is_terminal() {
        let d = DefaultDecider::default().decide(
            &task(1, 3),
            &SchedulerError::cancelled("body gave up"),
            Duration::ZERO,
        );
        assert_eq!(
            d,
            Decision::Cancel {
                reason: "body gave up".into()
            }
        );
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let d = DefaultDecider::default().decide(
            &task(1, 3),
            &SchedulerError::invalid_input("bad payload"),
            Duration::ZERO,
        );
        assert!(matches!(d, Decision::Fail { .. }));
    }
}
