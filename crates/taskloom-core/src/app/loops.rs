//! Background loops: scheduling tick, priority aging, deadlock detection
//! and maintenance.
//!
//! Each loop holds only a `Weak` reference to the scheduler and exits when
//! the shutdown token fires or the scheduler is dropped. Missed ticks are
//! delayed, not bursted.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::debug;

use super::scheduler::SchedulerInner;

pub(crate) fn spawn_all(inner: &Arc<SchedulerInner>) -> Vec<JoinHandle<()>> {
    let config = &inner.config;
    vec![
        spawn_periodic(inner, "tick", config.tick_interval(), |inner| async move {
            inner.tick().await;
        }),
        spawn_periodic(inner, "aging", config.aging_interval(), |inner| async move {
            inner.age_priorities().await;
        }),
        spawn_periodic(inner, "deadlock", config.deadlock_interval(), |inner| async move {
            inner.detect_deadlocks().await;
        }),
        spawn_periodic(
            inner,
            "maintenance",
            config.maintenance_interval(),
            |inner| async move {
                inner.maintain().await;
            },
        ),
    ]
}

fn spawn_periodic<F, Fut>(
    inner: &Arc<SchedulerInner>,
    name: &'static str,
    period: Duration,
    pass: F,
) -> JoinHandle<()>
where
    F: Fn(Arc<SchedulerInner>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let weak = Arc::downgrade(inner);
    let shutdown = inner.shutdown.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately; skip it
        interval.tick().await;
        debug!(loop_name = name, period_ms = period.as_millis() as u64, "loop started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }
            let Some(inner) = weak.upgrade() else {
                break;
            };
            pass(inner).await;
        }

        debug!(loop_name = name, "loop stopped");
    })
}
