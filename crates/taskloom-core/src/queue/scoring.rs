//! Scoring - ディスパッチ用のスコア計算（純粋関数のみ）
//!
//! - `priority_score`: priority weight, plus waiting time, minus failed attempts
//! - `resource_score`: can the request be satisfied right now?
//! - `worker_score`: how well a worker fits a task (0..=100)

use std::time::Duration;

use super::ledger::ResourceLedger;
use crate::domain::{Priority, Resources, WorkerConfig};

/// Age contribution is capped at this many points (one per minute waited).
pub const MAX_AGE_POINTS: f64 = 100.0;
/// Subtracted per attempt already made.
pub const ATTEMPT_PENALTY: f64 = 50.0;

pub const SATISFIABLE_POINTS: f64 = 10.0;
pub const UNSATISFIABLE_PENALTY: f64 = 50.0;

pub const PRIORITY_MATCH_POINTS: f64 = 30.0;
pub const SPECIALIZATION_POINTS: f64 = 20.0;
pub const FIT_POINTS: f64 = 25.0;
pub const LOAD_POINTS: f64 = 25.0;

/// `weight(priority) + min(100, age_ms / 60000) - 50 * attempts`
pub fn priority_score(priority: Priority, age: Duration, attempts: u32) -> f64 {
    let age_points = (age.as_millis() as f64 / 60_000.0).min(MAX_AGE_POINTS);
    priority.weight() + age_points - ATTEMPT_PENALTY * attempts as f64
}

/// +10 per requested kind the global ledger can satisfy now, -50 per kind it
/// cannot. An empty request counts as one satisfiable requirement.
pub fn resource_score(request: &Resources, global: &ResourceLedger) -> f64 {
    let mut requested = request.iter().filter(|(_, amount)| *amount > 0.0).peekable();
    if requested.peek().is_none() {
        return SATISFIABLE_POINTS;
    }
    requested
        .map(|(kind, amount)| {
            if global.fits(kind, amount) {
                SATISFIABLE_POINTS
            } else {
                -UNSATISFIABLE_PENALTY
            }
        })
        .sum()
}

/// Aging boost: `min(max_boost, wait_minutes * per_minute)`.
pub fn aging_boost(wait: Duration, per_minute: f64, max_boost: f64) -> f64 {
    let minutes = wait.as_secs_f64() / 60.0;
    (minutes * per_minute).clamp(0.0, max_boost.max(0.0))
}

/// What the scorer needs to know about one worker.
#[derive(Debug, Clone, Copy)]
pub struct WorkerView<'a> {
    pub config: &'a WorkerConfig,
    pub ledger: &'a ResourceLedger,
    pub active: usize,
}

/// What the scorer needs to know about one task.
#[derive(Debug, Clone, Copy)]
pub struct TaskView<'a> {
    pub priority: Priority,
    pub tags: &'a [String],
    pub request: &'a Resources,
}

/// Worker/task fit, higher is better.
///
/// - +30 if the worker's priority list names the task's priority
/// - up to +20 for specialization tags shared with the task's tags
/// - up to +25 for resource fit (tight fits score higher, keeping large
///   workers free for large tasks)
/// - up to +25 for spare concurrency
pub fn worker_score(worker: WorkerView<'_>, task: TaskView<'_>) -> f64 {
    let mut score = 0.0;

    if worker.config.lists_priority(task.priority) {
        score += PRIORITY_MATCH_POINTS;
    }

    if !task.tags.is_empty() {
        let shared = task
            .tags
            .iter()
            .filter(|t| worker.config.specializations.contains(t))
            .count();
        score += SPECIALIZATION_POINTS * shared as f64 / task.tags.len() as f64;
    }

    let fits: Vec<f64> = task
        .request
        .iter()
        .filter(|(_, amount)| *amount > 0.0)
        .map(|(kind, amount)| {
            let available = worker.ledger.available(kind);
            if available <= 0.0 {
                0.0
            } else {
                (amount / available).min(1.0)
            }
        })
        .collect();
    if !fits.is_empty() {
        score += FIT_POINTS * fits.iter().sum::<f64>() / fits.len() as f64;
    }

    let max = worker.config.max_concurrent_tasks.max(1) as f64;
    let load = (worker.active as f64 / max).min(1.0);
    score += LOAD_POINTS * (1.0 - load);

    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResourceKind;
    use rstest::rstest;

    #[rstest]
    #[case::fresh_normal(Priority::Normal, 0, 0, 500.0)]
    #[case::urgent(Priority::Urgent, 0, 0, 1000.0)]
    #[case::ten_minutes(Priority::Low, 10, 0, 260.0)]
    #[case::age_is_capped(Priority::Background, 500, 0, 200.0)]
    #[case::attempts_penalized(Priority::High, 0, 2, 650.0)]
    fn priority_score_table(
        #[case] priority: Priority,
        #[case] minutes: u64,
        #[case] attempts: u32,
        #[case] expected: f64,
    ) {
        let score = priority_score(priority, Duration::from_secs(minutes * 60), attempts);
        assert!((score - expected).abs() < 1e-9, "{score} != {expected}");
    }

    #[test]
    fn resource_score_rewards_satisfiable_requests() {
        let global = ResourceLedger::with_capacity(
            Resources::new()
                .with(ResourceKind::Cpu, 2.0)
                .with(ResourceKind::Memory, 100.0),
        );

        assert_eq!(resource_score(&Resources::new(), &global), 10.0);

        let ok = Resources::new()
            .with(ResourceKind::Cpu, 1.0)
            .with(ResourceKind::Memory, 50.0);
        assert_eq!(resource_score(&ok, &global), 20.0);

        let mixed = Resources::new()
            .with(ResourceKind::Cpu, 1.0)
            .with(ResourceKind::Gpu, 1.0);
        assert_eq!(resource_score(&mixed, &global), -40.0);
    }

    #[rstest]
    #[case(0, 0.0)]
    #[case(5, 5.0)]
    #[case(60, 50.0)]
    fn aging_boost_is_capped(#[case] minutes: u64, #[case] expected: f64) {
        let boost = aging_boost(Duration::from_secs(minutes * 60), 1.0, 50.0);
        assert!((boost - expected).abs() < 1e-9);
    }

    #[test]
    fn idle_specialist_beats_busy_generalist() {
        let specialist = WorkerConfig::new("gpu", 2)
            .with_specialization("vision")
            .with_capacity(ResourceKind::Gpu, 1.0);
        let generalist = WorkerConfig::new("any", 2).with_capacity(ResourceKind::Gpu, 4.0);

        let spec_ledger = ResourceLedger::with_capacity(specialist.capacity.clone());
        let gen_ledger = ResourceLedger::with_capacity(generalist.capacity.clone());

        let tags = vec!["vision".to_string()];
        let request = Resources::new().with(ResourceKind::Gpu, 1.0);
        let task = TaskView {
            priority: Priority::Normal,
            tags: &tags,
            request: &request,
        };

        let s = worker_score(
            WorkerView {
                config: &specialist,
                ledger: &spec_ledger,
                active: 0,
            },
            task,
        );
        let g = worker_score(
            WorkerView {
                config: &generalist,
                ledger: &gen_ledger,
                active: 1,
            },
            task,
        );

        // 30 + 20 + 25 + 25
        assert!((s - 100.0).abs() < 1e-9);
        assert!(s > g);
    }

    #[test]
    fn unlisted_priority_loses_membership_points() {
        let worker = WorkerConfig::new("w", 1).with_priorities([Priority::Urgent]);
        let ledger = ResourceLedger::new();
        let request = Resources::new();
        let score = worker_score(
            WorkerView {
                config: &worker,
                ledger: &ledger,
                active: 0,
            },
            TaskView {
                priority: Priority::Low,
                tags: &[],
                request: &request,
            },
        );
        assert_eq!(score, LOAD_POINTS);
    }
}
