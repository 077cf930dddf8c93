//! SchedulerBuilder - スケジューラの構築とワイヤリング
//!
//! # 方針
//! - 起動時検証（Fail-fast）：設定とワーカー定義は build() で全て検証する
//! - ports は差し替え可能。未指定なら本番用の実装を使う
//!   （SystemClock / UlidGenerator / DefaultDecider）

use std::collections::HashSet;
use std::sync::Arc;

use super::config::{ConfigError, SchedulerConfig};
use super::scheduler::{Parts, Scheduler};
use crate::domain::{Decider, DefaultDecider, SchedulerError, WorkerConfig, WorkerId};
use crate::ports::{Clock, EventSink, IdGenerator, MemoryPressureProbe, SystemClock, UlidGenerator};

/// SchedulerBuilder はスケジューラを構築
///
/// # 使用例
/// ```ignore
/// let scheduler = SchedulerBuilder::new()
///     .config(SchedulerConfig::default().with_max_queue_size(100))
///     .worker(WorkerConfig::new("cpu-1", 4).with_capacity(ResourceKind::Cpu, 4.0))
///     .event_sink(Arc::new(TracingEventSink))
///     .build()?;
/// ```
pub struct SchedulerBuilder {
    config: SchedulerConfig,
    clock: Option<Arc<dyn Clock>>,
    id_generator: Option<Arc<dyn IdGenerator>>,
    decider: Option<Arc<dyn Decider>>,
    sinks: Vec<Arc<dyn EventSink>>,
    pressure: Option<Arc<dyn MemoryPressureProbe>>,
    workers: Vec<WorkerConfig>,
}

/// BuildError はスケジューラ構築時のエラー
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    InvalidConfig(#[from] ConfigError),

    #[error("worker '{0}' is declared more than once")]
    DuplicateWorker(WorkerId),

    #[error("invalid worker: {0}")]
    InvalidWorker(#[source] SchedulerError),
}

impl SchedulerBuilder {
    /// 新しい SchedulerBuilder を作成（設定はデフォルト）
    pub fn new() -> Self {
        Self {
            config: SchedulerConfig::default(),
            clock: None,
            id_generator: None,
            decider: None,
            sinks: Vec::new(),
            pressure: None,
            workers: Vec::new(),
        }
    }

    pub fn config(mut self, config: SchedulerConfig) -> Self {
        self.config = config;
        self
    }

    /// Clock を差し替え（テストでは ManualClock など）
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn id_generator(mut self, id_generator: Arc<dyn IdGenerator>) -> Self {
        self.id_generator = Some(id_generator);
        self
    }

    /// リトライ判定を差し替え
    ///
    /// 未指定なら `SchedulerConfig::retry_policy()` を使う DefaultDecider。
    pub fn decider(mut self, decider: Arc<dyn Decider>) -> Self {
        self.decider = Some(decider);
        self
    }

    /// broadcast チャネルとは別の観測者を追加（複数可）
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn memory_pressure(mut self, probe: Arc<dyn MemoryPressureProbe>) -> Self {
        self.pressure = Some(probe);
        self
    }

    /// 起動時に登録するワーカー
    pub fn worker(mut self, worker: WorkerConfig) -> Self {
        self.workers.push(worker);
        self
    }

    /// 検証してスケジューラを構築
    ///
    /// # 検証
    /// - SchedulerConfig::validate()
    /// - 各 WorkerConfig::validate()
    /// - ワーカー ID の重複
    pub fn build(self) -> Result<Scheduler, BuildError> {
        self.config.validate()?;

        let mut seen = HashSet::new();
        for worker in &self.workers {
            worker.validate().map_err(BuildError::InvalidWorker)?;
            if !seen.insert(worker.id.clone()) {
                return Err(BuildError::DuplicateWorker(worker.id.clone()));
            }
        }

        let clock: Arc<dyn Clock> = self
            .clock
            .unwrap_or_else(|| Arc::new(SystemClock::new()));
        let ids = self
            .id_generator
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&clock))));
        let decider = self
            .decider
            .unwrap_or_else(|| Arc::new(DefaultDecider::new(self.config.retry_policy())));

        let parts = Parts {
            config: self.config,
            clock,
            ids,
            decider,
            sinks: self.sinks,
            pressure: self.pressure,
        };
        Scheduler::from_parts(parts, self.workers).map_err(BuildError::InvalidWorker)
    }
}

impl Default for SchedulerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
