//! taskloom-core
//!
//! Priority-based in-process task scheduler.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, priority, resources, task, definition, context, decision, errors, events）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator, EventSink, MemoryPressureProbe）
//! - **queue**: キュー・依存グラフ・リソース台帳・スコアリング（純粋なデータ構造）
//! - **workers**: ワーカーレジストリ
//! - **app**: スケジューラ本体（builder, scheduler, loops, metrics, report）
//! - **typed**: 型付き Task API（TaskPayload, Handler, TypedExecutor）
//! - **impls**: ports の実装（TracingEventSink, MemoryEventSink）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;
pub mod queue;
pub mod typed;
pub mod workers;

pub use app::{
    BuildError, ConfigError, PerformanceReport, Scheduler, SchedulerBuilder, SchedulerConfig,
    SchedulerMetrics,
};
pub use domain::{
    Priority, ResourceKind, Resources, SchedulerError, SchedulerEvent, SubmitOptions, TaskContext,
    TaskDefinition, TaskId, TaskInstance, TaskStatus, WorkerConfig, WorkerId,
};
