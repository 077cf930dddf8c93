//! App - アプリケーション層
//!
//! domain / queue / workers を組み合わせてスケジューラを実装します。
//!
//! # 主要コンポーネント
//! - **SchedulerBuilder**: 設定と ports のワイヤリング、起動時検証
//! - **Scheduler**: 公開 API（submit / cancel / status / metrics / report）
//! - **SchedulerState**: ロック内で完結する状態遷移（admit → dispatch → finish）
//! - **Outbox**: ロック解放後のイベント・フック配送
//! - **Loops**: tick / aging / deadlock / maintenance の定期実行

pub mod builder;
pub mod config;
pub mod metrics;
pub mod report;
pub mod scheduler;

mod dispatch;
mod loops;
mod maintenance;
mod outbox;
mod state;


// 主要な型を再エクスポート
pub use self::builder::{BuildError, SchedulerBuilder};
pub use self::config::{ConfigError, SchedulerConfig};
pub use self::metrics::{SchedulerMetrics, TrendPoint};
pub use self::report::{Bottleneck, PerformanceReport, QueueStats};
pub use self::scheduler::Scheduler;
