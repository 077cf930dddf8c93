//! Queue - キュー側の部品
//!
//! 待ち行列、依存グラフ、リソース台帳、スコアリング、リトライのバックオフ。
//! ここにあるのはデータと純粋関数だけで、ロックとオーケストレーションは `app` 側。

pub mod cycle;
pub mod dependency;
pub mod entry;
pub mod ledger;
pub mod retry;
pub mod scoring;

pub use cycle::{find_cycle, find_cycle_from};
pub use dependency::DependencyGraph;
pub use entry::{PendingQueue, QueuedTask};
pub use ledger::ResourceLedger;
pub use retry::RetryPolicy;
