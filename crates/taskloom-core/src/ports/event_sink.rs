//! EventSink port - イベント通知の抽象化
//!
//! broadcast チャネル（`Scheduler::subscribe`）とは別に、
//! 常駐の観測者（ログ、メトリクス送信など）を差し込むための trait。

use crate::domain::SchedulerEvent;

/// EventSink はスケジューライベントを受け取る
///
/// # 呼び出しタイミング
/// - スケジューラの状態ロックを解放した後に呼ばれる
/// - 同期メソッドなので、重い処理は自前でキューに積むこと
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &SchedulerEvent);
}

/// 何もしない EventSink
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn emit(&self, _event: &SchedulerEvent) {}
}
