//! TracingEventSink - イベントを構造化ログとして出力
//!
//! スケジューラ自身のログ（lifecycle / 警告）とは別に、
//! 全イベントを `taskloom::events` ターゲットに流す。
//! `RUST_LOG=taskloom::events=debug` で絞り込める。

use tracing::{debug, info, warn};

use crate::domain::SchedulerEvent;
use crate::ports::EventSink;

pub const EVENTS_TARGET: &str = "taskloom::events";

/// TracingEventSink は SchedulerEvent を JSON 付きでログに出す
///
/// レベルの割り当て
/// - warn: 失敗・デッドロック解消・shedding
/// - info: 完了・ワーカー登録/解除
/// - debug: それ以外（進捗を含む）
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &SchedulerEvent) {
        let name = event.name();
        let task_id = event.task_id().map(|id| id.to_string());
        let payload = serde_json::to_string(event).unwrap_or_default();

        match event {
            SchedulerEvent::TaskFailed { .. }
            | SchedulerEvent::DeadlockResolved { .. }
            | SchedulerEvent::TasksShed { .. } => {
                warn!(target: EVENTS_TARGET, event = name, task_id = task_id.as_deref(), %payload);
            }
            SchedulerEvent::TaskCompleted { .. }
            | SchedulerEvent::WorkerRegistered { .. }
            | SchedulerEvent::WorkerUnregistered { .. } => {
                info!(target: EVENTS_TARGET, event = name, task_id = task_id.as_deref(), %payload);
            }
            _ => debug!(target: EVENTS_TARGET, event = name, task_id = task_id.as_deref(), %payload),
        }
    }
}
