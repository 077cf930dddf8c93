//! MemoryEventSink - イベントを記録する EventSink
//!
//! broadcast チャネルと違い取りこぼしがないので、
//! テストで発火順序を検証するのに使う。

use std::sync::{Arc, Mutex};

use crate::domain::{SchedulerEvent, TaskId};
use crate::ports::EventSink;

/// MemoryEventSink は受け取ったイベントを順に保持する
///
/// Clone は同じバッファを共有する。
#[derive(Debug, Default, Clone)]
pub struct MemoryEventSink {
    events: Arc<Mutex<Vec<SchedulerEvent>>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// これまでのイベントのコピー
    pub fn events(&self) -> Vec<SchedulerEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// 条件に合うイベントだけ
    pub fn matching(&self, pred: impl Fn(&SchedulerEvent) -> bool) -> Vec<SchedulerEvent> {
        self.events().into_iter().filter(|e| pred(e)).collect()
    }

    /// TaskStarted の順序（ディスパッチ順）
    pub fn started_order(&self) -> Vec<TaskId> {
        self.events()
            .iter()
            .filter_map(|e| match e {
                SchedulerEvent::TaskStarted { task_id, .. } => Some(*task_id),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        match self.events.lock() {
            Ok(mut events) => events.clear(),
            Err(poisoned) => poisoned.into_inner().clear(),
        }
    }
}

impl EventSink for MemoryEventSink {
    fn emit(&self, event: &SchedulerEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
