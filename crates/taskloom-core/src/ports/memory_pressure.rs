//! MemoryPressureProbe port - ホストのメモリ状況
//!
//! スケジューラ自身はプロセスのメモリを監視しない。
//! ホスト側が probe を注入し、High / Critical のときに
//! 優先度の低いキュー内タスクを間引く（shedding）。

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::domain::PressureLevel;

/// MemoryPressureProbe は現在のメモリ逼迫度を返す
pub trait MemoryPressureProbe: Send + Sync {
    fn level(&self) -> PressureLevel;
}

/// クロージャをそのまま probe として使える
impl<F> MemoryPressureProbe for F
where
    F: Fn() -> PressureLevel + Send + Sync,
{
    fn level(&self) -> PressureLevel {
        self()
    }
}

/// 外から値を設定する probe（テスト・デモ用）
#[derive(Debug, Clone, Default)]
pub struct StaticPressure {
    level: Arc<AtomicU8>,
}

impl StaticPressure {
    pub fn new(level: PressureLevel) -> Self {
        let probe = Self::default();
        probe.set(level);
        probe
    }

    pub fn set(&self, level: PressureLevel) {
        self.level.store(level as u8, Ordering::SeqCst);
    }
}

impl MemoryPressureProbe for StaticPressure {
    fn level(&self) -> PressureLevel {
        match self.level.load(Ordering::SeqCst) {
            0 => PressureLevel::Normal,
            1 => PressureLevel::Elevated,
            2 => PressureLevel::High,
            _ => PressureLevel::Critical,
        }
    }
}
