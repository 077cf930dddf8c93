//! Ports - 抽象化レイヤー
//!
//! スケジューラが外部に依存する部分（時刻、ID 生成、イベント通知、
//! ホストのメモリ状況）を trait として切り出します。
//! テストでは ManualClock や固定の probe に差し替えられます。

pub mod clock;
pub mod event_sink;
pub mod id_generator;
pub mod memory_pressure;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, ManualClock, SystemClock};
pub use self::event_sink::{EventSink, NoopEventSink};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::memory_pressure::{MemoryPressureProbe, StaticPressure};
