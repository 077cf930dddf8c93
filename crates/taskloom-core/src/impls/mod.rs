//! Impls - ports の実装
//!
//! # 含まれる実装
//! - **TracingEventSink**: イベントを tracing に流す
//! - **MemoryEventSink**: イベントを記録する（テスト・デモ用）

pub mod memory_sink;
pub mod tracing_sink;

// 主要な型を再エクスポート
pub use self::memory_sink::MemoryEventSink;
pub use self::tracing_sink::TracingEventSink;
