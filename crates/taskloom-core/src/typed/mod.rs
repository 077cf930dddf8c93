//! Typed - 型付き Task API
//!
//! JSON の入出力を型で包み、タスク名と Handler の対応を静的に保証します。
//!
//! # 二層構造
//! - **表層（Typed）**: `TaskPayload` trait, `Handler<T>` trait - 型安全
//! - **内部（Dyn）**: `TaskExecutor` trait object - スケジューラが保持する形
//!
//! `TaskDefinition::typed::<T, _>(handler)` が両者をつなぐ。

pub mod codec;
pub mod handler;
pub mod task;

// 主要な trait/型 を再エクスポート
pub use self::codec::{CodecError, PayloadCodec};
pub use self::handler::{DecodeValidator, Handler, TypedExecutor};
pub use self::task::TaskPayload;
