//! Handler trait - 型付きタスクの実行
//!
//! # 学習ポイント
//! - ジェネリック trait (Handler<T>)
//! - Type erasure パターン (TypedExecutor<T, H> → dyn TaskExecutor)

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use super::codec::PayloadCodec;
use super::task::TaskPayload;
use crate::domain::{SchedulerError, TaskContext, TaskDefinition, TaskExecutor, TaskValidator};

/// Handler は型付きペイロードを受け取って実行する
///
/// # 使用例
/// ```ignore
/// struct ResizeHandler;
///
/// #[async_trait]
/// impl Handler<Resize> for ResizeHandler {
///     async fn handle(&self, task: Resize, ctx: TaskContext) -> Result<ResizeResult, SchedulerError> {
///         ctx.report_progress(50.0);
///         Ok(resize(task).await?)
///     }
/// }
/// ```
///
/// # ジェネリクスによる型安全性
/// - `Handler<Resize>` は `Resize` しか受け取れない
/// - 出力型は `Resize::Output` に固定される
#[async_trait]
pub trait Handler<T: TaskPayload>: Send + Sync {
    async fn handle(&self, task: T, ctx: TaskContext) -> Result<T::Output, SchedulerError>;
}

/// TypedExecutor は Handler<T> を TaskExecutor に変換する
///
/// JSON 入力 → T にデコード → handle → 出力を JSON にエンコード
pub struct TypedExecutor<T, H> {
    handler: H,
    _marker: PhantomData<fn(T)>,
}

impl<T: TaskPayload, H: Handler<T>> TypedExecutor<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: TaskPayload, H: Handler<T>> TaskExecutor for TypedExecutor<T, H> {
    async fn execute(&self, input: Value, ctx: TaskContext) -> Result<Value, SchedulerError> {
        let task = PayloadCodec::decode::<T>(&input)?;
        let output = self.handler.handle(task, ctx).await?;
        Ok(PayloadCodec::encode_output::<T>(&output)?)
    }
}

/// DecodeValidator は投入時に入力が T にデコードできるか検証する
///
/// 壊れた入力はキューに入る前に InvalidInput で弾かれる。
pub struct DecodeValidator<T> {
    _marker: PhantomData<fn(T)>,
}

impl<T: TaskPayload> DecodeValidator<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T: TaskPayload> Default for DecodeValidator<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T: TaskPayload> TaskValidator for DecodeValidator<T> {
    async fn validate(&self, input: &Value) -> Result<(), String> {
        PayloadCodec::decode::<T>(input)
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

impl TaskDefinition {
    /// 型付き Handler から TaskDefinition を作る
    ///
    /// name は `T::NAME`、validator は DecodeValidator<T>。
    pub fn typed<T, H>(handler: H) -> Self
    where
        T: TaskPayload,
        H: Handler<T> + 'static,
    {
        TaskDefinition::new(T::NAME, Arc::new(TypedExecutor::<T, H>::new(handler)))
            .with_validator(Arc::new(DecodeValidator::<T>::new()))
    }
}
