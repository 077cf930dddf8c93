//! Domain - ドメインモデル
//!
//! ID、タスク定義、タスクインスタンス、イベント、エラーを定義します。
//! ロックや I/O は持たず、純粋なデータと判断ロジックだけを置く。

pub mod context;
pub mod decision;
pub mod definition;
pub mod errors;
pub mod events;
pub mod ids;
pub mod pressure;
pub mod priority;
pub mod resources;
pub mod state;
pub mod task;
pub mod worker;

pub use context::TaskContext;
pub(crate) use context::ContextUpdate;
pub use decision::{Decider, Decision, DefaultDecider};
pub use definition::{
    FnExecutor, FnValidator, SubmitOptions, TaskDefinition, TaskExecutor, TaskHooks,
    TaskValidator,
};
pub use errors::{ErrorKind, SchedulerError};
pub use events::SchedulerEvent;
pub use ids::{Id, IdMarker, TaskId, WorkerId};
pub use pressure::PressureLevel;
pub use priority::Priority;
pub use resources::{ResourceKind, Resources};
pub use state::TaskStatus;
pub use task::TaskInstance;
pub use worker::WorkerConfig;
