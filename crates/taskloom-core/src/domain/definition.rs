//! Task definitions: the immutable template a caller submits.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::context::TaskContext;
use super::errors::SchedulerError;
use super::ids::TaskId;
use super::priority::Priority;
use super::resources::{ResourceKind, Resources};

/// Runs the body of a task.
///
/// Returning `SchedulerError::Execution` or timing out is retryable;
/// returning `SchedulerError::Cancelled` ends the task as cancelled.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    async fn execute(&self, input: Value, ctx: TaskContext) -> Result<Value, SchedulerError>;
}

/// Checks an input before the task is admitted.
#[async_trait]
pub trait TaskValidator: Send + Sync {
    /// `Err(reason)` rejects the submission with `InvalidInput`.
    async fn validate(&self, input: &Value) -> Result<(), String>;
}

/// Optional observer callbacks for a single definition.
///
/// Called after the scheduler has released its state, never from inside a
/// state transition.
pub trait TaskHooks: Send + Sync {
    fn on_progress(&self, _task_id: TaskId, _progress: f64) {}

    fn on_retry(&self, _task_id: TaskId, _attempt: u32, _error: &SchedulerError) {}
}

/// Adapter turning an async closure into a `TaskExecutor`.
pub struct FnExecutor<F> {
    f: F,
}

impl<F> FnExecutor<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F, Fut> TaskExecutor for FnExecutor<F>
where
    F: Fn(Value, TaskContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, SchedulerError>> + Send + 'static,
{
    async fn execute(&self, input: Value, ctx: TaskContext) -> Result<Value, SchedulerError> {
        (self.f)(input, ctx).await
    }
}

/// Adapter turning a synchronous predicate into a `TaskValidator`.
pub struct FnValidator<F> {
    f: F,
}

impl<F> FnValidator<F> {
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

#[async_trait]
impl<F> TaskValidator for FnValidator<F>
where
    F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
{
    async fn validate(&self, input: &Value) -> Result<(), String> {
        (self.f)(input)
    }
}

/// Immutable template of a unit of work.
///
/// # Example
/// ```ignore
/// let def = TaskDefinition::from_fn("resize", |input, ctx| async move {
///     ctx.report_progress(50.0);
///     Ok(input)
/// })
/// .with_priority(Priority::High)
/// .with_resource(ResourceKind::Cpu, 1.0)
/// .with_max_retries(2);
/// ```
#[derive(Clone)]
pub struct TaskDefinition {
    pub name: String,
    pub priority: Priority,
    pub estimated_duration: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub dependencies: Vec<TaskId>,
    pub resources: Resources,
    pub tags: Vec<String>,
    pub(crate) executor: Arc<dyn TaskExecutor>,
    pub(crate) validator: Option<Arc<dyn TaskValidator>>,
    pub(crate) hooks: Option<Arc<dyn TaskHooks>>,
}

impl TaskDefinition {
    pub const DEFAULT_MAX_RETRIES: u32 = 3;
    pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(name: impl Into<String>, executor: Arc<dyn TaskExecutor>) -> Self {
        Self {
            name: name.into(),
            priority: Priority::Normal,
            estimated_duration: Duration::ZERO,
            max_retries: Self::DEFAULT_MAX_RETRIES,
            retry_delay: Self::DEFAULT_RETRY_DELAY,
            timeout: Self::DEFAULT_TIMEOUT,
            dependencies: Vec::new(),
            resources: Resources::new(),
            tags: Vec::new(),
            executor,
            validator: None,
            hooks: None,
        }
    }

    pub fn from_fn<F, Fut>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(Value, TaskContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, SchedulerError>> + Send + 'static,
    {
        Self::new(name, Arc::new(FnExecutor::new(f)))
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_estimated_duration(mut self, d: Duration) -> Self {
        self.estimated_duration = d;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_delay(mut self, d: Duration) -> Self {
        self.retry_delay = d;
        self
    }

    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout = d;
        self
    }

    pub fn depends_on(mut self, task_id: TaskId) -> Self {
        self.dependencies.push(task_id);
        self
    }

    pub fn with_resource(mut self, kind: ResourceKind, amount: f64) -> Self {
        self.resources.set(kind, amount);
        self
    }

    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn with_validator(mut self, validator: Arc<dyn TaskValidator>) -> Self {
        self.validator = Some(validator);
        self
    }

    pub fn with_hooks(mut self, hooks: Arc<dyn TaskHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Structural checks done at admission.
    pub(crate) fn check(&self) -> Result<(), SchedulerError> {
        if self.name.trim().is_empty() {
            return Err(SchedulerError::invalid_input("task name must not be empty"));
        }
        if self.timeout.is_zero() {
            return Err(SchedulerError::invalid_input(format!(
                "task '{}' has a zero timeout",
                self.name
            )));
        }
        if !self.resources.is_well_formed() {
            return Err(SchedulerError::invalid_input(format!(
                "task '{}' has negative or non-finite resource amounts",
                self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for TaskDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskDefinition")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("timeout", &self.timeout)
            .field("dependencies", &self.dependencies)
            .field("resources", &self.resources)
            .field("tags", &self.tags)
            .field("has_validator", &self.validator.is_some())
            .field("has_hooks", &self.hooks.is_some())
            .finish()
    }
}

/// Call-site options for a submission.
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    /// Pre-allocated id. Lets callers wire dependencies on tasks that are
    /// submitted later.
    pub task_id: Option<TaskId>,

    /// Extra dependencies, merged with the definition's.
    pub dependencies: Vec<TaskId>,

    /// Overrides the definition's priority.
    pub priority: Option<Priority>,
}

impl SubmitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_task_id(mut self, task_id: TaskId) -> Self {
        self.task_id = Some(task_id);
        self
    }

    pub fn depends_on(mut self, task_id: TaskId) -> Self {
        self.dependencies.push(task_id);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}
