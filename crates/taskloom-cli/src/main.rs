use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::time::sleep;
use tracing::{info, warn};

use taskloom_core::impls::TracingEventSink;
use taskloom_core::typed::{Handler, PayloadCodec, TaskPayload};
use taskloom_core::{
    Priority, ResourceKind, Scheduler, SchedulerConfig, SchedulerError, SubmitOptions,
    TaskContext, TaskDefinition, TaskId, TaskStatus, WorkerConfig,
};

/// Runs a demo workload through the scheduler and prints a performance report.
#[derive(Parser, Debug)]
#[command(name = "taskloom", version, about)]
struct Cli {
    /// Scheduler config as JSON. Missing fields use defaults.
    #[arg(long, env = "TASKLOOM_CONFIG")]
    config: Option<PathBuf>,

    /// Number of workers to register.
    #[arg(long, default_value_t = 2)]
    workers: usize,

    /// Concurrent tasks per worker.
    #[arg(long, default_value_t = 2)]
    slots: usize,

    /// Number of batch tasks to submit.
    #[arg(long, default_value_t = 8)]
    tasks: usize,

    /// Failures the flaky greeting task produces before it succeeds.
    #[arg(long, default_value_t = 2)]
    failures: u32,

    /// Overrides `tick_interval_ms` from the config.
    #[arg(long)]
    tick_ms: Option<u64>,

    /// Seconds to wait for running tasks on shutdown.
    #[arg(long, default_value_t = 5)]
    shutdown_timeout: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Hello {
    name: String,
}

impl TaskPayload for Hello {
    const NAME: &'static str = "hello";
    type Output = String;
}

/// 指定回数だけ失敗してから挨拶を返す（リトライのデモ）
struct HelloHandler {
    remaining_failures: AtomicU32,
}

impl HelloHandler {
    fn new(n: u32) -> Self {
        Self {
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl Handler<Hello> for HelloHandler {
    async fn handle(&self, task: Hello, ctx: TaskContext) -> Result<String, SchedulerError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(SchedulerError::execution(format!(
                "intentional failure (left={left}, attempt={})",
                ctx.attempt()
            )));
        }
        Ok(format!("Hello, {}!", task.name))
    }
}

fn load_config(cli: &Cli) -> Result<SchedulerConfig, Box<dyn Error>> {
    let mut config = match &cli.config {
        Some(path) => SchedulerConfig::from_json_str(&std::fs::read_to_string(path)?)?,
        None => SchedulerConfig::default(),
    };
    if let Some(ms) = cli.tick_ms {
        config = config.with_tick_interval(Duration::from_millis(ms));
    }
    config.validate()?;
    Ok(config)
}

/// 進捗を刻みながら少し眠るだけのバッチタスク
fn batch_task(i: usize) -> TaskDefinition {
    let priority = match i % 4 {
        0 => Priority::High,
        1 => Priority::Normal,
        2 => Priority::Low,
        _ => Priority::Background,
    };
    TaskDefinition::from_fn(format!("batch-{i}"), move |input, ctx: TaskContext| async move {
        for step in 1..=4 {
            if ctx.is_cancelled() {
                return Err(SchedulerError::cancelled("stopped mid-batch"));
            }
            sleep(Duration::from_millis(50)).await;
            ctx.report_progress(step as f64 * 25.0);
        }
        Ok(json!({ "batch": i, "input": input }))
    })
    .with_priority(priority)
    .with_resource(ResourceKind::Cpu, 1.0)
    .with_resource(ResourceKind::Memory, 128.0)
    .with_tag("batch")
}

/// extract -> transform -> load の依存チェーン
async fn submit_pipeline(scheduler: &Scheduler) -> Result<Vec<TaskId>, SchedulerError> {
    let stage = |name: &'static str| {
        TaskDefinition::from_fn(name, move |input, _| async move {
            sleep(Duration::from_millis(100)).await;
            Ok(json!({ "stage": name, "input": input }))
        })
        .with_priority(Priority::Urgent)
        .with_tag("pipeline")
    };

    let extract = scheduler
        .submit_task(stage("extract"), json!({"source": "demo"}), SubmitOptions::new())
        .await?;
    let transform = scheduler
        .submit_task(stage("transform"), json!(null), SubmitOptions::new().depends_on(extract))
        .await?;
    let load = scheduler
        .submit_task(stage("load"), json!(null), SubmitOptions::new().depends_on(transform))
        .await?;
    Ok(vec![extract, transform, load])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    // (A) スケジューラとワーカーを用意
    let mut builder = Scheduler::builder()
        .config(config)
        .event_sink(Arc::new(TracingEventSink));
    for n in 0..cli.workers {
        let mut worker = WorkerConfig::new(format!("worker-{n}"), cli.slots)
            .with_capacity(ResourceKind::Cpu, cli.slots as f64)
            .with_capacity(ResourceKind::Memory, 512.0);
        if n == 0 {
            worker = worker.with_specialization("pipeline");
        }
        builder = builder.worker(worker);
    }
    let scheduler = builder.build()?;
    scheduler.start().await?;

    // (B) タスク投入：バッチ、依存チェーン、型付きタスク
    let mut ids = Vec::new();
    for i in 0..cli.tasks {
        ids.push(
            scheduler
                .submit_task(batch_task(i), json!({ "n": i }), SubmitOptions::new())
                .await?,
        );
    }
    ids.extend(submit_pipeline(&scheduler).await?);

    let hello = TaskDefinition::typed::<Hello, _>(HelloHandler::new(cli.failures))
        .with_retry_delay(Duration::from_millis(200))
        .with_max_retries(cli.failures);
    let input = PayloadCodec::encode(&Hello {
        name: "taskloom".into(),
    })?;
    ids.push(
        scheduler
            .submit_task(hello, input, SubmitOptions::new())
            .await?,
    );
    info!(submitted = ids.len(), "workload submitted");

    // (C) 完了を待つ
    for id in ids {
        let task = scheduler.wait_for_task(id).await?;
        match task.status {
            TaskStatus::Completed => info!(
                %id,
                name = %task.name,
                attempts = task.attempts,
                result = %task.result.unwrap_or_default(),
                "task done"
            ),
            status => warn!(%id, name = %task.name, ?status, error = ?task.last_error, "task did not complete"),
        }
    }

    // (D) レポートを出して止める
    scheduler.run_maintenance().await;
    let report = scheduler.get_performance_report().await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    scheduler
        .stop(Duration::from_secs(cli.shutdown_timeout))
        .await?;
    Ok(())
}
