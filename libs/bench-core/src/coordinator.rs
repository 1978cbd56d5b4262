use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use store_api::StoreConnector;

use crate::config::{AbandonPolicy, BenchConfig};
use crate::error::BenchError;
use crate::mutator::RecordMutator;
use crate::rng::{Rng, resolve_seed};
use crate::worker::{StopReason, Worker, WorkerExit, WorkerProgress};

// ═══════════════════════════════════════════════════════════════
//  Results
// ═══════════════════════════════════════════════════════════════

/// Как координатор увидел воркера в конце прогона.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    /// Дошёл до дедлайна.
    Completed,
    /// Вышел по токену в окне дренажа (abandon = cancel).
    Cancelled,
    /// Fetch failed (or the task panicked). Counter holds partial progress.
    Failed(String),
    /// Не закончил за окно ожидания.
    TimedOut,
    /// Координатор бросил ждать раньше, чем дошёл до этого воркера.
    Unjoined,
}

impl WorkerStatus {
    pub fn label(&self) -> &'static str {
        match self {
            WorkerStatus::Completed => "completed",
            WorkerStatus::Cancelled => "cancelled",
            WorkerStatus::Failed(_) => "failed",
            WorkerStatus::TimedOut => "timed_out",
            WorkerStatus::Unjoined => "unjoined",
        }
    }
}

#[derive(Debug, Clone)]
pub struct WorkerResult {
    pub id: usize,
    /// Snapshot of the success counter, taken after the join loop.
    pub completed: u64,
    pub errors: u64,
    pub attempts: u64,
    /// `None` if the worker was never observed finishing.
    pub elapsed: Option<Duration>,
    pub status: WorkerStatus,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub workers: Vec<WorkerResult>,
    /// Σ completed по всем воркерам.
    pub total: u64,
    /// Nominal per-worker duration; throughput divides by this.
    pub duration: Duration,
    /// Фактическое время от старта пула до конца join-цикла.
    pub wall: Duration,
}

impl RunSummary {
    /// Операций в секунду: total / duration.
    pub fn throughput(&self) -> f64 {
        self.total as f64 / self.duration.as_secs_f64()
    }

    pub fn count(&self, label: &str) -> usize {
        self.workers.iter().filter(|w| w.status.label() == label).count()
    }

    /// `"<D> secs, <ops> ops/sec"`.
    pub fn summary_line(&self) -> String {
        format!("{} secs, {} ops/sec", self.duration.as_secs_f64(), self.throughput())
    }
}

// ═══════════════════════════════════════════════════════════════
//  Coordinator
// ═══════════════════════════════════════════════════════════════

struct WorkerHandle {
    id: usize,
    progress: Arc<WorkerProgress>,
    join: JoinHandle<WorkerExit>,
}

/// Fixed-size pool: connect, spawn, bounded join, aggregate.
pub struct Coordinator {
    config: BenchConfig,
    connector: Arc<dyn StoreConnector>,
}

impl Coordinator {
    pub fn new(config: BenchConfig, connector: Arc<dyn StoreConnector>) -> Result<Self, BenchError> {
        config.validate()?;
        Ok(Self { config, connector })
    }

    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    pub async fn run(&self) -> Result<RunSummary, BenchError> {
        let cfg = &self.config;
        let target = self.connector.target();

        // --- One connection per worker, all up before anything starts ---
        let mut clients = Vec::with_capacity(cfg.threads);
        for worker in 0..cfg.threads {
            let client = self
                .connector
                .connect()
                .await
                .map_err(|source| BenchError::Connect { worker, source })?;
            clients.push(client);
        }
        tracing::info!(%target, connections = clients.len(), "connected");

        let token = CancellationToken::new();
        let table: Arc<str> = Arc::from(cfg.table.as_str());
        let mutator = Arc::new(RecordMutator::new(cfg.shuffle_field.clone()));
        let base_seed = resolve_seed(cfg.seed);

        tracing::info!(
            threads = cfg.threads,
            duration_s = cfg.duration.as_secs_f64(),
            key_space = cfg.key_space,
            table = %cfg.table,
            seed = base_seed,
            "benchmark starting"
        );
        let started = Instant::now();

        let mut handles: Vec<WorkerHandle> = clients
            .into_iter()
            .enumerate()
            .map(|(id, client)| {
                let worker = Worker::new(
                    id,
                    client,
                    table.clone(),
                    cfg.key_space,
                    cfg.duration,
                    mutator.clone(),
                    Rng::for_worker(base_seed, id),
                    token.child_token(),
                );
                let progress = worker.progress();
                WorkerHandle { id, progress, join: tokio::spawn(worker.run()) }
            })
            .collect();

        // --- Bounded join: bail out on the first worker that overruns ---
        let window = cfg.join_window();
        let mut statuses: Vec<(WorkerStatus, Option<Duration>)> = Vec::with_capacity(handles.len());
        // Индекс первого воркера, которого не дождались.
        let mut abandoned: Option<usize> = None;

        for h in handles.iter_mut() {
            if abandoned.is_some() {
                statuses.push((WorkerStatus::Unjoined, None));
                continue;
            }
            match tokio::time::timeout(window, &mut h.join).await {
                Ok(Ok(exit)) => statuses.push(observe(h.id, exit)),
                Ok(Err(join_err)) => {
                    tracing::error!(worker = h.id, error = %join_err, "worker task died");
                    statuses.push((WorkerStatus::Failed(format!("task died: {join_err}")), None));
                }
                Err(_) => {
                    let remaining = cfg.threads - h.id - 1;
                    tracing::warn!(
                        worker = h.id,
                        window_s = window.as_secs_f64(),
                        unjoined = remaining,
                        "worker did not finish in time, aggregating what is visible"
                    );
                    statuses.push((WorkerStatus::TimedOut, None));
                    abandoned = Some(h.id);
                }
            }
        }

        if let Some(first) = abandoned {
            match cfg.abandon {
                AbandonPolicy::Detach => {
                    tracing::info!("leaving unfinished workers running in background");
                }
                AbandonPolicy::Cancel => {
                    // Остаток окна сверх `duration` даётся на выход по токену.
                    token.cancel();
                    let drain = window.saturating_sub(cfg.duration);
                    let drain_started = Instant::now();
                    let mut aborted = 0usize;
                    for (h, slot) in handles.iter_mut().zip(statuses.iter_mut()).skip(first) {
                        let left = drain.saturating_sub(drain_started.elapsed());
                        match tokio::time::timeout(left, &mut h.join).await {
                            Ok(Ok(exit)) => *slot = observe(h.id, exit),
                            Ok(Err(join_err)) => {
                                tracing::error!(worker = h.id, error = %join_err, "worker task died");
                                *slot = (WorkerStatus::Failed(format!("task died: {join_err}")), None);
                            }
                            Err(_) => {
                                h.join.abort();
                                aborted += 1;
                            }
                        }
                    }
                    tracing::info!(drain_s = drain.as_secs_f64(), aborted, "cancelled unfinished workers");
                }
            }
        }

        let wall = started.elapsed();

        // --- Aggregate: snapshot every counter once ---
        let workers: Vec<WorkerResult> = handles
            .iter()
            .zip(statuses)
            .map(|(h, (status, elapsed))| WorkerResult {
                id: h.id,
                completed: h.progress.completed(),
                errors: h.progress.errors(),
                attempts: h.progress.attempts(),
                elapsed,
                status,
            })
            .collect();
        let total = workers.iter().map(|w| w.completed).sum();

        let summary = RunSummary { workers, total, duration: cfg.duration, wall };
        tracing::info!(
            total = summary.total,
            ops_per_sec = format_args!("{:.1}", summary.throughput()),
            wall_s = format_args!("{:.3}", wall.as_secs_f64()),
            completed = summary.count("completed"),
            cancelled = summary.count("cancelled"),
            failed = summary.count("failed"),
            timed_out = summary.count("timed_out"),
            unjoined = summary.count("unjoined"),
            "benchmark finished"
        );
        Ok(summary)
    }
}

fn observe(id: usize, exit: WorkerExit) -> (WorkerStatus, Option<Duration>) {
    let status = match exit.outcome {
        Ok(StopReason::Deadline) => WorkerStatus::Completed,
        Ok(StopReason::Cancelled) => WorkerStatus::Cancelled,
        Err(e) => {
            tracing::warn!(worker = id, error = %e, "worker failed");
            WorkerStatus::Failed(e.to_string())
        }
    };
    (status, Some(exit.elapsed))
}
