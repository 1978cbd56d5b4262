use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use store_api::StoreClient;

use crate::error::BenchError;
use crate::mutator::RecordMutator;
use crate::rng::Rng;

// ═══════════════════════════════════════════════════════════════
//  Progress: счётчики воркера, видимые координатору
// ═══════════════════════════════════════════════════════════════

/// Written only by the owning worker, read by the coordinator at any time.
/// Every counter only grows.
#[derive(Debug, Default)]
pub struct WorkerProgress {
    completed: AtomicU64,
    errors: AtomicU64,
    attempts: AtomicU64,
}

impl WorkerProgress {
    /// Успешные записи.
    pub fn completed(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Неудачные записи.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Acquire)
    }

    /// Попытки записи (успешные + неудачные).
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Acquire)
    }
}

/// Почему воркер вышел из цикла без ошибки.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Бюджет времени исчерпан.
    Deadline,
    /// Cancelled by the coordinator (abandon = cancel).
    Cancelled,
}

/// Итог задачи воркера.
#[derive(Debug)]
pub struct WorkerExit {
    pub elapsed: Duration,
    pub outcome: Result<StopReason, BenchError>,
}

// ═══════════════════════════════════════════════════════════════
//  Worker
// ═══════════════════════════════════════════════════════════════

/// Один read-mutate-write цикл на своём соединении до дедлайна.
pub struct Worker {
    pub(crate) id: usize,
    pub(crate) client: Box<dyn StoreClient>,
    pub(crate) table: Arc<str>,
    pub(crate) key_space: u64,
    pub(crate) duration: Duration,
    pub(crate) mutator: Arc<RecordMutator>,
    pub(crate) rng: Rng,
    pub(crate) progress: Arc<WorkerProgress>,
    pub(crate) token: CancellationToken,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        client: Box<dyn StoreClient>,
        table: Arc<str>,
        key_space: u64,
        duration: Duration,
        mutator: Arc<RecordMutator>,
        rng: Rng,
        token: CancellationToken,
    ) -> Self {
        Self {
            id,
            client,
            table,
            key_space,
            duration,
            mutator,
            rng,
            progress: Arc::new(WorkerProgress::default()),
            token,
        }
    }

    pub fn progress(&self) -> Arc<WorkerProgress> {
        self.progress.clone()
    }

    pub async fn run(mut self) -> WorkerExit {
        let begin = Instant::now();
        let outcome = self.run_loop(begin).await;
        WorkerExit { elapsed: begin.elapsed(), outcome }
    }

    async fn run_loop(&mut self, begin: Instant) -> Result<StopReason, BenchError> {
        let id = self.id;
        let mut errors = 0u64;

        loop {
            let key = self.rng.next_below(self.key_space).to_string();

            let row = match self.client.get(&self.table, &key).await {
                Ok(row) => row,
                Err(source) => {
                    tracing::error!(worker = id, %key, error = %source, "fetch failed, worker stopping");
                    return Err(BenchError::Fetch { worker: id, key, source });
                }
            };

            self.progress.attempts.fetch_add(1, Ordering::Release);
            let written = match self.mutator.mutate(&row, &mut self.rng) {
                Ok(values) => {
                    let lb = Instant::now();
                    let res = self.client.put(&self.table, &key, values).await;
                    res.map(|()| lb.elapsed()).map_err(|e| e.to_string())
                }
                Err(e) => Err(e.to_string()),
            };

            let failed = match written {
                Ok(latency) => {
                    let counter = self.progress.completed.fetch_add(1, Ordering::Release) + 1;
                    tracing::info!(
                        latency_ns = latency.as_nanos() as u64,
                        counter,
                        worker = id,
                        errors,
                        "update"
                    );
                    false
                }
                Err(e) => {
                    errors += 1;
                    self.progress.errors.store(errors, Ordering::Release);
                    tracing::warn!(worker = id, %key, errors, error = %e, "update failed, retrying");
                    true
                }
            };

            // Отмена важнее дедлайна: просроченный воркер сообщает Cancelled.
            if self.token.is_cancelled() {
                tracing::info!(worker = id, "worker cancelled");
                return Ok(StopReason::Cancelled);
            }
            if begin.elapsed() > self.duration {
                if failed {
                    tracing::warn!(worker = id, tried = errors, "could not finish update before deadline");
                }
                return Ok(StopReason::Deadline);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use store_api::Record;
    use store_memory::{MemoryStore, MemoryStoreConfig};

    async fn seeded(config: MemoryStoreConfig, keys: u64) -> MemoryStore {
        let store = MemoryStore::new(config);
        for k in 0..keys {
            store.insert("hotels", k.to_string(), Record::new().with("tel", format!("555-{k:04}"))).await;
        }
        store
    }

    fn worker(store: &MemoryStore, keys: u64, duration: Duration) -> Worker {
        Worker::new(
            0,
            Box::new(store.handle()),
            Arc::from("hotels"),
            keys,
            duration,
            Arc::new(RecordMutator::new("tel")),
            Rng::new(1),
            CancellationToken::new(),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn counts_successes_until_deadline() {
        let store = seeded(MemoryStoreConfig { put_latency_ms: 10, ..Default::default() }, 16).await;
        let w = worker(&store, 16, Duration::from_millis(200));
        let progress = w.progress();
        let exit = w.run().await;

        assert_eq!(exit.outcome.unwrap(), StopReason::Deadline);
        // 10 ms per write, loop stops once elapsed > 200 ms
        assert!((20..=21).contains(&progress.completed()), "completed = {}", progress.completed());
        assert_eq!(progress.errors(), 0);
        assert_eq!(progress.attempts(), progress.completed());
        assert!(exit.elapsed >= Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_is_retried_and_counted() {
        let store = seeded(MemoryStoreConfig { put_latency_ms: 10, fail_put_every: 2, ..Default::default() }, 4).await;
        let w = worker(&store, 4, Duration::from_millis(100));
        let progress = w.progress();
        let exit = w.run().await;

        assert!(exit.outcome.is_ok());
        assert!((10..=11).contains(&progress.attempts()), "attempts = {}", progress.attempts());
        assert_eq!(progress.completed() + progress.errors(), progress.attempts());
        assert_eq!(progress.errors(), progress.attempts() / 2);
    }

    #[tokio::test]
    async fn fetch_error_fails_the_worker() {
        let store = seeded(MemoryStoreConfig { fail_gets: true, ..Default::default() }, 4).await;
        let w = worker(&store, 4, Duration::from_secs(5));
        let progress = w.progress();
        let exit = w.run().await;

        assert!(matches!(exit.outcome, Err(BenchError::Fetch { worker: 0, .. })));
        assert_eq!(progress.completed(), 0);
        assert_eq!(progress.attempts(), 0);
    }

    #[tokio::test]
    async fn missing_key_is_a_fetch_error() {
        let store = seeded(MemoryStoreConfig::default(), 0).await;
        let exit = worker(&store, 10, Duration::from_secs(1)).run().await;
        assert!(matches!(exit.outcome, Err(BenchError::Fetch { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn mutation_error_counts_as_write_failure() {
        let store = MemoryStore::new(MemoryStoreConfig { get_latency_ms: 5, ..Default::default() });
        store.insert("hotels", "0", Record::new().with("name", "no tel")).await;
        let w = worker(&store, 1, Duration::from_millis(50));
        let progress = w.progress();
        let exit = w.run().await;

        assert!(exit.outcome.is_ok());
        assert_eq!(progress.completed(), 0);
        assert_eq!(progress.errors(), progress.attempts());
        assert!(progress.errors() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_is_checked_between_iterations() {
        let store = seeded(MemoryStoreConfig { put_latency_ms: 10, ..Default::default() }, 4).await;
        let w = worker(&store, 4, Duration::from_secs(3600));
        let token = w.token.clone();
        let progress = w.progress();
        let handle = tokio::spawn(w.run());

        tokio::time::sleep(Duration::from_millis(55)).await;
        token.cancel();
        let exit = handle.await.unwrap();

        assert_eq!(exit.outcome.unwrap(), StopReason::Cancelled);
        assert!((5..=6).contains(&progress.completed()), "completed = {}", progress.completed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_wins_over_passed_deadline() {
        let store = seeded(MemoryStoreConfig { put_latency_ms: 100, ..Default::default() }, 4).await;
        let w = worker(&store, 4, Duration::from_millis(150));
        let token = w.token.clone();
        let progress = w.progress();
        let handle = tokio::spawn(w.run());

        // Вторая запись заканчивается на 200 мс, уже после дедлайна.
        tokio::time::sleep(Duration::from_millis(170)).await;
        token.cancel();
        let exit = handle.await.unwrap();

        assert_eq!(exit.outcome.unwrap(), StopReason::Cancelled);
        assert_eq!(progress.completed(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn counters_never_go_backwards() {
        let store = seeded(MemoryStoreConfig { put_latency_ms: 10, fail_put_every: 3, ..Default::default() }, 8).await;
        let w = worker(&store, 8, Duration::from_millis(500));
        let progress = w.progress();
        let handle = tokio::spawn(w.run());

        let (mut completed, mut errors) = (0, 0);
        let mut readings = 0;
        while !handle.is_finished() {
            tokio::time::sleep(Duration::from_millis(25)).await;
            let (c, e, a) = (progress.completed(), progress.errors(), progress.attempts());
            assert!(c >= completed && e >= errors, "counters went back: {c}/{e} after {completed}/{errors}");
            assert!(c + e <= a, "{c} + {e} > {a} attempts");
            (completed, errors) = (c, e);
            readings += 1;
        }
        handle.await.unwrap().outcome.unwrap();
        assert!(readings >= 19, "readings = {readings}");
        assert!(progress.completed() >= completed);
        assert!(completed > 0 && errors > 0);
    }
}
