//! Bounded-concurrency fan-out over the entity list.
//!
//! A single dispatcher walks the entities in input order and acquires a
//! semaphore permit before spawning each task, so at most `concurrency`
//! fetches are in flight and dispatch order equals input order. Completion
//! order is whatever the fetches make it; each task records its own row as
//! soon as its fetch resolves.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tagmatrix_common::{Entity, FetchResult};
use tagmatrix_sink::PersistenceSink;
use tokio::sync::Semaphore;
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::config::{BuilderConfig, FlushFailurePolicy};
use crate::error::{FetchError, PersistStage};
use crate::fetcher::DataFetcher;
use crate::matrix::MatrixStore;

/// Counters for one `run`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    pub dispatched: u64,
    /// Rows assigned, including rows whose persistence reported an error.
    pub recorded: u64,
    /// Fetches that returned an error or panicked.
    pub fetch_failures: u64,
    pub fetch_timeouts: u64,
    pub checkpoint_failures: u64,
    pub write_failures: u64,
    /// Tasks that panicked or were aborted before recording.
    pub task_failures: u64,
    /// Dispatch stopped before the entity list was exhausted.
    pub cancelled: bool,
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum FetchStatus {
    Fetched,
    Failed,
    TimedOut,
    Panicked,
}

#[derive(Debug)]
enum RecordStatus {
    Recorded,
    PersistFailed(PersistStage),
    Panicked,
}

#[derive(Debug)]
struct TaskReport {
    fetch: FetchStatus,
    record: RecordStatus,
}

impl RunStats {
    fn absorb(&mut self, joined: Result<TaskReport, JoinError>) {
        let report = match joined {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(err = %e, "matrix task failed");
                self.task_failures += 1;
                return;
            }
        };
        match report.fetch {
            FetchStatus::Fetched => {}
            FetchStatus::Failed | FetchStatus::Panicked => self.fetch_failures += 1,
            FetchStatus::TimedOut => self.fetch_timeouts += 1,
        }
        match report.record {
            RecordStatus::Recorded => self.recorded += 1,
            RecordStatus::PersistFailed(stage) => {
                self.recorded += 1;
                match stage {
                    PersistStage::Checkpoint => self.checkpoint_failures += 1,
                    _ => self.write_failures += 1,
                }
            }
            RecordStatus::Panicked => self.task_failures += 1,
        }
    }
}

/// Everything one spawned task needs to fetch and record its entity.
struct EntityTask<F, S: PersistenceSink> {
    fetcher: Arc<F>,
    store: Arc<MatrixStore<S>>,
    timeout: Duration,
    policy: FlushFailurePolicy,
    cancel: CancellationToken,
}

impl<F, S> EntityTask<F, S>
where
    F: DataFetcher,
    S: PersistenceSink + 'static,
{
    /// Run the fetch on its own task so that a panicking fetcher costs the
    /// entity its data but not its row.
    async fn fetch(&self, entity: &Entity) -> (FetchResult, FetchStatus) {
        let scraped_on = Utc::now();
        tracing::info!(id = entity.id, title = %entity.name, "getting data");

        let mut handle = {
            let fetcher = self.fetcher.clone();
            let entity = entity.clone();
            tokio::spawn(async move { fetcher.fetch(&entity).await })
        };
        let (failure, status) = match tokio::time::timeout(self.timeout, &mut handle).await {
            Ok(Ok(Ok(mut result))) => {
                result.scraped_on.get_or_insert(scraped_on);
                tracing::info!(id = entity.id, title = %entity.name, "obtained data");
                return (result, FetchStatus::Fetched);
            }
            Ok(Ok(Err(e))) => (e.to_string(), FetchStatus::Failed),
            Ok(Err(e)) => (format!("fetch task failed: {e}"), FetchStatus::Panicked),
            Err(_) => {
                handle.abort();
                let e = FetchError::Timeout(self.timeout);
                (e.to_string(), FetchStatus::TimedOut)
            }
        };
        tracing::warn!(
            id = entity.id,
            title = %entity.name,
            err = %failure,
            "fetch failed; recording blank row"
        );
        (FetchResult::failed(scraped_on), status)
    }

    async fn record(&self, entity: Entity, fetched: (FetchResult, FetchStatus)) -> TaskReport {
        let (mut result, fetch) = fetched;
        result.normalize_tags();

        let store = self.store.clone();
        let recorded = tokio::task::spawn_blocking(move || {
            store.record(&entity, &result).map_err(|e| (entity, e))
        })
        .await;
        let record = match recorded {
            Ok(Ok(outcome)) => {
                tracing::debug!(
                    row = outcome.row,
                    new_tags = outcome.new_columns.len(),
                    "recorded"
                );
                RecordStatus::Recorded
            }
            Ok(Err((entity, e))) => {
                tracing::warn!(
                    id = entity.id,
                    title = %entity.name,
                    err = %e,
                    "persisting row failed"
                );
                let checkpoint = e.stage == PersistStage::Checkpoint;
                if checkpoint && self.policy == FlushFailurePolicy::Abort {
                    tracing::error!("checkpoint failed; no further entities will be dispatched");
                    self.cancel.cancel();
                }
                RecordStatus::PersistFailed(e.stage)
            }
            Err(e) => {
                tracing::error!(err = %e, "record panicked");
                RecordStatus::Panicked
            }
        };
        TaskReport { fetch, record }
    }
}

pub struct Scheduler<F, S: PersistenceSink> {
    fetcher: Arc<F>,
    store: Arc<MatrixStore<S>>,
    concurrency: usize,
    fetch_timeout: Duration,
    policy: FlushFailurePolicy,
    cancel: CancellationToken,
}

impl<F, S> Scheduler<F, S>
where
    F: DataFetcher,
    S: PersistenceSink + 'static,
{
    pub fn new(fetcher: Arc<F>, store: Arc<MatrixStore<S>>, config: &BuilderConfig) -> Self {
        Self {
            fetcher,
            store,
            concurrency: config.concurrency.max(1),
            fetch_timeout: config.fetch_timeout,
            policy: config.flush_failure_policy,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Fetch and record every entity, returning once all spawned tasks have
    /// finished. Never fails: per-entity problems end up in the counters.
    pub async fn run(&self, entities: Vec<Entity>) -> RunStats {
        let started = Instant::now();
        let total = entities.len();
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut join_set: JoinSet<TaskReport> = JoinSet::new();
        let mut stats = RunStats::default();

        tracing::info!(total, concurrency = self.concurrency, "starting run");

        for entity in entities {
            let permit = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    stats.cancelled = true;
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            stats.dispatched += 1;

            let task = EntityTask {
                fetcher: self.fetcher.clone(),
                store: self.store.clone(),
                timeout: self.fetch_timeout,
                policy: self.policy,
                cancel: self.cancel.clone(),
            };
            join_set.spawn(async move {
                let fetched = task.fetch(&entity).await;
                drop(permit);
                task.record(entity, fetched).await
            });

            while let Some(joined) = join_set.try_join_next() {
                stats.absorb(joined);
            }
        }

        while let Some(joined) = join_set.join_next().await {
            stats.absorb(joined);
        }
        stats.elapsed = started.elapsed();

        tracing::info!(
            dispatched = stats.dispatched,
            recorded = stats.recorded,
            fetch_failures = stats.fetch_failures,
            fetch_timeouts = stats.fetch_timeouts,
            checkpoint_failures = stats.checkpoint_failures,
            cancelled = stats.cancelled,
            elapsed_ms = stats.elapsed.as_millis() as u64,
            "run finished"
        );
        stats
    }
}
