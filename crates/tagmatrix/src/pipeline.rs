use std::sync::Arc;

use tagmatrix_common::Entity;
use tagmatrix_sink::PersistenceSink;
use tokio_util::sync::CancellationToken;

use crate::config::BuilderConfig;
use crate::error::BuildError;
use crate::fetcher::DataFetcher;
use crate::matrix::{MatrixStore, MatrixSummary};
use crate::scheduler::{RunStats, Scheduler};

#[derive(Clone, Debug)]
pub struct BuildReport {
    pub stats: RunStats,
    pub summary: MatrixSummary,
}

/// Build the whole matrix: header, one row per entity, final flush.
///
/// Cancelling `cancel` stops dispatching new entities; rows already in
/// flight are still recorded and the final flush still runs.
pub async fn build_matrix<F, S>(
    entities: Vec<Entity>,
    fetcher: F,
    sink: S,
    config: &BuilderConfig,
    cancel: CancellationToken,
) -> Result<BuildReport, BuildError>
where
    F: DataFetcher,
    S: PersistenceSink + 'static,
{
    let options = config.store_options()?;
    let store = Arc::new(MatrixStore::new(sink, options)?);
    let scheduler =
        Scheduler::new(Arc::new(fetcher), store.clone(), config).with_cancellation(cancel);

    let stats = scheduler.run(entities).await;

    let summary = tokio::task::spawn_blocking(move || store.finish()).await??;
    tracing::info!(
        rows = summary.rows,
        tags = summary.tags,
        destination = ?summary.destination,
        "matrix saved"
    );
    Ok(BuildReport { stats, summary })
}
