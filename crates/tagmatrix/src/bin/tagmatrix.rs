#[cfg(not(any(feature = "csv", feature = "umya")))]
compile_error!("the tagmatrix binary needs the `csv` or `umya` feature");

use std::fs::File;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tagmatrix::{
    Cli, Entity, SteamAppList, SteamFetcher, apply_limit, build_matrix, load_entities_json,
};
use tagmatrix_sink::AnySink;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_file.as_deref())?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("building tokio runtime")?;
    runtime.block_on(run(cli))
}

fn init_tracing(log_file: Option<&Path>) -> Result<()> {
    let file_layer = match log_file {
        Some(path) => {
            let file = File::options()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();
    Ok(())
}

async fn load_entities(cli: &Cli) -> Result<Vec<Entity>> {
    let config = cli.builder_config();
    if let Some(path) = &cli.entities {
        let entities = load_entities_json(path)
            .with_context(|| format!("loading entities from {}", path.display()))?;
        return Ok(apply_limit(entities, cli.limit));
    }
    let key = cli.api_key.clone().unwrap_or_default();
    let list = SteamAppList::new(key, config.fetch_timeout)?;
    list.fetch_all(cli.limit)
        .await
        .context("listing Steam apps")
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.builder_config();
    config.validate()?;
    let format = cli.sink_format()?;

    let entities = load_entities(&cli).await?;
    tracing::info!(count = entities.len(), "entities loaded");

    let sink = AnySink::create(format, &cli.output, &config.sheet)
        .with_context(|| format!("opening {}", cli.output.display()))?;
    let fetcher = SteamFetcher::new(config.fetch_timeout)?;

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted; finishing in-flight entities");
                cancel.cancel();
            }
        }
    });

    let report = build_matrix(entities, fetcher, sink, &config, cancel)
        .await
        .context("building matrix")?;

    let stats = &report.stats;
    tracing::info!(
        recorded = stats.recorded,
        tags = report.summary.tags,
        fetch_failures = stats.fetch_failures + stats.fetch_timeouts,
        checkpoint_failures = stats.checkpoint_failures,
        cancelled = stats.cancelled,
        "program finished"
    );
    Ok(())
}
