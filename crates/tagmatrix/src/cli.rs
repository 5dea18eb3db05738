use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};
use tagmatrix_sink::SinkFormat;

use crate::config::{BuilderConfig, FlushFailurePolicy};
use crate::error::ConfigError;

/// Build a game x user-tag incidence matrix from the Steam catalog.
#[derive(Debug, Parser)]
#[command(name = "tagmatrix", author, version, about, long_about = None)]
pub struct Cli {
    /// Steam Web API key used to list every game.
    #[arg(
        long,
        env = "STEAM_WEB_API_KEY",
        hide_env_values = true,
        required_unless_present = "entities"
    )]
    pub api_key: Option<String>,

    /// Read entities from a JSON array of {"appid", "name"} objects instead of the app list.
    #[arg(long, value_name = "FILE")]
    pub entities: Option<PathBuf>,

    /// Output file.
    #[arg(long, short, default_value = "game_tags_adjacency_matrix.xlsx")]
    pub output: PathBuf,

    /// Output format; inferred from the output extension when omitted.
    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Maximum fetches in flight.
    #[arg(long, env = "TAGMATRIX_CONCURRENCY", default_value_t = 4)]
    pub concurrency: usize,

    /// Save the output every N recorded entities.
    #[arg(long, env = "TAGMATRIX_CHECKPOINT_INTERVAL", default_value_t = 10)]
    pub checkpoint_interval: u64,

    #[arg(long, env = "TAGMATRIX_FETCH_TIMEOUT_SECS", default_value_t = 60)]
    pub fetch_timeout_secs: u64,

    /// Only process the first N entities.
    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long, default_value = tagmatrix_sink::DEFAULT_SHEET)]
    pub sheet: String,

    /// Stop dispatching after the first failed checkpoint.
    #[arg(long)]
    pub abort_on_flush_failure: bool,

    /// Also write plain-text logs to this file.
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Xlsx,
    Csv,
}

impl From<OutputFormat> for SinkFormat {
    fn from(value: OutputFormat) -> Self {
        match value {
            OutputFormat::Xlsx => SinkFormat::Xlsx,
            OutputFormat::Csv => SinkFormat::Csv,
        }
    }
}

impl Cli {
    pub fn builder_config(&self) -> BuilderConfig {
        BuilderConfig {
            concurrency: self.concurrency,
            checkpoint_interval: self.checkpoint_interval,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            sheet: self.sheet.clone(),
            flush_failure_policy: if self.abort_on_flush_failure {
                FlushFailurePolicy::Abort
            } else {
                FlushFailurePolicy::Continue
            },
        }
    }

    pub fn sink_format(&self) -> Result<SinkFormat, ConfigError> {
        match self.format {
            Some(f) => Ok(f.into()),
            None => SinkFormat::from_path(&self.output)
                .ok_or_else(|| ConfigError::UnknownFormat(self.output.display().to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_from_entities_file() {
        let cli = Cli::try_parse_from(["tagmatrix", "--entities", "games.json"]).unwrap();
        assert_eq!(cli.output, PathBuf::from("game_tags_adjacency_matrix.xlsx"));
        assert_eq!(cli.sink_format().unwrap(), SinkFormat::Xlsx);
        let cfg = cli.builder_config();
        assert_eq!(cfg.concurrency, 4);
        assert_eq!(cfg.checkpoint_interval, 10);
        assert_eq!(cfg.fetch_timeout, Duration::from_secs(60));
        assert_eq!(cfg.flush_failure_policy, FlushFailurePolicy::Continue);
    }

    #[test]
    fn explicit_flags() {
        let cli = Cli::try_parse_from([
            "tagmatrix",
            "--api-key",
            "k",
            "--output",
            "out.data",
            "--format",
            "csv",
            "--concurrency",
            "8",
            "--checkpoint-interval",
            "25",
            "--abort-on-flush-failure",
            "--limit",
            "100",
        ])
        .unwrap();
        assert_eq!(cli.sink_format().unwrap(), SinkFormat::Csv);
        assert_eq!(cli.limit, Some(100));
        let cfg = cli.builder_config();
        assert_eq!(cfg.concurrency, 8);
        assert_eq!(cfg.checkpoint_interval, 25);
        assert_eq!(cfg.flush_failure_policy, FlushFailurePolicy::Abort);
    }

    #[test]
    fn unknown_extension_needs_format() {
        let cli =
            Cli::try_parse_from(["tagmatrix", "--entities", "g.json", "-o", "matrix.ods"]).unwrap();
        assert!(matches!(
            cli.sink_format(),
            Err(ConfigError::UnknownFormat(_))
        ));
    }
}
