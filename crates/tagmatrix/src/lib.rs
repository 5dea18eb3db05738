//! Concurrent builder for entity x tag incidence matrices.
//!
//! Entities are fetched with bounded concurrency and appended to a
//! [`MatrixStore`] as they complete: one row per entity, one column per
//! distinct tag (allocated on first sight, never reused), and a presence
//! marker at each intersection. The store flushes its sink every
//! `checkpoint_interval` rows and once more at the end.

pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod matrix;
pub mod pipeline;
pub mod scheduler;
pub mod source;

pub use cli::{Cli, OutputFormat};
pub use config::{BuilderConfig, FlushFailurePolicy, StoreOptions};
pub use error::{BuildError, ConfigError, FetchError, PersistStage, PersistenceError, SourceError};
pub use fetcher::{DataFetcher, SteamEndpoints, SteamFetcher};
pub use matrix::{MatrixSnapshot, MatrixStore, MatrixSummary, RecordOutcome};
pub use pipeline::{BuildReport, build_matrix};
pub use scheduler::{RunStats, Scheduler};
pub use source::{SteamAppList, apply_limit, load_entities_json};

pub use tagmatrix_common::{ColumnId, Entity, FetchResult, MetadataField};
