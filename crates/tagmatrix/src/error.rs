use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// Where in the matrix lifecycle a persistence call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PersistStage {
    /// Writing the fixed header row at start-up.
    Header,
    /// A cell write inside `record`.
    Write,
    /// The periodic flush inside `record`.
    Checkpoint,
    /// The flush after all workers joined.
    FinalFlush,
    Close,
}

impl fmt::Display for PersistStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PersistStage::Header => "header write",
            PersistStage::Write => "cell write",
            PersistStage::Checkpoint => "checkpoint flush",
            PersistStage::FinalFlush => "final flush",
            PersistStage::Close => "close",
        })
    }
}

/// A sink failure, tagged with the stage it happened in.
///
/// In-memory matrix state is never rolled back because of one of these;
/// only the durable copy may lag behind.
#[derive(Debug, Error)]
#[error("{stage} failed on {backend} sink: {source}")]
pub struct PersistenceError {
    pub stage: PersistStage,
    pub backend: &'static str,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}

impl PersistenceError {
    pub fn new<E>(stage: PersistStage, backend: &'static str, err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            stage,
            backend,
            source: Box::new(err),
        }
    }

    /// True for failures that may leave the final file incomplete.
    pub fn is_terminal(&self) -> bool {
        matches!(self.stage, PersistStage::FinalFlush | PersistStage::Close)
    }
}

/// Repeated `finish` after one that failed; carries the original stage.
#[derive(Debug, Error)]
#[error("matrix already failed to finish at {0}")]
pub(crate) struct AlreadyFailed(pub PersistStage);

/// Failure to obtain data for one entity. Always recovered locally.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("building HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("decoding {what}: {message}")]
    Decode { what: &'static str, message: String },

    #[error("no data for entity {0}")]
    NotFound(u64),

    #[error("fetch timed out after {0:?}")]
    Timeout(Duration),

    #[error("metadata: {metadata}; tags: {tags}")]
    Both {
        metadata: Box<FetchError>,
        tags: Box<FetchError>,
    },

    #[error("{0}")]
    Other(String),
}

/// Failure to load the entity list.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON in {what}: {source}")]
    Json {
        what: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("a Steam Web API key is required to list apps")]
    MissingApiKey,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("concurrency must be at least 1")]
    ZeroConcurrency,

    #[error("checkpoint interval must be at least 1")]
    ZeroCheckpointInterval,

    #[error("fetch timeout must be non-zero")]
    ZeroTimeout,

    #[error("sheet name must not be empty")]
    EmptySheetName,

    #[error("cannot infer output format from {0}; pass --format")]
    UnknownFormat(String),
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error("matrix task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
