use std::num::NonZeroU64;
use std::time::Duration;

use tagmatrix_sink::DEFAULT_SHEET;

use crate::error::ConfigError;

pub const DEFAULT_CONCURRENCY: usize = 4;
pub const DEFAULT_CHECKPOINT_INTERVAL: u64 = 10;
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// What the scheduler does after a checkpoint flush fails.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlushFailurePolicy {
    /// Log, count, keep going; the next checkpoint retries implicitly.
    #[default]
    Continue,
    /// Stop dispatching new entities. In-flight work still finishes and the
    /// final flush still runs.
    Abort,
}

#[derive(Clone, Debug)]
pub struct BuilderConfig {
    /// Maximum number of fetches in flight.
    pub concurrency: usize,
    /// Flush every this many recorded entities.
    pub checkpoint_interval: u64,
    pub fetch_timeout: Duration,
    pub sheet: String,
    pub flush_failure_policy: FlushFailurePolicy,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            sheet: DEFAULT_SHEET.to_string(),
            flush_failure_policy: FlushFailurePolicy::Continue,
        }
    }
}

impl BuilderConfig {
    /// Single-worker configuration; rows then follow input order.
    pub fn sequential() -> Self {
        Self {
            concurrency: 1,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if self.checkpoint_interval == 0 {
            return Err(ConfigError::ZeroCheckpointInterval);
        }
        if self.fetch_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.sheet.trim().is_empty() {
            return Err(ConfigError::EmptySheetName);
        }
        Ok(())
    }

    /// Validated options for the matrix store.
    pub fn store_options(&self) -> Result<StoreOptions, ConfigError> {
        self.validate()?;
        let interval =
            NonZeroU64::new(self.checkpoint_interval).ok_or(ConfigError::ZeroCheckpointInterval)?;
        Ok(StoreOptions {
            sheet: self.sheet.clone(),
            checkpoint_interval: interval,
        })
    }
}

#[derive(Clone, Debug)]
pub struct StoreOptions {
    pub sheet: String,
    pub checkpoint_interval: NonZeroU64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            sheet: DEFAULT_SHEET.to_string(),
            checkpoint_interval: NonZeroU64::new(DEFAULT_CHECKPOINT_INTERVAL)
                .unwrap_or(NonZeroU64::MIN),
        }
    }
}

impl StoreOptions {
    pub fn with_checkpoint_interval(mut self, interval: NonZeroU64) -> Self {
        self.checkpoint_interval = interval;
        self
    }
}
