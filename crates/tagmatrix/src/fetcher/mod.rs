//! Per-entity data retrieval.

mod steam;

use std::future::Future;

use tagmatrix_common::{Entity, FetchResult};

use crate::error::FetchError;

pub use steam::{SteamEndpoints, SteamFetcher};

/// Fetches metadata and tags for one entity.
///
/// Implementations must be safe to call concurrently; the scheduler bounds
/// how many calls are in flight. Errors are never fatal to a run: the
/// entity is still recorded, with blank metadata and no tags.
pub trait DataFetcher: Send + Sync + 'static {
    fn fetch(
        &self,
        entity: &Entity,
    ) -> impl Future<Output = Result<FetchResult, FetchError>> + Send;
}
