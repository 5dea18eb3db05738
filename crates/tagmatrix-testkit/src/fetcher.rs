use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tagmatrix::{DataFetcher, FetchError};
use tagmatrix_common::{Entity, FetchResult};

enum Step {
    Ok(FetchResult),
    Fail(String),
    Hang,
    Panic,
}

#[derive(Default)]
struct Script {
    latency: Option<Duration>,
    step: Option<Step>,
}

/// Observations shared between a [`ScriptedFetcher`] and the test.
#[derive(Debug, Default)]
pub struct FetchTracker {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: Mutex<Vec<u64>>,
}

impl FetchTracker {
    fn enter(self: &Arc<Self>, id: u64) -> InFlight {
        self.calls.lock().push(id);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        InFlight(self.clone())
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Entity ids in the order their fetches started.
    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().clone()
    }
}

struct InFlight(Arc<FetchTracker>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

type Hook = Box<dyn Fn(&Entity) + Send + Sync>;

/// Fetcher driven by a per-entity script.
///
/// Entities without a script succeed immediately with no tags.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: HashMap<u64, Script>,
    default_latency: Duration,
    tracker: Arc<FetchTracker>,
    hook: Option<Hook>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tags(self, id: u64, tags: &[&str]) -> Self {
        self.result(id, FetchResult::default().with_tags(tags.iter().copied()))
    }

    pub fn result(mut self, id: u64, result: FetchResult) -> Self {
        self.scripts.entry(id).or_default().step = Some(Step::Ok(result));
        self
    }

    pub fn fail(mut self, id: u64, message: &str) -> Self {
        self.scripts.entry(id).or_default().step = Some(Step::Fail(message.to_string()));
        self
    }

    /// Never resolves; only a timeout gets the entity recorded.
    pub fn hang(mut self, id: u64) -> Self {
        self.scripts.entry(id).or_default().step = Some(Step::Hang);
        self
    }

    /// The fetch panics instead of returning.
    pub fn panic(mut self, id: u64) -> Self {
        self.scripts.entry(id).or_default().step = Some(Step::Panic);
        self
    }

    pub fn latency(mut self, id: u64, latency: Duration) -> Self {
        self.scripts.entry(id).or_default().latency = Some(latency);
        self
    }

    pub fn default_latency(mut self, latency: Duration) -> Self {
        self.default_latency = latency;
        self
    }

    /// Run `hook` at the start of every fetch.
    pub fn on_fetch(mut self, hook: impl Fn(&Entity) + Send + Sync + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn tracker(&self) -> Arc<FetchTracker> {
        self.tracker.clone()
    }
}

impl DataFetcher for ScriptedFetcher {
    async fn fetch(&self, entity: &Entity) -> Result<FetchResult, FetchError> {
        let _in_flight = self.tracker.enter(entity.id);
        if let Some(hook) = &self.hook {
            hook(entity);
        }
        let script = self.scripts.get(&entity.id);
        let latency = script
            .and_then(|s| s.latency)
            .unwrap_or(self.default_latency);
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        match script.and_then(|s| s.step.as_ref()) {
            None => Ok(FetchResult::default()),
            Some(Step::Ok(result)) => Ok(result.clone()),
            Some(Step::Fail(message)) => Err(FetchError::Other(message.clone())),
            Some(Step::Hang) => std::future::pending().await,
            Some(Step::Panic) => panic!("scripted fetch panic for {}", entity.id),
        }
    }
}

/// A generated catalog together with the fetcher that serves it.
pub struct RandomCatalog {
    pub entities: Vec<Entity>,
    pub expected_tags: HashMap<u64, Vec<String>>,
    pub fetcher: ScriptedFetcher,
}

/// `n` entities, each with a random subset of `tag_pool` and a random
/// latency up to `max_latency`. Deterministic for a given `seed`.
pub fn random_catalog(
    seed: u64,
    n: usize,
    tag_pool: &[&str],
    max_latency: Duration,
) -> RandomCatalog {
    let mut rng = SmallRng::seed_from_u64(seed);
    let max_ms = max_latency.as_millis() as u64;
    let mut fetcher = ScriptedFetcher::new();
    let mut entities = Vec::with_capacity(n);
    let mut expected_tags = HashMap::with_capacity(n);
    for i in 0..n {
        let id = 1_000 + i as u64;
        let k = rng.gen_range(0..=tag_pool.len());
        let tags: Vec<&str> = tag_pool.choose_multiple(&mut rng, k).copied().collect();
        let latency = Duration::from_millis(rng.gen_range(0..=max_ms));
        fetcher = fetcher.tags(id, &tags).latency(id, latency);
        expected_tags.insert(id, tags.iter().map(|t| t.to_string()).collect());
        entities.push(Entity::new(id, format!("Game {i}")));
    }
    RandomCatalog {
        entities,
        expected_tags,
        fetcher,
    }
}
