//! In-memory query cache with per-key fetch deduplication and prefix invalidation.

mod key;

use std::{
    any::Any,
    collections::HashMap,
    future::Future,
    sync::Arc,
    time::{Duration, Instant},
};

use futures::future::{BoxFuture, FutureExt, Shared, WeakShared};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::ApiError;

pub use key::ResourceKey;

type Payload = Arc<dyn Any + Send + Sync>;
type PendingFetch = BoxFuture<'static, Result<Payload, ApiError>>;
type SharedFetch = Shared<PendingFetch>;

/// Per-call query settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    /// When false nothing is fetched and [`QueryState::Disabled`] is returned.
    pub enabled: bool,
    /// How long a fetched value is served without hitting the network.
    pub ttl: Duration,
}

impl QueryOptions {
    /// Enabled query with the given freshness window.
    pub fn new(ttl: Duration) -> Self {
        Self { enabled: true, ttl }
    }

    /// Gate the query, typically on session readiness.
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Outcome of a successful [`QueryCache::query`].
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<T> {
    /// The query is gated off; no data and no request.
    Disabled,
    /// Cached or freshly fetched data.
    Ready(T),
}

impl<T> QueryState<T> {
    /// The data, if any.
    pub fn data(self) -> Option<T> {
        match self {
            QueryState::Ready(value) => Some(value),
            QueryState::Disabled => None,
        }
    }

    /// True when data is present.
    pub fn is_ready(&self) -> bool {
        matches!(self, QueryState::Ready(_))
    }
}

struct Entry {
    value: Payload,
    fetched_at: Instant,
    stale: bool,
}

impl Entry {
    fn is_fresh(&self, ttl: Duration) -> bool {
        !self.stale && self.fetched_at.elapsed() < ttl
    }
}

/// Only callers keep a fetch alive. Once every caller has dropped it the
/// weak handle stops upgrading and the next query starts over.
struct InFlight {
    id: u64,
    fetch: WeakShared<PendingFetch>,
}

#[derive(Default)]
struct Inner {
    entries: HashMap<ResourceKey, Entry>,
    in_flight: HashMap<ResourceKey, InFlight>,
    next_id: u64,
}

impl Inner {
    fn join(&self, key: &ResourceKey) -> Option<SharedFetch> {
        self.in_flight.get(key)?.fetch.upgrade()
    }
}

/// Key-addressed cache of server data. Process memory only.
///
/// At most one fetch per key is in flight; callers asking for the same key
/// meanwhile share its result. Invalidation marks entries stale and detaches
/// running fetches, so concurrent mutations touching the same prefixes cannot
/// corrupt anything: the next query simply refetches.
#[derive(Clone, Default)]
pub struct QueryCache {
    inner: Arc<Mutex<Inner>>,
}

impl QueryCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached value for `key` when fresh, otherwise fetch it with
    /// `fetcher` (or join the fetch already running for `key`).
    ///
    /// A failed fetch leaves any previously cached value in place.
    pub async fn query<T, F, Fut>(
        &self,
        key: ResourceKey,
        options: QueryOptions,
        fetcher: F,
    ) -> Result<QueryState<T>, ApiError>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        if !options.enabled {
            debug!("query {key} disabled");
            return Ok(QueryState::Disabled);
        }

        let joined = {
            let inner = self.inner.lock();
            if let Some(entry) = inner.entries.get(&key) {
                if entry.is_fresh(options.ttl) {
                    debug!("cache hit for {key}");
                    return downcast(&key, &entry.value).map(QueryState::Ready);
                }
            }
            inner.join(&key)
        };

        let fetch = match joined {
            Some(fetch) => {
                debug!("joining in-flight fetch for {key}");
                fetch
            }
            None => {
                // The fetcher only builds a lazy future; it runs outside the lock.
                let pending = fetcher();
                let mut inner = self.inner.lock();
                if let Some(fetch) = inner.join(&key) {
                    fetch
                } else {
                    let id = inner.next_id;
                    inner.next_id += 1;
                    debug!("fetching {key}");
                    let fetch = self.start_fetch(key.clone(), id, pending);
                    match fetch.downgrade() {
                        Some(weak) => {
                            inner.in_flight.insert(key.clone(), InFlight { id, fetch: weak });
                        }
                        None => {
                            inner.in_flight.remove(&key);
                        }
                    }
                    fetch
                }
            }
        };

        let payload = fetch.await?;
        downcast(&key, &payload).map(QueryState::Ready)
    }

    /// Run one write and, only once it has succeeded, invalidate every entry
    /// under `invalidates`. On failure the cache is untouched.
    pub async fn mutate<T, Fut>(&self, action: Fut, invalidates: &[ResourceKey]) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let value = action.await?;
        self.invalidate(invalidates);
        Ok(value)
    }

    /// Mark every entry whose key starts with one of `prefixes` as stale.
    ///
    /// Fetches already in flight for such keys are detached: their current
    /// callers still get the result, but it is not stored and later queries
    /// start a new fetch.
    ///
    /// Returns the number of entries newly marked.
    pub fn invalidate(&self, prefixes: &[ResourceKey]) -> usize {
        let mut inner = self.inner.lock();
        let mut marked = 0;
        for (key, entry) in inner.entries.iter_mut() {
            if !entry.stale && prefixes.iter().any(|prefix| key.starts_with(prefix)) {
                entry.stale = true;
                marked += 1;
            }
        }
        inner
            .in_flight
            .retain(|key, _| !prefixes.iter().any(|prefix| key.starts_with(prefix)));

        let names = prefixes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        info!("invalidated {marked} cached entries under [{names}]");
        marked
    }

    /// Cached value for `key` regardless of freshness.
    pub fn peek<T>(&self, key: &ResourceKey) -> Option<T>
    where
        T: Clone + 'static,
    {
        let inner = self.inner.lock();
        let entry = inner.entries.get(key)?;
        downcast(key, &entry.value).ok()
    }

    /// Whether a query for `key` with `ttl` would be served from memory.
    pub fn is_fresh(&self, key: &ResourceKey, ttl: Duration) -> bool {
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.is_fresh(ttl))
    }

    /// Drop every entry and forget in-flight fetches; their results are discarded.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.in_flight.clear();
        debug!("query cache cleared");
    }

    /// Number of cached entries, stale ones included.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn start_fetch<T, Fut>(&self, key: ResourceKey, id: u64, pending: Fut) -> SharedFetch
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        async move {
            let result = pending.await.map(|value| Arc::new(value) as Payload);

            let mut guard = inner.lock();
            let current = guard
                .in_flight
                .get(&key)
                .is_some_and(|in_flight| in_flight.id == id);
            if current {
                guard.in_flight.remove(&key);
                if let Ok(value) = &result {
                    guard.entries.insert(
                        key,
                        Entry {
                            value: Arc::clone(value),
                            fetched_at: Instant::now(),
                            stale: false,
                        },
                    );
                }
            } else {
                debug!("discarding result of detached fetch for {key}");
            }
            drop(guard);
            result
        }
        .boxed()
        .shared()
    }
}

fn downcast<T>(key: &ResourceKey, payload: &Payload) -> Result<T, ApiError>
where
    T: Clone + 'static,
{
    (**payload)
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| ApiError::Decode(format!("cached value for {key} has an unexpected type")))
}
