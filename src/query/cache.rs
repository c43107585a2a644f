//! Query cache with staleness and idle eviction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde_json::Value;
use tokio::time::Instant;

use super::key::QueryKey;
use super::QueryOptions;
use crate::error::ApiError;

pub(crate) type FetchResult = Result<Value, ApiError>;
pub(crate) type Fetcher = Arc<dyn Fn() -> BoxFuture<'static, FetchResult> + Send + Sync>;
pub(crate) type SharedFetch = Shared<BoxFuture<'static, FetchResult>>;

/// Freshness of a cached entry at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Missing,
    Fresh,
    Stale,
    /// Explicitly invalidated; must not be served.
    Invalidated,
}

pub(crate) struct Entry {
    pub(crate) value: Option<Value>,
    pub(crate) updated_at: Option<Instant>,
    pub(crate) last_accessed: Instant,
    pub(crate) invalidated: bool,
    generation: u64,
    pub(crate) options: QueryOptions,
    pub(crate) fetcher: Option<Fetcher>,
    pub(crate) in_flight: Option<InFlight>,
}

/// A running fetch and the entry generation it was started for.
#[derive(Clone)]
pub(crate) struct InFlight {
    generation: u64,
    fetch: SharedFetch,
}

impl Entry {
    fn new(options: QueryOptions) -> Self {
        Self {
            value: None,
            updated_at: None,
            last_accessed: Instant::now(),
            invalidated: false,
            generation: 0,
            options,
            fetcher: None,
            in_flight: None,
        }
    }

    pub(crate) fn freshness(&self) -> Freshness {
        match (&self.value, self.updated_at) {
            (None, _) | (_, None) => Freshness::Missing,
            _ if self.invalidated => Freshness::Invalidated,
            (Some(_), Some(at)) if at.elapsed() < self.options.stale_time => Freshness::Fresh,
            _ => Freshness::Stale,
        }
    }

    fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_accessed)
    }
}

/// Shared map of cached query results, stored as JSON.
#[derive(Clone, Default)]
pub struct QueryCache {
    inner: Arc<Mutex<HashMap<QueryKey, Entry>>>,
}

impl QueryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Drop entries idle for longer than their `gc_time`. In-flight entries stay.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|key, entry| {
            let keep = entry.in_flight.is_some() || entry.idle_for(now) <= entry.options.gc_time;
            if !keep {
                tracing::debug!(%key, "evicting idle query");
            }
            keep
        });
        before - entries.len()
    }

    /// Get or create the entry for `key`, refreshing its access time.
    pub(crate) fn touch<'a>(
        entries: &'a mut HashMap<QueryKey, Entry>,
        key: &QueryKey,
        options: &QueryOptions,
    ) -> &'a mut Entry {
        let entry = entries
            .entry(key.clone())
            .or_insert_with(|| Entry::new(options.clone()));
        entry.last_accessed = Instant::now();
        entry.options = options.clone();
        entry
    }

    /// Start (or join) the fetch for an entry; the fetch is driven on its own task.
    ///
    /// A fetch started before the latest invalidation is not joined: its
    /// data predates the write that invalidated the entry.
    pub(crate) fn start_fetch(&self, key: &QueryKey, entry: &mut Entry, fetcher: Fetcher) -> SharedFetch {
        if let Some(in_flight) = &entry.in_flight {
            if in_flight.generation == entry.generation {
                return in_flight.fetch.clone();
            }
            tracing::debug!(%key, "superseding fetch started before invalidation");
        }

        let cache = self.clone();
        let owned_key = key.clone();
        let generation = entry.generation;
        let fetch = async move {
            let result = fetcher().await;
            cache.complete(&owned_key, generation, &result);
            result
        }
        .boxed()
        .shared();

        entry.in_flight = Some(InFlight {
            generation,
            fetch: fetch.clone(),
        });
        tokio::spawn(fetch.clone());
        fetch
    }

    fn complete(&self, key: &QueryKey, generation: u64, result: &FetchResult) {
        let mut entries = self.lock();
        let Some(entry) = entries.get_mut(key) else {
            return;
        };
        if entry.in_flight.as_ref().map(|f| f.generation) == Some(generation) {
            entry.in_flight = None;
        }
        // An invalidation landed mid-fetch; this result is already out of date.
        if entry.generation != generation {
            tracing::debug!(%key, "dropping result of superseded fetch");
            return;
        }
        match result {
            Ok(value) => {
                entry.value = Some(value.clone());
                entry.updated_at = Some(Instant::now());
                entry.invalidated = false;
            }
            Err(error) => {
                tracing::debug!(%key, error = %error, "query fetch failed");
            }
        }
    }

    /// Mark every entry under `prefix` as invalidated. Returns how many matched.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        let mut entries = self.lock();
        let mut count = 0;
        for (key, entry) in entries.iter_mut() {
            if key.starts_with(prefix) {
                entry.invalidated = true;
                entry.generation += 1;
                count += 1;
            }
        }
        tracing::debug!(%prefix, count, "invalidated queries");
        count
    }

    /// Drop every entry under `prefix`.
    pub fn remove(&self, prefix: &QueryKey) {
        self.lock().retain(|key, _| !key.starts_with(prefix));
    }

    pub fn get(&self, key: &QueryKey) -> Option<Value> {
        self.lock().get(key).and_then(|entry| entry.value.clone())
    }

    pub fn freshness(&self, key: &QueryKey) -> Freshness {
        self.lock()
            .get(key)
            .map(Entry::freshness)
            .unwrap_or(Freshness::Missing)
    }

    /// Seed or overwrite an entry as freshly fetched.
    pub fn set(&self, key: &QueryKey, value: Value, options: &QueryOptions) {
        let mut entries = self.lock();
        let entry = Self::touch(&mut entries, key, options);
        entry.value = Some(value);
        entry.updated_at = Some(Instant::now());
        entry.invalidated = false;
    }

    /// Fetches currently in flight.
    pub(crate) fn in_flight(&self) -> Vec<SharedFetch> {
        self.lock()
            .values()
            .filter_map(|entry| entry.in_flight.as_ref().map(|f| f.fetch.clone()))
            .collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(stale_secs: u64, gc_secs: u64) -> QueryOptions {
        QueryOptions {
            stale_time: Duration::from_secs(stale_secs),
            gc_time: Duration::from_secs(gc_secs),
            ..QueryOptions::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn entry_goes_stale_after_stale_time() {
        let cache = QueryCache::new();
        let key = QueryKey::new("warehouses").with(1);
        cache.set(&key, json!({"id": 1}), &options(60, 300));
        assert_eq!(cache.freshness(&key), Freshness::Fresh);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(cache.freshness(&key), Freshness::Stale);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_evicts_only_idle_entries() {
        let cache = QueryCache::new();
        let old = QueryKey::new("customers").with(1);
        let recent = QueryKey::new("customers").with(2);
        cache.set(&old, json!(1), &options(60, 300));
        tokio::time::advance(Duration::from_secs(200)).await;
        cache.set(&recent, json!(2), &options(60, 300));
        tokio::time::advance(Duration::from_secs(150)).await;

        assert_eq!(cache.sweep(), 1);
        assert!(cache.get(&old).is_none());
        assert_eq!(cache.get(&recent), Some(json!(2)));
    }

    #[tokio::test]
    async fn invalidate_matches_prefix() {
        let cache = QueryCache::new();
        let opts = options(60, 300);
        cache.set(&QueryKey::new("warehouses").with("detail").with(1), json!(1), &opts);
        cache.set(&QueryKey::new("warehouses").with("search"), json!([]), &opts);
        cache.set(&QueryKey::new("customers").with("detail").with(1), json!(1), &opts);

        assert_eq!(cache.invalidate(&QueryKey::new("warehouses")), 2);
        assert_eq!(
            cache.freshness(&QueryKey::new("warehouses").with("search")),
            Freshness::Invalidated
        );
        assert_eq!(
            cache.freshness(&QueryKey::new("customers").with("detail").with(1)),
            Freshness::Fresh
        );
    }
}
