use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::cache::{Fetcher, Freshness, QueryCache, SharedFetch};
use super::key::QueryKey;
use super::QueryOptions;
use crate::error::{ApiError, AutoPartError};

/// Caching read layer plus un-retried writes.
///
/// Reads go through [`query`](Self::query); writes go through
/// [`mutate`](Self::mutate) and are followed by [`invalidate`](Self::invalidate)
/// on the keys they affect. Everything that comes out is an [`ApiError`].
///
/// # Example
/// ```no_run
/// use autopart::query::{QueryClient, QueryKey, QueryOptions};
///
/// # async fn example() -> Result<(), autopart::error::ApiError> {
/// let queries = QueryClient::new(QueryOptions::default());
/// let count: u32 = queries
///     .query(QueryKey::new("stats").with("parts"), None, || async { Ok(42u32) })
///     .await?;
/// assert_eq!(count, 42);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct QueryClient {
    cache: QueryCache,
    defaults: QueryOptions,
}

impl std::fmt::Debug for QueryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryClient")
            .field("entries", &self.cache.len())
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl QueryClient {
    pub fn new(defaults: QueryOptions) -> Self {
        Self {
            cache: QueryCache::new(),
            defaults,
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn defaults(&self) -> &QueryOptions {
        &self.defaults
    }

    /// Read through the cache, the way a mounted query hook does.
    ///
    /// - fresh hit: returned without touching the network
    /// - stale hit: returned immediately; a background refetch starts when
    ///   `refetch_on_mount` is set
    /// - missing or invalidated: fetched (with retry) and awaited
    pub async fn query<T, F, Fut>(
        &self,
        key: QueryKey,
        options: Option<QueryOptions>,
        fetcher: F,
    ) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, AutoPartError>> + Send + 'static,
    {
        self.cache.sweep();
        let options = options.unwrap_or_else(|| self.defaults.clone());
        let fetcher = erase(fetcher, &options);

        let pending = {
            let mut entries = self.cache.lock();
            let entry = QueryCache::touch(&mut entries, &key, &options);
            entry.fetcher = Some(fetcher.clone());
            match entry.freshness() {
                Freshness::Fresh => Served::Cached(entry.value.clone()),
                Freshness::Stale => {
                    if options.refetch_on_mount {
                        tracing::debug!(%key, "serving stale data; revalidating");
                        self.cache.start_fetch(&key, entry, fetcher);
                    }
                    Served::Cached(entry.value.clone())
                }
                Freshness::Missing | Freshness::Invalidated => {
                    Served::Pending(self.cache.start_fetch(&key, entry, fetcher))
                }
            }
        };

        let value = match pending {
            Served::Cached(Some(value)) => value,
            Served::Cached(None) => return Err(ApiError::new(format!("no cached data for {key}"))),
            Served::Pending(fetch) => fetch.await?,
        };
        decode(&key, value)
    }

    /// Always hit the network (joining a fetch already in flight), then cache.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: QueryKey,
        options: Option<QueryOptions>,
        fetcher: F,
    ) -> Result<T, ApiError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, AutoPartError>> + Send + 'static,
    {
        let options = options.unwrap_or_else(|| self.defaults.clone());
        let fetcher = erase(fetcher, &options);
        let fetch = {
            let mut entries = self.cache.lock();
            let entry = QueryCache::touch(&mut entries, &key, &options);
            entry.fetcher = Some(fetcher.clone());
            self.cache.start_fetch(&key, entry, fetcher)
        };
        decode(&key, fetch.await?)
    }

    /// Run a write once. No retry: writes are not assumed idempotent.
    pub async fn mutate<T, Fut>(&self, operation: impl FnOnce() -> Fut) -> Result<T, ApiError>
    where
        Fut: Future<Output = Result<T, AutoPartError>>,
    {
        operation().await.map_err(|error| {
            tracing::debug!(error = %error, "mutation failed");
            ApiError::from(error)
        })
    }

    /// Mark everything under `prefix` as invalid; the next read refetches.
    pub fn invalidate(&self, prefix: &QueryKey) -> usize {
        self.cache.invalidate(prefix)
    }

    /// Cached value for `key`, if any, regardless of freshness.
    pub fn get_query_data<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
        self.cache
            .get(key)
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Seed the cache (e.g. with the entity a mutation just returned).
    pub fn set_query_data<T: Serialize>(&self, key: &QueryKey, value: &T) -> Result<(), ApiError> {
        let value = serde_json::to_value(value).map_err(AutoPartError::from)?;
        self.cache.set(key, value, &self.defaults);
        Ok(())
    }

    /// Network came back: refetch stale queries that opted in.
    pub fn reconnected(&self) -> usize {
        self.refetch_stale(|options| options.refetch_on_reconnect, "reconnect")
    }

    /// Window regained focus: refetch stale queries that opted in (none by default).
    pub fn window_focused(&self) -> usize {
        self.refetch_stale(|options| options.refetch_on_window_focus, "window focus")
    }

    /// Wait for every fetch currently in flight to settle.
    pub async fn wait_idle(&self) {
        loop {
            let in_flight: Vec<SharedFetch> = self.cache.in_flight();
            if in_flight.is_empty() {
                return;
            }
            futures::future::join_all(in_flight).await;
        }
    }

    fn refetch_stale(&self, enabled: impl Fn(&QueryOptions) -> bool, trigger: &str) -> usize {
        let mut entries = self.cache.lock();
        let mut started = 0;
        for (key, entry) in entries.iter_mut() {
            if !enabled(&entry.options) || entry.freshness() == Freshness::Fresh {
                continue;
            }
            let Some(fetcher) = entry.fetcher.clone() else {
                continue;
            };
            self.cache.start_fetch(key, entry, fetcher);
            started += 1;
        }
        tracing::debug!(trigger, started, "refetching stale queries");
        started
    }
}

enum Served {
    Cached(Option<serde_json::Value>),
    Pending(SharedFetch),
}

/// Wrap a typed fetcher into the cache's JSON fetcher, applying retry and
/// error normalization.
fn erase<T, F, Fut>(fetcher: F, options: &QueryOptions) -> Fetcher
where
    T: Serialize + Send + 'static,
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, AutoPartError>> + Send + 'static,
{
    let fetcher = Arc::new(fetcher);
    let policy = options.retry_policy();
    Arc::new(move || {
        let fetcher = fetcher.clone();
        let policy = policy.clone();
        async move {
            let value = policy.execute(|| fetcher()).await?;
            Ok(serde_json::to_value(value)?)
        }
        .map(|result: Result<serde_json::Value, AutoPartError>| result.map_err(ApiError::from))
        .boxed()
    })
}

fn decode<T: DeserializeOwned>(key: &QueryKey, value: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| {
        ApiError::new(format!("cached data for {key} has an unexpected shape: {e}"))
            .with_code("serialization")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::future::{ready, BoxFuture, Ready};
    use pretty_assertions::assert_eq;

    fn counting(
        calls: &Arc<AtomicUsize>,
    ) -> impl Fn() -> Ready<Result<usize, AutoPartError>> + Send + Sync + 'static {
        let calls = calls.clone();
        move || ready(Ok(calls.fetch_add(1, Ordering::SeqCst) + 1))
    }

    fn slow(
        calls: &Arc<AtomicUsize>,
    ) -> impl Fn() -> BoxFuture<'static, Result<usize, AutoPartError>> + Send + Sync + 'static {
        let calls = calls.clone();
        move || {
            let calls = calls.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(1)).await;
                Ok(calls.fetch_add(1, Ordering::SeqCst) + 1)
            }
            .boxed()
        }
    }

    fn key() -> QueryKey {
        QueryKey::new("parts").with("detail").with(1)
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_hit_skips_the_fetcher() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let first: usize = client.query(key(), None, counting(&calls)).await.unwrap();
        let second: usize = client.query(key(), None, counting(&calls)).await.unwrap();

        assert_eq!((first, second), (1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stale_hit_is_served_then_revalidated() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let _: usize = client.query(key(), None, counting(&calls)).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        let served: usize = client.query(key(), None, counting(&calls)).await.unwrap();
        client.wait_idle().await;

        assert_eq!(served, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(client.get_query_data::<usize>(&key()), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_hit_without_refetch_on_mount_stays_put() {
        let client = QueryClient::new(QueryOptions::default());
        let options = QueryOptions::builder().refetch_on_mount(false).build();
        let calls = Arc::new(AtomicUsize::new(0));
        let _: usize = client
            .query(key(), Some(options.clone()), counting(&calls))
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        let _: usize = client
            .query(key(), Some(options), counting(&calls))
            .await
            .unwrap();
        client.wait_idle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidated_entry_is_refetched_before_returning() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let _: usize = client.query(key(), None, counting(&calls)).await.unwrap();

        assert_eq!(client.invalidate(&QueryKey::new("parts")), 1);
        let value: usize = client.query(key(), None, counting(&calls)).await.unwrap();

        assert_eq!(value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_reads_share_one_fetch() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let (a, b) = tokio::join!(
            client.query::<usize, _, _>(key(), None, slow(&calls)),
            client.query::<usize, _, _>(key(), None, slow(&calls)),
        );

        assert_eq!((a.unwrap(), b.unwrap()), (1, 1));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn invalidation_during_fetch_is_not_lost() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));

        let reader = client.clone();
        let fetcher = slow(&calls);
        let handle = tokio::spawn(async move { reader.query::<usize, _, _>(key(), None, fetcher).await });
        while client.cache().in_flight().is_empty() {
            tokio::task::yield_now().await;
        }
        client.invalidate(&QueryKey::new("parts"));
        assert_eq!(handle.await.unwrap().unwrap(), 1);

        assert_ne!(client.cache().freshness(&key()), Freshness::Fresh);
        let value: usize = client.query(key(), None, slow(&calls)).await.unwrap();
        assert_eq!(value, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn read_after_write_does_not_join_an_older_fetch() {
        let client = QueryClient::new(QueryOptions::default());
        let backend_version = Arc::new(AtomicUsize::new(1));
        let warehouses = || QueryKey::new("warehouses").with("detail").with(1);
        let fetcher = {
            let backend_version = backend_version.clone();
            move || {
                let seen = backend_version.load(Ordering::SeqCst);
                async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Ok::<_, AutoPartError>(seen)
                }
                .boxed()
            }
        };

        let reader = client.clone();
        let before_write = fetcher.clone();
        let early = tokio::spawn(async move {
            reader.query::<usize, _, _>(warehouses(), None, before_write).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;

        backend_version.store(2, Ordering::SeqCst);
        client.invalidate(&QueryKey::new("warehouses"));
        let after_write: usize = client.query(warehouses(), None, fetcher).await.unwrap();

        assert_eq!(after_write, 2);
        assert_eq!(early.await.unwrap().unwrap(), 1);
        client.wait_idle().await;
        assert_eq!(client.get_query_data::<usize>(&warehouses()), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_refetches_stale_queries_but_focus_does_not() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let _: usize = client.query(key(), None, counting(&calls)).await.unwrap();

        assert_eq!(client.reconnected(), 0, "fresh entries are left alone");

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(client.window_focused(), 0);
        assert_eq!(client.reconnected(), 1);
        client.wait_idle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn window_focus_refetch_is_opt_in() {
        let client = QueryClient::new(QueryOptions::builder().refetch_on_window_focus(true).build());
        let calls = Arc::new(AtomicUsize::new(0));
        let _: usize = client.query(key(), None, counting(&calls)).await.unwrap();

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(client.window_focused(), 1);
        client.wait_idle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn idle_entries_are_collected() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let _: usize = client.query(key(), None, counting(&calls)).await.unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;
        let other = QueryKey::new("parts").with("detail").with(2);
        let _: usize = client.query(other, None, counting(&calls)).await.unwrap();

        assert_eq!(client.get_query_data::<usize>(&key()), None);
        assert_eq!(client.cache().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failing_read_retries_then_normalizes() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();

        let err = client
            .query::<usize, _, _>(key(), None, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                ready(Err(AutoPartError::api(503, "warehouse service down")))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(err.status, Some(503));
        assert_eq!(err.message, "warehouse service down");
    }

    #[tokio::test]
    async fn mutation_runs_exactly_once() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = AtomicUsize::new(0);

        let err = client
            .mutate(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(AutoPartError::api(500, "insert failed"))
            })
            .await
            .unwrap_err();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err.code.as_deref(), Some("server"));
    }

    #[tokio::test]
    async fn seeded_data_is_served_without_fetching() {
        let client = QueryClient::new(QueryOptions::default());
        let calls = Arc::new(AtomicUsize::new(0));
        client.set_query_data(&key(), &7usize).unwrap();

        let value: usize = client.query(key(), None, counting(&calls)).await.unwrap();

        assert_eq!(value, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
