//! Data-fetching layer: cached reads, un-retried writes, invalidation.

pub mod cache;
pub mod client;
pub mod key;
pub mod resource;
pub mod retry;

pub use cache::{Freshness, QueryCache};
pub use client::QueryClient;
pub use key::QueryKey;
pub use resource::ResourceQueries;
pub use retry::RetryPolicy;

use std::time::Duration;

use bon::Builder;

pub const DEFAULT_STALE_TIME: Duration = Duration::from_secs(60);
pub const DEFAULT_GC_TIME: Duration = Duration::from_secs(5 * 60);

/// Read policy for a query.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use autopart::query::QueryOptions;
///
/// let options = QueryOptions::builder()
///     .stale_time(Duration::from_secs(10))
///     .retry(3)
///     .build();
/// assert_eq!(options.gc_time, Duration::from_secs(300));
/// assert!(!options.refetch_on_window_focus);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Builder)]
pub struct QueryOptions {
    /// How long fetched data counts as fresh.
    #[builder(default = DEFAULT_STALE_TIME)]
    pub stale_time: Duration,
    /// How long an untouched entry survives before eviction.
    #[builder(default = DEFAULT_GC_TIME)]
    pub gc_time: Duration,
    /// Retries after a failed fetch.
    #[builder(default = 1)]
    pub retry: u32,
    #[builder(default = Duration::from_secs(1))]
    pub retry_base_delay: Duration,
    #[builder(default = Duration::from_secs(30))]
    pub retry_max_delay: Duration,
    #[builder(default = true)]
    pub refetch_on_mount: bool,
    #[builder(default = true)]
    pub refetch_on_reconnect: bool,
    #[builder(default = false)]
    pub refetch_on_window_focus: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl QueryOptions {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retries: self.retry,
            base_delay: self.retry_base_delay,
            max_delay: self.retry_max_delay,
        }
    }
}
