//! Convenience re-exports for common use.

pub use crate::api::{
    Customer, Id, Page, PartLocation, Resource, ResourceApi, SearchRequest, Sort, SortDirection,
    Warehouse,
};
pub use crate::auth::{AuthEvent, LoginRequest, MemoryTokenStore, TokenStore};
pub use crate::client::AutoPartClient;
pub use crate::config::ClientConfig;
pub use crate::error::{ApiError, AutoPartError, Result};
pub use crate::query::{QueryClient, QueryKey, QueryOptions};
