//! Typed endpoint façade over the [`Transport`].
//!
//! Every call returns the decoded response body only; retries and caching
//! belong to the [`query`](crate::query) layer.

pub mod models;

pub use models::{
    Customer, CustomerFilter, CustomerUpdate, NewCustomer, NewPartLocation, NewWarehouse,
    PartLocation, PartLocationFilter, PartLocationUpdate, Warehouse, WarehouseFilter,
    WarehouseUpdate,
};

use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use bon::Builder;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::Result;
use crate::transport::{ApiRequest, Transport};

/// Identifier type shared by every backend resource.
pub type Id = i64;

/// A backend resource reachable at `PATH` with the standard CRUD + search routes.
pub trait Resource: Send + Sync + 'static {
    /// Cache namespace for this resource (first [`QueryKey`](crate::query::QueryKey) segment).
    const NAME: &'static str;
    /// Collection path, e.g. `/api/v1/warehouses`.
    const PATH: &'static str;

    type Entity: DeserializeOwned + Serialize + Clone + Send + Sync + 'static;
    type Create: Serialize + Send + Sync;
    type Update: Serialize + Send + Sync;
    type Filter: Serialize + Default + Clone + Send + Sync;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

/// Body of `POST /resource/search`.
///
/// # Example
/// ```
/// use autopart::api::{SearchRequest, WarehouseFilter};
///
/// let request = SearchRequest::builder()
///     .filter(WarehouseFilter { active: Some(true), ..Default::default() })
///     .page(2)
///     .build();
/// assert_eq!(request.page_size, 20);
/// ```
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest<F> {
    pub filter: F,
    #[builder(default = 1)]
    pub page: u32,
    #[builder(default = 20)]
    pub page_size: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Sort>,
}

impl<F: Default> Default for SearchRequest<F> {
    fn default() -> Self {
        Self {
            filter: F::default(),
            page: 1,
            page_size: 20,
            sort: None,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.page > 1
    }
}

/// CRUD + search operations for one [`Resource`].
pub struct ResourceApi<R: Resource> {
    transport: Arc<Transport>,
    _resource: PhantomData<fn() -> R>,
}

impl<R: Resource> Clone for ResourceApi<R> {
    fn clone(&self) -> Self {
        Self {
            transport: self.transport.clone(),
            _resource: PhantomData,
        }
    }
}

impl<R: Resource> fmt::Debug for ResourceApi<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceApi").field("path", &R::PATH).finish()
    }
}

impl<R: Resource> ResourceApi<R> {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self {
            transport,
            _resource: PhantomData,
        }
    }

    /// `POST /resource`; some resources accept an empty body.
    pub async fn create(&self, payload: Option<&R::Create>) -> Result<R::Entity> {
        let mut request = ApiRequest::post(R::PATH);
        if let Some(payload) = payload {
            request = request.with_json(payload)?;
        }
        self.transport.json(request).await
    }

    pub async fn get(&self, id: Id) -> Result<R::Entity> {
        self.transport.json(ApiRequest::get(item_path::<R>(id))).await
    }

    pub async fn update(&self, id: Id, payload: &R::Update) -> Result<R::Entity> {
        let request = ApiRequest::put(item_path::<R>(id)).with_json(payload)?;
        self.transport.json(request).await
    }

    pub async fn delete(&self, id: Id) -> Result<()> {
        self.transport.unit(ApiRequest::delete(item_path::<R>(id))).await
    }

    pub async fn search(&self, request: &SearchRequest<R::Filter>) -> Result<Page<R::Entity>> {
        let request = ApiRequest::post(format!("{}/search", R::PATH)).with_json(request)?;
        self.transport.json(request).await
    }
}

fn item_path<R: Resource>(id: Id) -> String {
    format!("{}/{id}", R::PATH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn search_request_serializes_camel_case() {
        let request = SearchRequest {
            filter: WarehouseFilter {
                code: Some("WH-1".to_string()),
                ..Default::default()
            },
            page: 3,
            page_size: 50,
            sort: Some(Sort {
                field: "name".to_string(),
                direction: SortDirection::Desc,
            }),
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "filter": {"code": "WH-1"},
                "page": 3,
                "pageSize": 50,
                "sort": {"field": "name", "direction": "desc"}
            })
        );
    }

    #[test]
    fn page_cursors() {
        let page: Page<Warehouse> = serde_json::from_value(json!({
            "items": [],
            "total": 45,
            "page": 2,
            "pageSize": 20,
            "totalPages": 3
        }))
        .unwrap();
        assert!(page.has_next());
        assert!(page.has_previous());
    }

    #[test]
    fn item_paths() {
        assert_eq!(item_path::<Warehouse>(7), "/api/v1/warehouses/7");
        assert_eq!(item_path::<PartLocation>(9), "/api/v1/part-locations/9");
    }
}
