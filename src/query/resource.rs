use std::fmt;

use super::client::QueryClient;
use super::key::QueryKey;
use crate::api::{Id, Page, Resource, ResourceApi, SearchRequest};
use crate::error::ApiError;

/// Cached reads and invalidating writes for one [`Resource`].
///
/// Reads are keyed `[name, "detail", id]` and `[name, "search", params]`;
/// every successful write invalidates `[name]`.
pub struct ResourceQueries<R: Resource> {
    api: ResourceApi<R>,
    client: QueryClient,
}

impl<R: Resource> Clone for ResourceQueries<R> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            client: self.client.clone(),
        }
    }
}

impl<R: Resource> fmt::Debug for ResourceQueries<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceQueries")
            .field("resource", &R::NAME)
            .finish()
    }
}

impl<R: Resource> ResourceQueries<R> {
    pub fn new(api: ResourceApi<R>, client: QueryClient) -> Self {
        Self { api, client }
    }

    pub fn all_key() -> QueryKey {
        QueryKey::new(R::NAME)
    }

    pub fn detail_key(id: Id) -> QueryKey {
        Self::all_key().with("detail").with(id)
    }

    pub fn search_key(request: &SearchRequest<R::Filter>) -> QueryKey {
        Self::all_key().with("search").with_param(request)
    }

    pub async fn get(&self, id: Id) -> Result<R::Entity, ApiError> {
        let api = self.api.clone();
        self.client
            .query(Self::detail_key(id), None, move || {
                let api = api.clone();
                async move { api.get(id).await }
            })
            .await
    }

    pub async fn search(
        &self,
        request: SearchRequest<R::Filter>,
    ) -> Result<Page<R::Entity>, ApiError> {
        let key = Self::search_key(&request);
        let api = self.api.clone();
        self.client
            .query(key, None, move || {
                let api = api.clone();
                let request = request.clone();
                async move { api.search(&request).await }
            })
            .await
    }

    pub async fn create(&self, payload: Option<&R::Create>) -> Result<R::Entity, ApiError> {
        let created = self.client.mutate(|| self.api.create(payload)).await?;
        self.client.invalidate(&Self::all_key());
        Ok(created)
    }

    pub async fn update(&self, id: Id, payload: &R::Update) -> Result<R::Entity, ApiError> {
        let updated = self.client.mutate(|| self.api.update(id, payload)).await?;
        self.client.invalidate(&Self::all_key());
        self.client.set_query_data(&Self::detail_key(id), &updated)?;
        Ok(updated)
    }

    pub async fn delete(&self, id: Id) -> Result<(), ApiError> {
        self.client.mutate(|| self.api.delete(id)).await?;
        self.client.cache().remove(&Self::detail_key(id));
        self.client.invalidate(&Self::all_key());
        Ok(())
    }
}
