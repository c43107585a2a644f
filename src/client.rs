//! Top-level client wiring the token store, transport, façades, and query cache.

use std::sync::Arc;

use crate::api::{Customer, PartLocation, Resource, ResourceApi, Warehouse};
use crate::auth::{AuthApi, AuthEvent, FileTokenStore, TokenStore};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::query::{QueryClient, ResourceQueries};
use crate::transport::{RefreshCoordinator, Transport};

/// Entry point for the AutoPart backend.
///
/// Cloning is cheap; clones share the transport, coordinator, and cache.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use autopart::auth::{AuthEvent, MemoryTokenStore};
/// use autopart::client::AutoPartClient;
/// use autopart::config::ClientConfig;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = AutoPartClient::with_store(ClientConfig::from_env()?, Arc::new(MemoryTokenStore::new()))?;
/// client.on_auth_event(|event| match event {
///     AuthEvent::SessionExpired { login_route, .. } => println!("navigate to {login_route}"),
/// });
/// let warehouse = client.warehouses().get(1).await?;
/// println!("{}", warehouse.name);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AutoPartClient {
    transport: Arc<Transport>,
    queries: QueryClient,
}

impl AutoPartClient {
    /// Client with a file-backed token store under `config.token_dir()`.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let store = Arc::new(FileTokenStore::new(config.token_dir().clone()));
        Self::with_store(config, store)
    }

    pub fn with_store(config: ClientConfig, store: Arc<dyn TokenStore>) -> Result<Self> {
        let queries = QueryClient::new(config.query_defaults().clone());
        let transport = Transport::new(config, store, Arc::new(RefreshCoordinator::new()))?;
        Ok(Self {
            transport: Arc::new(transport),
            queries,
        })
    }

    pub fn transport(&self) -> &Arc<Transport> {
        &self.transport
    }

    pub fn queries(&self) -> &QueryClient {
        &self.queries
    }

    /// Subscribe to session events; the host decides how to reach the login route.
    pub fn on_auth_event(&self, listener: impl Fn(AuthEvent) + Send + Sync + 'static) {
        self.transport.subscribe(Arc::new(listener));
    }

    pub fn auth(&self) -> AuthApi {
        AuthApi::new(self.transport.clone())
    }

    /// Uncached façade for any resource.
    pub fn api<R: Resource>(&self) -> ResourceApi<R> {
        ResourceApi::new(self.transport.clone())
    }

    /// Cached reads / invalidating writes for any resource.
    pub fn resource<R: Resource>(&self) -> ResourceQueries<R> {
        ResourceQueries::new(self.api(), self.queries.clone())
    }

    pub fn warehouses(&self) -> ResourceQueries<Warehouse> {
        self.resource()
    }

    pub fn part_locations(&self) -> ResourceQueries<PartLocation> {
        self.resource()
    }

    pub fn customers(&self) -> ResourceQueries<Customer> {
        self.resource()
    }
}
