//! HTTP transport with bearer interception and 401 recovery.

pub mod interceptor;
pub mod refresh;

pub use refresh::{RefreshCoordinator, RefreshFailure, RefreshGuard, RefreshOutcome, RefreshState, Ticket};

use std::sync::{Arc, RwLock};

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::auth::events::{AuthEvent, AuthEventSink, SessionExpiredReason};
use crate::auth::token::{RefreshRequest, TokenResponse};
use crate::auth::TokenStore;
use crate::config::ClientConfig;
use crate::error::{AutoPartError, Result};

/// Refresh endpoint; called directly, never through the 401 handler.
pub const REFRESH_PATH: &str = "/api/v1/token/refresh";

/// A replayable request description.
///
/// The body is kept as JSON so the same request can be re-issued after a
/// token refresh.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
    id: Uuid,
    retried: bool,
    recover_auth: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            id: Uuid::new_v4(),
            retried: false,
            recover_auth: true,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn with_json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    /// Let a 401 through as an ordinary error instead of refreshing.
    ///
    /// Used by credential endpoints (login, logout, signup) where a 401 means
    /// bad credentials, not an expired session.
    pub fn without_auth_recovery(mut self) -> Self {
        self.recover_auth = false;
        self
    }
}

/// Sends [`ApiRequest`]s, attaching the bearer token and recovering from
/// expired access tokens through the [`RefreshCoordinator`].
pub struct Transport {
    client: reqwest::Client,
    config: ClientConfig,
    store: Arc<dyn TokenStore>,
    coordinator: Arc<RefreshCoordinator>,
    refresher: Refresher,
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("base_url", &self.config.base_url())
            .field("coordinator", &self.coordinator)
            .field("store", &"..")
            .finish()
    }
}

impl Transport {
    pub fn new(
        config: ClientConfig,
        store: Arc<dyn TokenStore>,
        coordinator: Arc<RefreshCoordinator>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| AutoPartError::Configuration(format!("failed to build HTTP client: {e}")))?;
        let refresher = Refresher {
            client: client.clone(),
            url: config.url(REFRESH_PATH),
            store: store.clone(),
            notifier: SessionNotifier {
                login_route: config.login_route().to_string(),
                listeners: Arc::new(RwLock::new(Vec::new())),
            },
        };
        Ok(Self {
            client,
            config,
            store,
            coordinator,
            refresher,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    /// Register a callback for [`AuthEvent`]s (e.g. to navigate to login).
    pub fn subscribe(&self, sink: AuthEventSink) {
        self.refresher.notifier.subscribe(sink);
    }

    /// Send a request and decode a JSON body.
    pub async fn json<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let response = self.execute(request).await?;
        let response = ensure_success(response).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send a request and discard the body.
    pub async fn unit(&self, request: ApiRequest) -> Result<()> {
        let response = self.execute(request).await?;
        ensure_success(response).await?;
        Ok(())
    }

    /// Send a request, recovering once from a 401.
    ///
    /// Non-401 responses (including other errors) and network failures come
    /// back untouched.
    pub async fn execute(&self, mut request: ApiRequest) -> Result<reqwest::Response> {
        let (response, sent_token) = self.send(&request).await?;
        if response.status() != StatusCode::UNAUTHORIZED || !request.recover_auth {
            return Ok(response);
        }
        request.retried = true;

        // The token was replaced while this request was in flight; replay it
        // with the current one instead of starting another cycle.
        let current = self.store.access_token();
        if current.is_some() && current != sent_token {
            tracing::debug!(request_id = %request.id, "replaying with token refreshed in flight");
            return self.replay(&request).await;
        }

        // Sent with a token that has since been cleared: the session already
        // ended (a refresh failed or the user logged out) and was announced.
        if current.is_none() && sent_token.is_some() {
            tracing::debug!(request_id = %request.id, "401 after session ended; not refreshing");
            return Err(AutoPartError::NoRefreshToken);
        }

        let outcome = match self.coordinator.begin() {
            Ticket::Follower(waiter) => {
                tracing::debug!(request_id = %request.id, path = %request.path, "waiting for token refresh");
                waiter
            }
            Ticket::Leader(guard) => {
                let Some(refresh_token) = self.store.refresh_token() else {
                    tracing::warn!(request_id = %request.id, "401 with no refresh token; ending session");
                    self.refresher.clear_tokens();
                    guard.settle(Err(RefreshFailure::new(None, "No refresh token available")));
                    self.refresher
                        .notifier
                        .emit(SessionExpiredReason::MissingRefreshToken);
                    return Err(AutoPartError::NoRefreshToken);
                };

                tracing::info!(request_id = %request.id, "access token rejected; refreshing");
                let outcome = guard.outcome();
                // The cycle outlives this request; dropping the caller leaves
                // followers waiting on the real outcome.
                tokio::spawn(self.refresher.clone().run(refresh_token, guard));
                outcome
            }
        };
        self.after_refresh(&request, outcome).await
    }

    async fn after_refresh(
        &self,
        request: &ApiRequest,
        outcome: oneshot::Receiver<RefreshOutcome>,
    ) -> Result<reqwest::Response> {
        match outcome.await {
            Ok(Ok(())) => self.replay(request).await,
            Ok(Err(failure)) => Err(failure.into()),
            Err(_) => Err(RefreshFailure::new(None, "token refresh was abandoned").into()),
        }
    }

    /// Re-issue a request that already burned its one 401 retry.
    async fn replay(&self, request: &ApiRequest) -> Result<reqwest::Response> {
        debug_assert!(request.retried);
        let (response, _) = self.send(request).await?;
        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(unauthorized(response).await);
        }
        Ok(response)
    }

    async fn send(&self, request: &ApiRequest) -> Result<(reqwest::Response, Option<String>)> {
        let mut builder = self
            .client
            .request(request.method.clone(), self.config.url(&request.path));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let (builder, sent_token) = interceptor::authorize(builder, self.store.as_ref());

        tracing::debug!(
            request_id = %request.id,
            method = %request.method,
            path = %request.path,
            retried = request.retried,
            "sending request"
        );
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                AutoPartError::Timeout(self.config.timeout().as_millis() as u64)
            } else {
                AutoPartError::Network(e)
            }
        })?;
        Ok((response, sent_token))
    }
}

/// Runs refresh cycles on their own task.
#[derive(Clone)]
struct Refresher {
    client: reqwest::Client,
    url: String,
    store: Arc<dyn TokenStore>,
    notifier: SessionNotifier,
}

impl Refresher {
    async fn run(self, refresh_token: String, guard: RefreshGuard) {
        match self.exchange(&refresh_token).await {
            Ok(()) => {
                tracing::info!("token refresh succeeded");
                guard.settle(Ok(()));
            }
            Err(failure) => {
                tracing::warn!(
                    status = ?failure.status,
                    error = %failure.message,
                    "token refresh failed; ending session"
                );
                self.clear_tokens();
                guard.settle(Err(failure));
                self.notifier.emit(SessionExpiredReason::RefreshRejected);
            }
        }
    }

    /// Exchange the refresh token and persist the result.
    ///
    /// Called directly, never through the 401 handler.
    async fn exchange(&self, refresh_token: &str) -> std::result::Result<(), RefreshFailure> {
        let body = RefreshRequest {
            refresh_token: refresh_token.to_string(),
        };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RefreshFailure::new(None, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = match AutoPartError::from_response_body(status.as_u16(), &raw) {
                AutoPartError::Api { message, .. } => message,
                other => other.to_string(),
            };
            return Err(RefreshFailure::new(Some(status.as_u16()), message));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| RefreshFailure::new(None, format!("invalid refresh response: {e}")))?;

        self.store
            .set_access_token(&tokens.token)
            .map_err(|e| RefreshFailure::new(None, e.to_string()))?;
        if let Some(rotated) = tokens.refresh_token.as_deref() {
            self.store
                .set_refresh_token(rotated)
                .map_err(|e| RefreshFailure::new(None, e.to_string()))?;
        }
        Ok(())
    }

    fn clear_tokens(&self) {
        if let Err(err) = self.store.clear() {
            tracing::error!(error = %err, "failed to clear stored tokens");
        }
    }
}

/// Fans [`AuthEvent::SessionExpired`] out to subscribers.
#[derive(Clone)]
struct SessionNotifier {
    login_route: String,
    listeners: Arc<RwLock<Vec<AuthEventSink>>>,
}

impl SessionNotifier {
    fn subscribe(&self, sink: AuthEventSink) {
        self.listeners
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(sink);
    }

    fn emit(&self, reason: SessionExpiredReason) {
        let event = AuthEvent::SessionExpired {
            login_route: self.login_route.clone(),
            reason,
        };
        let listeners = self
            .listeners
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        for listener in listeners {
            listener(event.clone());
        }
    }
}

/// Turn a non-2xx response into an [`AutoPartError::Api`].
pub async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let raw = response.text().await.unwrap_or_default();
    Err(AutoPartError::from_response_body(status.as_u16(), &raw))
}

async fn unauthorized(response: reqwest::Response) -> AutoPartError {
    let raw = response.text().await.unwrap_or_default();
    match AutoPartError::from_response_body(StatusCode::UNAUTHORIZED.as_u16(), &raw) {
        AutoPartError::Api { message, .. } => AutoPartError::Authentication(message),
        other => other,
    }
}
