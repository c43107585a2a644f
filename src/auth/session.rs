//! Login, logout, and signup against the token endpoints.

use std::sync::Arc;

use serde_json::json;

use super::token::{LoginRequest, SignupRequest, TokenResponse, User};
use crate::error::Result;
use crate::transport::{ApiRequest, Transport};

pub const LOGIN_PATH: &str = "/api/v1/token";
pub const LOGOUT_PATH: &str = "/api/v1/token/logout";
pub const SIGNUP_PATH: &str = "/api/v1/user";

/// Session operations. All I/O decisions (prompting, navigation) belong to the caller.
///
/// # Example
/// ```no_run
/// use autopart::auth::LoginRequest;
/// use autopart::client::AutoPartClient;
/// use autopart::config::ClientConfig;
///
/// # async fn example() -> autopart::error::Result<()> {
/// let client = AutoPartClient::new(ClientConfig::from_env()?)?;
/// client
///     .auth()
///     .login(&LoginRequest { username: "admin".into(), password: "secret".into() })
///     .await?;
/// assert!(client.auth().is_authenticated());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AuthApi {
    transport: Arc<Transport>,
}

impl AuthApi {
    pub fn new(transport: Arc<Transport>) -> Self {
        Self { transport }
    }

    /// Exchange credentials for a token pair and persist it.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<TokenResponse> {
        let request = ApiRequest::post(LOGIN_PATH)
            .with_json(credentials)?
            .without_auth_recovery();
        let tokens: TokenResponse = self.transport.json(request).await?;

        let store = self.transport.store();
        store.set_access_token(&tokens.token)?;
        match tokens.refresh_token.as_deref() {
            Some(refresh) => store.set_refresh_token(refresh)?,
            None => tracing::warn!("login response carried no refresh token"),
        }
        tracing::info!(username = %credentials.username, "logged in");
        Ok(tokens)
    }

    /// Tell the backend to revoke the session, then drop local tokens.
    ///
    /// Local tokens are cleared even when the backend call fails; the
    /// backend error is still returned.
    pub async fn logout(&self) -> Result<()> {
        let store = self.transport.store();
        let body = match store.refresh_token() {
            Some(refresh) => json!({ "refreshToken": refresh }),
            None => json!({}),
        };
        let request = ApiRequest::post(LOGOUT_PATH)
            .with_json(&body)?
            .without_auth_recovery();
        let outcome = self.transport.unit(request).await;
        store.clear()?;
        tracing::info!(backend_ok = outcome.is_ok(), "logged out");
        outcome
    }

    /// Register a new user. Does not log in.
    pub async fn signup(&self, request: &SignupRequest) -> Result<User> {
        let request = ApiRequest::post(SIGNUP_PATH)
            .with_json(request)?
            .without_auth_recovery();
        self.transport.json(request).await
    }

    /// True iff an access token is stored. Says nothing about validity.
    pub fn is_authenticated(&self) -> bool {
        self.transport.store().has_access_token()
    }
}
