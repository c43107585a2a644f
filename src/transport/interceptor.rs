//! Outgoing request interception.

use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;

use crate::auth::TokenStore;

/// Attach the stored access token as a bearer credential.
///
/// Returns the builder together with the token that was attached so the
/// caller can tell later whether a 401 was earned by a token that has since
/// been replaced. Never fails: a missing or unencodable token leaves the
/// request untouched and the backend decides.
pub fn authorize(builder: RequestBuilder, store: &dyn TokenStore) -> (RequestBuilder, Option<String>) {
    let Some(token) = store.access_token() else {
        return (builder, None);
    };
    match bearer_value(&token) {
        Some(value) => (builder.header(AUTHORIZATION, value), Some(token)),
        None => {
            tracing::warn!("stored access token is not a valid header value; sending without it");
            (builder, None)
        }
    }
}

/// Build an `Authorization: Bearer` header value.
pub fn bearer_value(token: &str) -> Option<HeaderValue> {
    let mut value = HeaderValue::from_str(&format!("Bearer {token}")).ok()?;
    value.set_sensitive(true);
    Some(value)
}
