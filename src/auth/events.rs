//! Authentication events surfaced to the hosting application.

use std::sync::Arc;

/// Emitted when the client gives up on the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    /// Credentials were cleared; the host should navigate to `login_route`.
    SessionExpired {
        login_route: String,
        reason: SessionExpiredReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum SessionExpiredReason {
    /// A 401 arrived and no refresh token was stored.
    MissingRefreshToken,
    /// The refresh endpoint rejected the refresh token or was unreachable.
    RefreshRejected,
}

/// Subscriber callback for [`AuthEvent`]s.
pub type AuthEventSink = Arc<dyn Fn(AuthEvent) + Send + Sync>;
