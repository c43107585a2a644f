//! Token storage, session operations, and auth events.

pub mod error;
pub mod events;
pub mod session;
pub mod store;
pub mod token;

pub use error::AuthError;
pub use events::{AuthEvent, AuthEventSink, SessionExpiredReason};
pub use session::AuthApi;
pub use store::{FileTokenStore, MemoryTokenStore, TokenStore};
pub use token::{CredentialPair, LoginRequest, RefreshRequest, SignupRequest, TokenResponse, User};
