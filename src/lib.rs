//! Client for the AutoPart parts and warehouse inventory backend.
//!
//! Handles the access/refresh token lifecycle, attaches bearer credentials,
//! recovers from expired access tokens with a single coordinated refresh,
//! and layers a caching query client over typed resource endpoints.
//!
//! # Quick Start
//!
//! ```no_run
//! use autopart::prelude::*;
//!
//! # async fn example() -> std::result::Result<(), Box<dyn std::error::Error>> {
//! let client = AutoPartClient::new(ClientConfig::from_env()?)?;
//! client
//!     .auth()
//!     .login(&LoginRequest { username: "admin".into(), password: "secret".into() })
//!     .await?;
//!
//! let page = client
//!     .warehouses()
//!     .search(SearchRequest::default())
//!     .await?;
//! println!("{} warehouses", page.total);
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod prelude;
pub mod query;
pub mod transport;

#[cfg(feature = "cli")]
pub mod cli;
