//! Client gateway for the Times Global REST backend.
//!
//! Every call the presentation layer makes goes through [`ApiClient`], which
//! attaches bearer authentication, transparently recovers from expired access
//! tokens (at most one refresh in flight; concurrent callers queue and replay
//! once it lands), walks cursor pagination into a single collection, and
//! rewrites scope-sensitive read queries with the selected location.
//!
//! The credential store, the scope selection, and the session-expired
//! notification are all injected, so the crate has no opinion about where the
//! host keeps session state:
//!
//! ```no_run
//! use std::sync::Arc;
//! use timesgate::{ApiClient, ClientConfig, MemoryTokenStore, ScopeCell};
//!
//! # async fn demo() -> Result<(), timesgate::ApiError> {
//! let tokens = Arc::new(MemoryTokenStore::new());
//! let scope = Arc::new(ScopeCell::new());
//! let client = ApiClient::new(
//!     ClientConfig::new("https://backend.example.com/api"),
//!     tokens,
//!     scope.clone(),
//! )?
//! .on_session_expired(|| eprintln!("please sign in again"));
//!
//! client.login("reception", "hunter2").await?;
//! scope.select(2u64);
//! let visitors: Vec<serde_json::Value> = client.get_all("/visitors/?search=john").await?;
//! # let _ = visitors;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod multipart;
pub mod page;
mod refresh;
pub mod scope;
pub mod token;

pub use client::{ApiClient, LoginSession, REFRESH_ENDPOINT};
pub use config::ClientConfig;
pub use error::ApiError;
pub use multipart::Multipart;
pub use page::Page;
pub use scope::{ScopeCell, ScopeId, ScopeProvider};
pub use token::{MemoryTokenStore, TokenStore};
