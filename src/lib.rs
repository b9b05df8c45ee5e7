//! Storefront API client.
//!
//! HTTP client layer for the storefront and admin frontends: persists the
//! bearer credential across runs, decides per request whether to attach it,
//! normalizes backend failures into [`api::ApiError`], and reports lost
//! sessions as [`session::SessionEvent`]s.
//!
//! No retries, no request cancellation, no response caching.

pub mod api;
pub mod config;
pub mod session;

pub use api::{ApiClient, ApiError, Status};
pub use config::ClientConfig;
pub use session::{CredentialStore, SessionEvent};
