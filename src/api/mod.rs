//! API client module for the storefront backend.
//!
//! Provides the HTTP client with route-based credential injection, the typed
//! error taxonomy, the endpoint classifier, and thin auth/catalog façades.

pub mod auth;
pub mod catalog;
pub mod client;
pub mod error;
pub mod routes;
pub mod types;


pub use client::{decode, query_pairs, ApiClient};
pub use error::{ApiError, Status, ValidationErrors};
pub use routes::{Access, RouteRule, RouteTable};
pub use types::{Payload, RequestDescriptor};
