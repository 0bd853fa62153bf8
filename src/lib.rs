//! Client library for the Libiverse admin backend.
//!
//! Two cooperating layers do the real work:
//!
//! - [`api::HttpClient`], the single choke point for outbound calls:
//!   bearer-token injection, 401 interception, envelope normalization.
//! - [`cache::QueryCache`], the client query cache: composite keys,
//!   shared in-flight fetches, prefix invalidation after mutations.
//!
//! [`api::AdminApi`] composes both into typed per-resource methods, and
//! [`session::SessionStore`] holds the credential in its two scopes.

pub mod api;
pub mod cache;
pub mod config;
pub mod session;

pub use api::{AdminApi, ApiError, Envelope, HttpClient, Page};
pub use cache::{Mutation, Query, QueryCache, QueryKey};
pub use config::Config;
pub use session::SessionStore;
