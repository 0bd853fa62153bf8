//! The Libiverse admin API surface: HTTP access layer, response envelope,
//! error taxonomy and the cached per-resource service methods.

mod admin;
mod client;
mod envelope;
mod error;
pub mod invalidation;
pub mod types;

pub use admin::{AdminApi, Filters};
pub use client::{HttpClient, RequestBody};
pub use envelope::{Envelope, FieldErrors, Meta, Page, PageLinks, Pagination};
pub use error::ApiError;
pub use invalidation::MutationKind;
