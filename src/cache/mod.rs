//! Client-side query caching.
//!
//! This module keeps every view of a resource consistent after mutations:
//! - results are cached under composite [`QueryKey`]s
//! - identical in-flight fetches are shared (one network call per key)
//! - mutations invalidate key prefixes, marking entries stale rather than
//!   deleting them
//! - failed refetches keep serving last-known-good data

mod key;
mod mutation;
mod query;
mod store;

pub use key::QueryKey;
pub use mutation::{Mutation, MutationState};
pub use query::{Query, QueryState};
pub use store::QueryCache;
