//! Composite query keys: resource name plus disambiguating parameters.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Addresses one cached result and its subscribers.
///
/// A key is an ordered list of segments: the resource name first, then any
/// disambiguators (entity id, page, canonicalized filters). Two calls with
/// structurally equal keys address the same entry; changing any parameter
/// changes the key. Invalidation matches on segment prefixes, so
/// `["books"]` covers `["books", "5"]` and every filtered book list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
  segments: Vec<String>,
}

impl QueryKey {
  /// Start a key for a resource type, e.g. `QueryKey::resource("books")`.
  pub fn resource(name: &str) -> Self {
    Self {
      segments: vec![name.to_string()],
    }
  }

  /// Append a plain segment (an id, a sub-collection name).
  pub fn segment(mut self, part: impl ToString) -> Self {
    self.segments.push(part.to_string());
    self
  }

  /// Append a page number. Page 1 and page 2 are distinct entries.
  pub fn page(self, page: u64) -> Self {
    self.segment(format!("page={page}"))
  }

  /// Append a canonicalized filter segment.
  ///
  /// Filters arrive as a `BTreeMap`, so two semantically equal filter sets
  /// produce the same segment regardless of the order the caller inserted
  /// them in. An empty map appends nothing.
  pub fn filters(self, filters: &BTreeMap<String, String>) -> Self {
    if filters.is_empty() {
      return self;
    }
    let canonical = filters
      .iter()
      .map(|(k, v)| format!("{k}={v}"))
      .collect::<Vec<_>>()
      .join("&");
    self.segment(canonical)
  }

  /// Whether `prefix` addresses this key or any parent of it.
  pub fn starts_with(&self, prefix: &QueryKey) -> bool {
    prefix.segments.len() <= self.segments.len()
      && self.segments[..prefix.segments.len()] == prefix.segments[..]
  }

  /// Stable, fixed-length hash for addressing the cache map.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    for segment in &self.segments {
      hasher.update(segment.as_bytes());
      // Separator keeps ["ab","c"] distinct from ["a","bc"]
      hasher.update([0x1f]);
    }
    hex::encode(hasher.finalize())
  }

  /// Human-readable form for logs.
  pub fn description(&self) -> String {
    self.segments.join(":")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn filters(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect()
  }

  #[test]
  fn equal_filters_in_any_order_produce_equal_keys() {
    let a = QueryKey::resource("books").filters(&filters(&[("author", "bell"), ("genre", "scifi")]));
    let b = QueryKey::resource("books").filters(&filters(&[("genre", "scifi"), ("author", "bell")]));

    assert_eq!(a, b);
    assert_eq!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn changing_any_parameter_changes_the_key() {
    let base = QueryKey::resource("users").page(1);
    assert_ne!(base.cache_hash(), QueryKey::resource("users").page(2).cache_hash());
    assert_ne!(base.cache_hash(), QueryKey::resource("books").page(1).cache_hash());
    assert_ne!(
      base.cache_hash(),
      QueryKey::resource("users")
        .page(1)
        .filters(&filters(&[("role", "admin")]))
        .cache_hash()
    );
  }

  #[test]
  fn prefix_matching() {
    let list = QueryKey::resource("books").page(1);
    let entity = QueryKey::resource("books").segment(5);
    let other = QueryKey::resource("users").segment(5);

    let prefix = QueryKey::resource("books");
    assert!(list.starts_with(&prefix));
    assert!(entity.starts_with(&prefix));
    assert!(!other.starts_with(&prefix));

    // A key is a prefix of itself; a longer key is not a prefix of a shorter one
    assert!(entity.starts_with(&entity));
    assert!(!prefix.starts_with(&entity));
  }

  #[test]
  fn segment_boundaries_are_part_of_the_hash() {
    let a = QueryKey::resource("ab").segment("c");
    let b = QueryKey::resource("a").segment("bc");
    assert_ne!(a.cache_hash(), b.cache_hash());
  }

  #[test]
  fn empty_filters_append_nothing() {
    let bare = QueryKey::resource("events");
    let filtered = QueryKey::resource("events").filters(&BTreeMap::new());
    assert_eq!(bare, filtered);
  }

  #[test]
  fn description_is_readable() {
    let key = QueryKey::resource("forums").segment(3).segment("threads").page(2);
    assert_eq!(key.description(), "forums:3:threads:page=2");
  }
}
