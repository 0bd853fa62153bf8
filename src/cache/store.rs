//! The in-memory query cache: keyed entries, freshness, shared in-flight
//! fetches, prefix invalidation.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::{debug, trace};

use super::key::QueryKey;
use crate::api::ApiError;

/// What a finished fetch produced. Values are stored serialized so entries
/// of different payload types share one map.
type FetchOutcome = Result<serde_json::Value, Arc<ApiError>>;

struct CachedValue {
  json: serde_json::Value,
  fetched_at: DateTime<Utc>,
}

struct CacheEntry {
  key: QueryKey,
  value: Option<CachedValue>,
  error: Option<Arc<ApiError>>,
  stale: bool,
  /// Bumped every time a fetch is issued (or the entry is seeded). A
  /// completion whose generation is no longer current is discarded, so a
  /// slow superseded request can never overwrite fresher data.
  generation: u64,
  inflight: Option<watch::Receiver<Option<FetchOutcome>>>,
}

impl CacheEntry {
  fn new(key: QueryKey) -> Self {
    Self {
      key,
      value: None,
      error: None,
      stale: false,
      generation: 0,
      inflight: None,
    }
  }
}

struct CacheInner {
  entries: Mutex<HashMap<String, CacheEntry>>,
  fresh_for: Duration,
}

impl CacheInner {
  fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, CacheEntry>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Write a completed fetch into the entry, unless it was superseded.
  fn apply(&self, hash: &str, generation: u64, outcome: &FetchOutcome) {
    let mut entries = self.lock();
    let Some(entry) = entries.get_mut(hash) else {
      return;
    };
    if entry.generation != generation {
      trace!(key = %entry.key.description(), "discarding superseded fetch result");
      return;
    }

    entry.inflight = None;
    match outcome {
      Ok(json) => {
        entry.value = Some(CachedValue {
          json: json.clone(),
          fetched_at: Utc::now(),
        });
        entry.error = None;
        entry.stale = false;
      }
      Err(err) => {
        // Stale-while-revalidate: a failed refetch records the error but
        // never clears previously successful data.
        entry.error = Some(Arc::clone(err));
        entry.stale = true;
      }
    }
  }
}

enum Plan {
  Hit(serde_json::Value),
  Join(watch::Receiver<Option<FetchOutcome>>),
  Start {
    generation: u64,
    tx: watch::Sender<Option<FetchOutcome>>,
    rx: watch::Receiver<Option<FetchOutcome>>,
  },
}

/// Client-side query cache.
///
/// Cheap to clone; clones share one entry map. The interior mutex is never
/// held across an await.
#[derive(Clone)]
pub struct QueryCache {
  inner: Arc<CacheInner>,
}

impl Default for QueryCache {
  fn default() -> Self {
    Self::new()
  }
}

impl QueryCache {
  pub fn new() -> Self {
    Self {
      inner: Arc::new(CacheInner {
        entries: Mutex::new(HashMap::new()),
        fresh_for: Duration::seconds(60),
      }),
    }
  }

  /// Override the freshness window.
  pub fn with_fresh_for(fresh_for: Duration) -> Self {
    Self {
      inner: Arc::new(CacheInner {
        entries: Mutex::new(HashMap::new()),
        fresh_for,
      }),
    }
  }

  /// Fetch through the cache.
  ///
  /// A fresh entry is returned without running the fetcher. If a fetch for
  /// the same key is already in flight, the caller awaits that shared call
  /// instead of issuing its own. Otherwise the fetcher runs in a spawned
  /// task, so the shared entry still gets updated even if this caller goes
  /// away mid-flight.
  pub async fn fetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<T, Arc<ApiError>>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    self.fetch_inner(key, fetcher, false).await
  }

  /// Force a new fetch, superseding any in-flight request for the key.
  ///
  /// Callers already awaiting the superseded request still receive the
  /// result it eventually produces; only the cache entry ignores it.
  pub async fn refetch<T, F, Fut>(&self, key: &QueryKey, fetcher: F) -> Result<T, Arc<ApiError>>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    self.fetch_inner(key, fetcher, true).await
  }

  async fn fetch_inner<T, F, Fut>(
    &self,
    key: &QueryKey,
    fetcher: F,
    force: bool,
  ) -> Result<T, Arc<ApiError>>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    let hash = key.cache_hash();

    // Decide under the lock, await after it is released.
    let plan = {
      let mut entries = self.inner.lock();
      let entry = entries
        .entry(hash.clone())
        .or_insert_with(|| CacheEntry::new(key.clone()));

      let fresh_hit = !force
        && !entry.stale
        && entry
          .value
          .as_ref()
          .is_some_and(|v| Utc::now() - v.fetched_at <= self.inner.fresh_for);

      if fresh_hit {
        trace!(key = %key.description(), "cache hit");
        let json = entry.value.as_ref().map(|v| v.json.clone());
        Plan::Hit(json.unwrap_or(serde_json::Value::Null))
      } else if let (false, Some(rx)) = (force, &entry.inflight) {
        trace!(key = %key.description(), "joining in-flight fetch");
        Plan::Join(rx.clone())
      } else {
        let (tx, rx) = watch::channel(None);
        entry.generation += 1;
        entry.inflight = Some(rx.clone());
        Plan::Start {
          generation: entry.generation,
          tx,
          rx,
        }
      }
    };

    match plan {
      Plan::Hit(json) => Self::decode(json),
      Plan::Join(rx) => Self::decode_outcome(Self::await_outcome(rx).await),
      Plan::Start { generation, tx, rx } => {
        debug!(key = %key.description(), "issuing fetch");
        let future = fetcher();
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
          let outcome: FetchOutcome = match future.await {
            Ok(data) => serde_json::to_value(&data).map_err(|e| Arc::new(ApiError::Decode(e))),
            Err(err) => Err(Arc::new(err)),
          };
          inner.apply(&hash, generation, &outcome);
          // Receivers may all be gone; the cache update above already happened
          let _ = tx.send(Some(outcome));
        });

        Self::decode_outcome(Self::await_outcome(rx).await)
      }
    }
  }

  async fn await_outcome(mut rx: watch::Receiver<Option<FetchOutcome>>) -> FetchOutcome {
    loop {
      if let Some(outcome) = rx.borrow_and_update().clone() {
        return outcome;
      }
      if rx.changed().await.is_err() {
        return Err(Arc::new(ApiError::Cancelled));
      }
    }
  }

  fn decode_outcome<T: DeserializeOwned>(outcome: FetchOutcome) -> Result<T, Arc<ApiError>> {
    outcome.and_then(Self::decode)
  }

  fn decode<T: DeserializeOwned>(json: serde_json::Value) -> Result<T, Arc<ApiError>> {
    serde_json::from_value(json).map_err(|e| Arc::new(ApiError::Decode(e)))
  }

  /// Seed a key directly, e.g. with a mutation's response body, skipping a
  /// refetch round-trip. Supersedes any in-flight fetch for the key.
  pub fn set<T: Serialize>(&self, key: &QueryKey, value: &T) -> Result<(), ApiError> {
    let json = serde_json::to_value(value)?;
    let mut entries = self.inner.lock();
    let entry = entries
      .entry(key.cache_hash())
      .or_insert_with(|| CacheEntry::new(key.clone()));

    entry.generation += 1;
    // The superseded fetch's receiver must go too, or later fetches would
    // join a channel that only ever yields the discarded outcome.
    entry.inflight = None;
    entry.value = Some(CachedValue {
      json,
      fetched_at: Utc::now(),
    });
    entry.error = None;
    entry.stale = false;
    Ok(())
  }

  /// Mark every entry under `prefix` as stale. Entries are not deleted;
  /// the next fetch on each key refetches.
  pub fn invalidate(&self, prefix: &QueryKey) {
    let mut entries = self.inner.lock();
    let mut marked = 0usize;
    for entry in entries.values_mut() {
      if entry.key.starts_with(prefix) {
        entry.stale = true;
        marked += 1;
      }
    }
    debug!(prefix = %prefix.description(), marked, "invalidated cache entries");
  }

  pub fn invalidate_prefixes(&self, prefixes: &[QueryKey]) {
    for prefix in prefixes {
      self.invalidate(prefix);
    }
  }

  /// Last-known-good data for a key, stale or not.
  pub fn data_for<T: DeserializeOwned>(&self, key: &QueryKey) -> Option<T> {
    let entries = self.inner.lock();
    let value = entries.get(&key.cache_hash())?.value.as_ref()?;
    serde_json::from_value(value.json.clone()).ok()
  }

  /// Last recorded error for a key.
  pub fn error_for(&self, key: &QueryKey) -> Option<Arc<ApiError>> {
    let entries = self.inner.lock();
    entries.get(&key.cache_hash())?.error.clone()
  }

  /// Whether the entry for `key` is currently marked stale.
  pub fn is_stale(&self, key: &QueryKey) -> bool {
    let entries = self.inner.lock();
    entries.get(&key.cache_hash()).is_some_and(|e| e.stale)
  }
}
