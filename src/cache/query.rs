//! Poll-based query handle for UI loops.
//!
//! A `Query<T>` subscribes one view to a cache key. Handles sharing a key
//! share the underlying network call through [`QueryCache`]; a handle that
//! goes away mid-fetch only drops its local channel, the shared cache entry
//! still gets the result.
//!
//! # Example
//!
//! ```ignore
//! let mut query = Query::new(cache.clone(), QueryKey::resource("books").page(1), move || {
//!     let api = api.clone();
//!     async move { api.fetch_books_page(1).await }
//! });
//!
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use std::future::Future;
use std::sync::Arc;
use tokio::sync::mpsc;

use futures::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::key::QueryKey;
use super::store::QueryCache;
use crate::api::ApiError;

/// The state of a query.
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Not started, or disabled.
  Idle,
  /// Currently fetching.
  Loading,
  /// Completed successfully.
  Success(T),
  /// Failed with an error.
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }
}

type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// One subscriber's view of a cached query.
pub struct Query<T> {
  cache: QueryCache,
  key: QueryKey,
  fetcher: FetcherFn<T>,
  enabled: bool,
  state: QueryState<T>,
  /// Last successful data, retained across later failures
  /// (stale-while-revalidate).
  last_data: Option<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, Arc<ApiError>>>>,
}

impl<T> Query<T>
where
  T: Clone + Serialize + DeserializeOwned + Send + 'static,
{
  /// Create a query on `key` backed by `cache`.
  ///
  /// The fetcher is called each time the cache needs a network round-trip
  /// for this key; cache hits never run it.
  pub fn new<F, Fut>(cache: QueryCache, key: QueryKey, fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    Self {
      cache,
      key,
      fetcher: Box::new(move || Box::pin(fetcher())),
      enabled: true,
      state: QueryState::Idle,
      last_data: None,
      receiver: None,
    }
  }

  /// Disable the query until a required parameter is known.
  ///
  /// While disabled, `fetch()` is a no-op and the state stays `Idle`.
  pub fn with_enabled(mut self, enabled: bool) -> Self {
    self.enabled = enabled;
    self
  }

  pub fn set_enabled(&mut self, enabled: bool) {
    self.enabled = enabled;
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  /// Current data: the live success value, or the last-known-good value
  /// while loading or after a failed background refetch.
  pub fn data(&self) -> Option<&T> {
    match &self.state {
      QueryState::Success(data) => Some(data),
      _ => self.last_data.as_ref(),
    }
  }

  pub fn error(&self) -> Option<&str> {
    match &self.state {
      QueryState::Error(message) => Some(message),
      _ => None,
    }
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  /// Start fetching if enabled and not already loading.
  pub fn fetch(&mut self) {
    if !self.enabled || self.state.is_loading() {
      return;
    }
    self.start(false);
  }

  /// Force a refetch, superseding any in-flight request for the key.
  pub fn refetch(&mut self) {
    if !self.enabled {
      return;
    }
    self.receiver = None;
    self.start(true);
  }

  /// Poll for a pending result. Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.last_data = Some(data.clone());
        self.state = QueryState::Success(data);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error.to_string());
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.state = QueryState::Error(ApiError::Cancelled.to_string());
        self.receiver = None;
        true
      }
    }
  }

  fn start(&mut self, force: bool) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let cache = self.cache.clone();
    let key = self.key.clone();
    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = if force {
        cache.refetch(&key, move || future).await
      } else {
        cache.fetch(&key, move || future).await
      };
      // Receiver may have been dropped; the cache entry is updated anyway
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("key", &self.key.description())
      .field("enabled", &self.enabled)
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}
