//! Poll-based mutation handle with success-only invalidation.

use std::future::Future;
use tokio::sync::mpsc;

use futures::future::BoxFuture;
use serde::Serialize;

use super::key::QueryKey;
use super::store::QueryCache;
use crate::api::ApiError;

/// The state of a mutation.
#[derive(Debug, Clone)]
pub enum MutationState<T> {
  Idle,
  Pending,
  Success(T),
  Error(String),
}

type OperationFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, ApiError>> + Send + Sync>;

/// A mutation bound to the set of query-key prefixes it stales.
///
/// The invalidation set is declared up front as data, not buried in a
/// success callback. On success every declared prefix is marked stale (and
/// an optional seed key is filled with the result); a failed mutation
/// invalidates nothing.
pub struct Mutation<T> {
  cache: QueryCache,
  operation: OperationFn<T>,
  invalidates: Vec<QueryKey>,
  seed_key: Option<QueryKey>,
  state: MutationState<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, ApiError>>>,
}

impl<T> Mutation<T>
where
  T: Clone + Serialize + Send + 'static,
{
  pub fn new<F, Fut>(cache: QueryCache, invalidates: Vec<QueryKey>, operation: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, ApiError>> + Send + 'static,
  {
    Self {
      cache,
      operation: Box::new(move || Box::pin(operation())),
      invalidates,
      seed_key: None,
      state: MutationState::Idle,
      receiver: None,
    }
  }

  /// Also seed `key` with the mutation's result on success, skipping a
  /// refetch round-trip for that entry.
  pub fn seeding(mut self, key: QueryKey) -> Self {
    self.seed_key = Some(key);
    self
  }

  pub fn state(&self) -> &MutationState<T> {
    &self.state
  }

  pub fn is_pending(&self) -> bool {
    matches!(self.state, MutationState::Pending)
  }

  pub fn is_error(&self) -> bool {
    matches!(self.state, MutationState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match &self.state {
      MutationState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match &self.state {
      MutationState::Error(message) => Some(message),
      _ => None,
    }
  }

  /// Execute the mutation once.
  ///
  /// Returns `false` when a previous run is still pending and this
  /// invocation was dropped without executing.
  pub fn mutate(&mut self) -> bool {
    if self.is_pending() {
      return false;
    }

    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = MutationState::Pending;

    let cache = self.cache.clone();
    let invalidates = self.invalidates.clone();
    let seed_key = self.seed_key.clone();
    let future = (self.operation)();
    tokio::spawn(async move {
      let result = future.await;
      if let Ok(data) = &result {
        // Invalidation is success-only
        cache.invalidate_prefixes(&invalidates);
        if let Some(key) = seed_key {
          if let Err(err) = cache.set(&key, data) {
            tracing::warn!("failed to seed cache after mutation: {err}");
          }
        }
      }
      let _ = tx.send(result);
    });
    true
  }

  /// Poll for a pending result. Returns `true` if the state changed.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = MutationState::Success(data);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = MutationState::Error(error.to_string());
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        self.state = MutationState::Error(ApiError::Cancelled.to_string());
        self.receiver = None;
        true
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::de::DeserializeOwned;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  async fn settle<T>(mutation: &mut Mutation<T>)
  where
    T: Clone + Serialize + DeserializeOwned + Send + 'static,
  {
    for _ in 0..50 {
      tokio::time::sleep(Duration::from_millis(5)).await;
      if mutation.poll() {
        return;
      }
    }
    panic!("mutation never settled");
  }

  async fn prime_list(cache: &QueryCache, key: &QueryKey, items: Vec<u32>) {
    let primed: Vec<u32> = cache
      .fetch(key, move || Box::pin(async move { Ok(items) }))
      .await
      .unwrap();
    assert!(!primed.is_empty());
  }

  #[tokio::test]
  async fn successful_mutation_invalidates_declared_prefixes() {
    let cache = QueryCache::new();
    let list_key = QueryKey::resource("books").page(1);
    prime_list(&cache, &list_key, vec![5, 6]).await;

    let mut mutation = Mutation::new(
      cache.clone(),
      vec![QueryKey::resource("books")],
      || async { Ok(()) },
    );
    mutation.mutate();
    settle(&mut mutation).await;

    assert!(matches!(mutation.state(), MutationState::Success(())));
    assert!(cache.is_stale(&list_key));
  }

  #[tokio::test]
  async fn failed_mutation_invalidates_nothing() {
    let cache = QueryCache::new();
    let list_key = QueryKey::resource("books").page(1);
    prime_list(&cache, &list_key, vec![5, 6]).await;

    let mut mutation: Mutation<()> = Mutation::new(
      cache.clone(),
      vec![QueryKey::resource("books")],
      || async {
        Err(ApiError::Server {
          status: 500,
          message: "boom".to_string(),
        })
      },
    );
    mutation.mutate();
    settle(&mut mutation).await;

    assert!(mutation.is_error());
    assert!(!cache.is_stale(&list_key));
  }

  #[tokio::test]
  async fn mutation_runs_exactly_once_per_invocation() {
    let cache = QueryCache::new();
    let runs = Arc::new(AtomicU32::new(0));
    let runs_clone = Arc::clone(&runs);

    let mut mutation = Mutation::new(cache, vec![], move || {
      let runs = Arc::clone(&runs_clone);
      async move {
        runs.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        Ok(1u32)
      }
    });

    assert!(mutation.mutate());
    assert!(mutation.is_pending());
    // A second call while pending is dropped, and says so
    assert!(!mutation.mutate());
    settle(&mut mutation).await;

    assert_eq!(runs.load(Ordering::SeqCst), 1);

    // A fresh invocation after settling runs again
    assert!(mutation.mutate());
    settle(&mut mutation).await;
    assert_eq!(runs.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn seeding_fills_the_target_entry() {
    let cache = QueryCache::new();
    let entity_key = QueryKey::resource("badges").segment(7);

    let mut mutation = Mutation::new(
      cache.clone(),
      vec![QueryKey::resource("badges")],
      || async { Ok(vec![7u32]) },
    )
    .seeding(entity_key.clone());

    mutation.mutate();
    settle(&mut mutation).await;

    assert_eq!(cache.data_for::<Vec<u32>>(&entity_key), Some(vec![7]));
    // The seeded entry is fresh, not stale
    assert!(!cache.is_stale(&entity_key));
  }
}
