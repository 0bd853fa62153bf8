//! Cached service layer over the HTTP access layer.
//!
//! One method per admin operation. Queries go through the query cache under
//! typed keys; mutations go straight to the network and, on success only,
//! apply the static invalidation rules (plus a cache seed where the server
//! returns the updated entity).

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::cache::{QueryCache, QueryKey};
use crate::config::Config;
use crate::session::SessionStore;

use super::client::HttpClient;
use super::envelope::Page;
use super::error::ApiError;
use super::invalidation::{self, MutationKind};
use super::types::{
  Badge, BadgeUpdate, Book, BookEvent, BookUpdate, Challenge, ChallengeUpdate, EventUpdate,
  FileUpload, Forum, ForumThread, ForumUpdate, LoginRequest, LoginResponse, NewBadge, NewBook,
  NewChallenge, NewEvent, NewForum, Post, User, UserUpdate,
};

/// Filter parameters for list queries, canonical by construction.
pub type Filters = BTreeMap<String, String>;

/// The admin client: HTTP access layer plus query cache.
#[derive(Clone)]
pub struct AdminApi {
  http: HttpClient,
  cache: QueryCache,
  session: Arc<SessionStore>,
}

impl AdminApi {
  pub fn new(config: &Config, session: Arc<SessionStore>) -> Result<Self, ApiError> {
    let http = HttpClient::new(config, Arc::clone(&session))?;
    Ok(Self {
      http,
      cache: QueryCache::new(),
      session,
    })
  }

  pub fn cache(&self) -> &QueryCache {
    &self.cache
  }

  pub fn session(&self) -> &Arc<SessionStore> {
    &self.session
  }

  // ==========================================================================
  // Auth
  // ==========================================================================

  /// Log in and store the credential.
  ///
  /// Writes `token` and `user` to the session scope, and to the remembered
  /// scope when `remember` is set. The returned user is also seeded into
  /// the cache under its entity key.
  pub async fn login(&self, email: &str, password: &str, remember: bool) -> Result<User, ApiError> {
    let request = LoginRequest {
      email: email.to_string(),
      password: password.to_string(),
    };
    let login: LoginResponse = self
      .http
      .post("/auth/login", &request)
      .await?
      .into_result()?;

    self
      .session
      .store_login(&login.access_token, &login.user, remember)?;
    self
      .cache
      .set(&QueryKey::resource("users").segment(login.user.id), &login.user)?;

    Ok(login.user)
  }

  /// Best-effort server logout plus unconditional local teardown.
  pub async fn logout(&self) -> Result<(), ApiError> {
    self.http.logout().await
  }

  /// The locally stored user record, if logged in.
  pub fn current_user(&self) -> Result<Option<User>, ApiError> {
    Ok(self.session.user()?)
  }

  // ==========================================================================
  // Query and mutation plumbing
  // ==========================================================================

  async fn list_query<T>(
    &self,
    key: QueryKey,
    path: String,
    page: u64,
    filters: &Filters,
  ) -> Result<Page<T>, Arc<ApiError>>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
  {
    let http = self.http.clone();
    let mut query = filters.clone();
    query.insert("page".to_string(), page.to_string());

    self
      .cache
      .fetch(&key, move || async move {
        let envelope = http.get_with::<Vec<T>>(&path, &query).await?;
        let pagination = envelope.pagination().cloned();
        let items = envelope.into_result()?;
        Ok(Page { items, pagination })
      })
      .await
  }

  async fn entity_query<T>(&self, key: QueryKey, path: String) -> Result<T, Arc<ApiError>>
  where
    T: Serialize + DeserializeOwned + Send + 'static,
  {
    let http = self.http.clone();
    self
      .cache
      .fetch(&key, move || async move {
        http.get::<T>(&path).await?.into_result()
      })
      .await
  }

  /// Apply invalidation rules after a successful mutation, seeding the
  /// entity key with the server's updated record when one came back.
  fn finish_mutation<T: Serialize>(
    &self,
    kind: MutationKind,
    seed: Option<(QueryKey, &T)>,
  ) -> Result<(), ApiError> {
    self.cache.invalidate_prefixes(&invalidation::rules(kind));
    if let Some((key, entity)) = seed {
      self.cache.set(&key, entity)?;
    }
    Ok(())
  }

  // ==========================================================================
  // Users
  // ==========================================================================

  pub async fn users(&self, page: u64, filters: &Filters) -> Result<Page<User>, Arc<ApiError>> {
    let key = QueryKey::resource("users").page(page).filters(filters);
    self.list_query(key, "/user".to_string(), page, filters).await
  }

  pub async fn user(&self, id: u64) -> Result<User, Arc<ApiError>> {
    let key = QueryKey::resource("users").segment(id);
    self.entity_query(key, format!("/user/{id}")).await
  }

  pub async fn update_user(&self, id: u64, update: &UserUpdate) -> Result<User, ApiError> {
    let user: User = self
      .http
      .put(&format!("/user/{id}"), update)
      .await?
      .into_result()?;
    self.finish_mutation(
      MutationKind::UserUpdate(id),
      Some((QueryKey::resource("users").segment(id), &user)),
    )?;
    Ok(user)
  }

  pub async fn delete_user(&self, id: u64) -> Result<(), ApiError> {
    self
      .http
      .delete::<serde_json::Value>(&format!("/user/{id}"))
      .await?
      .into_ack()?;
    self.finish_mutation::<User>(MutationKind::UserDelete(id), None)
  }

  pub async fn toggle_user_active(&self, id: u64) -> Result<User, ApiError> {
    let user: User = self
      .http
      .post_empty(&format!("/user/{id}/toggle"))
      .await?
      .into_result()?;
    self.finish_mutation(
      MutationKind::UserToggleActive(id),
      Some((QueryKey::resource("users").segment(id), &user)),
    )?;
    Ok(user)
  }

  // ==========================================================================
  // Books
  // ==========================================================================

  pub async fn books(&self, page: u64, filters: &Filters) -> Result<Page<Book>, Arc<ApiError>> {
    let key = QueryKey::resource("books").page(page).filters(filters);
    self.list_query(key, "/book".to_string(), page, filters).await
  }

  pub async fn book(&self, id: u64) -> Result<Book, Arc<ApiError>> {
    let key = QueryKey::resource("books").segment(id);
    self.entity_query(key, format!("/book/{id}")).await
  }

  pub async fn create_book(&self, book: &NewBook) -> Result<Book, ApiError> {
    let created: Book = self.http.post("/book", book).await?.into_result()?;
    self.finish_mutation(
      MutationKind::BookCreate,
      Some((QueryKey::resource("books").segment(created.id), &created)),
    )?;
    Ok(created)
  }

  pub async fn update_book(&self, id: u64, update: &BookUpdate) -> Result<Book, ApiError> {
    let book: Book = self
      .http
      .put(&format!("/book/{id}"), update)
      .await?
      .into_result()?;
    self.finish_mutation(
      MutationKind::BookUpdate(id),
      Some((QueryKey::resource("books").segment(id), &book)),
    )?;
    Ok(book)
  }

  pub async fn delete_book(&self, id: u64) -> Result<(), ApiError> {
    self
      .http
      .delete::<serde_json::Value>(&format!("/book/{id}"))
      .await?
      .into_ack()?;
    self.finish_mutation::<Book>(MutationKind::BookDelete(id), None)
  }

  // ==========================================================================
  // Forums, threads, posts
  // ==========================================================================

  pub async fn forums(&self, page: u64) -> Result<Page<Forum>, Arc<ApiError>> {
    let key = QueryKey::resource("forums").page(page);
    self
      .list_query(key, "/forum".to_string(), page, &Filters::new())
      .await
  }

  pub async fn forum(&self, id: u64) -> Result<Forum, Arc<ApiError>> {
    let key = QueryKey::resource("forums").segment(id);
    self.entity_query(key, format!("/forum/{id}")).await
  }

  pub async fn create_forum(&self, forum: &NewForum) -> Result<Forum, ApiError> {
    let created: Forum = self.http.post("/forum", forum).await?.into_result()?;
    self.finish_mutation(
      MutationKind::ForumCreate,
      Some((QueryKey::resource("forums").segment(created.id), &created)),
    )?;
    Ok(created)
  }

  pub async fn update_forum(&self, id: u64, update: &ForumUpdate) -> Result<Forum, ApiError> {
    let forum: Forum = self
      .http
      .put(&format!("/forum/{id}"), update)
      .await?
      .into_result()?;
    self.finish_mutation(
      MutationKind::ForumUpdate(id),
      Some((QueryKey::resource("forums").segment(id), &forum)),
    )?;
    Ok(forum)
  }

  pub async fn delete_forum(&self, id: u64) -> Result<(), ApiError> {
    self
      .http
      .delete::<serde_json::Value>(&format!("/forum/{id}"))
      .await?
      .into_ack()?;
    self.finish_mutation::<Forum>(MutationKind::ForumDelete(id), None)
  }

  pub async fn forum_threads(
    &self,
    forum_id: u64,
    page: u64,
  ) -> Result<Page<ForumThread>, Arc<ApiError>> {
    let key = QueryKey::resource("forums")
      .segment(forum_id)
      .segment("threads")
      .page(page);
    self
      .list_query(key, format!("/forum/{forum_id}/threads"), page, &Filters::new())
      .await
  }

  pub async fn delete_thread(&self, forum_id: u64, thread_id: u64) -> Result<(), ApiError> {
    self
      .http
      .delete::<serde_json::Value>(&format!("/thread/{thread_id}"))
      .await?
      .into_ack()?;
    self.finish_mutation::<ForumThread>(MutationKind::ThreadDelete { forum_id, thread_id }, None)
  }

  pub async fn thread_posts(
    &self,
    thread_id: u64,
    page: u64,
  ) -> Result<Page<Post>, Arc<ApiError>> {
    let key = QueryKey::resource("threads")
      .segment(thread_id)
      .segment("posts")
      .page(page);
    self
      .list_query(key, format!("/thread/{thread_id}/posts"), page, &Filters::new())
      .await
  }

  pub async fn delete_post(&self, thread_id: u64, post_id: u64) -> Result<(), ApiError> {
    self
      .http
      .delete::<serde_json::Value>(&format!("/post/{post_id}"))
      .await?
      .into_ack()?;
    self.finish_mutation::<Post>(MutationKind::PostDelete { thread_id, post_id }, None)
  }

  // ==========================================================================
  // Reading challenges
  // ==========================================================================

  pub async fn challenges(&self, page: u64) -> Result<Page<Challenge>, Arc<ApiError>> {
    let key = QueryKey::resource("challenges").page(page);
    self
      .list_query(key, "/challenge".to_string(), page, &Filters::new())
      .await
  }

  pub async fn challenge(&self, id: u64) -> Result<Challenge, Arc<ApiError>> {
    let key = QueryKey::resource("challenges").segment(id);
    self.entity_query(key, format!("/challenge/{id}")).await
  }

  pub async fn create_challenge(&self, challenge: &NewChallenge) -> Result<Challenge, ApiError> {
    let created: Challenge = self.http.post("/challenge", challenge).await?.into_result()?;
    self.finish_mutation(
      MutationKind::ChallengeCreate,
      Some((QueryKey::resource("challenges").segment(created.id), &created)),
    )?;
    Ok(created)
  }

  pub async fn update_challenge(
    &self,
    id: u64,
    update: &ChallengeUpdate,
  ) -> Result<Challenge, ApiError> {
    let challenge: Challenge = self
      .http
      .put(&format!("/challenge/{id}"), update)
      .await?
      .into_result()?;
    self.finish_mutation(
      MutationKind::ChallengeUpdate(id),
      Some((QueryKey::resource("challenges").segment(id), &challenge)),
    )?;
    Ok(challenge)
  }

  pub async fn delete_challenge(&self, id: u64) -> Result<(), ApiError> {
    self
      .http
      .delete::<serde_json::Value>(&format!("/challenge/{id}"))
      .await?
      .into_ack()?;
    self.finish_mutation::<Challenge>(MutationKind::ChallengeDelete(id), None)
  }

  /// Join a challenge on behalf of the logged-in account.
  pub async fn join_challenge(&self, id: u64) -> Result<(), ApiError> {
    self
      .http
      .post_empty::<serde_json::Value>(&format!("/challenge/{id}/join"))
      .await?
      .into_ack()?;
    self.finish_mutation::<Challenge>(MutationKind::ChallengeJoin(id), None)
  }

  // ==========================================================================
  // Events
  // ==========================================================================

  pub async fn events(&self, page: u64) -> Result<Page<BookEvent>, Arc<ApiError>> {
    let key = QueryKey::resource("events").page(page);
    self
      .list_query(key, "/event".to_string(), page, &Filters::new())
      .await
  }

  pub async fn event(&self, id: u64) -> Result<BookEvent, Arc<ApiError>> {
    let key = QueryKey::resource("events").segment(id);
    self.entity_query(key, format!("/event/{id}")).await
  }

  /// Create an event. The optional image travels as a multipart part.
  pub async fn create_event(
    &self,
    event: &NewEvent,
    image: Option<FileUpload>,
  ) -> Result<BookEvent, ApiError> {
    let mut form = multipart_fields(event)?;
    if let Some(image) = image {
      form = attach_file(form, "image", image);
    }

    let created: BookEvent = self.http.upload("/event", form).await?.into_result()?;
    self.finish_mutation(
      MutationKind::EventCreate,
      Some((QueryKey::resource("events").segment(created.id), &created)),
    )?;
    Ok(created)
  }

  pub async fn update_event(&self, id: u64, update: &EventUpdate) -> Result<BookEvent, ApiError> {
    let event: BookEvent = self
      .http
      .put(&format!("/event/{id}"), update)
      .await?
      .into_result()?;
    self.finish_mutation(
      MutationKind::EventUpdate(id),
      Some((QueryKey::resource("events").segment(id), &event)),
    )?;
    Ok(event)
  }

  pub async fn delete_event(&self, id: u64) -> Result<(), ApiError> {
    self
      .http
      .delete::<serde_json::Value>(&format!("/event/{id}"))
      .await?
      .into_ack()?;
    self.finish_mutation::<BookEvent>(MutationKind::EventDelete(id), None)
  }

  // ==========================================================================
  // Badges
  // ==========================================================================

  pub async fn badges(&self, page: u64) -> Result<Page<Badge>, Arc<ApiError>> {
    let key = QueryKey::resource("badges").page(page);
    self
      .list_query(key, "/badge".to_string(), page, &Filters::new())
      .await
  }

  pub async fn badge(&self, id: u64) -> Result<Badge, Arc<ApiError>> {
    let key = QueryKey::resource("badges").segment(id);
    self.entity_query(key, format!("/badge/{id}")).await
  }

  /// Create a badge. The optional icon travels as a multipart part.
  pub async fn create_badge(
    &self,
    badge: &NewBadge,
    icon: Option<FileUpload>,
  ) -> Result<Badge, ApiError> {
    let mut form = multipart_fields(badge)?;
    if let Some(icon) = icon {
      form = attach_file(form, "icon", icon);
    }

    let created: Badge = self.http.upload("/badge", form).await?.into_result()?;
    self.finish_mutation(
      MutationKind::BadgeCreate,
      Some((QueryKey::resource("badges").segment(created.id), &created)),
    )?;
    Ok(created)
  }

  pub async fn update_badge(&self, id: u64, update: &BadgeUpdate) -> Result<Badge, ApiError> {
    let badge: Badge = self
      .http
      .put(&format!("/badge/{id}"), update)
      .await?
      .into_result()?;
    self.finish_mutation(
      MutationKind::BadgeUpdate(id),
      Some((QueryKey::resource("badges").segment(id), &badge)),
    )?;
    Ok(badge)
  }

  pub async fn delete_badge(&self, id: u64) -> Result<(), ApiError> {
    self
      .http
      .delete::<serde_json::Value>(&format!("/badge/{id}"))
      .await?
      .into_ack()?;
    self.finish_mutation::<Badge>(MutationKind::BadgeDelete(id), None)
  }

  /// Download a badge icon as raw bytes.
  pub async fn badge_icon(&self, id: u64) -> Result<Vec<u8>, ApiError> {
    self.http.get_bytes(&format!("/badge/{id}/icon")).await
  }
}

/// Flatten a payload struct into multipart text fields.
fn multipart_fields<B: Serialize>(fields: &B) -> Result<reqwest::multipart::Form, ApiError> {
  let value = serde_json::to_value(fields)?;
  let mut form = reqwest::multipart::Form::new();
  if let serde_json::Value::Object(map) = value {
    for (name, field) in map {
      let text = match field {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
      };
      form = form.text(name, text);
    }
  }
  Ok(form)
}

fn attach_file(
  form: reqwest::multipart::Form,
  name: &str,
  file: FileUpload,
) -> reqwest::multipart::Form {
  form.part(
    name.to_string(),
    reqwest::multipart::Part::bytes(file.bytes).file_name(file.file_name),
  )
}
