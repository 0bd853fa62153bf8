//! Credential/session storage for the admin client.
//!
//! Tokens live in two scopes: a process-lifetime "session" scope and a
//! long-lived "remembered" scope (SQLite). Reads check the session scope
//! first. The only writers are login, logout and the 401 interception path;
//! everything else gets a read-only view through the narrow API here.

mod scope;

pub use scope::{CredentialScope, MemoryScope, SqliteScope, StorageError};

use crate::api::types::User;

/// Persisted credential keys.
pub const TOKEN_KEY: &str = "token";
pub const USER_KEY: &str = "user";
pub const USERNAME_KEY: &str = "username";

/// Two-scope credential store, injected into the HTTP client.
pub struct SessionStore {
  session: Box<dyn CredentialScope>,
  remembered: Box<dyn CredentialScope>,
}

impl SessionStore {
  /// Build a store from explicit scopes.
  pub fn new(session: Box<dyn CredentialScope>, remembered: Box<dyn CredentialScope>) -> Self {
    Self { session, remembered }
  }

  /// Store backed by the default SQLite remembered scope.
  pub fn open() -> Result<Self, StorageError> {
    Ok(Self::new(
      Box::new(MemoryScope::new()),
      Box::new(SqliteScope::open()?),
    ))
  }

  /// Fully in-memory store. Nothing survives the process.
  pub fn in_memory() -> Self {
    Self::new(Box::new(MemoryScope::new()), Box::new(MemoryScope::new()))
  }

  fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
    // Session scope takes precedence over remembered
    if let Some(value) = self.session.get(key)? {
      return Ok(Some(value));
    }
    self.remembered.get(key)
  }

  /// The stored bearer token, if any.
  pub fn token(&self) -> Result<Option<String>, StorageError> {
    self.read(TOKEN_KEY)
  }

  /// The stored user record, if any.
  pub fn user(&self) -> Result<Option<User>, StorageError> {
    match self.read(USER_KEY)? {
      Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
      None => Ok(None),
    }
  }

  /// The remembered login name, if any.
  pub fn username(&self) -> Result<Option<String>, StorageError> {
    self.read(USERNAME_KEY)
  }

  /// Record a successful login.
  ///
  /// Writes `token` and `user` to the session scope always, and to the
  /// remembered scope only when `remember` is set.
  pub fn store_login(&self, token: &str, user: &User, remember: bool) -> Result<(), StorageError> {
    let user_json = serde_json::to_string(user)?;

    self.session.set(TOKEN_KEY, token)?;
    self.session.set(USER_KEY, &user_json)?;

    if remember {
      self.remembered.set(TOKEN_KEY, token)?;
      self.remembered.set(USER_KEY, &user_json)?;
    }

    Ok(())
  }

  /// Remember the login name for form prefill.
  pub fn store_username(&self, username: &str) -> Result<(), StorageError> {
    self.session.set(USERNAME_KEY, username)?;
    self.remembered.set(USERNAME_KEY, username)
  }

  /// Drop the token from both scopes. The 401 interception path.
  ///
  /// Leaves `user` and `username` alone: the next route-guard check sees a
  /// missing token and sends the operator back to login.
  pub fn clear_token(&self) -> Result<(), StorageError> {
    self.session.remove(TOKEN_KEY)?;
    self.remembered.remove(TOKEN_KEY)
  }

  /// Drop every persisted key from both scopes. The logout path.
  pub fn clear_all(&self) -> Result<(), StorageError> {
    for key in [TOKEN_KEY, USER_KEY, USERNAME_KEY] {
      self.session.remove(key)?;
      self.remembered.remove(key)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::types::{Role, User};

  fn sample_user() -> User {
    User {
      id: 1,
      name: "Li Admin".to_string(),
      email: "li@libiverse.example".to_string(),
      role: Role::Admin,
      active: true,
    }
  }

  #[test]
  fn login_without_remember_stays_in_session_scope() {
    let store = SessionStore::in_memory();
    store.store_login("abc", &sample_user(), false).unwrap();

    assert_eq!(store.token().unwrap(), Some("abc".to_string()));
    assert_eq!(store.user().unwrap().unwrap().id, 1);
    // Remembered scope untouched
    assert_eq!(store.remembered.get(TOKEN_KEY).unwrap(), None);
  }

  #[test]
  fn login_with_remember_writes_both_scopes() {
    let store = SessionStore::in_memory();
    store.store_login("abc", &sample_user(), true).unwrap();

    assert_eq!(store.session.get(TOKEN_KEY).unwrap(), Some("abc".into()));
    assert_eq!(store.remembered.get(TOKEN_KEY).unwrap(), Some("abc".into()));
  }

  #[test]
  fn session_scope_takes_precedence() {
    let store = SessionStore::in_memory();
    store.remembered.set(TOKEN_KEY, "old").unwrap();
    store.session.set(TOKEN_KEY, "new").unwrap();

    assert_eq!(store.token().unwrap(), Some("new".to_string()));
  }

  #[test]
  fn clear_token_leaves_user_and_username() {
    let store = SessionStore::in_memory();
    store.store_login("abc", &sample_user(), true).unwrap();
    store.store_username("li@libiverse.example").unwrap();

    store.clear_token().unwrap();

    assert_eq!(store.token().unwrap(), None);
    assert!(store.user().unwrap().is_some());
    assert!(store.username().unwrap().is_some());
  }

  #[test]
  fn clear_all_empties_both_scopes() {
    let store = SessionStore::in_memory();
    store.store_login("abc", &sample_user(), true).unwrap();
    store.store_username("li@libiverse.example").unwrap();

    store.clear_all().unwrap();

    for key in [TOKEN_KEY, USER_KEY, USERNAME_KEY] {
      assert_eq!(store.session.get(key).unwrap(), None);
      assert_eq!(store.remembered.get(key).unwrap(), None);
    }
  }

  #[test]
  fn remembered_token_survives_session_clearing() {
    let store = SessionStore::in_memory();
    store.store_login("abc", &sample_user(), true).unwrap();

    // Simulate a fresh process: empty session scope, populated remembered scope
    store.session.remove(TOKEN_KEY).unwrap();
    assert_eq!(store.token().unwrap(), Some("abc".to_string()));
  }
}
