//! Domain records for the Libiverse admin API.

use serde::{Deserialize, Serialize};

/// Platform role of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
  Admin,
  Moderator,
  Member,
}

/// A user account as returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub id: u64,
  pub name: String,
  pub email: String,
  pub role: Role,
  #[serde(default)]
  pub active: bool,
}

/// Payload of a successful `POST /auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
  pub access_token: String,
  pub user: User,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
  pub email: String,
  pub password: String,
}

/// A book in the platform catalogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
  pub id: u64,
  pub title: String,
  pub author: String,
  #[serde(default)]
  pub isbn: Option<String>,
  #[serde(default)]
  pub cover_url: Option<String>,
}

/// A discussion forum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forum {
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub thread_count: u64,
}

/// A thread within a forum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForumThread {
  pub id: u64,
  pub forum_id: u64,
  pub title: String,
  pub author: String,
  #[serde(default)]
  pub post_count: u64,
  pub created_at: String,
}

/// A post within a thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
  pub id: u64,
  pub thread_id: u64,
  pub author: String,
  pub body: String,
  pub created_at: String,
}

/// A reading challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  pub starts_on: String,
  pub ends_on: String,
  #[serde(default)]
  pub participant_count: u64,
}

/// A community event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookEvent {
  pub id: u64,
  pub title: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub location: Option<String>,
  pub starts_at: String,
  #[serde(default)]
  pub image_url: Option<String>,
}

/// An achievement badge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Badge {
  pub id: u64,
  pub name: String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub icon_url: Option<String>,
}

// ============================================================================
// Mutation payloads
// ============================================================================

/// Partial update for a user account. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub role: Option<Role>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewBook {
  pub title: String,
  pub author: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub isbn: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BookUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub author: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub isbn: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewForum {
  pub title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ForumUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewChallenge {
  pub title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  pub starts_on: String,
  pub ends_on: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChallengeUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub ends_on: Option<String>,
}

/// Text fields of a new event. The image travels as a multipart part.
#[derive(Debug, Clone, Serialize)]
pub struct NewEvent {
  pub title: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,
  pub starts_at: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EventUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub title: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub location: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub starts_at: Option<String>,
}

/// Text fields of a new badge. The icon travels as a multipart part.
#[derive(Debug, Clone, Serialize)]
pub struct NewBadge {
  pub name: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BadgeUpdate {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub description: Option<String>,
}

/// An uploaded file: original file name plus raw bytes.
#[derive(Debug, Clone)]
pub struct FileUpload {
  pub file_name: String,
  pub bytes: Vec<u8>,
}
