//! Error taxonomy surfaced by the HTTP access layer.

use reqwest::StatusCode;
use thiserror::Error;

use super::envelope::{Envelope, FieldErrors};
use crate::session::StorageError;

/// Every failure a caller can see from the access layer.
///
/// `Network` carries the original transport error unchanged; no envelope is
/// fabricated when there was no response at all.
#[derive(Debug, Error)]
pub enum ApiError {
  /// HTTP 401. The stored token has already been cleared by the time this
  /// surfaces.
  #[error("authentication rejected: {message}")]
  Unauthenticated { message: String },

  /// Any non-2xx response whose envelope carried a populated field-error
  /// map, regardless of exact status code.
  #[error("{message}")]
  Validation {
    message: String,
    errors: FieldErrors,
  },

  /// Non-2xx without field errors (typically 5xx).
  #[error("server error ({status}): {message}")]
  Server { status: u16, message: String },

  /// No response-shaped object at all: connect failure, timeout, etc.
  #[error("network unavailable: {0}")]
  Network(#[from] reqwest::Error),

  /// A 2xx body that did not parse as an envelope.
  #[error("failed to decode response body: {0}")]
  Decode(#[from] serde_json::Error),

  /// Credential store failure while attaching or clearing the token.
  #[error(transparent)]
  Storage(#[from] StorageError),

  #[error("invalid request url: {0}")]
  Url(#[from] url::ParseError),

  /// The in-flight request was dropped before a result arrived.
  #[error("request was cancelled before completing")]
  Cancelled,
}

impl ApiError {
  /// Build the typed failure for a non-2xx response.
  pub(crate) fn classify(status: StatusCode, envelope: Option<Envelope<serde_json::Value>>) -> Self {
    let (message, errors) = match envelope {
      Some(env) => (env.message, env.errors),
      None => (None, None),
    };
    Self::from_parts(status.as_u16(), message, errors)
  }

  pub(crate) fn from_parts(
    status: u16,
    message: Option<String>,
    errors: Option<FieldErrors>,
  ) -> Self {
    let message = message.unwrap_or_else(|| {
      StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("request failed")
        .to_string()
    });

    if status == StatusCode::UNAUTHORIZED.as_u16() {
      return ApiError::Unauthenticated { message };
    }

    // Field errors mark a validation failure whatever the status code says.
    match errors {
      Some(errors) if !errors.is_empty() => ApiError::Validation { message, errors },
      _ => ApiError::Server { status, message },
    }
  }

  /// Field-level messages for form display, when present.
  pub fn field_errors(&self) -> Option<&FieldErrors> {
    match self {
      ApiError::Validation { errors, .. } => Some(errors),
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;

  fn errors(field: &str, message: &str) -> FieldErrors {
    let mut map = BTreeMap::new();
    map.insert(field.to_string(), vec![message.to_string()]);
    map
  }

  #[test]
  fn unauthorized_maps_to_unauthenticated() {
    let err = ApiError::from_parts(401, Some("token expired".into()), None);
    assert!(matches!(err, ApiError::Unauthenticated { .. }));
  }

  #[test]
  fn populated_errors_map_means_validation_regardless_of_status() {
    // 422 is the usual carrier...
    let err = ApiError::from_parts(422, None, Some(errors("title", "is required")));
    assert!(matches!(err, ApiError::Validation { .. }));

    // ...but a 400 or even a 500 with field errors still classifies the same.
    let err = ApiError::from_parts(500, None, Some(errors("title", "is required")));
    assert!(matches!(err, ApiError::Validation { .. }));
  }

  #[test]
  fn empty_errors_map_falls_back_to_server() {
    let err = ApiError::from_parts(422, None, Some(FieldErrors::new()));
    assert!(matches!(err, ApiError::Server { status: 422, .. }));
  }

  #[test]
  fn message_defaults_to_canonical_reason() {
    let err = ApiError::from_parts(503, None, None);
    assert_eq!(
      err.to_string(),
      "server error (503): Service Unavailable"
    );
  }

  #[test]
  fn field_errors_accessor() {
    let err = ApiError::from_parts(422, Some("bad".into()), Some(errors("email", "taken")));
    assert_eq!(err.field_errors().unwrap()["email"], vec!["taken"]);
    let err = ApiError::from_parts(500, None, None);
    assert!(err.field_errors().is_none());
  }
}
