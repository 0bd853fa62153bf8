//! The normalized wrapper around every Libiverse API response body.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::error::ApiError;

/// Field name to list of human messages, as produced by backend validation.
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Standard response envelope.
///
/// `success` is authoritative over payload presence: a `success=false`
/// envelope may still carry scraps in `data`, and callers must not trust
/// them. Use [`Envelope::into_result`] rather than reading `data` directly.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
  #[serde(default)]
  pub success: bool,
  #[serde(default)]
  pub message: Option<String>,
  #[serde(default = "none")]
  pub data: Option<T>,
  #[serde(default)]
  pub errors: Option<FieldErrors>,
  #[serde(default)]
  pub meta: Option<Meta>,
}

// `#[serde(default)]` on a generic field would require `T: Default`.
fn none<T>() -> Option<T> {
  None
}

/// Response metadata block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
  #[serde(default)]
  pub pagination: Option<Pagination>,
  pub status: u16,
  pub timestamp: String,
}

/// Pagination block for list responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
  pub count: u64,
  pub current_page: u64,
  #[serde(default)]
  pub links: PageLinks,
  pub per_page: u64,
  pub total: u64,
  pub total_pages: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLinks {
  #[serde(default)]
  pub first: Option<String>,
  #[serde(default)]
  pub last: Option<String>,
  #[serde(default)]
  pub next: Option<String>,
  #[serde(default)]
  pub prev: Option<String>,
}

impl<T> Envelope<T> {
  /// Extract the payload, honoring the `success` flag.
  ///
  /// A `success=false` envelope becomes the matching [`ApiError`] even if
  /// the transport status was 2xx.
  pub fn into_result(self) -> Result<T, ApiError> {
    let status = self.meta.as_ref().map(|m| m.status).unwrap_or(200);
    if !self.success {
      return Err(ApiError::from_parts(status, self.message, self.errors));
    }
    match self.data {
      Some(data) => Ok(data),
      None => Err(ApiError::Server {
        status,
        message: self
          .message
          .unwrap_or_else(|| "response marked successful but carried no data".to_string()),
      }),
    }
  }

  /// Acknowledge a payload-free success (deletes, joins).
  ///
  /// Deletes legitimately come back with `data: null`, so only the
  /// `success` flag is consulted.
  pub fn into_ack(self) -> Result<(), ApiError> {
    if self.success {
      return Ok(());
    }
    let status = self.meta.as_ref().map(|m| m.status).unwrap_or(200);
    Err(ApiError::from_parts(status, self.message, self.errors))
  }

  /// Pagination block, if the response carried one.
  pub fn pagination(&self) -> Option<&Pagination> {
    self.meta.as_ref().and_then(|m| m.pagination.as_ref())
  }
}

/// One page of a list resource, as stored in the query cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub pagination: Option<Pagination>,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn parses_success_envelope_with_pagination() {
    let body = json!({
      "success": true,
      "message": "ok",
      "data": [{"id": 1}, {"id": 2}],
      "errors": null,
      "meta": {
        "pagination": {
          "count": 20,
          "current_page": 1,
          "links": {"first": "/user?page=1", "last": "/user?page=3", "next": "/user?page=2", "prev": null},
          "per_page": 20,
          "total": 57,
          "total_pages": 3
        },
        "status": 200,
        "timestamp": "2026-08-27T10:00:00Z"
      }
    });

    let envelope: Envelope<Vec<serde_json::Value>> = serde_json::from_value(body).unwrap();
    assert!(envelope.success);
    assert_eq!(envelope.pagination().unwrap().total, 57);
    assert_eq!(envelope.into_result().unwrap().len(), 2);
  }

  #[test]
  fn parses_error_envelope() {
    let body = json!({
      "success": false,
      "message": "Validation failed",
      "data": null,
      "errors": {"email": ["is already taken"]},
      "meta": {"status": 422, "timestamp": "2026-08-27T10:00:00Z"}
    });

    let envelope: Envelope<serde_json::Value> = serde_json::from_value(body).unwrap();
    assert!(!envelope.success);
    let err = envelope.into_result().unwrap_err();
    match err {
      ApiError::Validation { errors, .. } => {
        assert_eq!(errors["email"], vec!["is already taken".to_string()]);
      }
      other => panic!("expected Validation, got {other:?}"),
    }
  }

  #[test]
  fn success_flag_wins_over_present_data() {
    // A broken backend may ship data alongside success=false.
    let body = json!({
      "success": false,
      "message": "nope",
      "data": {"id": 9},
      "meta": {"status": 500, "timestamp": "2026-08-27T10:00:00Z"}
    });

    let envelope: Envelope<serde_json::Value> = serde_json::from_value(body).unwrap();
    assert!(envelope.into_result().is_err());
  }

  #[test]
  fn missing_optional_blocks_default() {
    let envelope: Envelope<serde_json::Value> =
      serde_json::from_value(json!({"success": true, "data": 1})).unwrap();
    assert!(envelope.meta.is_none());
    assert!(envelope.errors.is_none());
  }
}
