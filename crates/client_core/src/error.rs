use thiserror::Error;

use crate::transport::Response;

/// Error taxonomy for every store operation.
///
/// Validation failures are produced before any network call and list one
/// human-readable message per offending field. Fetch failures cover both
/// transport-level errors (no status) and non-success backend responses.
/// NotFound is a local lookup miss, also raised before any network call.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),
    #[error("{}", fetch_message(.status, .message))]
    Fetch {
        status: Option<u16>,
        message: String,
    },
    #[error("no local entry with id {0}")]
    NotFound(i64),
}

impl StoreError {
    /// Transport-level failure: the request never produced a response.
    pub fn network(err: impl std::fmt::Display) -> Self {
        StoreError::Fetch {
            status: None,
            message: err.to_string(),
        }
    }

    /// Non-success backend response, message extracted from the body.
    pub fn rejected(response: &Response) -> Self {
        StoreError::Fetch {
            status: Some(response.status),
            message: response.error_message(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, StoreError::Validation(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

fn fetch_message(status: &Option<u16>, message: &str) -> String {
    match status {
        Some(status) => format!("backend rejected request ({status}): {message}"),
        None => format!("request failed: {message}"),
    }
}
