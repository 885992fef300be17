use serde::{Deserialize, Serialize};

/// Error body shape the backend uses for rejected requests. Some endpoints
/// return plain text instead; callers fall back to the raw body in that case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
