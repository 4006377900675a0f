use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failure body returned by the backend on non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BackendErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<Value>,
}

impl BackendErrorBody {
    /// Validation failures carry structured details; those are shown as compact JSON.
    pub fn detail_text(&self) -> Option<String> {
        match self.detail.as_ref()? {
            Value::Null => None,
            Value::String(text) if text.is_empty() => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunConfigError {
    #[error("The provided Cookie JSON is invalid. Please check and paste it again.")]
    InvalidCookieJson(String),
    #[error("max posts to process must be between 1 and 20, got {0}")]
    MaxPostsOutOfRange(u8),
}

/// Reasons an inbound stream frame is dropped without touching run state.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("frame is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame has no string `type` field")]
    MissingType,
    #[error("unrecognized event type `{0}`")]
    UnknownType(String),
    #[error("malformed `{kind}` event: {source}")]
    Malformed {
        kind: String,
        source: serde_json::Error,
    },
}
