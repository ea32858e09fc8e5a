use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum GargoteError {
    #[error("Template error: {0}")]
    Template(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Definition error: {0}")]
    Definition(String),
}

impl From<reqwest::Error> for GargoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GargoteError::Transport(format!("request timed out: {err}"))
        } else {
            GargoteError::Transport(err.to_string())
        }
    }
}

impl GargoteError {
    /// The failure class recorded for an action attempt, or `None` for errors
    /// that never come out of an action.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            GargoteError::Template(_) => Some(FailureKind::Template),
            GargoteError::Transport(_) => Some(FailureKind::Transport),
            GargoteError::ValidationFailed(_) => Some(FailureKind::Validation),
            GargoteError::CaptureFailed(_) => Some(FailureKind::Capture),
            _ => None,
        }
    }
}

impl Serialize for GargoteError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

/// Why an action attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The query could not be prepared; no request was sent.
    Template,
    /// Connection, timeout or body read failure.
    Transport,
    /// The response did not satisfy the validation rules.
    Validation,
    /// The response was valid but a capture could not be applied.
    Capture,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FailureKind::Template => "template",
            FailureKind::Transport => "transport",
            FailureKind::Validation => "validation",
            FailureKind::Capture => "capture",
        };
        write!(f, "{s}")
    }
}
