//! Error types for the filter stage.
//!
//! Only construction-time problems surface as errors. Everything that happens
//! while events flow (missing raw field, short lines, unknown operators) folds
//! into accept/reject decisions instead.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilterError>;

#[derive(Debug, Error)]
pub enum FilterError {
    /// A downstream endpoint could not be built for a consumer.
    #[error("Construction of consumer '{consumer_id}' failed: {source}")]
    Construction {
        consumer_id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Invalid filter config: {0}")]
    InvalidConfig(String),
    #[error("Invalid regex pattern: {0}")]
    InvalidRegex(String),
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Dispatch loops are spawned onto the ambient tokio runtime.
    #[error("No tokio runtime available to spawn dispatch loop for filter '{0}'")]
    RuntimeUnavailable(String),
}

impl FilterError {
    /// Wrap an external endpoint-construction failure.
    pub fn construction(consumer_id: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        FilterError::Construction {
            consumer_id: consumer_id.into(),
            source: source.into(),
        }
    }

    /// Whether the error came from the downstream side rather than from our config.
    pub fn is_construction(&self) -> bool {
        matches!(self, FilterError::Construction { .. })
    }
}
