//! Error types shared across Lapse crates.

/// Top-level error type for Lapse operations.
#[derive(Debug, thiserror::Error)]
pub enum LapseError {
    #[error("Catalog error: {message}")]
    Catalog { message: String },

    #[error("Sampling error: {message}")]
    Sampling { message: String },

    #[error("History error: {message}")]
    History { message: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Result type alias using LapseError.
pub type LapseResult<T> = Result<T, LapseError>;

impl LapseError {
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog {
            message: msg.into(),
        }
    }

    pub fn sampling(msg: impl Into<String>) -> Self {
        Self::Sampling {
            message: msg.into(),
        }
    }

    pub fn history(msg: impl Into<String>) -> Self {
        Self::History {
            message: msg.into(),
        }
    }
}
