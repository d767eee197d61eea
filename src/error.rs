//! Error type shared across the analysis pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HighlightError {
    /// The analysis backend rejected the request or sent an unusable reply.
    #[error("backend error: {0}")]
    Backend(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
