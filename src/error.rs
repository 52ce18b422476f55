use thiserror::Error;

/// Custom error type for emograph operations.
#[derive(Debug, Error)]
pub enum EmographError {
    /// A required classifier artifact is missing or unreadable.
    ///
    /// There is no degraded mode without the classifier, so this surfaces
    /// at load time as an unrecoverable startup failure.
    #[error("Artifact error: {0}")]
    Artifact(String),

    /// Tokenization or model forward pass failed.
    #[error("Inference error: {0}")]
    Inference(String),

    /// The emotion model is not loaded (noop service, or load was skipped).
    #[error("Model unavailable: {0}")]
    Unavailable(String),
}

impl From<candle_core::Error> for EmographError {
    fn from(err: candle_core::Error) -> Self {
        EmographError::Inference(err.to_string())
    }
}
