use thiserror::Error;

/// Failure taxonomy for the estimation pipeline.
///
/// Configuration problems surface before a run's loop starts; decomposition
/// problems abort the current run only and carry the frame offset at which
/// the estimator failed.
#[derive(Debug, Error)]
pub enum DoaError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("decomposition failed at frame offset {frame}: {reason}")]
    Decomposition { frame: usize, reason: String },
}

impl DoaError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn decomposition(frame: usize, reason: impl Into<String>) -> Self {
        Self::Decomposition {
            frame,
            reason: reason.into(),
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
