use thiserror::Error;

/// Failure taxonomy for the retrieval core.
///
/// Only `InvalidConfig` is a hard failure surfaced to callers at
/// construction time. Backend failures are expected degradation: the
/// pipeline isolates them per retrieval method and returns partial results.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{backend} backend error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    pub fn backend(backend: &'static str, err: impl std::fmt::Display) -> Self {
        Error::Backend {
            backend,
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
