use thiserror::Error;

/// Failures while constructing an adapter. Call-time failures are
/// [`content_core::GenerationError`]s.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to build http client: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid adapter configuration: {0}")]
    InvalidConfig(String),
}
