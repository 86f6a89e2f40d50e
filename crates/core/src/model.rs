use std::time::Duration;
use thiserror::Error;

/// Failure of one call to the hosted model.
///
/// Messages never carry the credential; transports redact it before an
/// error is constructed.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GenerationError {
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },
    #[error("provider returned status {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("operation failed after {attempts} attempts: {source}")]
    RetryExhausted {
        attempts: usize,
        #[source]
        source: Box<GenerationError>,
    },
}

impl GenerationError {
    pub fn missing_credential() -> Self {
        GenerationError::Auth(
            "no API key configured; set GROQ_API_KEY or add [groq] api_key to the secrets file"
                .to_string(),
        )
    }

    pub fn retry_exhausted(attempts: usize, source: GenerationError) -> Self {
        GenerationError::RetryExhausted {
            attempts,
            source: Box::new(source),
        }
    }

    /// Network failures and throttling may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            GenerationError::Network(_) | GenerationError::RateLimit { .. }
        )
    }

    /// The error that actually ended the call, looking through retry wrapping.
    pub fn root(&self) -> &GenerationError {
        match self {
            GenerationError::RetryExhausted { source, .. } => source.root(),
            other => other,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    pub model_id: &'a str,
    pub creativity: f32,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<&'a str>,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(prompt: &'a str, model_id: &'a str, creativity: f32) -> Self {
        Self {
            prompt,
            model_id,
            creativity,
            max_tokens: None,
            system_prompt: None,
        }
    }
}

pub trait LanguageModel: Send + Sync {
    fn generate(&self, request: &CompletionRequest<'_>) -> Result<String, GenerationError>;
}

impl<M: LanguageModel + ?Sized> LanguageModel for Box<M> {
    fn generate(&self, request: &CompletionRequest<'_>) -> Result<String, GenerationError> {
        (**self).generate(request)
    }
}

impl<M: LanguageModel + ?Sized> LanguageModel for &M {
    fn generate(&self, request: &CompletionRequest<'_>) -> Result<String, GenerationError> {
        (**self).generate(request)
    }
}
