mod base_url;
mod error;
mod llm;
mod retry;

pub use base_url::{chat_completions_url, normalize_base_url};
pub use error::AdapterError;
pub use llm::{create_language_model, ChatCompletionsClient};
pub use retry::{call_with_retry, call_with_retry_using, RetryConfig};

pub use content_core::{CompletionRequest, GenerationError, LanguageModel};
pub use content_core::config::{Config, Credential, LlmConfig, RetrySettings};
