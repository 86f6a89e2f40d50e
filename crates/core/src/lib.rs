pub mod config;
pub mod export;
pub mod history;
pub mod logging;
pub mod model;
pub mod prompts;
pub mod request;
pub mod session;

pub use config::{
    resolve_credential_with, Config, ConfigError, ConfigStore, Credential, CredentialSource,
    LlmConfig, PromptConfig, RetrySettings, SessionConfig, API_KEY_ENV, DEFAULT_BASE_URL,
    DEFAULT_CONFIG_FILE, DEFAULT_SECRETS_FILE, DEFAULT_SYSTEM_PROMPT,
};
pub use export::{export, export_file_name, ExportError, ExportFormat};
pub use history::HistoryStore;
pub use logging::{
    LogLevel, LogRecord, LogSink, NullLogSink, StderrLogSink, VecLogSink,
};
pub use model::{CompletionRequest, GenerationError, LanguageModel};
pub use prompts::{
    build_prompt, PromptArguments, PromptBuilder, PromptError, PromptMetadata, PromptRegistry,
    PromptSource, PromptTemplate,
};
pub use request::{
    CampaignType, ContentOptions, ContentType, DocType, GenerationRequest, GenerationResult,
    Platform, RequestError, TechnicalLevel, DEFAULT_MODEL, KNOWN_MODELS,
};
pub use session::{render_prompt, GenerationSettings, Session, SessionError};
