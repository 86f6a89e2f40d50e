use std::time::{Duration, Instant};
use thiserror::Error;

use crate::config::{Config, DEFAULT_SYSTEM_PROMPT};
use crate::export::{export, ExportError, ExportFormat};
use crate::history::HistoryStore;
use crate::logging::{LogLevel, LogRecord, LogSink};
use crate::model::{CompletionRequest, GenerationError, LanguageModel};
use crate::prompts::{PromptBuilder, PromptError, PromptRegistry};
use crate::request::{GenerationRequest, GenerationResult, RequestError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("invalid input: {0}")]
    InvalidInput(#[from] RequestError),
    #[error("failed to build prompt: {0}")]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error(transparent)]
    Export(#[from] ExportError),
    #[error("history entry #{0} does not exist")]
    UnknownEntry(usize),
}

impl SessionError {
    /// True when retrying later, without changing input or credentials, may help.
    pub fn is_transient(&self) -> bool {
        match self {
            SessionError::Generation(err) => err.root().is_transient(),
            _ => false,
        }
    }
}

/// Validates `request` and renders its prompt. A prompt that renders blank
/// is rejected as invalid input.
pub fn render_prompt(
    prompts: &PromptRegistry,
    request: &GenerationRequest,
) -> Result<String, SessionError> {
    request.validate()?;
    let prompt = PromptBuilder::new(prompts).build(request)?;
    if prompt.trim().is_empty() {
        return Err(RequestError::EmptyPrompt.into());
    }
    Ok(prompt)
}

/// Settings forwarded with every completion call.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationSettings {
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    pub idle_timeout: Option<Duration>,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            max_tokens: Some(2048),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
            idle_timeout: Some(Duration::from_secs(30 * 60)),
        }
    }
}

impl GenerationSettings {
    pub fn from_config(config: &Config) -> Self {
        let system_prompt = config.llm.system_prompt.trim();
        Self {
            max_tokens: (config.llm.max_tokens > 0).then_some(config.llm.max_tokens),
            system_prompt: (!system_prompt.is_empty()).then(|| system_prompt.to_string()),
            idle_timeout: config.session.idle_timeout(),
        }
    }
}

/// Everything one interactive user needs: the model handle, templates,
/// settings and the history of successful generations.
///
/// History only grows through [`Session::generate`], so every entry maps to
/// exactly one successful model call.
pub struct Session<'a, M> {
    model: M,
    prompts: &'a PromptRegistry,
    settings: GenerationSettings,
    history: HistoryStore,
    sink: &'a dyn LogSink,
    last_activity: Instant,
}

impl<'a, M: LanguageModel> Session<'a, M> {
    pub fn new(model: M, prompts: &'a PromptRegistry, sink: &'a dyn LogSink) -> Self {
        Self {
            model,
            prompts,
            settings: GenerationSettings::default(),
            history: HistoryStore::new(),
            sink,
            last_activity: Instant::now(),
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.touch();
        self.history.clear();
        self.sink.log(LogRecord::info("History cleared."));
    }

    /// Renders the prompt for `request` without contacting the model.
    pub fn preview_prompt(&self, request: &GenerationRequest) -> Result<String, SessionError> {
        render_prompt(self.prompts, request)
    }

    pub fn generate(
        &mut self,
        request: GenerationRequest,
    ) -> Result<&GenerationResult, SessionError> {
        self.touch();
        let prompt = self.preview_prompt(&request)?;

        self.sink.log(LogRecord::info(format!(
            "Generating {} with model {}…",
            request.content_type.label(),
            request.model_id
        )));

        let call = CompletionRequest {
            prompt: &prompt,
            model_id: &request.model_id,
            creativity: request.creativity,
            max_tokens: self.settings.max_tokens,
            system_prompt: self.settings.system_prompt.as_deref(),
        };

        let text = match self.model.generate(&call) {
            Ok(text) => text,
            Err(err) => {
                self.sink
                    .log(LogRecord::new(LogLevel::Error, format!("Generation failed: {err}")));
                return Err(err.into());
            }
        };

        let result = GenerationResult::new(request, text);
        self.sink.log(LogRecord::info(format!(
            "Generated {} characters; saved as history entry #{}.",
            result.text.chars().count(),
            self.history.len() + 1
        )));
        self.history.append(result);

        self.history
            .latest()
            .ok_or(SessionError::UnknownEntry(self.history.len()))
    }

    /// Runs the request stored at `index` again, appending a new entry.
    pub fn regenerate(&mut self, index: usize) -> Result<&GenerationResult, SessionError> {
        let request = self
            .history
            .get(index)
            .map(|result| result.request.clone())
            .ok_or(SessionError::UnknownEntry(index))?;
        self.generate(request)
    }

    pub fn export(&self, index: usize, format: ExportFormat) -> Result<Vec<u8>, SessionError> {
        let result = self
            .history
            .get(index)
            .ok_or(SessionError::UnknownEntry(index))?;
        Ok(export(result, format)?)
    }

    /// Records an interaction. History is cleared first when the previous
    /// interaction is older than the idle timeout.
    ///
    /// Call once per user command; reads such as listing or exporting count
    /// as activity too.
    pub fn expire_if_idle(&mut self) -> bool {
        self.expire_if_idle_at(Instant::now())
    }

    pub fn expire_if_idle_at(&mut self, now: Instant) -> bool {
        let idle = now.saturating_duration_since(self.last_activity);
        self.last_activity = self.last_activity.max(now);
        let Some(timeout) = self.settings.idle_timeout else {
            return false;
        };
        if idle <= timeout {
            return false;
        }

        let minutes = timeout.as_secs() / 60;
        self.history.clear();
        self.sink.log(LogRecord::warn(format!(
            "Session history was reset after {minutes} minutes of inactivity."
        )));
        true
    }

    fn touch(&mut self) {
        self.last_activity = Instant::now();
    }
}
