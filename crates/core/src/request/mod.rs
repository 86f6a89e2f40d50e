use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod options;

pub use options::{CampaignType, ContentOptions, DocType, Platform, TechnicalLevel};

/// Model identifiers offered by the hosted provider at the time of writing.
/// Any other identifier is still accepted and forwarded as-is.
pub const KNOWN_MODELS: &[&str] = &["llama3-70b-8192", "mixtral-8x7b-32768", "gemma-7b-it"];

pub const DEFAULT_MODEL: &str = "llama3-70b-8192";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RequestError {
    #[error("unknown content type `{0}` (expected one of: {list})", list = ContentType::names().join(", "))]
    UnknownContentType(String),
    #[error("creativity must be between 0.0 and 1.0, got {0}")]
    CreativityOutOfRange(f32),
    #[error("target length must be greater than zero")]
    ZeroLength,
    #[error("model identifier must not be empty")]
    EmptyModel,
    #[error("topic must not be empty")]
    EmptyTopic,
    #[error("the rendered prompt is empty")]
    EmptyPrompt,
    #[error("unknown {field} `{value}` (expected one of: {expected})")]
    UnknownOption {
        field: &'static str,
        value: String,
        expected: String,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    BlogPost,
    SocialMedia,
    ProductDescription,
    MarketingCopy,
    TechnicalDoc,
    Other,
}

impl ContentType {
    pub const ALL: [ContentType; 6] = [
        ContentType::BlogPost,
        ContentType::SocialMedia,
        ContentType::ProductDescription,
        ContentType::MarketingCopy,
        ContentType::TechnicalDoc,
        ContentType::Other,
    ];

    /// Stable identifier; also the prompt template key.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BlogPost => "blog_post",
            Self::SocialMedia => "social_media",
            Self::ProductDescription => "product_description",
            Self::MarketingCopy => "marketing_copy",
            Self::TechnicalDoc => "technical_doc",
            Self::Other => "other",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::BlogPost => "Blog Post",
            Self::SocialMedia => "Social Media Post",
            Self::ProductDescription => "Product Description",
            Self::MarketingCopy => "Marketing Copy",
            Self::TechnicalDoc => "Technical Documentation",
            Self::Other => "Custom Prompt",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(|kind| kind.name()).collect()
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ContentType {
    type Err = RequestError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let normalized = trimmed.to_ascii_lowercase().replace([' ', '-'], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|kind| {
                kind.name() == normalized || kind.label().eq_ignore_ascii_case(trimmed)
            })
            .ok_or_else(|| RequestError::UnknownContentType(trimmed.to_string()))
    }
}

/// Parameters of one generation, as submitted by the user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub content_type: ContentType,
    pub model_id: String,
    pub tone: String,
    pub target_length: u32,
    pub creativity: f32,
    pub topic: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
    #[serde(default)]
    pub options: ContentOptions,
}

impl GenerationRequest {
    pub fn new(content_type: ContentType, topic: impl Into<String>) -> Self {
        Self {
            content_type,
            model_id: DEFAULT_MODEL.to_string(),
            tone: "informative".to_string(),
            target_length: 800,
            creativity: 0.7,
            topic: topic.into(),
            audience: None,
            instructions: None,
            options: ContentOptions::default(),
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_tone(mut self, tone: impl Into<String>) -> Self {
        self.tone = tone.into();
        self
    }

    pub fn with_target_length(mut self, target_length: u32) -> Self {
        self.target_length = target_length;
        self
    }

    pub fn with_creativity(mut self, creativity: f32) -> Self {
        self.creativity = creativity;
        self
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    pub fn with_options(mut self, options: ContentOptions) -> Self {
        self.options = options;
        self
    }

    pub fn validate(&self) -> Result<(), RequestError> {
        if !self.creativity.is_finite() || !(0.0..=1.0).contains(&self.creativity) {
            return Err(RequestError::CreativityOutOfRange(self.creativity));
        }
        if self.target_length == 0 {
            return Err(RequestError::ZeroLength);
        }
        if self.model_id.trim().is_empty() {
            return Err(RequestError::EmptyModel);
        }
        if self.topic.trim().is_empty() {
            return Err(RequestError::EmptyTopic);
        }
        Ok(())
    }
}

/// Output of one successful generation. Never mutated after creation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    pub request: GenerationRequest,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

impl GenerationResult {
    pub fn new(request: GenerationRequest, text: impl Into<String>) -> Self {
        Self::at(request, text, Utc::now())
    }

    pub fn at(request: GenerationRequest, text: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            request,
            text: text.into(),
            created_at,
        }
    }

    /// Creation time as shown to users; always UTC, and labelled as such.
    pub fn display_time(&self) -> String {
        self.created_at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
    }
}
