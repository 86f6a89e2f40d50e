use std::time::Duration;

use log::{debug, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::blocking::{Client, Response};
use reqwest::header::{self, HeaderValue};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use content_core::{
    CompletionRequest, Config, Credential, GenerationError, LanguageModel, DEFAULT_BASE_URL,
};

use crate::base_url::{chat_completions_url, normalize_base_url};
use crate::error::AdapterError;
use crate::retry::{call_with_retry, RetryConfig};

pub fn create_language_model(
    config: &Config,
    credential: Option<Credential>,
) -> Result<ChatCompletionsClient, AdapterError> {
    ChatCompletionsClient::from_config(config, credential)
}

/// Blocking client for an OpenAI-compatible `/chat/completions` endpoint
/// (Groq by default).
///
/// A missing credential fails every call with [`GenerationError::Auth`]
/// before any connection is opened.
pub struct ChatCompletionsClient {
    client: Client,
    url: String,
    credential: Option<Credential>,
    retry: RetryConfig,
}

impl ChatCompletionsClient {
    pub fn new(
        base_url: &str,
        credential: Option<Credential>,
        timeout: Duration,
    ) -> Result<Self, AdapterError> {
        let base_url = normalize_base_url(base_url, DEFAULT_BASE_URL);
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(AdapterError::InvalidConfig(format!(
                "base_url must start with http:// or https://, got `{base_url}`"
            )));
        }

        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: chat_completions_url(&base_url),
            credential,
            retry: RetryConfig::default(),
        })
    }

    pub fn from_config(
        config: &Config,
        credential: Option<Credential>,
    ) -> Result<Self, AdapterError> {
        Ok(Self::new(&config.llm.base_url, credential, config.llm.timeout())?
            .with_retry(RetryConfig::from(&config.retry)))
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    fn invoke_once(
        &self,
        credential: &Credential,
        request: &CompletionRequest<'_>,
    ) -> Result<String, GenerationError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = request.system_prompt.filter(|s| !s.trim().is_empty()) {
            messages.push(ChatMessageRequest {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessageRequest {
            role: "user",
            content: request.prompt,
        });

        let body = ChatCompletionRequest {
            model: request.model_id,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.creativity,
        };

        let mut authorization = HeaderValue::from_str(&format!("Bearer {}", credential.expose()))
            .map_err(|_| {
                GenerationError::Auth(
                    "API key contains characters that are not valid in an HTTP header".to_string(),
                )
            })?;
        authorization.set_sensitive(true);

        debug!(
            "POST {} model={} temperature={} max_tokens={:?}",
            self.url, request.model_id, request.creativity, request.max_tokens
        );

        let response = self
            .client
            .post(&self.url)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .header(header::AUTHORIZATION, authorization)
            .json(&body)
            .send()
            .map_err(|err| transport_error(&err, credential))?;

        handle_chat_response(response, credential)
    }
}

impl LanguageModel for ChatCompletionsClient {
    fn generate(&self, request: &CompletionRequest<'_>) -> Result<String, GenerationError> {
        let credential = self
            .credential
            .as_ref()
            .ok_or_else(GenerationError::missing_credential)?;
        call_with_retry(|| self.invoke_once(credential, request), &self.retry)
    }
}

fn transport_error(err: &reqwest::Error, credential: &Credential) -> GenerationError {
    let kind = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "could not connect to the provider"
    } else {
        "request failed"
    };
    GenerationError::Network(credential.redact(&format!("{kind}: {err}")))
}

fn handle_chat_response(
    response: Response,
    credential: &Credential,
) -> Result<String, GenerationError> {
    let status = response.status();
    let retry_after = response
        .headers()
        .get(header::RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_retry_after_header);
    let body = response
        .text()
        .map_err(|err| transport_error(&err, credential))?;
    let body = credential.redact(&body);

    if !status.is_success() {
        return Err(classify_failure(status, retry_after, body));
    }

    let parsed: ChatCompletionResponse =
        serde_json::from_str(&body).map_err(|err| GenerationError::Upstream {
            status: status.as_u16(),
            body: format!("invalid response body: {err}"),
        })?;
    extract_choice_content(parsed).ok_or_else(|| GenerationError::Upstream {
        status: status.as_u16(),
        body: "response contained no message content".to_string(),
    })
}

fn classify_failure(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: String,
) -> GenerationError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::Auth(format!(
            "provider rejected the API key ({}): {}",
            status.as_u16(),
            provider_message(&body)
        )),
        StatusCode::TOO_MANY_REQUESTS => {
            let retry_after = retry_after.or_else(|| parse_retry_hint(&body));
            warn!("rate limited by provider; retry after {:?}", retry_after);
            GenerationError::RateLimit {
                message: provider_message(&body),
                retry_after,
            }
        }
        _ => GenerationError::Upstream {
            status: status.as_u16(),
            body,
        },
    }
}

/// `error.message` from a provider error payload, or the raw body.
fn provider_message(body: &str) -> String {
    serde_json::from_str::<ProviderErrorBody>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .and_then(|error| error.message)
        .filter(|message| !message.trim().is_empty())
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "no details provided".to_string()
            } else {
                trimmed.to_string()
            }
        })
}

fn parse_retry_after_header(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Reads hints such as "Please try again in 7.66s" from an error body.
fn parse_retry_hint(body: &str) -> Option<Duration> {
    static RETRY_RE: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"(?i)try again in (\d+(?:\.\d+)?)\s*(ms|s)")
            .expect("valid regex for retry hints")
    });

    let caps = RETRY_RE.captures(body)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let seconds = match caps.get(2)?.as_str().to_ascii_lowercase().as_str() {
        "ms" => value / 1000.0,
        _ => value,
    };
    Duration::try_from_secs_f64(seconds).ok()
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessageRequest<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessageRequest<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    error: Option<ProviderError>,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: Option<String>,
}

fn extract_choice_content(response: ChatCompletionResponse) -> Option<String> {
    response
        .choices
        .into_iter()
        .filter_map(|choice| choice.message.and_then(|message| message.content))
        .find(|content| !content.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_auth() {
        let err = classify_failure(
            StatusCode::UNAUTHORIZED,
            None,
            r#"{"error":{"message":"Invalid API Key","type":"invalid_request_error"}}"#.into(),
        );
        assert_eq!(
            err,
            GenerationError::Auth("provider rejected the API key (401): Invalid API Key".into())
        );
    }

    #[test]
    fn too_many_requests_maps_to_rate_limit() {
        let err = classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            None,
            r#"{"error":{"message":"Rate limit reached. Please try again in 2.5s."}}"#.into(),
        );
        match err {
            GenerationError::RateLimit {
                message,
                retry_after,
            } => {
                assert!(message.starts_with("Rate limit reached"));
                assert_eq!(retry_after, Some(Duration::from_millis(2500)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn header_hint_wins_over_body() {
        let err = classify_failure(
            StatusCode::TOO_MANY_REQUESTS,
            Some(Duration::from_secs(4)),
            "try again in 9s".into(),
        );
        assert!(matches!(
            err,
            GenerationError::RateLimit { retry_after: Some(d), .. } if d == Duration::from_secs(4)
        ));
    }

    #[test]
    fn other_statuses_are_upstream_verbatim() {
        let err = classify_failure(StatusCode::BAD_GATEWAY, None, "<html>bad gateway</html>".into());
        assert_eq!(
            err,
            GenerationError::Upstream {
                status: 502,
                body: "<html>bad gateway</html>".into()
            }
        );
    }

    #[test]
    fn retry_hints() {
        assert_eq!(parse_retry_after_header(" 12 "), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after_header("Wed, 21 Oct 2015 07:28:00 GMT"), None);
        assert_eq!(
            parse_retry_hint("Please try again in 450ms"),
            Some(Duration::from_millis(450))
        );
        assert_eq!(parse_retry_hint("no hint"), None);
    }

    #[test]
    fn extracts_first_non_empty_choice() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"content":"  "}},{"message":{"content":"Hello"}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_choice_content(parsed).as_deref(), Some("Hello"));

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert_eq!(extract_choice_content(empty), None);
    }

    #[test]
    fn request_body_shape() {
        let body = ChatCompletionRequest {
            model: "modelA",
            messages: vec![
                ChatMessageRequest {
                    role: "system",
                    content: "sys",
                },
                ChatMessageRequest {
                    role: "user",
                    content: "hi",
                },
            ],
            max_tokens: None,
            temperature: 0.5,
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["model"], "modelA");
        assert_eq!(value["temperature"], 0.5);
        assert_eq!(value["messages"][1]["role"], "user");
        assert!(value.get("max_tokens").is_none());
    }

    #[test]
    fn rejects_non_http_base_url() {
        let err = ChatCompletionsClient::new("ftp://example.com#", None, Duration::from_secs(1))
            .err()
            .expect("invalid scheme");
        assert!(matches!(err, AdapterError::InvalidConfig(_)));
    }
}
