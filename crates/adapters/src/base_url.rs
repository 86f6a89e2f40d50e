use once_cell::sync::Lazy;
use regex::Regex;

static VERSION_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"/v\d+(beta\d*)?$").unwrap());

/// Normalises an OpenAI-compatible base URL.
///
/// Blank input falls back to `default`. A trailing `#` keeps the URL exactly
/// as written (minus the `#`); otherwise a missing `/v1` suffix is appended.
pub fn normalize_base_url(input: &str, default: &str) -> String {
    let trimmed = input.trim();
    let raw = if trimmed.is_empty() { default.trim() } else { trimmed };
    if raw.is_empty() {
        return String::new();
    }

    if let Some(verbatim) = raw.strip_suffix('#') {
        return verbatim.trim_end_matches('/').to_string();
    }

    let without_slash = raw.trim_end_matches('/');
    if VERSION_SUFFIX_RE.is_match(without_slash) || without_slash.contains("/v1/") {
        without_slash.to_string()
    } else {
        format!("{without_slash}/v1")
    }
}

pub fn chat_completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}
