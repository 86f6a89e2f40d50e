use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::request::GenerationResult;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("unsupported export format `{0}` (expected one of: txt, md, html, json)")]
    UnsupportedFormat(String),
    #[error("failed to encode JSON export: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Txt,
    Md,
    Html,
    Json,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 4] = [
        ExportFormat::Txt,
        ExportFormat::Md,
        ExportFormat::Html,
        ExportFormat::Json,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Md => "md",
            Self::Html => "html",
            Self::Json => "json",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Txt => "text/plain",
            Self::Md => "text/markdown",
            Self::Html => "text/html",
            Self::Json => "application/json",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let normalized = input.trim().trim_start_matches('.').to_ascii_lowercase();
        match normalized.as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "md" | "markdown" => Ok(Self::Md),
            "html" | "htm" => Ok(Self::Html),
            "json" => Ok(Self::Json),
            _ => Err(ExportError::UnsupportedFormat(input.trim().to_string())),
        }
    }
}

/// Encodes one result for download. Plain text and Markdown carry the text
/// unchanged; JSON carries every result field; HTML escapes all embedded
/// strings.
pub fn export(result: &GenerationResult, format: ExportFormat) -> Result<Vec<u8>, ExportError> {
    match format {
        ExportFormat::Txt | ExportFormat::Md => Ok(result.text.clone().into_bytes()),
        ExportFormat::Json => Ok(serde_json::to_vec_pretty(result)?),
        ExportFormat::Html => Ok(render_html(result).into_bytes()),
    }
}

/// `content_YYYYmmdd_HHMMSS.<ext>`, stamped with the result's creation time.
pub fn export_file_name(result: &GenerationResult, format: ExportFormat) -> String {
    format!(
        "content_{}.{}",
        result.created_at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

fn render_html(result: &GenerationResult) -> String {
    let content_type = escape_html(result.request.content_type.label());
    let generated_at = escape_html(&result.display_time());
    let model = escape_html(&result.request.model_id);
    let body = escape_html(&result.text).replace('\n', "<br>\n");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="UTF-8">
    <title>Generated Content - {content_type}</title>
    <style>
        body {{ font-family: Arial, sans-serif; line-height: 1.6; max-width: 800px; margin: 0 auto; padding: 20px; }}
        h1, h2, h3 {{ color: #333; }}
        .metadata {{ color: #666; font-size: 0.9em; margin-bottom: 20px; }}
        .content {{ background-color: #f9f9f9; padding: 20px; border-radius: 5px; }}
    </style>
</head>
<body>
    <h1>Generated Content</h1>
    <div class="metadata">
        <p><strong>Content Type:</strong> {content_type}</p>
        <p><strong>Generation Time:</strong> {generated_at}</p>
        <p><strong>Model:</strong> {model}</p>
    </div>
    <div class="content">
{body}
    </div>
</body>
</html>
"#
    )
}

fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{ContentType, GenerationRequest};
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    fn sample(text: &str) -> GenerationResult {
        GenerationResult::at(
            GenerationRequest::new(ContentType::BlogPost, "AI")
                .with_model("modelA")
                .with_tone("casual")
                .with_target_length(200)
                .with_creativity(0.7),
            text,
            Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
        )
    }

    #[test]
    fn text_formats_are_raw() {
        let result = sample("Hello world\n# Title");
        assert_eq!(export(&result, ExportFormat::Txt).unwrap(), b"Hello world\n# Title");
        assert_eq!(export(&result, ExportFormat::Md).unwrap(), b"Hello world\n# Title");
    }

    #[test]
    fn json_has_exactly_the_result_fields() {
        let result = sample("Hello world");
        let bytes = export(&result, ExportFormat::Json).unwrap();

        let value: Value = serde_json::from_slice(&bytes).unwrap();
        let object = value.as_object().unwrap();
        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(keys, ["created_at", "request", "text"]);
        assert_eq!(object["text"], "Hello world");
        assert_eq!(object["request"]["content_type"], "blog_post");
        assert_eq!(object["request"]["model_id"], "modelA");
        assert_eq!(object["request"]["target_length"], 200);

        let decoded: GenerationResult = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, result);
    }

    #[test]
    fn html_escapes_markup_in_text() {
        let result = sample("<script>alert('x')</script> & <b>bold</b>");
        let html = String::from_utf8(export(&result, ExportFormat::Html).unwrap()).unwrap();

        assert!(!html.contains("<script>"));
        assert!(!html.contains("<b>"));
        assert!(html.contains("&lt;script&gt;alert(&#39;x&#39;)&lt;/script&gt; &amp; &lt;b&gt;bold&lt;/b&gt;"));
    }

    #[test]
    fn html_escapes_metadata_and_breaks_lines() {
        let mut result = sample("line one\nline two");
        result.request.model_id = "<model>".into();
        let html = String::from_utf8(export(&result, ExportFormat::Html).unwrap()).unwrap();

        assert!(html.contains("<strong>Model:</strong> &lt;model&gt;"));
        assert!(html.contains("line one<br>\nline two"));
        assert!(html.contains("<strong>Generation Time:</strong> 2024-03-09 14:05:07 UTC"));
        assert!(html.contains("<title>Generated Content - Blog Post</title>"));
    }

    #[test]
    fn parses_formats() {
        assert_eq!("TXT".parse::<ExportFormat>().unwrap(), ExportFormat::Txt);
        assert_eq!(".md".parse::<ExportFormat>().unwrap(), ExportFormat::Md);
        assert_eq!("markdown".parse::<ExportFormat>().unwrap(), ExportFormat::Md);
        assert_eq!("html".parse::<ExportFormat>().unwrap(), ExportFormat::Html);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);

        let err = "pdf".parse::<ExportFormat>().unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedFormat(name) if name == "pdf"));
    }

    #[test]
    fn file_name_uses_creation_time() {
        let result = sample("x");
        assert_eq!(
            export_file_name(&result, ExportFormat::Html),
            "content_20240309_140507.html"
        );
        for format in ExportFormat::ALL {
            assert!(export_file_name(&result, format).ends_with(format.extension()));
        }
    }
}
