use once_cell::sync::Lazy;

use crate::request::{ContentType, GenerationRequest};

use super::{PromptArguments, PromptError, PromptRegistry};

static BUILT_IN_REGISTRY: Lazy<PromptRegistry> =
    Lazy::new(|| PromptRegistry::new().expect("built-in prompt definitions are valid"));

/// Renders a request with the built-in templates.
pub fn build_prompt(request: &GenerationRequest) -> Result<String, PromptError> {
    PromptBuilder::new(&BUILT_IN_REGISTRY).build(request)
}

/// Turns a [`GenerationRequest`] into the instruction text sent to the model.
///
/// The template is chosen by content type. Tone is lower-cased, and free text
/// fields are trimmed, so equal requests always produce the same prompt.
/// Per-type options become `*_clause` arguments that start with their own
/// line break and are empty when the option is off, so templates can place
/// them without leaving blank lines behind.
pub struct PromptBuilder<'a> {
    registry: &'a PromptRegistry,
}

impl<'a> PromptBuilder<'a> {
    pub fn new(registry: &'a PromptRegistry) -> Self {
        Self { registry }
    }

    pub fn build(&self, request: &GenerationRequest) -> Result<String, PromptError> {
        let mut prompt = self
            .registry
            .format(request.content_type.name(), &prompt_arguments(request))?;

        if let Some(instructions) = non_blank(request.instructions.as_deref()) {
            prompt.push_str("\n\nAdditional instructions: ");
            prompt.push_str(instructions);
        }

        Ok(prompt)
    }
}

fn prompt_arguments(request: &GenerationRequest) -> PromptArguments {
    let options = &request.options;
    let audience_clause = non_blank(request.audience.as_deref())
        .map(|audience| format!(", targeting {audience}"))
        .unwrap_or_default();

    let mut target_length = request.target_length;
    if request.content_type == ContentType::SocialMedia {
        if let Some(platform) = options.platform {
            target_length = target_length.min(platform.char_limit());
        }
    }

    let platform = options
        .platform
        .map_or("social media", |platform| platform.label());
    let platform_clause = options
        .platform
        .map(|platform| {
            format!(
                "\n\nThe tone should match {}'s typical successful posts and resonate with the platform's audience.",
                platform.label()
            )
        })
        .unwrap_or_default();
    let cta_clause = match non_blank(options.call_to_action.as_deref()) {
        _ if !options.include_call_to_action => String::new(),
        Some(action) => format!("\nInclude a clear call to action to {action}."),
        None => "\nInclude a clear call to action.".to_string(),
    };

    let campaign = options
        .campaign
        .map(|campaign| format!("{} marketing copy", campaign.label().to_lowercase()))
        .unwrap_or_else(|| "marketing copy".to_string());
    let selling_point_clause = non_blank(options.selling_point.as_deref())
        .map(|point| format!("\nUnique selling point: {point}"))
        .unwrap_or_default();

    let doc_type = options
        .doc_type
        .map_or("technical documentation", |doc_type| doc_type.label());
    let level_clause = options
        .technical_level
        .map(|level| format!(", aimed at {}-level users", level.name()))
        .unwrap_or_default();

    PromptArguments::from([
        ("topic".to_string(), request.topic.trim().to_string()),
        ("tone".to_string(), request.tone.trim().to_lowercase()),
        ("target_length".to_string(), target_length.to_string()),
        ("audience_clause".to_string(), audience_clause),
        ("platform".to_string(), platform.to_string()),
        ("platform_clause".to_string(), platform_clause),
        (
            "hashtags_clause".to_string(),
            flag_clause(options.include_hashtags, "Include relevant hashtags."),
        ),
        ("cta_clause".to_string(), cta_clause),
        (
            "headers_clause".to_string(),
            flag_clause(
                options.include_headers,
                "Include section headers to organize the content.",
            ),
        ),
        (
            "conclusion_clause".to_string(),
            flag_clause(
                options.include_conclusion,
                "Include a conclusion section at the end.",
            ),
        ),
        (
            "features_clause".to_string(),
            list_clause("Key features to highlight:", &options.key_features),
        ),
        ("campaign".to_string(), campaign),
        ("selling_point_clause".to_string(), selling_point_clause),
        ("doc_type".to_string(), doc_type.to_string()),
        ("level_clause".to_string(), level_clause),
        (
            "sections_clause".to_string(),
            list_clause("Include the following sections:", &options.key_sections),
        ),
    ])
}

/// A sentence on its own line, or nothing when the option is off.
fn flag_clause(enabled: bool, sentence: &str) -> String {
    if enabled {
        format!("\n{sentence}")
    } else {
        String::new()
    }
}

/// A heading followed by one bullet per non-blank item; nothing for an empty list.
fn list_clause(heading: &str, items: &[String]) -> String {
    let bullets: Vec<_> = items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .map(|item| format!("\n- {item}"))
        .collect();
    if bullets.is_empty() {
        String::new()
    } else {
        format!("\n{heading}{}", bullets.concat())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{CampaignType, ContentOptions, DocType, Platform, TechnicalLevel};

    fn blog_request() -> GenerationRequest {
        GenerationRequest::new(ContentType::BlogPost, "AI trends")
            .with_model("modelA")
            .with_tone("Casual")
            .with_target_length(200)
            .with_creativity(0.7)
    }

    #[test]
    fn embeds_tone_length_and_topic() {
        let prompt = build_prompt(&blog_request()).unwrap();
        assert!(prompt.starts_with("Write a casual blog post about AI trends."));
        assert!(prompt.contains("approximately 200 words"));
    }

    #[test]
    fn is_deterministic() {
        for kind in ContentType::ALL {
            let request = GenerationRequest::new(kind, "  wireless earbuds ")
                .with_tone("Professional")
                .with_target_length(350)
                .with_audience("commuters")
                .with_instructions("mention battery life");
            let first = build_prompt(&request).unwrap();
            let second = build_prompt(&request.clone()).unwrap();
            assert_eq!(first, second, "{kind}");
            assert!(first.contains("wireless earbuds"), "{kind}");
            assert!(!first.contains("  wireless"), "{kind}");
        }
    }

    #[test]
    fn audience_and_instructions_are_optional() {
        let plain = build_prompt(&blog_request()).unwrap();
        assert!(!plain.contains("targeting"));
        assert!(!plain.contains("Additional instructions"));

        let detailed = build_prompt(
            &blog_request()
                .with_audience("tech professionals")
                .with_instructions("cite two sources"),
        )
        .unwrap();
        assert!(detailed.contains("about AI trends, targeting tech professionals."));
        assert!(detailed.ends_with("\n\nAdditional instructions: cite two sources"));
    }

    #[test]
    fn blank_instructions_are_skipped() {
        let prompt = build_prompt(&blog_request().with_instructions("   ")).unwrap();
        assert!(!prompt.contains("Additional instructions"));
    }

    #[test]
    fn social_media_uses_character_budget() {
        let request = GenerationRequest::new(ContentType::SocialMedia, "product launch")
            .with_target_length(280);
        let prompt = build_prompt(&request).unwrap();
        assert!(prompt.contains("under 280 characters"));
    }

    #[test]
    fn blog_sections_can_be_switched_off() {
        let full = build_prompt(&blog_request()).unwrap();
        assert!(full.contains("words.\nInclude section headers to organize the content."));
        assert!(full.contains("\nInclude a conclusion section at the end.\nMake it engaging"));

        let bare = build_prompt(&blog_request().with_options(ContentOptions {
            include_headers: false,
            include_conclusion: false,
            ..ContentOptions::default()
        }))
        .unwrap();
        assert!(!bare.contains("section headers"));
        assert!(!bare.contains("conclusion"));
        assert!(bare.contains("approximately 200 words.\nMake it engaging"));
    }

    #[test]
    fn social_media_platform_hashtags_and_call_to_action() {
        let request = GenerationRequest::new(ContentType::SocialMedia, "product launch")
            .with_target_length(1000)
            .with_options(ContentOptions {
                platform: Some(Platform::Twitter),
                call_to_action: Some("sign up".into()),
                ..ContentOptions::default()
            });
        let prompt = build_prompt(&request).unwrap();
        assert!(prompt.starts_with("Create a compelling Twitter/X post about product launch."));
        assert!(prompt.contains("under 280 characters"));
        assert!(prompt.contains("\nInclude relevant hashtags."));
        assert!(prompt.contains("\nInclude a clear call to action to sign up."));
        assert!(prompt.ends_with(
            "The tone should match Twitter/X's typical successful posts and resonate with the platform's audience."
        ));

        let quiet = build_prompt(&request.with_options(ContentOptions {
            platform: Some(Platform::LinkedIn),
            include_hashtags: false,
            include_call_to_action: false,
            ..ContentOptions::default()
        }))
        .unwrap();
        assert!(quiet.contains("under 1000 characters"));
        assert!(!quiet.contains("hashtags"));
        assert!(!quiet.contains("call to action"));
    }

    #[test]
    fn product_features_are_listed() {
        let request = GenerationRequest::new(ContentType::ProductDescription, "Wireless Earbuds")
            .with_options(ContentOptions {
                key_features: vec![" noise cancelling ".into(), "".into(), "24h battery".into()],
                ..ContentOptions::default()
            });
        let prompt = build_prompt(&request).unwrap();
        assert!(prompt.contains(
            "Wireless Earbuds.\nKey features to highlight:\n- noise cancelling\n- 24h battery\n"
        ));

        let plain =
            build_prompt(&GenerationRequest::new(ContentType::ProductDescription, "Earbuds")).unwrap();
        assert!(!plain.contains("Key features"));
    }

    #[test]
    fn marketing_campaign_and_selling_point() {
        let request = GenerationRequest::new(ContentType::MarketingCopy, "Fitness App")
            .with_options(ContentOptions {
                campaign: Some(CampaignType::LandingPage),
                selling_point: Some("AI-powered workouts".into()),
                ..ContentOptions::default()
            });
        let prompt = build_prompt(&request).unwrap();
        assert!(prompt.starts_with("Create landing page marketing copy for Fitness App."));
        assert!(prompt.contains("\nUnique selling point: AI-powered workouts\n"));

        let plain = build_prompt(&GenerationRequest::new(ContentType::MarketingCopy, "App")).unwrap();
        assert!(plain.starts_with("Create marketing copy for App."));
        assert!(!plain.contains("Unique selling point"));
    }

    #[test]
    fn technical_doc_type_level_and_sections() {
        let request = GenerationRequest::new(ContentType::TechnicalDoc, "Cloud Database Service")
            .with_audience("operators")
            .with_options(ContentOptions {
                doc_type: Some(DocType::UserGuide),
                technical_level: Some(TechnicalLevel::Beginner),
                key_sections: vec!["Installation".into(), "Troubleshooting".into()],
                ..ContentOptions::default()
            });
        let prompt = build_prompt(&request).unwrap();
        assert!(prompt.starts_with(
            "Create User Guide for Cloud Database Service, aimed at beginner-level users, targeting operators."
        ));
        assert!(prompt.contains(
            "\nInclude the following sections:\n- Installation\n- Troubleshooting\n"
        ));

        let plain = build_prompt(&GenerationRequest::new(ContentType::TechnicalDoc, "DB")).unwrap();
        assert!(plain.starts_with("Create technical documentation for DB."));
        assert!(!plain.contains("sections:"));
    }

    #[test]
    fn options_for_other_types_are_ignored() {
        let options = ContentOptions {
            platform: Some(Platform::Instagram),
            key_features: vec!["waterproof".into()],
            doc_type: Some(DocType::Tutorial),
            ..ContentOptions::default()
        };
        let prompt = build_prompt(&blog_request().with_options(options)).unwrap();
        assert_eq!(prompt, build_prompt(&blog_request()).unwrap());
    }

    #[test]
    fn custom_prompt_passes_topic_through() {
        let request = GenerationRequest::new(ContentType::Other, "List five Rust crates for CLIs.")
            .with_tone("neutral")
            .with_target_length(120);
        let prompt = build_prompt(&request).unwrap();
        assert!(prompt.starts_with("List five Rust crates for CLIs.\n\n"));
        assert!(prompt.contains("neutral tone"));
    }
}
