use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::RequestError;

/// Fixed-choice option parsed from either its identifier or its label.
trait Choice: Copy + 'static {
    const FIELD: &'static str;
    const ALL: &'static [Self];

    fn name(&self) -> &'static str;
    fn label(&self) -> &'static str;

    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }
}

fn parse_choice<T: Choice>(input: &str) -> Result<T, RequestError> {
    let trimmed = input.trim();
    let normalized = trimmed.to_ascii_lowercase().replace([' ', '-', '/'], "_");
    T::ALL
        .iter()
        .copied()
        .find(|choice| {
            choice.name() == normalized
                || choice.label().eq_ignore_ascii_case(trimmed)
                || choice.aliases().contains(&normalized.as_str())
        })
        .ok_or_else(|| RequestError::UnknownOption {
            field: T::FIELD,
            value: trimmed.to_string(),
            expected: T::ALL
                .iter()
                .map(|choice| choice.name())
                .collect::<Vec<_>>()
                .join(", "),
        })
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    LinkedIn,
    Twitter,
    Instagram,
    Facebook,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::LinkedIn,
        Platform::Twitter,
        Platform::Instagram,
        Platform::Facebook,
    ];

    pub fn name(&self) -> &'static str {
        Choice::name(self)
    }

    pub fn label(&self) -> &'static str {
        Choice::label(self)
    }

    /// Longest post the network accepts, in characters.
    pub fn char_limit(&self) -> u32 {
        match self {
            Self::LinkedIn => 3000,
            Self::Twitter => 280,
            Self::Instagram => 2200,
            Self::Facebook => 5000,
        }
    }
}

impl Choice for Platform {
    const FIELD: &'static str = "platform";
    const ALL: &'static [Self] = &Platform::ALL;

    fn name(&self) -> &'static str {
        match self {
            Self::LinkedIn => "linkedin",
            Self::Twitter => "twitter",
            Self::Instagram => "instagram",
            Self::Facebook => "facebook",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::LinkedIn => "LinkedIn",
            Self::Twitter => "Twitter/X",
            Self::Instagram => "Instagram",
            Self::Facebook => "Facebook",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::Twitter => &["x", "twitter_x"],
            _ => &[],
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignType {
    AdCopy,
    LandingPage,
    Brochure,
    SalesEmail,
}

impl CampaignType {
    pub const ALL: [CampaignType; 4] = [
        CampaignType::AdCopy,
        CampaignType::LandingPage,
        CampaignType::Brochure,
        CampaignType::SalesEmail,
    ];

    pub fn name(&self) -> &'static str {
        Choice::name(self)
    }

    pub fn label(&self) -> &'static str {
        Choice::label(self)
    }
}

impl Choice for CampaignType {
    const FIELD: &'static str = "campaign type";
    const ALL: &'static [Self] = &CampaignType::ALL;

    fn name(&self) -> &'static str {
        match self {
            Self::AdCopy => "ad_copy",
            Self::LandingPage => "landing_page",
            Self::Brochure => "brochure",
            Self::SalesEmail => "sales_email",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::AdCopy => "Ad Copy",
            Self::LandingPage => "Landing Page",
            Self::Brochure => "Brochure",
            Self::SalesEmail => "Sales Email",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocType {
    UserGuide,
    ApiDocumentation,
    Tutorial,
    ReferenceManual,
}

impl DocType {
    pub const ALL: [DocType; 4] = [
        DocType::UserGuide,
        DocType::ApiDocumentation,
        DocType::Tutorial,
        DocType::ReferenceManual,
    ];

    pub fn name(&self) -> &'static str {
        Choice::name(self)
    }

    pub fn label(&self) -> &'static str {
        Choice::label(self)
    }
}

impl Choice for DocType {
    const FIELD: &'static str = "documentation type";
    const ALL: &'static [Self] = &DocType::ALL;

    fn name(&self) -> &'static str {
        match self {
            Self::UserGuide => "user_guide",
            Self::ApiDocumentation => "api_documentation",
            Self::Tutorial => "tutorial",
            Self::ReferenceManual => "reference_manual",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::UserGuide => "User Guide",
            Self::ApiDocumentation => "API Documentation",
            Self::Tutorial => "Tutorial",
            Self::ReferenceManual => "Reference Manual",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            Self::ApiDocumentation => &["api", "api_docs"],
            Self::ReferenceManual => &["reference"],
            _ => &[],
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TechnicalLevel {
    Beginner,
    Intermediate,
    Advanced,
    Expert,
}

impl TechnicalLevel {
    pub const ALL: [TechnicalLevel; 4] = [
        TechnicalLevel::Beginner,
        TechnicalLevel::Intermediate,
        TechnicalLevel::Advanced,
        TechnicalLevel::Expert,
    ];

    pub fn name(&self) -> &'static str {
        Choice::name(self)
    }

    pub fn label(&self) -> &'static str {
        Choice::label(self)
    }
}

impl Choice for TechnicalLevel {
    const FIELD: &'static str = "technical level";
    const ALL: &'static [Self] = &TechnicalLevel::ALL;

    fn name(&self) -> &'static str {
        match self {
            Self::Beginner => "beginner",
            Self::Intermediate => "intermediate",
            Self::Advanced => "advanced",
            Self::Expert => "expert",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Beginner => "Beginner",
            Self::Intermediate => "Intermediate",
            Self::Advanced => "Advanced",
            Self::Expert => "Expert",
        }
    }
}

macro_rules! choice_traits {
    ($($kind:ty),+) => {
        $(
            impl fmt::Display for $kind {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(Choice::name(self))
                }
            }

            impl FromStr for $kind {
                type Err = RequestError;

                fn from_str(input: &str) -> Result<Self, Self::Err> {
                    parse_choice(input)
                }
            }
        )+
    };
}

choice_traits!(Platform, CampaignType, DocType, TechnicalLevel);

/// Settings that only apply to some content types. Templates that do not
/// mention an option ignore it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContentOptions {
    /// Social media: target network. Caps the character budget.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<Platform>,
    pub include_hashtags: bool,
    pub include_call_to_action: bool,
    /// Social media: what the reader should do, e.g. "sign up".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub call_to_action: Option<String>,
    pub include_headers: bool,
    pub include_conclusion: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub key_features: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign: Option<CampaignType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub selling_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doc_type: Option<DocType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub technical_level: Option<TechnicalLevel>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub key_sections: Vec<String>,
}

impl Default for ContentOptions {
    fn default() -> Self {
        Self {
            platform: None,
            include_hashtags: true,
            include_call_to_action: true,
            call_to_action: None,
            include_headers: true,
            include_conclusion: true,
            key_features: Vec::new(),
            campaign: None,
            selling_point: None,
            doc_type: None,
            technical_level: None,
            key_sections: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn choices_parse_from_names_and_labels() {
        assert_eq!("Twitter/X".parse::<Platform>(), Ok(Platform::Twitter));
        assert_eq!(" x ".parse::<Platform>(), Ok(Platform::Twitter));
        assert_eq!("LinkedIn".parse::<Platform>(), Ok(Platform::LinkedIn));
        assert_eq!("api-documentation".parse::<DocType>(), Ok(DocType::ApiDocumentation));
        assert_eq!("Reference Manual".parse::<DocType>(), Ok(DocType::ReferenceManual));
        assert_eq!("EXPERT".parse::<TechnicalLevel>(), Ok(TechnicalLevel::Expert));
        assert_eq!("landing page".parse::<CampaignType>(), Ok(CampaignType::LandingPage));
    }

    #[test]
    fn unknown_choice_names_the_field() {
        let err = "myspace".parse::<Platform>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "unknown platform `myspace` (expected one of: linkedin, twitter, instagram, facebook)"
        );
    }

    #[test]
    fn platform_limits() {
        assert_eq!(Platform::Twitter.char_limit(), 280);
        assert_eq!(Platform::LinkedIn.char_limit(), 3000);
        assert_eq!(Platform::Instagram.char_limit(), 2200);
        assert_eq!(Platform::Facebook.char_limit(), 5000);
    }

    #[test]
    fn defaults_enable_every_section() {
        let options: ContentOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, ContentOptions::default());
        assert!(options.include_hashtags);
        assert!(options.include_call_to_action);
        assert!(options.include_headers);
        assert!(options.include_conclusion);
    }

    #[test]
    fn serialized_names_match_display() {
        let json = serde_json::to_string(&ContentOptions {
            platform: Some(Platform::LinkedIn),
            doc_type: Some(DocType::UserGuide),
            ..ContentOptions::default()
        })
        .unwrap();
        assert!(json.contains(r#""platform":"linkedin""#));
        assert!(json.contains(r#""doc_type":"user_guide""#));
        assert!(!json.contains("key_features"));
        assert_eq!(Platform::LinkedIn.to_string(), "linkedin");
    }
}
