use serde::Deserialize;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::{ConfigError, LlmConfig};

pub const API_KEY_ENV: &str = "GROQ_API_KEY";
pub const DEFAULT_SECRETS_FILE: &str = "secrets.toml";

/// An API key. `Debug` and `Display` never print the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank input.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Replaces every occurrence of the key in `text`.
    pub fn redact(&self, text: &str) -> String {
        text.replace(self.0.as_str(), "***")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CredentialSource {
    Override,
    SecretsFile(PathBuf),
    Environment,
    ConfigFile,
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Override => f.write_str("command line"),
            Self::SecretsFile(path) => write!(f, "secrets file {}", path.display()),
            Self::Environment => write!(f, "environment variable {API_KEY_ENV}"),
            Self::ConfigFile => f.write_str("config file"),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SecretsDocument {
    #[serde(default)]
    groq: Option<GroqSecrets>,
    #[serde(default, rename = "GROQ_API_KEY")]
    flat_api_key: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct GroqSecrets {
    #[serde(default)]
    api_key: Option<String>,
}

/// Resolves the API key once at startup. `env` looks up environment
/// variables, so callers decide whether the process environment is consulted.
///
/// Precedence: explicit override, secrets file, environment, config file.
/// A missing secrets file is skipped; an unreadable or malformed one is an error.
pub fn resolve_credential_with<F>(
    override_key: Option<&str>,
    secrets_path: &Path,
    llm: &LlmConfig,
    env: F,
) -> Result<Option<(Credential, CredentialSource)>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(credential) = override_key.and_then(Credential::new) {
        return Ok(Some((credential, CredentialSource::Override)));
    }

    if let Some(credential) = read_secrets_file(secrets_path)? {
        return Ok(Some((
            credential,
            CredentialSource::SecretsFile(secrets_path.to_path_buf()),
        )));
    }

    if let Some(credential) = env(API_KEY_ENV).and_then(Credential::new) {
        return Ok(Some((credential, CredentialSource::Environment)));
    }

    Ok(Credential::new(llm.api_key.as_str()).map(|credential| (credential, CredentialSource::ConfigFile)))
}

fn read_secrets_file(path: &Path) -> Result<Option<Credential>, ConfigError> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::ReadSecrets {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let document: SecretsDocument =
        toml::from_str(&contents).map_err(|source| ConfigError::ParseSecrets {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(document
        .groq
        .and_then(|groq| groq.api_key)
        .or(document.flat_api_key)
        .and_then(Credential::new))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn env_with_key(name: &str) -> Option<String> {
        (name == API_KEY_ENV).then(|| "env-key".to_string())
    }

    #[test]
    fn debug_and_display_are_redacted() {
        let credential = Credential::new("gsk_secret").unwrap();
        assert_eq!(format!("{credential:?}"), "Credential(***)");
        assert_eq!(credential.to_string(), "***");
        assert_eq!(credential.expose(), "gsk_secret");
    }

    #[test]
    fn blank_values_are_not_credentials() {
        assert!(Credential::new("   ").is_none());
        assert_eq!(Credential::new(" key \n").unwrap().expose(), "key");
    }

    #[test]
    fn redact_replaces_every_occurrence() {
        let credential = Credential::new("abc123").unwrap();
        assert_eq!(
            credential.redact("key abc123 rejected (abc123)"),
            "key *** rejected (***)"
        );
    }

    #[test]
    fn nothing_configured_resolves_to_none() {
        let temp = tempdir().unwrap();
        let resolved = resolve_credential_with(
            None,
            &temp.path().join("secrets.toml"),
            &LlmConfig::default(),
            no_env,
        )
        .unwrap();
        assert!(resolved.is_none());
    }

    #[test]
    fn secrets_file_wins_over_environment() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("secrets.toml");
        fs::write(&path, "[groq]\napi_key = \"file-key\"\n").unwrap();

        let (credential, source) =
            resolve_credential_with(None, &path, &LlmConfig::default(), env_with_key)
                .unwrap()
                .unwrap();
        assert_eq!(credential.expose(), "file-key");
        assert_eq!(source, CredentialSource::SecretsFile(path));
    }

    #[test]
    fn flat_secrets_key_is_accepted() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("secrets.toml");
        fs::write(&path, "GROQ_API_KEY = \"flat-key\"\n").unwrap();

        let (credential, _) = resolve_credential_with(None, &path, &LlmConfig::default(), no_env)
            .unwrap()
            .unwrap();
        assert_eq!(credential.expose(), "flat-key");
    }

    #[test]
    fn environment_then_config_file() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing.toml");
        let llm = LlmConfig {
            api_key: "config-key".into(),
            ..LlmConfig::default()
        };

        let (credential, source) = resolve_credential_with(None, &path, &llm, env_with_key)
            .unwrap()
            .unwrap();
        assert_eq!(credential.expose(), "env-key");
        assert_eq!(source, CredentialSource::Environment);

        let (credential, source) = resolve_credential_with(None, &path, &llm, no_env)
            .unwrap()
            .unwrap();
        assert_eq!(credential.expose(), "config-key");
        assert_eq!(source, CredentialSource::ConfigFile);
    }

    #[test]
    fn override_wins() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("secrets.toml");
        fs::write(&path, "[groq]\napi_key = \"file-key\"\n").unwrap();

        let (credential, source) =
            resolve_credential_with(Some("cli-key"), &path, &LlmConfig::default(), env_with_key)
                .unwrap()
                .unwrap();
        assert_eq!(credential.expose(), "cli-key");
        assert_eq!(source, CredentialSource::Override);
    }

    #[test]
    fn malformed_secrets_file_is_reported() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("secrets.toml");
        fs::write(&path, "[groq\napi_key = ").unwrap();

        let err = resolve_credential_with(None, &path, &LlmConfig::default(), no_env).unwrap_err();
        assert!(matches!(err, ConfigError::ParseSecrets { .. }));
    }
}
