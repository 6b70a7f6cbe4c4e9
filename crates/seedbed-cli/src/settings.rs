use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use seedbed_core::redact_secret;
use seedbed_generate::scrape::DEFAULT_PAGE_SIZE_CAP;

/// Settings file read from the working directory when `--config` is absent.
pub const DEFAULT_SETTINGS_FILE: &str = "seedbed.toml";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml decode error: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("env file error: {0}")]
    EnvFile(#[from] dotenvy::Error),
    #[error("invalid settings: {0}")]
    Invalid(String),
}

pub type SettingsResult<T> = Result<T, SettingsError>;

/// Load `.env.<ENVIRONMENT>.local`, or `.env.local` when `ENVIRONMENT` is
/// unset. Values in the file win over the process environment.
pub fn load_env_file() -> SettingsResult<Option<PathBuf>> {
    let name = env_file_name(std::env::var("ENVIRONMENT").ok().as_deref());
    match dotenvy::from_filename_override(&name) {
        Ok(path) => Ok(Some(path)),
        Err(err) if err.not_found() => Ok(None),
        Err(err) => Err(SettingsError::EnvFile(err)),
    }
}

fn env_file_name(environment: Option<&str>) -> String {
    match environment {
        Some(environment) if !environment.trim().is_empty() => {
            format!(".env.{}.local", environment.trim())
        }
        _ => ".env.local".to_string(),
    }
}

/// Credentials for a remote search source. Never printed in clear.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SourceCredentials {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

impl SourceCredentials {
    pub fn is_configured(&self) -> bool {
        self.client_id.is_some() && self.client_secret.is_some()
    }
}

impl fmt::Debug for SourceCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceCredentials")
            .field("client_id", &self.client_id.as_deref().map(redact_secret))
            .field(
                "client_secret",
                &self.client_secret.as_deref().map(redact_secret),
            )
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Seed used when neither the command line nor the plan sets one.
    pub seed: Option<u64>,
    /// Largest page requested from a search source.
    pub page_size_cap: Option<u64>,
    /// Placeholder email domains appended to the built-in pool.
    pub email_domains: Vec<String>,
    pub market: Option<String>,
    #[serde(skip)]
    pub credentials: SourceCredentials,
}

impl Settings {
    /// Read settings from `path` (or the default file if present), then
    /// apply environment overrides.
    pub fn load(path: Option<&Path>) -> SettingsResult<Self> {
        let mut settings = match path {
            Some(path) if !path.exists() => {
                return Err(SettingsError::Invalid(format!(
                    "settings file not found at: {}",
                    path.display()
                )));
            }
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => {
                let default_path = Path::new(DEFAULT_SETTINGS_FILE);
                if default_path.exists() {
                    Self::from_toml_str(&std::fs::read_to_string(default_path)?)?
                } else {
                    Self::default()
                }
            }
        };
        settings.apply_env(|key| std::env::var(key).ok())?;
        Ok(settings)
    }

    pub fn from_toml_str(content: &str) -> SettingsResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Overlay `SEEDBED_*` and `SOURCE_CLIENT_*` values from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> SettingsResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(seed) = lookup("SEEDBED_SEED") {
            self.seed = Some(parse_number("SEEDBED_SEED", &seed)?);
        }
        if let Some(page_size) = lookup("SEEDBED_PAGE_SIZE") {
            self.page_size_cap = Some(parse_number("SEEDBED_PAGE_SIZE", &page_size)?);
        }
        if let Some(client_id) = lookup("SOURCE_CLIENT_ID") {
            self.credentials.client_id = Some(client_id);
        }
        if let Some(client_secret) = lookup("SOURCE_CLIENT_SECRET") {
            self.credentials.client_secret = Some(client_secret);
        }
        Ok(())
    }

    pub fn page_size_cap(&self) -> u64 {
        self.page_size_cap.unwrap_or(DEFAULT_PAGE_SIZE_CAP)
    }
}

fn parse_number(key: &str, value: &str) -> SettingsResult<u64> {
    value.trim().parse().map_err(|_| {
        SettingsError::Invalid(format!("{key} must be a non-negative integer, got '{value}'"))
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn env_file_name_follows_environment() {
        assert_eq!(env_file_name(None), ".env.local");
        assert_eq!(env_file_name(Some("")), ".env.local");
        assert_eq!(env_file_name(Some("staging")), ".env.staging.local");
    }

    #[test]
    fn toml_settings_parse_with_defaults() {
        let settings = Settings::from_toml_str(
            "seed = 42\nemail_domains = [\"synergypath.io\"]\nmarket = \"US\"\n",
        )
        .expect("parse");
        assert_eq!(settings.seed, Some(42));
        assert_eq!(settings.page_size_cap(), DEFAULT_PAGE_SIZE_CAP);
        assert_eq!(settings.email_domains, vec!["synergypath.io".to_string()]);

        assert!(Settings::from_toml_str("sede = 1\n").is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut settings = Settings::from_toml_str("seed = 1\npage_size_cap = 5\n").expect("parse");
        let env: HashMap<&str, &str> = HashMap::from([
            ("SEEDBED_SEED", "9"),
            ("SOURCE_CLIENT_ID", "client-1234567890"),
            ("SOURCE_CLIENT_SECRET", "s3cr3t-value-abcdef"),
        ]);
        settings
            .apply_env(|key| env.get(key).map(|value| value.to_string()))
            .expect("apply env");

        assert_eq!(settings.seed, Some(9));
        assert_eq!(settings.page_size_cap(), 5);
        assert!(settings.credentials.is_configured());

        let bad = HashMap::from([("SEEDBED_PAGE_SIZE", "ten")]);
        let err = settings
            .apply_env(|key| bad.get(key).map(|value| value.to_string()))
            .unwrap_err();
        assert!(matches!(err, SettingsError::Invalid(_)));
    }

    #[test]
    fn debug_output_redacts_credentials() {
        let settings = Settings {
            credentials: SourceCredentials {
                client_id: Some("client-1234567890".to_string()),
                client_secret: Some("s3cr3t-value-abcdef".to_string()),
            },
            ..Settings::default()
        };
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("1234567890"));
        assert!(!rendered.contains("s3cr3t-value-abcdef"));
        assert!(rendered.contains("***"));
    }
}
