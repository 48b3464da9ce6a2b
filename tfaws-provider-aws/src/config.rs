//! Provider configuration
//!
//! Values come from a JSON file, then from the standard AWS environment
//! variables for anything the file left unset, and finally from explicit
//! command line overrides.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use tfaws_core::tags::IgnoreTagsConfig;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("No AWS region configured; set \"region\", AWS_REGION or --region")]
    MissingRegion,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    pub region: Option<String>,
    pub profile: Option<String>,
    pub ignore_tags: IgnoreTagsConfig,
    /// Tags applied to every taggable resource, below the resource's own tags
    pub default_tags: BTreeMap<String, String>,
    /// Maximum attempts for retryable SDK calls
    pub max_attempts: Option<u32>,
}

impl ProviderConfig {
    /// Load from a JSON file, or start empty when no path is given
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Fill unset values from the process environment
    pub fn from_env(self) -> Self {
        self.from_env_with(|key| std::env::var(key).ok())
    }

    /// Fill unset values using `lookup` to read environment variables
    pub fn from_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.is_empty());
        if self.region.is_none() {
            self.region = non_empty("AWS_REGION").or_else(|| non_empty("AWS_DEFAULT_REGION"));
        }
        if self.profile.is_none() {
            self.profile = non_empty("AWS_PROFILE");
        }
        if self.max_attempts.is_none() {
            self.max_attempts = non_empty("AWS_MAX_ATTEMPTS").and_then(|v| v.parse().ok());
        }
        self
    }

    /// Apply explicit overrides, which win over file and environment
    pub fn with_overrides(mut self, region: Option<String>, profile: Option<String>) -> Self {
        if region.is_some() {
            self.region = region;
        }
        if profile.is_some() {
            self.profile = profile;
        }
        self
    }

    pub fn region(&self) -> Result<&str, ConfigError> {
        self.region.as_deref().ok_or(ConfigError::MissingRegion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "region": "eu-west-1",
                "ignore_tags": {{ "key_prefixes": ["kubernetes.io/"] }},
                "default_tags": {{ "Env": "prod" }}
            }}"#
        )
        .unwrap();

        let config = ProviderConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.region().unwrap(), "eu-west-1");
        assert_eq!(config.ignore_tags.key_prefixes, vec!["kubernetes.io/"]);
        assert!(config.ignore_tags.keys.is_empty());
        assert_eq!(config.default_tags.get("Env").map(String::as_str), Some("prod"));
    }

    #[test]
    fn load_reports_parse_errors() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "regoin": "eu-west-1" }}"#).unwrap();
        let err = ProviderConfig::load(Some(file.path())).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = ProviderConfig::load(Some(Path::new("/nonexistent/tfaws.json"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn environment_fills_gaps_only() {
        let config = ProviderConfig {
            profile: Some("file-profile".to_string()),
            ..Default::default()
        }
        .from_env_with(env(&[
            ("AWS_DEFAULT_REGION", "us-east-2"),
            ("AWS_PROFILE", "env-profile"),
        ]));
        assert_eq!(config.region.as_deref(), Some("us-east-2"));
        assert_eq!(config.profile.as_deref(), Some("file-profile"));

        let config = ProviderConfig::default().from_env_with(env(&[
            ("AWS_REGION", "us-west-1"),
            ("AWS_DEFAULT_REGION", "us-east-2"),
        ]));
        assert_eq!(config.region.as_deref(), Some("us-west-1"));
    }

    #[test]
    fn overrides_win() {
        let config = ProviderConfig {
            region: Some("us-east-1".to_string()),
            ..Default::default()
        }
        .with_overrides(Some("ap-northeast-1".to_string()), None);
        assert_eq!(config.region().unwrap(), "ap-northeast-1");
        assert!(config.profile.is_none());
    }

    #[test]
    fn region_is_required() {
        let config = ProviderConfig::default().from_env_with(env(&[]));
        assert!(matches!(config.region(), Err(ConfigError::MissingRegion)));
    }
}
