use crate::{DEFAULT_KEYSPACE, DEFAULT_LIMIT, db::executor::Consistency};
use serde::Deserialize;
use thiserror::Error as ThisError;

///
/// ConfigError
///

#[derive(Debug, ThisError)]
pub enum ConfigError {
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("default_keyspace must not be empty")]
    UndefinedKeyspace,
}

///
/// SessionConfig
///
/// Per-session defaults. Replaces process-wide connection state: every
/// query set, DML query, and batch reads these through its session handle.
///
/// ```toml
/// default_keyspace = "app"
/// consistency = "local_quorum"
/// default_limit = 500
/// ```
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub default_keyspace: String,
    pub consistency: Consistency,
    pub default_limit: Option<u32>,
}

impl SessionConfig {
    /// Parse and validate a TOML session document.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.default_keyspace.trim().is_empty() {
            return Err(ConfigError::UndefinedKeyspace);
        }

        Ok(())
    }

    #[must_use]
    pub fn with_keyspace(mut self, keyspace: impl Into<String>) -> Self {
        self.default_keyspace = keyspace.into();
        self
    }

    #[must_use]
    pub const fn with_consistency(mut self, consistency: Consistency) -> Self {
        self.consistency = consistency;
        self
    }

    #[must_use]
    pub const fn with_default_limit(mut self, limit: Option<u32>) -> Self {
        self.default_limit = limit;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            default_keyspace: DEFAULT_KEYSPACE.to_string(),
            consistency: Consistency::One,
            default_limit: Some(DEFAULT_LIMIT),
        }
    }
}

///
/// TESTS
///
