//! Configuration loading from disk and environment.

use std::fs;
use std::path::Path;

use crate::config::schema::TunnelConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable overriding `auth.user_id`.
pub const ENV_USER_ID: &str = "UUID";

/// Environment variable overriding `outbound.fallback_host`.
pub const ENV_FALLBACK_HOST: &str = "PROXYIP";

/// Error type for configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Validation(Vec<ValidationError>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "IO error: {}", e),
            ConfigError::Parse(e) => write!(f, "Parse error: {}", e),
            ConfigError::Validation(errors) => {
                write!(f, "Validation failed: ")?;
                for (i, err) in errors.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", err)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Load configuration: file (optional) → environment overrides → validation.
pub fn load_config(path: Option<&Path>) -> Result<TunnelConfig, ConfigError> {
    let mut config = match path {
        Some(path) => parse_file(path)?,
        None => TunnelConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

fn parse_file(path: &Path) -> Result<TunnelConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    toml::from_str(&content).map_err(ConfigError::Parse)
}

/// Apply `UUID` / `PROXYIP` style overrides. Empty values are ignored.
pub fn apply_env_overrides<F>(config: &mut TunnelConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(user_id) = non_empty(ENV_USER_ID) {
        config.auth.user_id = user_id.trim().to_string();
    }
    if let Some(host) = non_empty(ENV_FALLBACK_HOST) {
        config.outbound.fallback_host = Some(host.trim().to_string());
    }
}

/// Names of the override variables `lookup` has a non-empty value for.
///
/// Overrides are applied before logging is up, so callers report these once
/// the subscriber is installed.
pub fn active_env_overrides<F>(lookup: F) -> Vec<&'static str>
where
    F: Fn(&str) -> Option<String>,
{
    [ENV_USER_ID, ENV_FALLBACK_HOST]
        .into_iter()
        .filter(|key| lookup(*key).is_some_and(|v| !v.trim().is_empty()))
        .collect()
}
