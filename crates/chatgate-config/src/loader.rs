//! Configuration loading and persistence.

use crate::schema::{Config, LogFormat};
use chatgate_common::{ChatGateError, Jid, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Prefix of environment variables that override file settings.
pub const ENV_PREFIX: &str = "CHATGATE_";

/// On-disk configuration format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML document.
    Toml,
    /// YAML document.
    Yaml,
}

impl ConfigFormat {
    /// Picks the format from a file extension, defaulting to TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml" | "yml") => Self::Yaml,
            _ => Self::Toml,
        }
    }
}

/// Configuration loader with atomic file writes.
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new configuration loader.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path this loader reads from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads, overrides from the process environment, and validates the configuration.
    pub async fn load(&self) -> Result<Config> {
        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            ChatGateError::Config(format!("failed to read {}: {e}", self.path.display()))
        })?;

        let mut config = Self::parse(&contents, ConfigFormat::from_path(&self.path))?;
        Self::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
        config.validate()?;

        info!(path = %self.path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parses a configuration document.
    pub fn parse(contents: &str, format: ConfigFormat) -> Result<Config> {
        match format {
            ConfigFormat::Toml => toml::from_str(contents)
                .map_err(|e| ChatGateError::Config(format!("invalid TOML: {e}"))),
            ConfigFormat::Yaml => serde_yaml::from_str(contents)
                .map_err(|e| ChatGateError::Config(format!("invalid YAML: {e}"))),
        }
    }

    /// Applies `CHATGATE_*` overrides read through `lookup`.
    pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(prefixes) = var("PREFIXES") {
            config.bot.prefixes = split_list(&prefixes);
            debug!("Prefixes overridden from environment");
        }
        if let Some(owners) = var("OWNERS") {
            config.bot.owners = parse_jids(&owners)?;
        }
        if let Some(sudo) = var("SUDO") {
            config.bot.sudo = parse_jids(&sudo)?;
        }
        if let Some(mode) = var("WHITELIST_MODE") {
            config.bot.whitelist_mode = parse_bool("WHITELIST_MODE", &mode)?;
        }
        if let Some(locale) = var("LOCALE") {
            config.bot.locale = locale;
        }
        if let Some(level) = var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Some(format) = var("LOG_FORMAT") {
            config.logging.format = match format.to_ascii_lowercase().as_str() {
                "pretty" => LogFormat::Pretty,
                "compact" => LogFormat::Compact,
                "json" => LogFormat::Json,
                other => {
                    return Err(ChatGateError::Config(format!(
                        "{ENV_PREFIX}LOG_FORMAT must be pretty, compact or json, got '{other}'"
                    )))
                }
            };
        }

        Ok(())
    }

    /// Saves configuration to file atomically, in the format implied by the path.
    pub async fn save(&self, config: &Config) -> Result<()> {
        let contents = match ConfigFormat::from_path(&self.path) {
            ConfigFormat::Toml => toml::to_string_pretty(config)
                .map_err(|e| ChatGateError::Serialization(e.to_string()))?,
            ConfigFormat::Yaml => serde_yaml::to_string(config)
                .map_err(|e| ChatGateError::Serialization(e.to_string()))?,
        };

        let tmp = self.path.with_extension("tmp");
        tokio::fs::write(&tmp, contents).await?;
        tokio::fs::rename(&tmp, &self.path).await?;

        debug!(path = %self.path.display(), "Saved configuration");
        Ok(())
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_jids(raw: &str) -> Result<Vec<Jid>> {
    split_list(raw).iter().map(|s| Jid::parse(s)).collect()
}

fn parse_bool(name: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ChatGateError::Config(format!(
            "{ENV_PREFIX}{name} must be a boolean, got '{other}'"
        ))),
    }
}
