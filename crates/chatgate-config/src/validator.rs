//! Semantic validation of a parsed configuration.

use crate::defaults::{MAX_COOLDOWN_SECONDS, MAX_SESSION_TTL_SECONDS};
use crate::schema::Config;
use chatgate_common::{ChatGateError, Result};

impl Config {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<()> {
        ConfigValidator::validate(self)
    }
}

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a configuration, reporting the first problem found.
    pub fn validate(config: &Config) -> Result<()> {
        if config.bot.prefixes.is_empty() {
            return Err(ChatGateError::Config("at least one command prefix is required".to_string()));
        }
        if let Some(bad) = config.bot.prefixes.iter().find(|p| p.is_empty() || p.chars().any(char::is_whitespace)) {
            return Err(ChatGateError::Config(format!(
                "command prefix '{bad}' must be non-empty and contain no whitespace"
            )));
        }
        if config.sessions.short_ttl_seconds == 0 || config.sessions.long_ttl_seconds == 0 {
            return Err(ChatGateError::Config("session TTLs must be greater than zero".to_string()));
        }
        if config.sessions.short_ttl_seconds > config.sessions.long_ttl_seconds {
            return Err(ChatGateError::Config(format!(
                "short session TTL ({}s) exceeds long session TTL ({}s)",
                config.sessions.short_ttl_seconds, config.sessions.long_ttl_seconds
            )));
        }
        if config.sessions.long_ttl_seconds > MAX_SESSION_TTL_SECONDS {
            return Err(ChatGateError::Config(format!(
                "long session TTL ({}s) exceeds the maximum of {MAX_SESSION_TTL_SECONDS}s",
                config.sessions.long_ttl_seconds
            )));
        }
        if config.cooldown.default_seconds > MAX_COOLDOWN_SECONDS {
            return Err(ChatGateError::Config(format!(
                "default cooldown ({}s) exceeds the maximum of {MAX_COOLDOWN_SECONDS}s",
                config.cooldown.default_seconds
            )));
        }
        if config.bot.locale.trim().is_empty() {
            return Err(ChatGateError::Config("locale cannot be empty".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_prefixes() {
        let mut config = Config::default();
        config.bot.prefixes.clear();
        assert!(config.validate().is_err());

        config.bot.prefixes = vec![String::new()];
        assert!(config.validate().is_err());

        config.bot.prefixes = vec!["! ".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_inverted_ttls() {
        let mut config = Config::default();
        config.sessions.short_ttl_seconds = 600;
        assert!(config.validate().is_err());

        config.sessions.short_ttl_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_oversized_durations() {
        let mut config = Config::default();
        config.cooldown.default_seconds = u64::MAX;
        assert!(config.validate().is_err());

        config.cooldown.default_seconds = MAX_COOLDOWN_SECONDS;
        assert!(config.validate().is_ok());

        config.sessions.long_ttl_seconds = MAX_SESSION_TTL_SECONDS + 1;
        assert!(config.validate().is_err());
    }
}
