//! Default values for every configuration section.

use crate::schema::{BotConfig, Config, CooldownConfig, LogFormat, LoggingConfig, SessionsConfig};
use chatgate_common::{Capability, UnauthorizedPolicy};

/// Default command prefixes.
pub const DEFAULT_PREFIXES: [&str; 2] = ["!", "."];

/// Default per-(user, command) cooldown in seconds.
pub const DEFAULT_COOLDOWN_SECONDS: u64 = 3;

/// Largest cooldown the configuration accepts.
pub const MAX_COOLDOWN_SECONDS: u64 = 24 * 60 * 60;

/// Largest session TTL the configuration accepts.
pub const MAX_SESSION_TTL_SECONDS: u64 = 24 * 60 * 60;

/// Default TTL for confirmations.
pub const DEFAULT_SHORT_TTL_SECONDS: u64 = 60;

/// Default TTL for exploratory flows.
pub const DEFAULT_LONG_TTL_SECONDS: u64 = 300;

impl Default for Config {
    fn default() -> Self {
        Self {
            bot: BotConfig::default(),
            cooldown: CooldownConfig::default(),
            sessions: SessionsConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_PREFIXES.iter().map(ToString::to_string).collect(),
            owners: Vec::new(),
            sudo: Vec::new(),
            whitelist_mode: false,
            notify_unknown_command: false,
            locale: "en-US".to_string(),
            capabilities: Capability::ALL.to_vec(),
        }
    }
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            default_seconds: DEFAULT_COOLDOWN_SECONDS,
            sweep_interval_seconds: 600,
            owners_exempt: false,
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            short_ttl_seconds: DEFAULT_SHORT_TTL_SECONDS,
            long_ttl_seconds: DEFAULT_LONG_TTL_SECONDS,
            default_policy: UnauthorizedPolicy::Notify,
            terminal_keywords: vec!["stop".to_string(), "cancel".to_string(), "exit".to_string()],
            namespace_by_chat: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            file: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let config = Config::default();
        assert_eq!(config.bot.prefixes, vec!["!", "."]);
        assert_eq!(config.bot.capabilities.len(), 4);
        assert!(config.sessions.short_ttl() < config.sessions.long_ttl());
        assert_eq!(config.cooldown.default_cooldown().as_secs(), 3);
        assert!(config.sessions.is_terminal_keyword("  STOP "));
        assert!(!config.sessions.is_terminal_keyword("stopwatch"));
    }
}
