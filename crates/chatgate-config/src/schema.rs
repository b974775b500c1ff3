//! Configuration schema definitions using serde.

use chatgate_common::{Capability, Jid, UnauthorizedPolicy};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for ChatGate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bot identity and access configuration.
    pub bot: BotConfig,
    /// Cooldown ledger configuration.
    pub cooldown: CooldownConfig,
    /// Reply-session configuration.
    pub sessions: SessionsConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Bot identity and access configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Prefixes that mark a message as a command invocation.
    pub prefixes: Vec<String>,
    /// Bot owners. Owners pass every authorization check except group context checks.
    pub owners: Vec<Jid>,
    /// Sudo users.
    pub sudo: Vec<Jid>,
    /// When on, only whitelisted users, owners and sudo users may run commands.
    pub whitelist_mode: bool,
    /// Whether an unknown command token gets a reply.
    pub notify_unknown_command: bool,
    /// Locale used for user-facing notices.
    pub locale: String,
    /// Capabilities the connected platform supports.
    pub capabilities: Vec<Capability>,
}

/// Cooldown ledger configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Cooldown applied to commands that do not declare one.
    pub default_seconds: u64,
    /// Interval of the background sweep of expired entries; 0 disables it.
    pub sweep_interval_seconds: u64,
    /// Whether owners skip cooldowns.
    pub owners_exempt: bool,
}

/// Reply-session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// TTL for destructive-action confirmations.
    pub short_ttl_seconds: u64,
    /// TTL for exploratory multi-turn flows.
    pub long_ttl_seconds: u64,
    /// Policy for replies from someone other than the authorized sender.
    pub default_policy: UnauthorizedPolicy,
    /// Words that end a multi-turn flow when sent as a reply.
    pub terminal_keywords: Vec<String>,
    /// Key sessions by (chat, message id) instead of message id alone.
    pub namespace_by_chat: bool,
}

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Multi-line, colored output.
    #[default]
    Pretty,
    /// Single-line output.
    Compact,
    /// Newline-delimited JSON.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "chatgate_commands=debug").
    pub level: String,
    /// Output format.
    pub format: LogFormat,
    /// Optional file to write logs to instead of stdout.
    pub file: Option<PathBuf>,
}

impl BotConfig {
    /// Whether `jid` is a configured owner.
    pub fn is_owner(&self, jid: &Jid) -> bool {
        self.owners.contains(jid)
    }

    /// Whether `jid` is a configured sudo user.
    pub fn is_sudo(&self, jid: &Jid) -> bool {
        self.sudo.contains(jid)
    }

    /// Whether the platform supports `capability`.
    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }
}

impl CooldownConfig {
    /// Cooldown for commands that do not declare their own.
    pub const fn default_cooldown(&self) -> Duration {
        Duration::from_secs(self.default_seconds)
    }

    /// Sweep interval, or `None` when sweeping is disabled.
    pub const fn sweep_interval(&self) -> Option<Duration> {
        if self.sweep_interval_seconds == 0 {
            None
        } else {
            Some(Duration::from_secs(self.sweep_interval_seconds))
        }
    }
}

impl SessionsConfig {
    /// TTL for confirmations.
    pub const fn short_ttl(&self) -> Duration {
        Duration::from_secs(self.short_ttl_seconds)
    }

    /// TTL for exploratory flows.
    pub const fn long_ttl(&self) -> Duration {
        Duration::from_secs(self.long_ttl_seconds)
    }

    /// Whether `text` is one of the terminal keywords, ignoring case and surrounding space.
    pub fn is_terminal_keyword(&self, text: &str) -> bool {
        let text = text.trim();
        self.terminal_keywords
            .iter()
            .any(|keyword| keyword.eq_ignore_ascii_case(text))
    }
}
