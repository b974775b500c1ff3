//! Test utilities and shared test helpers for ChatGate.
//!
//! This module provides common testing utilities, fixtures, and helper functions
//! that can be used across all crates in the workspace for unit and integration testing.

use std::sync::Once;

#[cfg(feature = "tracing-subscriber")]
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize test logging once per test run.
static INIT: Once = Once::new();

/// Initialize logging for tests with a sensible default configuration.
/// This function is safe to call multiple times and will only initialize once.
#[cfg(feature = "tracing-subscriber")]
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

        let _ = fmt().with_test_writer().with_env_filter(filter).try_init();
    });
}

/// No-op version when tracing-subscriber is not available
#[cfg(not(feature = "tracing-subscriber"))]
pub fn init_test_logging() {
    INIT.call_once(|| {});
}

/// Chat-identity fixtures.
pub mod chat_fixtures {
    use crate::{InboundEvent, Jid, MessageId};
    use std::sync::atomic::{AtomicU64, Ordering};

    static NEXT_EVENT: AtomicU64 = AtomicU64::new(1);

    /// Parses a jid, panicking on malformed fixtures.
    pub fn jid(raw: &str) -> Jid {
        Jid::parse(raw).expect("fixture jid must be valid")
    }

    /// The configured bot owner.
    pub fn owner() -> Jid {
        jid("100@s.whatsapp.net")
    }

    /// A sudo user.
    pub fn sudo() -> Jid {
        jid("200@s.whatsapp.net")
    }

    /// An ordinary user.
    pub fn user() -> Jid {
        jid("111@s.whatsapp.net")
    }

    /// A second ordinary user.
    pub fn other_user() -> Jid {
        jid("222@s.whatsapp.net")
    }

    /// A group chat.
    pub fn group() -> Jid {
        jid("120363000000@g.us")
    }

    /// Builds a fresh event with a unique id.
    pub fn event(chat: &Jid, sender: &Jid, text: &str) -> InboundEvent {
        let n = NEXT_EVENT.fetch_add(1, Ordering::Relaxed);
        InboundEvent::new(MessageId::new(format!("in-{n}")), chat.clone(), sender.clone(), text)
    }

    /// Builds a fresh event replying to `quoted`.
    pub fn reply(chat: &Jid, sender: &Jid, quoted: &str, text: &str) -> InboundEvent {
        event(chat, sender, text).quoting(quoted, None)
    }
}

/// Configuration-related test utilities.
pub mod config_fixtures {
    /// A minimal valid configuration as a TOML string.
    pub fn minimal_config_toml() -> &'static str {
        r#"
[bot]
prefixes = ["!"]
owners = ["100@s.whatsapp.net"]
"#
    }

    /// A fully specified configuration as a YAML string.
    pub fn full_config_yaml() -> &'static str {
        concat!(
            "bot:\n",
            "  prefixes: [\"!\", \".\"]\n",
            "  owners: [\"100@s.whatsapp.net\"]\n",
            "  sudo: [\"200@s.whatsapp.net\"]\n",
            "  whitelist_mode: false\n",
            "  notify_unknown_command: true\n",
            "  locale: \"en-US\"\n",
            "  capabilities: [reply, chat_stream, react, buttons]\n",
            "\n",
            "cooldown:\n",
            "  default_seconds: 5\n",
            "  sweep_interval_seconds: 300\n",
            "  owners_exempt: true\n",
            "\n",
            "sessions:\n",
            "  short_ttl_seconds: 60\n",
            "  long_ttl_seconds: 300\n",
            "  default_policy: silent\n",
            "  terminal_keywords: [\"stop\", \"quit\"]\n",
            "  namespace_by_chat: true\n",
            "\n",
            "logging:\n",
            "  level: \"debug\"\n",
            "  format: json\n"
        )
    }
}

/// Property-based testing utilities using proptest.
#[cfg(feature = "proptest")]
pub mod property_testing {
    use crate::Jid;
    use proptest::prelude::*;

    /// Strategy for generating valid user jids.
    pub fn user_jid_strategy() -> impl Strategy<Value = Jid> {
        (1_000_000u64..=999_999_999_999u64)
            .prop_map(|n| Jid::parse(&format!("{n}@s.whatsapp.net")).expect("generated jid is valid"))
    }

    /// Strategy for generating command tokens.
    pub fn command_token_strategy() -> impl Strategy<Value = String> {
        r"[a-z][a-z0-9]{1,11}".prop_map(|s| s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_multiple_calls() {
        init_test_logging();
        init_test_logging();
        init_test_logging();
    }

    #[test]
    fn test_fixture_events_have_unique_ids() {
        let a = chat_fixtures::event(&chat_fixtures::group(), &chat_fixtures::user(), "!ping");
        let b = chat_fixtures::event(&chat_fixtures::group(), &chat_fixtures::user(), "!ping");
        assert_ne!(a.id, b.id);
        assert!(a.is_group_chat);
    }

    #[test]
    fn test_reply_fixture_quotes() {
        let r = chat_fixtures::reply(&chat_fixtures::user(), &chat_fixtures::user(), "m1", "2");
        assert_eq!(r.quoted_message_id().map(crate::MessageId::as_str), Some("m1"));
    }
}
