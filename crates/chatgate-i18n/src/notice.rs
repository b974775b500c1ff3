//! The closed set of notices the dispatcher can send.

use fluent_bundle::{FluentArgs, FluentValue};

/// A user-facing notice, independent of locale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The sender is banned.
    Banned,
    /// The sender is muted in this group.
    Muted,
    /// Owner-only command, or the sender's role is too low.
    NotOwner,
    /// Premium-only command.
    NotPremium,
    /// Whitelist mode is on and the sender is not whitelisted.
    WhitelistBlocked,
    /// Group-only command used outside a group.
    NotGroup,
    /// Admin-only command used by a non-admin.
    NotAdmin,
    /// The bot lacks admin rights in the chat.
    BotNotAdmin,
    /// The (user, command) cooldown is still running.
    RateLimited {
        /// Whole seconds left, rounded up.
        seconds: u64,
    },
    /// Fewer arguments than the command's minimum.
    TooFewArgs {
        /// Minimum accepted.
        min: usize,
        /// Usage line, if the command declares one.
        usage: Option<String>,
    },
    /// More arguments than the command's maximum.
    TooManyArgs {
        /// Maximum accepted.
        max: usize,
        /// Usage line, if the command declares one.
        usage: Option<String>,
    },
    /// The command body failed.
    ExecutionFailed {
        /// Command name.
        command: String,
    },
    /// No command matches the token.
    UnknownCommand {
        /// Token the sender typed.
        name: String,
        /// Prefix to suggest for `help`.
        prefix: String,
    },
    /// Someone other than the authorized sender replied to a session.
    SessionNotYours,
    /// A reply handler failed.
    SessionFailed,
}

impl Notice {
    /// Fluent message id of this notice.
    pub const fn message_id(&self) -> &'static str {
        match self {
            Self::Banned => "denied-banned",
            Self::Muted => "denied-muted",
            Self::NotOwner => "denied-not-owner",
            Self::NotPremium => "denied-not-premium",
            Self::WhitelistBlocked => "denied-whitelist",
            Self::NotGroup => "denied-not-group",
            Self::NotAdmin => "denied-not-admin",
            Self::BotNotAdmin => "denied-bot-not-admin",
            Self::RateLimited { .. } => "rate-limited",
            Self::TooFewArgs { .. } => "too-few-args",
            Self::TooManyArgs { .. } => "too-many-args",
            Self::ExecutionFailed { .. } => "execution-failed",
            Self::UnknownCommand { .. } => "unknown-command",
            Self::SessionNotYours => "session-not-yours",
            Self::SessionFailed => "session-failed",
        }
    }

    /// Fluent arguments of this notice, if any.
    pub fn args(&self) -> Option<FluentArgs<'_>> {
        let mut args = FluentArgs::new();
        match self {
            Self::RateLimited { seconds } => args.set("seconds", FluentValue::from(*seconds)),
            Self::TooFewArgs { min, .. } => args.set("min", FluentValue::from(*min)),
            Self::TooManyArgs { max, .. } => args.set("max", FluentValue::from(*max)),
            Self::ExecutionFailed { command } => args.set("command", FluentValue::from(command.as_str())),
            Self::UnknownCommand { name, prefix } => {
                args.set("name", FluentValue::from(name.as_str()));
                args.set("prefix", FluentValue::from(prefix.as_str()));
            }
            _ => return None,
        }
        Some(args)
    }

    /// Usage line appended below the notice.
    pub fn usage(&self) -> Option<&str> {
        match self {
            Self::TooFewArgs { usage, .. } | Self::TooManyArgs { usage, .. } => usage.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_parameterized_notices_have_args() {
        assert!(Notice::Banned.args().is_none());
        assert!(Notice::SessionNotYours.args().is_none());
        assert!(Notice::RateLimited { seconds: 2 }.args().is_some());
    }

    #[test]
    fn test_usage_only_for_arity_notices() {
        let notice = Notice::TooManyArgs { max: 0, usage: Some("!ping".into()) };
        assert_eq!(notice.usage(), Some("!ping"));
        assert_eq!(Notice::NotGroup.usage(), None);
    }
}
