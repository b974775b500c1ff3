//! Console platform: stdin lines in, stdout lines out.
//!
//! Each input line is one inbound message:
//!
//! ```text
//! [user@chat] [>quoted_id] text
//! ```
//!
//! `user` and `chat` are local parts: `111@42` is user `111@s.whatsapp.net`
//! writing in group `42@g.us`, and `111@dm` is a private chat. Without the
//! identity token the default sender writes privately. Lines starting with
//! `/` are directives that edit the role directory, e.g. `/ban 111` or
//! `/admin 111@42`.

use async_trait::async_trait;
use chatgate_commands::{Messenger, OutboundMessage, StaticDirectory};
use chatgate_common::{ChatGateError, InboundEvent, Jid, MessageId, GROUP_SUFFIX};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Server part of user jids on the console.
pub const USER_SERVER: &str = "s.whatsapp.net";

/// A change to the role directory typed on the console.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// `/ban` and `/unban`.
    Ban {
        /// Target user.
        user: Jid,
        /// Set or clear.
        on: bool,
    },
    /// `/mute` and `/unmute`.
    Mute {
        /// Group.
        chat: Jid,
        /// Target user.
        user: Jid,
        /// Set or clear.
        on: bool,
    },
    /// `/admin` and `/unadmin`.
    Admin {
        /// Group.
        chat: Jid,
        /// Target user.
        user: Jid,
        /// Set or clear.
        on: bool,
    },
    /// `/botadmin` and `/unbotadmin`.
    BotAdmin {
        /// Group.
        chat: Jid,
        /// Set or clear.
        on: bool,
    },
    /// `/premium` and `/unpremium`.
    Premium {
        /// Target user.
        user: Jid,
        /// Set or clear.
        on: bool,
    },
    /// `/whitelist` and `/unwhitelist`.
    Whitelist {
        /// Target user.
        user: Jid,
        /// Set or clear.
        on: bool,
    },
}

impl Directive {
    /// Applies the change.
    pub fn apply(&self, directory: &StaticDirectory) {
        match self {
            Self::Ban { user, on } => directory.set_banned(user, *on),
            Self::Mute { chat, user, on } => directory.set_muted(chat, user, *on),
            Self::Admin { chat, user, on } => directory.set_group_admin(chat, user, *on),
            Self::BotAdmin { chat, on } => directory.set_bot_admin(chat, *on),
            Self::Premium { user, on } => directory.set_premium(user, *on),
            Self::Whitelist { user, on } => directory.set_whitelisted(user, *on),
        }
    }
}

/// One parsed console line.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleInput {
    /// A chat message.
    Event(InboundEvent),
    /// A directory change.
    Directive(Directive),
    /// Blank line.
    Empty,
}

/// Turns console lines into events with ids `in-1`, `in-2`, ...
#[derive(Debug)]
pub struct ConsoleParser {
    default_sender: Jid,
    next_id: u64,
}

impl ConsoleParser {
    /// Creates a parser; lines without an identity token come from `default_sender`.
    pub const fn new(default_sender: Jid) -> Self {
        Self {
            default_sender,
            next_id: 0,
        }
    }

    /// Parses one line.
    pub fn parse(&mut self, line: &str) -> Result<ConsoleInput, ChatGateError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(ConsoleInput::Empty);
        }
        if let Some(directive) = line.strip_prefix('/') {
            return parse_directive(directive).map(ConsoleInput::Directive);
        }

        let mut rest = line;
        let (sender, chat) = match first_token(rest) {
            (token, tail) if token.contains('@') => {
                rest = tail;
                identity(token)?
            }
            _ => (self.default_sender.clone(), self.default_sender.clone()),
        };

        let mut quoted = None;
        let (token, tail) = first_token(rest);
        if let Some(id) = token.strip_prefix('>').filter(|id| !id.is_empty()) {
            quoted = Some(MessageId::new(id));
            rest = tail;
        }

        self.next_id += 1;
        let mut event = InboundEvent::new(format!("in-{}", self.next_id), chat, sender, rest);
        if let Some(id) = quoted {
            event = event.quoting(id, None);
        }
        Ok(ConsoleInput::Event(event))
    }
}

fn first_token(input: &str) -> (&str, &str) {
    let input = input.trim_start();
    input
        .split_once(char::is_whitespace)
        .map_or((input, ""), |(token, tail)| (token, tail.trim_start()))
}

fn user_jid(local: &str) -> Result<Jid, ChatGateError> {
    Jid::parse(&format!("{local}@{USER_SERVER}"))
}

fn group_jid(local: &str) -> Result<Jid, ChatGateError> {
    Jid::parse(&format!("{local}{GROUP_SUFFIX}"))
}

/// `user@chat` into (sender, chat).
fn identity(token: &str) -> Result<(Jid, Jid), ChatGateError> {
    let (user, chat) = token
        .split_once('@')
        .ok_or_else(|| ChatGateError::InvalidJid(token.to_string()))?;
    let sender = user_jid(user)?;
    let chat = if chat.eq_ignore_ascii_case("dm") {
        sender.clone()
    } else {
        group_jid(chat)?
    };
    Ok((sender, chat))
}

fn parse_directive(input: &str) -> Result<Directive, ChatGateError> {
    let (name, target) = first_token(input);
    let (name, on) = name
        .strip_prefix("un")
        .map_or((name, true), |stripped| (stripped, false));
    let target = target.trim();
    let missing = || ChatGateError::Config(format!("/{name} needs a target"));
    if target.is_empty() {
        return Err(missing());
    }

    let in_group = |target: &str| -> Result<(Jid, Jid), ChatGateError> {
        let (user, chat) = target
            .split_once('@')
            .ok_or_else(|| ChatGateError::Config(format!("/{name} expects user@chat")))?;
        Ok((group_jid(chat)?, user_jid(user)?))
    };

    Ok(match name.to_ascii_lowercase().as_str() {
        "ban" => Directive::Ban { user: user_jid(target)?, on },
        "premium" => Directive::Premium { user: user_jid(target)?, on },
        "whitelist" => Directive::Whitelist { user: user_jid(target)?, on },
        "botadmin" => Directive::BotAdmin { chat: group_jid(target)?, on },
        "mute" => {
            let (chat, user) = in_group(target)?;
            Directive::Mute { chat, user, on }
        }
        "admin" => {
            let (chat, user) = in_group(target)?;
            Directive::Admin { chat, user, on }
        }
        other => return Err(ChatGateError::Config(format!("unknown directive /{other}"))),
    })
}

/// Prints outbound messages and issues ids `m1`, `m2`, ...
pub struct ConsoleMessenger {
    out: Mutex<Box<dyn Write + Send>>,
    next_id: AtomicU64,
}

impl std::fmt::Debug for ConsoleMessenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsoleMessenger")
            .field("next_id", &self.next_id)
            .finish_non_exhaustive()
    }
}

impl ConsoleMessenger {
    /// Writes to `out`.
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
            next_id: AtomicU64::new(0),
        }
    }

    /// Writes to standard output.
    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }
}

#[async_trait]
impl Messenger for ConsoleMessenger {
    async fn send_message(&self, chat: &Jid, message: OutboundMessage) -> chatgate_common::Result<MessageId> {
        let id = MessageId::new(format!("m{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1));
        let quote = message
            .quoted
            .as_ref()
            .map(|q| format!(" (re {q})"))
            .unwrap_or_default();

        let mut out = self.out.lock();
        writeln!(out, "[{id}] {chat}{quote}")?;
        for line in message.text.lines() {
            writeln!(out, "    {line}")?;
        }
        out.flush()?;
        debug!(id = %id, chat = %chat, "Printed outbound message");
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_common::test_utils::chat_fixtures::jid;
    use std::sync::Arc;

    fn parser() -> ConsoleParser {
        ConsoleParser::new(jid("111@s.whatsapp.net"))
    }

    fn as_event(input: ConsoleInput) -> InboundEvent {
        match input {
            ConsoleInput::Event(event) => event,
            other => panic!("expected event, got {other:?}"),
        }
    }

    #[test]
    fn test_plain_line_is_private_message_from_default_sender() {
        let event = as_event(parser().parse("!ping").unwrap());
        assert_eq!(event.id.as_str(), "in-1");
        assert_eq!(event.sender_id, event.chat_id);
        assert!(!event.is_group_chat);
        assert_eq!(event.text, "!ping");
    }

    #[test]
    fn test_identity_and_quote() {
        let mut parser = parser();
        parser.parse("hello").unwrap();
        let event = as_event(parser.parse("222@42 >m3  7").unwrap());

        assert_eq!(event.id.as_str(), "in-2");
        assert_eq!(event.sender_id.as_str(), "222@s.whatsapp.net");
        assert_eq!(event.chat_id.as_str(), "42@g.us");
        assert!(event.is_group_chat);
        assert_eq!(event.quoted_message_id().map(MessageId::as_str), Some("m3"));
        assert_eq!(event.text, "7");

        let event = as_event(parser.parse("222@dm !help").unwrap());
        assert_eq!(event.chat_id.as_str(), "222@s.whatsapp.net");
    }

    #[test]
    fn test_directives() {
        let mut parser = parser();
        assert_eq!(
            parser.parse("/ban 111").unwrap(),
            ConsoleInput::Directive(Directive::Ban { user: jid("111@s.whatsapp.net"), on: true })
        );
        assert_eq!(
            parser.parse("/unadmin 111@42").unwrap(),
            ConsoleInput::Directive(Directive::Admin {
                chat: jid("42@g.us"),
                user: jid("111@s.whatsapp.net"),
                on: false,
            })
        );
        assert!(parser.parse("/ban").is_err());
        assert!(parser.parse("/admin 111").is_err());
        assert!(parser.parse("/teleport 1").is_err());
        assert_eq!(parser.parse("   ").unwrap(), ConsoleInput::Empty);
    }

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_messenger_prints_and_numbers() {
        let buffer = Buffer::default();
        let messenger = ConsoleMessenger::new(Box::new(buffer.clone()));
        let chat = jid("42@g.us");

        let first = messenger.send_message(&chat, OutboundMessage::text("hi")).await.unwrap();
        let second = messenger
            .send_message(&chat, OutboundMessage::text("a\nb").quoting(first.clone()))
            .await
            .unwrap();

        assert_eq!((first.as_str(), second.as_str()), ("m1", "m2"));
        let printed = String::from_utf8(buffer.0.lock().clone()).unwrap();
        assert_eq!(printed, "[m1] 42@g.us\n    hi\n[m2] 42@g.us (re m1)\n    a\n    b\n");
    }
}
