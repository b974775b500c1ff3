//! What command bodies and reply handlers see, and the collaborators they talk to.

use crate::error::CommandError;
use crate::permissions::RoleFlags;
use crate::registry::Invocation;
use crate::session::{ReplyHandler, ReplySession, SessionKey, SessionRegistry};
use async_trait::async_trait;
use chatgate_common::{Capability, InboundEvent, Jid, MessageId, QuotedMessage, UnauthorizedPolicy};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::ops::Deref;
use std::sync::Arc;

/// A message the bot sends.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Message text.
    pub text: String,
    /// Message this one replies to.
    pub quoted: Option<MessageId>,
    /// Users to mention.
    #[serde(default)]
    pub mentions: Vec<Jid>,
}

impl OutboundMessage {
    /// Plain text message.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Sends the message as a reply to `id`.
    #[must_use]
    pub fn quoting(mut self, id: MessageId) -> Self {
        self.quoted = Some(id);
        self
    }

    /// Mentions `ids`.
    #[must_use]
    pub fn mentioning(mut self, ids: impl IntoIterator<Item = Jid>) -> Self {
        self.mentions.extend(ids);
        self
    }
}

/// Outbound side of the chat platform.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Messenger: Send + Sync {
    /// Sends `message` to `chat` and returns the platform-issued id.
    async fn send_message(&self, chat: &Jid, message: OutboundMessage) -> chatgate_common::Result<MessageId>;
}

/// Source of per-message role and status flags (ban, mute, premium, admin, ...).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoleDirectory: Send + Sync {
    /// Looks up the sender's flags for this event. Owner and sudo are filled in from config.
    async fn lookup(&self, event: &InboundEvent) -> chatgate_common::Result<RoleFlags>;
}

/// Everything a body needs to register follow-up sessions.
#[derive(Clone)]
pub(crate) struct SessionScope {
    pub(crate) registry: Arc<SessionRegistry>,
    pub(crate) reply_capable: bool,
    pub(crate) default_policy: UnauthorizedPolicy,
    pub(crate) registered: Arc<Mutex<Vec<SessionKey>>>,
}

impl SessionScope {
    pub(crate) fn new(registry: Arc<SessionRegistry>, reply_capable: bool, default_policy: UnauthorizedPolicy) -> Self {
        Self {
            registry,
            reply_capable,
            default_policy,
            registered: Arc::default(),
        }
    }

    /// Keys registered through this scope so far, oldest first.
    pub(crate) fn registered(&self) -> Vec<SessionKey> {
        self.registered.lock().clone()
    }
}

/// The conversation a body runs in: the triggering event plus the ability to talk back.
#[derive(Clone)]
pub struct Conversation {
    event: Arc<InboundEvent>,
    command: String,
    messenger: Arc<dyn Messenger>,
    scope: SessionScope,
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("event", &self.event.id)
            .field("command", &self.command)
            .field("reply_capable", &self.scope.reply_capable)
            .finish_non_exhaustive()
    }
}

impl Conversation {
    pub(crate) fn new(
        event: Arc<InboundEvent>,
        command: impl Into<String>,
        messenger: Arc<dyn Messenger>,
        scope: SessionScope,
    ) -> Self {
        Self {
            event,
            command: command.into(),
            messenger,
            scope,
        }
    }

    /// The triggering event.
    pub fn event(&self) -> &InboundEvent {
        &self.event
    }

    /// Chat the event came from.
    pub fn chat(&self) -> &Jid {
        &self.event.chat_id
    }

    /// Author of the event.
    pub fn sender(&self) -> &Jid {
        &self.event.sender_id
    }

    /// Whether the event came from a group chat.
    pub fn is_group(&self) -> bool {
        self.event.is_group_chat
    }

    /// Name of the command this conversation belongs to.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Sends `text` to the chat.
    pub async fn send(&self, text: impl Into<String> + Send) -> Result<MessageId, CommandError> {
        self.send_message(OutboundMessage::text(text)).await
    }

    /// Sends `text` as a reply to the triggering event.
    pub async fn reply(&self, text: impl Into<String> + Send) -> Result<MessageId, CommandError> {
        self.send_message(OutboundMessage::text(text).quoting(self.event.id.clone()))
            .await
    }

    /// Sends an arbitrary message to the chat.
    pub async fn send_message(&self, message: OutboundMessage) -> Result<MessageId, CommandError> {
        Ok(self.messenger.send_message(self.chat(), message).await?)
    }

    /// A session for this command, answerable only by the current sender.
    pub fn session(&self, handler: impl ReplyHandler + 'static) -> ReplySession {
        ReplySession::new(self.command.clone(), self.sender().clone(), self.chat().clone(), handler)
            .policy(self.scope.default_policy)
    }

    /// Registers `session` under `message`, an id returned by a send.
    pub fn expect_reply(&self, message: MessageId, session: ReplySession) -> Result<SessionKey, CommandError> {
        self.require_reply_capability()?;
        let key = self.scope.registry.register(message, session);
        self.scope.registered.lock().push(key.clone());
        Ok(key)
    }

    /// Replies with `text` and waits for an answer to it through `session`.
    pub async fn ask(&self, text: impl Into<String> + Send, session: ReplySession) -> Result<SessionKey, CommandError> {
        // checked before sending so no prompt goes out without a session behind it
        self.require_reply_capability()?;
        let sent = self.reply(text).await?;
        let key = self.scope.registry.register(sent, session);
        self.scope.registered.lock().push(key.clone());
        Ok(key)
    }

    fn require_reply_capability(&self) -> Result<(), CommandError> {
        if self.scope.reply_capable {
            Ok(())
        } else {
            Err(CommandError::CapabilityMissing {
                command: self.command.clone(),
                capability: Capability::Reply,
            })
        }
    }
}

/// Context handed to a command body.
#[derive(Debug, Clone)]
pub struct CommandContext {
    conversation: Conversation,
    invocation: Invocation,
    roles: RoleFlags,
}

impl CommandContext {
    pub(crate) const fn new(conversation: Conversation, invocation: Invocation, roles: RoleFlags) -> Self {
        Self {
            conversation,
            invocation,
            roles,
        }
    }

    /// Parsed arguments.
    pub fn args(&self) -> &[String] {
        &self.invocation.args
    }

    /// Argument at `index`, if given.
    pub fn arg(&self, index: usize) -> Option<&str> {
        self.invocation.args.get(index).map(String::as_str)
    }

    /// All arguments joined by single spaces.
    pub fn rest(&self) -> String {
        self.invocation.args.join(" ")
    }

    /// Prefix the sender used.
    pub fn prefix(&self) -> &str {
        &self.invocation.prefix
    }

    /// Token the sender typed, which may be an alias.
    pub fn invoked_as(&self) -> &str {
        &self.invocation.token
    }

    /// Sender's role flags.
    pub const fn roles(&self) -> &RoleFlags {
        &self.roles
    }

    /// Message the invocation quotes, if any.
    pub fn quoted(&self) -> Option<&QuotedMessage> {
        self.conversation.event.quoted.as_ref()
    }
}

impl Deref for CommandContext {
    type Target = Conversation;

    fn deref(&self) -> &Self::Target {
        &self.conversation
    }
}

/// Context handed to a reply handler.
#[derive(Debug, Clone)]
pub struct ReplyContext {
    conversation: Conversation,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    terminal: bool,
}

impl ReplyContext {
    pub(crate) const fn new(
        conversation: Conversation,
        metadata: Option<serde_json::Value>,
        created_at: DateTime<Utc>,
        terminal: bool,
    ) -> Self {
        Self {
            conversation,
            metadata,
            created_at,
            terminal,
        }
    }

    /// The reply text, trimmed.
    pub fn text(&self) -> &str {
        self.conversation.event.text.trim()
    }

    /// Metadata attached when the session was registered.
    pub const fn metadata(&self) -> Option<&serde_json::Value> {
        self.metadata.as_ref()
    }

    /// Metadata deserialized into `T`.
    pub fn metadata_as<T: DeserializeOwned>(&self) -> Result<T, CommandError> {
        let value = self
            .metadata
            .clone()
            .ok_or_else(|| CommandError::other("reply session carries no metadata"))?;
        serde_json::from_value(value).map_err(|err| CommandError::other(format!("bad session metadata: {err}")))
    }

    /// When the answered session was registered.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Whether the reply is one of the configured terminal keywords.
    pub const fn is_terminal(&self) -> bool {
        self.terminal
    }
}

impl Deref for ReplyContext {
    type Target = Conversation;

    fn deref(&self) -> &Self::Target {
        &self.conversation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Claim, SessionSettings};
    use chatgate_common::test_utils::chat_fixtures::{event, group, user};
    use mockall::predicate::eq;

    fn conversation(messenger: MockMessenger, reply_capable: bool) -> (Conversation, Arc<SessionRegistry>) {
        let registry = Arc::new(SessionRegistry::new(SessionSettings::default()));
        let scope = SessionScope::new(registry.clone(), reply_capable, UnauthorizedPolicy::Silent);
        let event = Arc::new(event(&group(), &user(), "!quiz"));
        (Conversation::new(event, "quiz", Arc::new(messenger), scope), registry)
    }

    #[tokio::test]
    async fn test_ask_sends_quoted_and_registers() {
        let mut messenger = MockMessenger::new();
        messenger
            .expect_send_message()
            .with(eq(group()), mockall::predicate::function(|m: &OutboundMessage| {
                m.text == "What is 2 + 2?" && m.quoted.is_some()
            }))
            .times(1)
            .returning(|_, _| Ok(MessageId::new("m1")));

        let (conversation, registry) = conversation(messenger, true);
        let session = conversation.session(|_ctx: ReplyContext| async { Ok::<(), CommandError>(()) });
        assert_eq!(session.unauthorized_policy(), UnauthorizedPolicy::Silent);

        let key = conversation.ask("What is 2 + 2?", session).await.unwrap();
        assert_eq!(key.message().as_str(), "m1");
        assert_eq!(conversation.scope.registered(), vec![key.clone()]);
        assert!(matches!(registry.claim(&key, &user()), Claim::Granted(_)));
    }

    #[tokio::test]
    async fn test_session_requires_reply_capability() {
        let mut messenger = MockMessenger::new();
        messenger.expect_send_message().never();

        let (conversation, registry) = conversation(messenger, false);
        let session = conversation.session(|_ctx: ReplyContext| async { Ok::<(), CommandError>(()) });
        let err = conversation.ask("next?", session).await.unwrap_err();

        assert!(matches!(
            err,
            CommandError::CapabilityMissing { capability: Capability::Reply, .. }
        ));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_expect_reply_requires_reply_capability() {
        let (conversation, registry) = conversation(MockMessenger::new(), false);
        let session = conversation.session(|_ctx: ReplyContext| async { Ok::<(), CommandError>(()) });

        let err = conversation.expect_reply("m9".into(), session).unwrap_err();
        assert!(matches!(err, CommandError::CapabilityMissing { .. }));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_metadata_as() {
        #[derive(Deserialize)]
        struct Page {
            query: String,
            page: u32,
        }

        let (conversation, _) = conversation(MockMessenger::new(), true);
        let ctx = ReplyContext::new(
            conversation,
            Some(serde_json::json!({ "query": "rust", "page": 2 })),
            Utc::now(),
            false,
        );
        let page: Page = ctx.metadata_as().unwrap();
        assert_eq!((page.query.as_str(), page.page), ("rust", 2));
        assert_eq!(ctx.text(), "!quiz");
        assert!(!ctx.is_terminal());
    }
}
