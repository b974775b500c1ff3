//! Inbound chat events as delivered by the platform collaborator.

use crate::types::{Jid, MessageId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata about the message an inbound event quotes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuotedMessage {
    /// Id of the quoted message.
    pub id: MessageId,
    /// Author of the quoted message, when the platform reports it.
    pub author: Option<Jid>,
    /// Text of the quoted message, when the platform reports it.
    pub content: Option<String>,
}

/// A single incoming chat message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// Platform id of this message.
    pub id: MessageId,
    /// Chat the message was posted in.
    pub chat_id: Jid,
    /// Author of the message.
    pub sender_id: Jid,
    /// Whether the chat is a group chat.
    pub is_group_chat: bool,
    /// Raw message text.
    pub text: String,
    /// The message this one replies to, if any.
    pub quoted: Option<QuotedMessage>,
    /// Users mentioned in the message.
    #[serde(default)]
    pub mentioned_ids: Vec<Jid>,
    /// When the platform received the message.
    pub received_at: DateTime<Utc>,
}

impl InboundEvent {
    /// Creates a plain, non-quoting event.
    pub fn new(id: impl Into<MessageId>, chat_id: Jid, sender_id: Jid, text: impl Into<String>) -> Self {
        let is_group_chat = chat_id.is_group();
        Self {
            id: id.into(),
            chat_id,
            sender_id,
            is_group_chat,
            text: text.into(),
            quoted: None,
            mentioned_ids: Vec::new(),
            received_at: Utc::now(),
        }
    }

    /// Marks this event as a reply to `quoted_id`.
    #[must_use]
    pub fn quoting(mut self, quoted_id: impl Into<MessageId>, author: Option<Jid>) -> Self {
        self.quoted = Some(QuotedMessage {
            id: quoted_id.into(),
            author,
            content: None,
        });
        self
    }

    /// Adds mentioned users.
    #[must_use]
    pub fn mentioning(mut self, ids: impl IntoIterator<Item = Jid>) -> Self {
        self.mentioned_ids.extend(ids);
        self
    }

    /// Id of the quoted message, if this event is a reply.
    pub fn quoted_message_id(&self) -> Option<&MessageId> {
        self.quoted.as_ref().map(|q| &q.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn jid(s: &str) -> Jid {
        Jid::parse(s).unwrap()
    }

    #[test]
    fn test_group_flag_follows_chat_jid() {
        let event = InboundEvent::new("a1", jid("1203@g.us"), jid("111@s"), "!ping");
        assert!(event.is_group_chat);

        let event = InboundEvent::new("a2", jid("111@s"), jid("111@s"), "!ping");
        assert!(!event.is_group_chat);
    }

    #[test]
    fn test_quoting() {
        let event = InboundEvent::new("a1", jid("111@s"), jid("111@s"), "yes")
            .quoting("m1", Some(jid("bot@s")));
        assert_eq!(event.quoted_message_id(), Some(&MessageId::from("m1")));
        assert_eq!(event.quoted.unwrap().author, Some(jid("bot@s")));
    }
}
