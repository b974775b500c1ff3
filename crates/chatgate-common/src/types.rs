//! Common type definitions and newtype wrappers for domain modeling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix the platform uses for group chat addresses.
pub const GROUP_SUFFIX: &str = "@g.us";

/// A platform-issued addressable identity for a user or a group chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Jid(String);

impl Jid {
    /// Parses a jid, requiring a non-empty local part and server part.
    pub fn parse(raw: &str) -> std::result::Result<Self, ChatGateError> {
        let raw = raw.trim();
        match raw.split_once('@') {
            Some((local, server)) if !local.is_empty() && !server.is_empty() => {
                Ok(Self(raw.to_ascii_lowercase()))
            }
            _ => Err(ChatGateError::InvalidJid(raw.to_string())),
        }
    }

    /// Returns the jid as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the part before the `@`.
    pub fn local_part(&self) -> &str {
        self.0.split_once('@').map_or(self.0.as_str(), |(local, _)| local)
    }

    /// Whether this jid addresses a group chat.
    pub fn is_group(&self) -> bool {
        self.0.ends_with(GROUP_SUFFIX)
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Jid {
    type Error = ChatGateError;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Jid> for String {
    fn from(jid: Jid) -> Self {
        jid.0
    }
}

impl std::str::FromStr for Jid {
    type Err = ChatGateError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Id of a message as issued by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Wraps a platform message id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// An optional interaction feature a command may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Registers reply sessions to continue a conversation.
    Reply,
    /// Streams incremental output into the chat.
    ChatStream,
    /// Reacts to messages with emoji.
    React,
    /// Sends interactive button messages.
    Buttons,
}

impl Capability {
    /// Every capability, in declaration order.
    pub const ALL: [Self; 4] = [Self::Reply, Self::ChatStream, Self::React, Self::Buttons];

    /// Stable lowercase name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::ChatStream => "chat_stream",
            Self::React => "react",
            Self::Buttons => "buttons",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happens when someone other than the authorized sender replies to a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnauthorizedPolicy {
    /// Drop the reply without answering.
    Silent,
    /// Answer with a "not your session" notice.
    #[default]
    Notify,
}

/// Common result type for the application.
pub type Result<T> = std::result::Result<T, ChatGateError>;

/// Application-wide error type.
#[derive(thiserror::Error, Debug)]
pub enum ChatGateError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A string that is not a well-formed jid.
    #[error("Invalid jid: '{0}'")]
    InvalidJid(String),

    /// The platform rejected or failed an outbound call.
    #[error("Platform error: {0}")]
    Platform(String),

    /// The user/group directory could not answer a lookup.
    #[error("Directory error: {0}")]
    Directory(String),

    /// Command registration failed at startup.
    #[error("Registration error: {0}")]
    Registration(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ChatGateError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}
