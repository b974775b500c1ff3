//! Test doubles for the dispatch pipeline.

use crate::command::Command;
use crate::context::{Messenger, OutboundMessage};
use crate::directory::StaticDirectory;
use crate::dispatcher::Dispatcher;
use crate::error::BuildError;
use crate::metrics::ExecutionMetrics;
use async_trait::async_trait;
use chatgate_common::{Jid, MessageId};
use chatgate_config::{Config, ConfigCache};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A message captured by [`RecordingMessenger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Id issued for it.
    pub id: MessageId,
    /// Destination chat.
    pub chat: Jid,
    /// What was sent.
    pub message: OutboundMessage,
}

/// Messenger that records every outbound message and issues ids `m1`, `m2`, ...
#[derive(Debug, Default)]
pub struct RecordingMessenger {
    next_id: AtomicU64,
    sent: Mutex<Vec<SentMessage>>,
}

impl RecordingMessenger {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything sent so far, oldest first.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().clone()
    }

    /// Texts sent so far, oldest first.
    pub fn texts(&self) -> Vec<String> {
        self.sent.lock().iter().map(|s| s.message.text.clone()).collect()
    }

    /// Id of the most recent message.
    pub fn last_id(&self) -> Option<MessageId> {
        self.sent.lock().last().map(|s| s.id.clone())
    }

    /// Forgets recorded messages; ids keep counting.
    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

#[async_trait]
impl Messenger for RecordingMessenger {
    async fn send_message(&self, chat: &Jid, message: OutboundMessage) -> chatgate_common::Result<MessageId> {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let id = MessageId::new(format!("m{n}"));
        self.sent.lock().push(SentMessage {
            id: id.clone(),
            chat: chat.clone(),
            message,
        });
        Ok(id)
    }
}

/// A dispatcher wired to in-memory collaborators.
#[derive(Debug)]
pub struct TestBed {
    /// The dispatcher under test.
    pub dispatcher: Arc<Dispatcher>,
    /// Captures outbound messages.
    pub messenger: Arc<RecordingMessenger>,
    /// Role flags source.
    pub directory: Arc<StaticDirectory>,
    /// Execution metrics.
    pub metrics: Arc<ExecutionMetrics>,
}

impl TestBed {
    /// Builds a dispatcher for `commands` under `config`.
    pub fn new(config: Config, commands: impl IntoIterator<Item = Command>) -> Result<Self, BuildError> {
        let messenger = Arc::new(RecordingMessenger::new());
        let directory = Arc::new(StaticDirectory::new());
        let metrics = Arc::new(ExecutionMetrics::new());
        let dispatcher = Dispatcher::builder(ConfigCache::new(config))
            .commands(commands)
            .messenger(messenger.clone())
            .directory(directory.clone())
            .metrics(metrics.clone())
            .build()?;

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            messenger,
            directory,
            metrics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatgate_common::test_utils::chat_fixtures::{group, user};

    #[tokio::test]
    async fn test_ids_are_sequential() {
        let messenger = RecordingMessenger::new();
        let first = messenger.send_message(&group(), OutboundMessage::text("a")).await.unwrap();
        let second = messenger.send_message(&user(), OutboundMessage::text("b")).await.unwrap();

        assert_eq!((first.as_str(), second.as_str()), ("m1", "m2"));
        assert_eq!(messenger.texts(), vec!["a", "b"]);
        assert_eq!(messenger.sent()[1].chat, user());

        messenger.clear();
        assert!(messenger.last_id().is_none());
    }
}
