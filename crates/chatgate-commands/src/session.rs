//! Reply-session registry.
//!
//! A reply session lets one specific reply to one specific outbound message
//! resume a multi-turn flow. Sessions are keyed by the platform id of the
//! message the bot sent, optionally namespaced by chat. An entry is consumed
//! at most once: [`SessionRegistry::claim`] removes it atomically before the
//! handler runs, so a second reply to the same message never reaches it.
//! Continuing a flow means registering a fresh session under the id of a new
//! outbound message.
//!
//! All deadlines live in one min-heap served by a single expiry task
//! ([`SessionRegistry::spawn_expiry`]). Overwriting an entry bumps its
//! generation, which turns the old heap item into a no-op.

use crate::context::ReplyContext;
use crate::cooldown::deadline_after;
use crate::error::CommandError;
use async_trait::async_trait;
use chatgate_common::{Jid, MessageId, UnauthorizedPolicy};
use chatgate_config::SessionsConfig;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Continuation invoked with the authorized reply.
#[async_trait]
pub trait ReplyHandler: Send + Sync {
    /// Handles the reply. Registering a new session from `ctx` chains the flow.
    async fn on_reply(&self, ctx: ReplyContext) -> Result<(), CommandError>;
}

#[async_trait]
impl<F, Fut> ReplyHandler for F
where
    F: Fn(ReplyContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CommandError>> + Send + 'static,
{
    async fn on_reply(&self, ctx: ReplyContext) -> Result<(), CommandError> {
        (self)(ctx).await
    }
}

/// Lifetime class of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SessionTtl {
    /// Destructive-action confirmations.
    Short,
    /// Exploratory multi-turn flows.
    #[default]
    Long,
    /// Explicit lifetime.
    Custom(Duration),
}

impl SessionTtl {
    /// Concrete lifetime under `settings`.
    pub const fn resolve(self, settings: &SessionSettings) -> Duration {
        match self {
            Self::Short => settings.short_ttl,
            Self::Long => settings.long_ttl,
            Self::Custom(ttl) => ttl,
        }
    }
}

/// Lifecycle states of a session entry. Only `Registered` is ever stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Waiting for a reply.
    Registered,
    /// Consumed, and the handler registered a follow-up session.
    ConsumedChained,
    /// Consumed without a follow-up.
    ConsumedTerminal,
    /// The TTL elapsed before an authorized reply arrived.
    Expired,
}

/// A pending continuation.
#[derive(Clone)]
pub struct ReplySession {
    command: String,
    authorized_sender: Jid,
    chat: Jid,
    ttl: SessionTtl,
    policy: UnauthorizedPolicy,
    metadata: Option<serde_json::Value>,
    created_at: DateTime<Utc>,
    handler: Arc<dyn ReplyHandler>,
}

impl fmt::Debug for ReplySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplySession")
            .field("command", &self.command)
            .field("authorized_sender", &self.authorized_sender)
            .field("chat", &self.chat)
            .field("ttl", &self.ttl)
            .field("policy", &self.policy)
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}

impl ReplySession {
    /// Creates a long-lived, notifying session only `authorized_sender` may answer.
    pub fn new(
        command: impl Into<String>,
        authorized_sender: Jid,
        chat: Jid,
        handler: impl ReplyHandler + 'static,
    ) -> Self {
        Self {
            command: command.into(),
            authorized_sender,
            chat,
            ttl: SessionTtl::default(),
            policy: UnauthorizedPolicy::default(),
            metadata: None,
            created_at: Utc::now(),
            handler: Arc::new(handler),
        }
    }

    /// Sets the lifetime class.
    #[must_use]
    pub fn ttl(mut self, ttl: SessionTtl) -> Self {
        self.ttl = ttl;
        self
    }

    /// Sets the unauthorized-reply policy.
    #[must_use]
    pub fn policy(mut self, policy: UnauthorizedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attaches opaque state the handler can read back.
    #[must_use]
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Command that opened the session.
    pub fn command(&self) -> &str {
        &self.command
    }

    /// The only sender whose reply is accepted.
    pub const fn authorized_sender(&self) -> &Jid {
        &self.authorized_sender
    }

    /// Chat the prompt was sent to.
    pub const fn chat(&self) -> &Jid {
        &self.chat
    }

    /// Lifetime class.
    pub const fn ttl_class(&self) -> SessionTtl {
        self.ttl
    }

    /// Unauthorized-reply policy.
    pub const fn unauthorized_policy(&self) -> UnauthorizedPolicy {
        self.policy
    }

    /// Attached state.
    pub const fn session_metadata(&self) -> Option<&serde_json::Value> {
        self.metadata.as_ref()
    }

    /// Creation time.
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// The continuation.
    pub fn handler(&self) -> &Arc<dyn ReplyHandler> {
        &self.handler
    }
}

/// Registry key: the bot's outbound message id, optionally scoped to a chat.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionKey {
    chat: Option<Jid>,
    message: MessageId,
}

impl SessionKey {
    /// Id of the message the session hangs off.
    pub const fn message(&self) -> &MessageId {
        &self.message
    }

    /// Chat scope, when keys are namespaced by chat.
    pub const fn chat(&self) -> Option<&Jid> {
        self.chat.as_ref()
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.chat {
            Some(chat) => write!(f, "{chat}/{}", self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Registry settings derived from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    /// Lifetime of [`SessionTtl::Short`].
    pub short_ttl: Duration,
    /// Lifetime of [`SessionTtl::Long`].
    pub long_ttl: Duration,
    /// Whether keys include the chat.
    pub namespace_by_chat: bool,
}

impl From<&SessionsConfig> for SessionSettings {
    fn from(config: &SessionsConfig) -> Self {
        Self {
            short_ttl: config.short_ttl(),
            long_ttl: config.long_ttl(),
            namespace_by_chat: config.namespace_by_chat,
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SessionsConfig::default())
    }
}

/// Result of presenting a reply to the registry.
#[derive(Debug)]
pub enum Claim {
    /// No live session under the key; treat the message as ordinary input.
    Absent,
    /// A live session exists but belongs to someone else. It stays registered.
    Unauthorized {
        /// Command that owns the session.
        command: String,
        /// How to answer the intruder.
        policy: UnauthorizedPolicy,
    },
    /// The session was removed and handed to the caller.
    Granted(ReplySession),
}

struct Entry {
    session: ReplySession,
    deadline: Instant,
    generation: u64,
}

#[derive(PartialEq, Eq)]
struct Deadline {
    at: Instant,
    generation: u64,
    key: SessionKey,
}

impl Ord for Deadline {
    fn cmp(&self, other: &Self) -> Ordering {
        // reversed: BinaryHeap is a max-heap
        other
            .at
            .cmp(&self.at)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for Deadline {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<SessionKey, Entry>,
    deadlines: BinaryHeap<Deadline>,
    next_generation: u64,
}

impl Inner {
    fn is_current(&self, deadline: &Deadline) -> bool {
        self.entries
            .get(&deadline.key)
            .is_some_and(|entry| entry.generation == deadline.generation)
    }
}

/// Message-id-keyed store of pending reply sessions.
pub struct SessionRegistry {
    settings: SessionSettings,
    inner: Mutex<Inner>,
    wake: Notify,
}

impl fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("SessionRegistry")
            .field("settings", &self.settings)
            .field("entries", &inner.entries.len())
            .field("deadlines", &inner.deadlines.len())
            .finish()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(SessionSettings::default())
    }
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new(settings: SessionSettings) -> Self {
        Self {
            settings,
            inner: Mutex::new(Inner::default()),
            wake: Notify::new(),
        }
    }

    /// Settings in effect.
    pub const fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Builds the key for `message` sent to `chat`.
    pub fn key_for(&self, chat: &Jid, message: &MessageId) -> SessionKey {
        SessionKey {
            chat: self.settings.namespace_by_chat.then(|| chat.clone()),
            message: message.clone(),
        }
    }

    /// Stores `session` under `message`, replacing any entry already there.
    pub fn register(&self, message: MessageId, session: ReplySession) -> SessionKey {
        let key = self.key_for(session.chat(), &message);
        let ttl = session.ttl_class().resolve(&self.settings);
        let deadline = deadline_after(Instant::now(), ttl);

        let mut inner = self.inner.lock();
        inner.next_generation += 1;
        let generation = inner.next_generation;
        debug!(
            key = %key,
            command = session.command(),
            sender = %session.authorized_sender(),
            ttl_ms = ttl.as_millis(),
            "Registered reply session"
        );
        let replaced = inner.entries.insert(
            key.clone(),
            Entry {
                session,
                deadline,
                generation,
            },
        );
        if replaced.is_some() {
            debug!(key = %key, "Replaced existing reply session");
        }
        inner.deadlines.push(Deadline {
            at: deadline,
            generation,
            key: key.clone(),
        });
        drop(inner);

        self.wake.notify_one();
        key
    }

    /// Removes and returns the session if `sender` is its authorized sender.
    ///
    /// An entry whose deadline has passed counts as absent and is dropped.
    pub fn claim(&self, key: &SessionKey, sender: &Jid) -> Claim {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let Some(entry) = inner.entries.get(key) else {
            return Claim::Absent;
        };
        if entry.deadline <= now {
            inner.entries.remove(key);
            debug!(key = %key, state = ?SessionState::Expired, "Reply to expired session");
            return Claim::Absent;
        }
        if entry.session.authorized_sender() != sender {
            debug!(key = %key, sender = %sender, "Reply from unauthorized sender");
            return Claim::Unauthorized {
                command: entry.session.command().to_string(),
                policy: entry.session.unauthorized_policy(),
            };
        }

        inner
            .entries
            .remove(key)
            .map_or(Claim::Absent, |entry| Claim::Granted(entry.session))
    }

    /// Removes and returns a live session regardless of sender.
    pub fn take(&self, key: &SessionKey) -> Option<ReplySession> {
        let now = Instant::now();
        let entry = self.inner.lock().entries.remove(key)?;
        (entry.deadline > now).then_some(entry.session)
    }

    /// Drops the session under `key`; returns whether a live one was there.
    pub fn remove(&self, key: &SessionKey) -> bool {
        self.take(key).is_some()
    }

    /// Whether a live session exists under `key`.
    pub fn contains(&self, key: &SessionKey) -> bool {
        let now = Instant::now();
        self.inner
            .lock()
            .entries
            .get(key)
            .is_some_and(|entry| entry.deadline > now)
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.inner
            .lock()
            .entries
            .values()
            .filter(|entry| entry.deadline > now)
            .count()
    }

    /// Whether no live session exists.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Earliest deadline among stored sessions.
    pub fn next_deadline(&self) -> Option<Instant> {
        let mut inner = self.inner.lock();
        while let Some(top) = inner.deadlines.peek() {
            if inner.is_current(top) {
                return Some(top.at);
            }
            inner.deadlines.pop();
        }
        None
    }

    /// Deletes every session whose deadline has passed; returns how many expired.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let mut expired = 0;

        while inner.deadlines.peek().is_some_and(|top| top.at <= now) {
            let Some(deadline) = inner.deadlines.pop() else {
                break;
            };
            if inner.is_current(&deadline) {
                inner.entries.remove(&deadline.key);
                trace!(key = %deadline.key, state = ?SessionState::Expired, "Reply session expired");
                expired += 1;
            }
        }

        if expired > 0 {
            debug!(expired, live = inner.entries.len(), "Purged expired reply sessions");
        }
        expired
    }

    /// Expiry loop: sleeps until the earliest deadline, purges, repeats until `shutdown`.
    pub async fn run_expiry(self: Arc<Self>, shutdown: CancellationToken) {
        loop {
            let next = self.next_deadline();
            let sleep = async move {
                match next {
                    Some(at) => tokio::time::sleep_until(at).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                () = shutdown.cancelled() => {
                    debug!("Session expiry task stopped");
                    break;
                }
                () = self.wake.notified() => {}
                () = sleep => {
                    self.purge_expired();
                }
            }
        }
    }

    /// Spawns [`run_expiry`](Self::run_expiry) on the current runtime.
    pub fn spawn_expiry(self: &Arc<Self>, shutdown: CancellationToken) -> tokio::task::JoinHandle<()> {
        tokio::spawn(Arc::clone(self).run_expiry(shutdown))
    }
}
