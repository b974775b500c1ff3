//! Per-(user, command) cooldown ledger.

use chatgate_common::Jid;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Upper bound on how far ahead a cooldown or session deadline is placed.
pub const MAX_DEADLINE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// `now + span`, clamped to [`MAX_DEADLINE`] so oversized durations cannot overflow.
pub(crate) fn deadline_after(now: Instant, span: Duration) -> Instant {
    now + span.min(MAX_DEADLINE)
}

/// Ledger key: who ran which command.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct CooldownKey {
    user: Jid,
    command: String,
}

impl CooldownKey {
    fn new(user: &Jid, command: &str) -> Self {
        Self {
            user: user.clone(),
            command: command.to_string(),
        }
    }
}

/// Tracks when each (user, command) pair may run again.
#[derive(Debug, Default)]
pub struct CooldownLedger {
    next_allowed: DashMap<CooldownKey, Instant>,
}

impl CooldownLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Time left before `user` may run `command` again; zero when ready.
    ///
    /// An expired entry for this exact pair is removed on the way.
    pub fn check(&self, user: &Jid, command: &str) -> Duration {
        let key = CooldownKey::new(user, command);
        let now = Instant::now();

        let remaining = match self.next_allowed.get(&key) {
            Some(entry) => entry.value().saturating_duration_since(now),
            None => return Duration::ZERO,
        };

        if remaining.is_zero() {
            self.next_allowed.remove_if(&key, |_, allowed_at| *allowed_at <= now);
            trace!(user = %user, command, "Reclaimed expired cooldown entry");
        }
        remaining
    }

    /// Records that `user` started `command`; it is blocked for `cooldown`.
    pub fn touch(&self, user: &Jid, command: &str, cooldown: Duration) {
        if cooldown.is_zero() {
            return;
        }
        debug!(user = %user, command, cooldown_ms = cooldown.as_millis(), "Applying cooldown");
        self.next_allowed
            .insert(CooldownKey::new(user, command), deadline_after(Instant::now(), cooldown));
    }

    /// Drops every entry whose cooldown has elapsed and returns how many were removed.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.next_allowed.len();
        self.next_allowed.retain(|_, allowed_at| *allowed_at > now);
        let removed = before.saturating_sub(self.next_allowed.len());
        debug!(removed, remaining = self.next_allowed.len(), "Swept cooldown ledger");
        removed
    }

    /// Clears every cooldown of one user.
    pub fn clear_user(&self, user: &Jid) {
        self.next_allowed.retain(|key, _| &key.user != user);
        debug!(user = %user, "Cleared user cooldowns");
    }

    /// Clears every user's cooldown of one command.
    pub fn clear_command(&self, command: &str) {
        self.next_allowed.retain(|key, _| key.command != command);
        debug!(command, "Cleared command cooldowns");
    }

    /// Number of tracked pairs, expired or not.
    pub fn len(&self) -> usize {
        self.next_allowed.len()
    }

    /// Whether no pair is tracked.
    pub fn is_empty(&self) -> bool {
        self.next_allowed.is_empty()
    }

    /// Spawns a task sweeping the ledger every `interval` until `shutdown` fires.
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let ledger = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // first tick completes immediately
            ticker.tick().await;
            loop {
                tokio::select! {
                    () = shutdown.cancelled() => {
                        debug!("Cooldown sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        ledger.sweep_expired();
                    }
                }
            }
        })
    }
}
