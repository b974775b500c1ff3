//! The pipeline that turns one inbound event into at most one execution.
//!
//! A reply to a tracked outbound message goes to the [`SessionRegistry`]; an
//! unauthorized or absent session falls back as described on
//! [`Dispatcher::dispatch`]. Everything else is parsed as a command and runs
//! resolver, gate, cooldown, arity check and executor in that order. Every
//! refusal is answered with exactly one notice quoting the inbound message,
//! except replies to sessions whose policy is silent.

use crate::arguments::{validate, ArgumentError};
use crate::command::Command;
use crate::context::{CommandContext, Conversation, Messenger, OutboundMessage, ReplyContext, RoleDirectory, SessionScope};
use crate::cooldown::CooldownLedger;
use crate::error::{BuildError, Rejection};
use crate::executor::{ExecutionKind, Executor, MetricsSink, Outcome};
use crate::permissions::{AuthorizationGate, Decision, DenialReason, GateInput, RoleFlags};
use crate::registry::{parse_invocation, CommandRegistry};
use crate::session::{Claim, ReplySession, SessionKey, SessionRegistry, SessionSettings, SessionState};
use chatgate_common::{ceil_seconds, Capability, InboundEvent, UnauthorizedPolicy};
use chatgate_config::{Config, ConfigCache};
use chatgate_i18n::{Notice, Notices};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// What happened to a reply routed into the session registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The handler ran and registered a follow-up session.
    Chained {
        /// Command owning the flow.
        command: String,
        /// Key of the newest follow-up session.
        next: SessionKey,
    },
    /// The handler ran and the flow ended.
    Terminal {
        /// Command owning the flow.
        command: String,
    },
    /// The handler failed; the session is gone and a failure notice was sent.
    Failed {
        /// Command owning the flow.
        command: String,
        /// Rendered error.
        error: String,
    },
    /// Someone other than the authorized sender replied; the session stays.
    Unauthorized {
        /// Command owning the flow.
        command: String,
        /// Policy that decided whether a notice was sent.
        policy: UnauthorizedPolicy,
    },
}

impl SessionOutcome {
    /// State the answered session ended up in.
    pub const fn state(&self) -> SessionState {
        match self {
            Self::Chained { .. } => SessionState::ConsumedChained,
            Self::Terminal { .. } | Self::Failed { .. } => SessionState::ConsumedTerminal,
            Self::Unauthorized { .. } => SessionState::Registered,
        }
    }
}

/// Result of dispatching one inbound event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Not a command and not a reply to a live session.
    Ignored,
    /// Prefixed, but no command claims the token.
    UnknownCommand {
        /// Token as typed, lowercased.
        token: String,
    },
    /// Refused before the body ran.
    Rejected {
        /// Command name.
        command: String,
        /// Why.
        rejection: Rejection,
    },
    /// The body ran.
    Executed {
        /// Command name.
        command: String,
        /// How it went.
        outcome: Outcome,
    },
    /// The pipeline could not decide, e.g. the role directory failed.
    Aborted {
        /// Command name.
        command: String,
        /// What went wrong.
        reason: String,
    },
    /// The event answered a reply session.
    Session(SessionOutcome),
}

/// Owns every piece of dispatch state. Cheap to share behind an `Arc`.
pub struct Dispatcher {
    config: Arc<ConfigCache>,
    commands: Arc<CommandRegistry>,
    cooldowns: Arc<CooldownLedger>,
    sessions: Arc<SessionRegistry>,
    executor: Executor,
    notices: Notices,
    messenger: Arc<dyn Messenger>,
    directory: Arc<dyn RoleDirectory>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("commands", &self.commands.len())
            .field("cooldowns", &self.cooldowns.len())
            .field("sessions", &self.sessions)
            .field("notices", &self.notices)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Starts building a dispatcher around `config`.
    pub fn builder(config: impl Into<Arc<ConfigCache>>) -> DispatcherBuilder {
        DispatcherBuilder::new(config.into())
    }

    /// Live configuration.
    pub fn config(&self) -> Arc<Config> {
        self.config.get()
    }

    /// Registered commands.
    pub const fn commands(&self) -> &Arc<CommandRegistry> {
        &self.commands
    }

    /// Cooldown ledger.
    pub const fn cooldowns(&self) -> &Arc<CooldownLedger> {
        &self.cooldowns
    }

    /// Reply-session registry.
    pub const fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    /// Starts the session expiry task and, if configured, the cooldown sweeper.
    pub fn spawn_background(&self, shutdown: &CancellationToken) -> Vec<JoinHandle<()>> {
        let mut handles = vec![self.sessions.spawn_expiry(shutdown.child_token())];
        if let Some(interval) = self.config.get().cooldown.sweep_interval() {
            handles.push(self.cooldowns.spawn_sweeper(interval, shutdown.child_token()));
        }
        info!(tasks = handles.len(), "Background tasks started");
        handles
    }

    /// Routes one inbound event.
    ///
    /// A reply quoting a live session goes to that session. A reply quoting
    /// an absent or expired session is treated like any other message.
    #[instrument(skip(self, event), fields(id = %event.id, chat = %event.chat_id, sender = %event.sender_id))]
    pub async fn dispatch(&self, event: InboundEvent) -> DispatchOutcome {
        let event = Arc::new(event);
        let config = self.config.get();

        if let Some(quoted) = event.quoted_message_id() {
            let key = self.sessions.key_for(&event.chat_id, quoted);
            match self.sessions.claim(&key, &event.sender_id) {
                Claim::Absent => {}
                Claim::Unauthorized { command, policy } => {
                    if policy == UnauthorizedPolicy::Notify {
                        self.notify(&event, &Notice::SessionNotYours).await;
                    }
                    return DispatchOutcome::Session(SessionOutcome::Unauthorized { command, policy });
                }
                Claim::Granted(session) => {
                    return DispatchOutcome::Session(self.continue_session(&config, Arc::clone(&event), session).await);
                }
            }
        }

        let Some(invocation) = parse_invocation(&event.text, &config.bot.prefixes) else {
            return DispatchOutcome::Ignored;
        };

        let Some(command) = self.commands.resolve(&invocation.token) else {
            debug!(token = %invocation.token, "Unknown command");
            if config.bot.notify_unknown_command {
                let notice = Notice::UnknownCommand {
                    name: invocation.token.clone(),
                    prefix: invocation.prefix.clone(),
                };
                self.notify(&event, &notice).await;
            }
            return DispatchOutcome::UnknownCommand { token: invocation.token };
        };
        let name = command.name().to_string();

        let roles = match self.directory.lookup(&event).await {
            Ok(mut roles) => {
                roles.owner |= config.bot.is_owner(&event.sender_id);
                roles.sudo |= config.bot.is_sudo(&event.sender_id);
                roles
            }
            Err(err) => {
                error!(command = %name, error = %err, "Role lookup failed");
                self.notify(&event, &Notice::ExecutionFailed { command: name.clone() }).await;
                return DispatchOutcome::Aborted {
                    command: name,
                    reason: err.to_string(),
                };
            }
        };

        if let Err(rejection) = self.admit(&config, &command, &event, &roles, &invocation.args) {
            self.notify(&event, &rejection_notice(&command, &rejection)).await;
            return DispatchOutcome::Rejected {
                command: name,
                rejection,
            };
        }

        let cooldown = command
            .declared_cooldown()
            .unwrap_or_else(|| config.cooldown.default_cooldown());
        if !(roles.owner && config.cooldown.owners_exempt) {
            self.cooldowns.touch(&event.sender_id, &name, cooldown);
        }

        let scope = SessionScope::new(
            Arc::clone(&self.sessions),
            command.supports(Capability::Reply),
            config.sessions.default_policy,
        );
        let conversation = Conversation::new(Arc::clone(&event), name.clone(), Arc::clone(&self.messenger), scope);
        let ctx = CommandContext::new(conversation, invocation, roles);

        let outcome = self.executor.run(&command, ctx).await;
        if !outcome.is_success() {
            self.notify(&event, &Notice::ExecutionFailed { command: name.clone() }).await;
        }
        DispatchOutcome::Executed { command: name, outcome }
    }

    /// Gate, cooldown and arity, in that order.
    fn admit(
        &self,
        config: &Config,
        command: &Command,
        event: &InboundEvent,
        roles: &RoleFlags,
        args: &[String],
    ) -> Result<(), Rejection> {
        let gate = AuthorizationGate::new(config.bot.whitelist_mode);
        let input = GateInput {
            roles: *roles,
            is_group: event.is_group_chat,
        };
        if let Decision::Denied(reason) = gate.evaluate(command, &input) {
            return Err(Rejection::AuthorizationDenied(reason));
        }

        if !(roles.owner && config.cooldown.owners_exempt) {
            let remaining = self.cooldowns.check(&event.sender_id, command.name());
            if !remaining.is_zero() {
                debug!(command = command.name(), remaining_ms = remaining.as_millis(), "Rate limited");
                return Err(Rejection::RateLimited { remaining });
            }
        }

        validate(command, args).map_err(|err| {
            debug!(command = command.name(), error = %err, "Invalid arguments");
            Rejection::Validation(err)
        })
    }

    async fn continue_session(
        &self,
        config: &Config,
        event: Arc<InboundEvent>,
        session: ReplySession,
    ) -> SessionOutcome {
        let command = session.command().to_string();
        debug!(command = %command, "Reply session claimed");

        // a session only exists if its command could register one
        let scope = SessionScope::new(Arc::clone(&self.sessions), true, config.sessions.default_policy);
        let terminal = config.sessions.is_terminal_keyword(&event.text);
        let conversation = Conversation::new(
            Arc::clone(&event),
            command.clone(),
            Arc::clone(&self.messenger),
            scope.clone(),
        );
        let ctx = ReplyContext::new(
            conversation,
            session.session_metadata().cloned(),
            session.created_at(),
            terminal,
        );

        let handler = Arc::clone(session.handler());
        let outcome = self
            .executor
            .guard(&command, &event.sender_id, ExecutionKind::Reply, async move {
                handler.on_reply(ctx).await
            })
            .await;

        let result = match outcome {
            Outcome::Failed { error, .. } => {
                self.notify(&event, &Notice::SessionFailed).await;
                SessionOutcome::Failed { command, error }
            }
            Outcome::Completed { .. } => match scope.registered().pop() {
                Some(next) => SessionOutcome::Chained { command, next },
                None => SessionOutcome::Terminal { command },
            },
        };
        debug!(state = ?result.state(), "Reply session consumed");
        result
    }

    /// Sends `notice` quoting `event`. Delivery failures are logged, never raised.
    async fn notify(&self, event: &InboundEvent, notice: &Notice) {
        let text = self.notices.render(notice);
        let message = OutboundMessage::text(text).quoting(event.id.clone());
        if let Err(err) = self.messenger.send_message(&event.chat_id, message).await {
            warn!(notice = notice.message_id(), error = %err, "Failed to deliver notice");
        }
    }
}

fn rejection_notice(command: &Command, rejection: &Rejection) -> Notice {
    let usage = command.usage_text().map(ToString::to_string);
    match rejection {
        Rejection::AuthorizationDenied(reason) => match reason {
            DenialReason::Banned => Notice::Banned,
            DenialReason::Muted => Notice::Muted,
            DenialReason::NotOwner => Notice::NotOwner,
            DenialReason::NotPremium => Notice::NotPremium,
            DenialReason::WhitelistBlocked => Notice::WhitelistBlocked,
            DenialReason::NotGroup => Notice::NotGroup,
            DenialReason::NotAdmin => Notice::NotAdmin,
            DenialReason::BotNotAdmin => Notice::BotNotAdmin,
        },
        Rejection::RateLimited { remaining } => Notice::RateLimited {
            seconds: ceil_seconds(remaining.as_millis()),
        },
        Rejection::Validation(ArgumentError::TooFewArgs { min, .. }) => Notice::TooFewArgs { min: *min, usage },
        Rejection::Validation(ArgumentError::TooManyArgs { max, .. }) => Notice::TooManyArgs { max: *max, usage },
    }
}

/// Assembles a [`Dispatcher`].
pub struct DispatcherBuilder {
    config: Arc<ConfigCache>,
    commands: Vec<Command>,
    messenger: Option<Arc<dyn Messenger>>,
    directory: Option<Arc<dyn RoleDirectory>>,
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl DispatcherBuilder {
    fn new(config: Arc<ConfigCache>) -> Self {
        Self {
            config,
            commands: Vec::new(),
            messenger: None,
            directory: None,
            metrics: None,
        }
    }

    /// Adds a command.
    #[must_use]
    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    /// Adds several commands.
    #[must_use]
    pub fn commands(mut self, commands: impl IntoIterator<Item = Command>) -> Self {
        self.commands.extend(commands);
        self
    }

    /// Sets the outbound platform.
    #[must_use]
    pub fn messenger(mut self, messenger: Arc<dyn Messenger>) -> Self {
        self.messenger = Some(messenger);
        self
    }

    /// Sets the role directory.
    #[must_use]
    pub fn directory(mut self, directory: Arc<dyn RoleDirectory>) -> Self {
        self.directory = Some(directory);
        self
    }

    /// Sets the metrics sink.
    #[must_use]
    pub fn metrics(mut self, metrics: Arc<dyn MetricsSink>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Registers every command and wires the pipeline; fails on the first bad command.
    pub fn build(self) -> Result<Dispatcher, BuildError> {
        let config = self.config.get();
        let messenger = self.messenger.ok_or(BuildError::Missing("messenger"))?;
        let directory = self.directory.ok_or(BuildError::Missing("role directory"))?;

        let mut commands = CommandRegistry::new(config.bot.capabilities.iter().copied());
        commands.register_all(self.commands)?;
        let notices = Notices::new(&config.bot.locale)?;

        info!(
            commands = commands.len(),
            prefixes = ?config.bot.prefixes,
            locale = %notices.locale(),
            "Dispatcher ready"
        );

        Ok(Dispatcher {
            sessions: Arc::new(SessionRegistry::new(SessionSettings::from(&config.sessions))),
            config: self.config,
            commands: Arc::new(commands),
            cooldowns: Arc::new(CooldownLedger::new()),
            executor: Executor::new(self.metrics),
            notices,
            messenger,
            directory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{MockRoleDirectory, ReplyContext};
    use crate::error::CommandError;
    use crate::testing::RecordingMessenger;
    use crate::StaticDirectory;
    use chatgate_common::test_utils::chat_fixtures::{event, group, reply, user};
    use chatgate_common::ChatGateError;

    fn config() -> ConfigCache {
        ConfigCache::new(Config::default())
    }

    #[test]
    fn test_build_requires_collaborators() {
        let err = Dispatcher::builder(config()).build().unwrap_err();
        assert!(matches!(err, BuildError::Missing("messenger")));
    }

    #[test]
    fn test_build_rejects_duplicate_tokens() {
        let noop = |_ctx: CommandContext| async { Ok(()) };
        let err = Dispatcher::builder(config())
            .command(Command::from_fn("ping", noop))
            .command(Command::from_fn("pong", noop).alias("ping"))
            .messenger(Arc::new(RecordingMessenger::new()))
            .directory(Arc::new(StaticDirectory::new()))
            .build()
            .unwrap_err();
        assert!(matches!(err, BuildError::Registration(_)));
    }

    #[tokio::test]
    async fn test_directory_failure_aborts_with_notice() {
        let mut directory = MockRoleDirectory::new();
        directory
            .expect_lookup()
            .returning(|_| Err(ChatGateError::Directory("store offline".into())));
        let messenger = Arc::new(RecordingMessenger::new());
        let dispatcher = Dispatcher::builder(config())
            .command(Command::from_fn("ping", |_ctx: CommandContext| async { Ok(()) }))
            .messenger(messenger.clone())
            .directory(Arc::new(directory))
            .build()
            .unwrap();

        let outcome = dispatcher.dispatch(event(&group(), &user(), "!ping")).await;
        assert!(matches!(outcome, DispatchOutcome::Aborted { ref command, .. } if command == "ping"));
        assert_eq!(messenger.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_reply_handler_drops_session_and_notifies() {
        let messenger = Arc::new(RecordingMessenger::new());
        let quiz = Command::from_fn("quiz", |ctx: CommandContext| async move {
            let session = ctx.session(|_reply: ReplyContext| async { Err::<(), _>(CommandError::other("scoring failed")) });
            ctx.ask("2 + 2?", session).await?;
            Ok(())
        })
        .capability(Capability::Reply);
        let dispatcher = Dispatcher::builder(config())
            .command(quiz)
            .messenger(messenger.clone())
            .directory(Arc::new(StaticDirectory::new()))
            .build()
            .unwrap();

        dispatcher.dispatch(event(&group(), &user(), "!quiz")).await;
        let prompt = messenger.last_id().unwrap();

        let outcome = dispatcher.dispatch(reply(&group(), &user(), prompt.as_str(), "4")).await;
        assert!(matches!(
            outcome,
            DispatchOutcome::Session(SessionOutcome::Failed { ref error, .. }) if error == "scoring failed"
        ));
        assert!(dispatcher.sessions().is_empty());
        assert_eq!(messenger.sent().len(), 2);
    }

    #[tokio::test]
    async fn test_plain_text_is_ignored() {
        let messenger = Arc::new(RecordingMessenger::new());
        let dispatcher = Dispatcher::builder(config())
            .messenger(messenger.clone())
            .directory(Arc::new(StaticDirectory::new()))
            .build()
            .unwrap();

        assert_eq!(dispatcher.dispatch(event(&group(), &user(), "hello")).await, DispatchOutcome::Ignored);
        assert_eq!(
            dispatcher.dispatch(event(&group(), &user(), "!nope")).await,
            DispatchOutcome::UnknownCommand { token: "nope".into() }
        );
        assert!(messenger.sent().is_empty(), "unknown commands are silent by default");
    }
}
