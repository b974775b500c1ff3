//! The console bot: config, dispatcher wiring and the input loop.

use crate::builtin::{self, HelpIndex};
use crate::console::{ConsoleInput, ConsoleParser};
use crate::error::BotResult;
use chatgate_commands::{DispatchOutcome, Dispatcher, ExecutionMetrics, Messenger, StaticDirectory};
use chatgate_common::Jid;
use chatgate_config::{Config, ConfigCache, ConfigLoader};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Loads the configuration file, or defaults plus environment overrides when there is none.
pub async fn load_config(path: Option<&Path>) -> BotResult<Config> {
    if let Some(path) = path {
        return Ok(ConfigLoader::new(path).load().await?);
    }

    let mut config = Config::default();
    ConfigLoader::apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    config.validate()?;
    info!("No configuration file given, using defaults");
    Ok(config)
}

/// Counters reported when the input loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Events handed to the dispatcher.
    pub dispatched: usize,
    /// Directory directives applied.
    pub directives: usize,
    /// Lines that could not be parsed.
    pub rejected_lines: usize,
    /// Dispatch or background tasks that died instead of finishing.
    pub failed_tasks: usize,
}

/// Main bot structure.
pub struct ChatGateBot {
    dispatcher: Arc<Dispatcher>,
    directory: Arc<StaticDirectory>,
    metrics: Arc<ExecutionMetrics>,
    parser: ConsoleParser,
}

impl std::fmt::Debug for ChatGateBot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatGateBot")
            .field("dispatcher", &self.dispatcher)
            .field("parser", &self.parser)
            .finish_non_exhaustive()
    }
}

impl ChatGateBot {
    /// Builds the dispatcher with the built-in commands.
    pub fn new(config: Config, messenger: Arc<dyn Messenger>, default_sender: Jid) -> BotResult<Self> {
        let directory = Arc::new(StaticDirectory::new());
        let metrics = Arc::new(ExecutionMetrics::new());
        let index = HelpIndex::default();

        let dispatcher = Dispatcher::builder(ConfigCache::new(config))
            .commands(builtin::commands(&index))
            .messenger(messenger)
            .directory(directory.clone())
            .metrics(metrics.clone())
            .build()?;
        // only ever set here
        let _ = index.set(Arc::clone(dispatcher.commands()));

        Ok(Self {
            dispatcher: Arc::new(dispatcher),
            directory,
            metrics,
            parser: ConsoleParser::new(default_sender),
        })
    }

    /// The dispatcher.
    pub const fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// The role directory console directives edit.
    pub const fn directory(&self) -> &Arc<StaticDirectory> {
        &self.directory
    }

    /// Execution metrics.
    pub const fn metrics(&self) -> &Arc<ExecutionMetrics> {
        &self.metrics
    }

    /// Reads lines until EOF or `shutdown`, dispatching each event on its own task.
    pub async fn run<R>(mut self, input: R, shutdown: CancellationToken) -> BotResult<RunSummary>
    where
        R: AsyncBufRead + Unpin,
    {
        let background = self.dispatcher.spawn_background(&shutdown);
        let mut lines = input.lines();
        let mut in_flight = JoinSet::new();
        let mut summary = RunSummary::default();

        info!("Reading messages from input");
        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("Shutdown requested");
                    break;
                }
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    settle_dispatch(joined, &mut summary);
                }
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("Input closed");
                        break;
                    };
                    match self.parser.parse(&line) {
                        Ok(ConsoleInput::Event(event)) => {
                            summary.dispatched += 1;
                            let dispatcher = Arc::clone(&self.dispatcher);
                            in_flight.spawn(async move { dispatcher.dispatch(event).await });
                        }
                        Ok(ConsoleInput::Directive(directive)) => {
                            directive.apply(&self.directory);
                            summary.directives += 1;
                            info!(?directive, "Applied directive");
                        }
                        Ok(ConsoleInput::Empty) => {}
                        Err(err) => {
                            summary.rejected_lines += 1;
                            warn!(line = %line, error = %err, "Ignoring malformed line");
                        }
                    }
                }
            }
        }

        while let Some(joined) = in_flight.join_next().await {
            settle_dispatch(joined, &mut summary);
        }
        shutdown.cancel();
        for handle in background {
            if let Err(err) = handle.await {
                summary.failed_tasks += 1;
                warn!(error = %err, "Background task failed");
            }
        }

        let (total, successes, failures) = self.metrics.get_global_counts();
        info!(?summary, total, successes, failures, "Bot stopped");
        Ok(summary)
    }
}

fn settle_dispatch(joined: Result<DispatchOutcome, JoinError>, summary: &mut RunSummary) {
    match joined {
        Ok(outcome) => log_outcome(&outcome),
        Err(err) => {
            summary.failed_tasks += 1;
            warn!(error = %err, "Dispatch task failed");
        }
    }
}

fn log_outcome(outcome: &DispatchOutcome) {
    match outcome {
        DispatchOutcome::Ignored => {}
        DispatchOutcome::Executed { command, outcome } if !outcome.is_success() => {
            warn!(command = %command, ?outcome, "Command failed");
        }
        other => debug!(outcome = ?other, "Dispatched"),
    }
}
