//! Failure-isolating wrapper around command bodies and reply handlers.

use crate::command::Command;
use crate::context::CommandContext;
use crate::error::CommandError;
use chatgate_common::Jid;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// What was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    /// A command body.
    Command,
    /// A reply-session handler.
    Reply,
}

/// Result of exactly one guarded execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The body returned `Ok`.
    Completed {
        /// Wall time spent in the body.
        duration: Duration,
    },
    /// The body returned `Err` or panicked.
    Failed {
        /// Wall time spent in the body.
        duration: Duration,
        /// Rendered error or panic message.
        error: String,
    },
}

impl Outcome {
    /// Whether the body succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }

    /// Wall time spent in the body.
    pub const fn duration(&self) -> Duration {
        match self {
            Self::Completed { duration } | Self::Failed { duration, .. } => *duration,
        }
    }
}

/// One execution as reported to a [`MetricsSink`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    /// Command name.
    pub command: String,
    /// Who triggered it.
    pub sender: Jid,
    /// Command body or reply handler.
    pub kind: ExecutionKind,
    /// When the execution finished.
    pub timestamp: DateTime<Utc>,
    /// Wall time spent in the body.
    pub duration: Duration,
    /// Whether it succeeded.
    pub success: bool,
    /// Error message if it failed.
    pub error: Option<String>,
}

/// Collector of execution records.
pub trait MetricsSink: Send + Sync {
    /// Records one finished execution.
    fn record_execution(&self, record: ExecutionRecord);
}

/// Runs bodies inside a failure boundary and reports every run.
#[derive(Clone, Default)]
pub struct Executor {
    metrics: Option<Arc<dyn MetricsSink>>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("metrics", &self.metrics.is_some())
            .finish()
    }
}

impl Executor {
    /// Creates an executor reporting to `metrics`, if any.
    pub fn new(metrics: Option<Arc<dyn MetricsSink>>) -> Self {
        Self { metrics }
    }

    /// Runs a command body.
    pub async fn run(&self, command: &Command, ctx: CommandContext) -> Outcome {
        let sender = ctx.sender().clone();
        let handler = Arc::clone(command.handler());
        self.guard(command.name(), &sender, ExecutionKind::Command, async move {
            handler.execute(ctx).await
        })
        .await
    }

    /// Awaits `body`, turning errors and panics into [`Outcome::Failed`].
    pub async fn guard<F>(&self, command: &str, sender: &Jid, kind: ExecutionKind, body: F) -> Outcome
    where
        F: Future<Output = Result<(), CommandError>> + Send,
    {
        let started = Instant::now();
        let result = AssertUnwindSafe(body).catch_unwind().await;
        let duration = started.elapsed();

        let outcome = match result {
            Ok(Ok(())) => {
                debug!(command, sender = %sender, ?kind, duration_ms = duration.as_millis(), "Execution completed");
                Outcome::Completed { duration }
            }
            Ok(Err(err)) => {
                error!(command, sender = %sender, ?kind, error = %err, "Execution failed");
                Outcome::Failed {
                    duration,
                    error: err.to_string(),
                }
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(command, sender = %sender, ?kind, panic = %message, "Execution panicked");
                Outcome::Failed {
                    duration,
                    error: format!("panicked: {message}"),
                }
            }
        };

        if let Some(metrics) = &self.metrics {
            metrics.record_execution(ExecutionRecord {
                command: command.to_string(),
                sender: sender.clone(),
                kind,
                timestamp: Utc::now(),
                duration,
                success: outcome.is_success(),
                error: match &outcome {
                    Outcome::Failed { error, .. } => Some(error.clone()),
                    Outcome::Completed { .. } => None,
                },
            });
        }
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
