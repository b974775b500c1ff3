//! In-process execution metrics.

use crate::executor::{ExecutionKind, ExecutionRecord, MetricsSink};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

/// Aggregated metrics for a specific command
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandMetrics {
    /// Command name
    pub command: String,
    /// Total number of executions, command bodies and reply handlers together
    pub total_executions: u64,
    /// Number of successful executions
    pub successful_executions: u64,
    /// Number of failed executions
    pub failed_executions: u64,
    /// How many of the executions were reply handlers
    pub reply_executions: u64,
    /// Average execution time in milliseconds
    pub avg_duration_ms: f64,
    /// Minimum execution time in milliseconds
    pub min_duration_ms: u64,
    /// Maximum execution time in milliseconds
    pub max_duration_ms: u64,
    /// Most recent execution timestamp
    pub last_execution: Option<DateTime<Utc>>,
    /// Most recent error message
    pub last_error: Option<String>,
}

impl CommandMetrics {
    fn new(command: &str) -> Self {
        Self {
            command: command.to_string(),
            total_executions: 0,
            successful_executions: 0,
            failed_executions: 0,
            reply_executions: 0,
            avg_duration_ms: 0.0,
            min_duration_ms: 0,
            max_duration_ms: 0,
            last_execution: None,
            last_error: None,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn apply(&mut self, record: &ExecutionRecord) {
        let duration_ms = u64::try_from(record.duration.as_millis()).unwrap_or(u64::MAX);
        let previous = self.total_executions;

        self.total_executions += 1;
        if record.success {
            self.successful_executions += 1;
        } else {
            self.failed_executions += 1;
            self.last_error.clone_from(&record.error);
        }
        if record.kind == ExecutionKind::Reply {
            self.reply_executions += 1;
        }

        self.avg_duration_ms =
            self.avg_duration_ms.mul_add(previous as f64, duration_ms as f64) / self.total_executions as f64;
        self.min_duration_ms = if previous == 0 {
            duration_ms
        } else {
            self.min_duration_ms.min(duration_ms)
        };
        self.max_duration_ms = self.max_duration_ms.max(duration_ms);
        self.last_execution = Some(record.timestamp);
    }

    /// Success rate as percentage
    #[allow(clippy::cast_precision_loss)]
    pub fn success_rate(&self) -> f64 {
        if self.total_executions == 0 {
            0.0
        } else {
            (self.successful_executions as f64 / self.total_executions as f64) * 100.0
        }
    }
}

/// Thread-safe per-command counters fed by the executor.
#[derive(Debug, Default)]
pub struct ExecutionMetrics {
    command_metrics: DashMap<String, CommandMetrics>,
    total_executions: AtomicU64,
    total_successes: AtomicU64,
    total_failures: AtomicU64,
}

impl ExecutionMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Get metrics for a specific command
    pub fn get_command_metrics(&self, command: &str) -> Option<CommandMetrics> {
        self.command_metrics.get(command).map(|m| m.clone())
    }

    /// Metrics for every command, sorted by name
    pub fn snapshot(&self) -> Vec<CommandMetrics> {
        let mut all: Vec<CommandMetrics> = self
            .command_metrics
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.command.cmp(&b.command));
        all
    }

    /// Get global execution counts as (total, successes, failures)
    pub fn get_global_counts(&self) -> (u64, u64, u64) {
        (
            self.total_executions.load(Ordering::Relaxed),
            self.total_successes.load(Ordering::Relaxed),
            self.total_failures.load(Ordering::Relaxed),
        )
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.command_metrics.clear();
        self.total_executions.store(0, Ordering::Relaxed);
        self.total_successes.store(0, Ordering::Relaxed);
        self.total_failures.store(0, Ordering::Relaxed);
    }
}

impl MetricsSink for ExecutionMetrics {
    fn record_execution(&self, record: ExecutionRecord) {
        self.total_executions.fetch_add(1, Ordering::Relaxed);
        if record.success {
            self.total_successes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.total_failures.fetch_add(1, Ordering::Relaxed);
        }

        self.command_metrics
            .entry(record.command.clone())
            .or_insert_with(|| CommandMetrics::new(&record.command))
            .apply(&record);

        trace!(
            command = %record.command,
            sender = %record.sender,
            success = record.success,
            duration_ms = record.duration.as_millis(),
            "Recorded execution"
        );
    }
}
