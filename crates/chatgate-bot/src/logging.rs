//! Structured logging setup.

use crate::error::{BotError, BotResult};
use chatgate_config::{LogFormat, LoggingConfig};
use std::path::Path;
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Installs the global subscriber.
///
/// `RUST_LOG` wins over `config.level`. When `config.file` is set, output goes
/// through a non-blocking file writer; keep the returned guard alive until exit
/// or buffered lines are lost.
pub fn init_logging(config: &LoggingConfig) -> BotResult<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| BotError::Logging(format!("invalid log filter '{}': {e}", config.level)))?;

    let (layer, guard) = match &config.file {
        Some(path) => {
            let directory = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let file_name = path
                .file_name()
                .ok_or_else(|| BotError::Logging(format!("log path '{}' has no file name", path.display())))?;
            let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
            (format_layer(config.format, false, writer), Some(guard))
        }
        None => (format_layer(config.format, true, std::io::stdout), None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .map_err(|e| BotError::Logging(e.to_string()))?;

    Ok(guard)
}

fn format_layer<S, W>(format: LogFormat, ansi: bool, writer: W) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let base = fmt::layer().with_target(true).with_ansi(ansi).with_writer(writer);
    match format {
        LogFormat::Pretty => base.pretty().boxed(),
        LogFormat::Compact => base.compact().boxed(),
        LogFormat::Json => base.json().with_current_span(true).boxed(),
    }
}
