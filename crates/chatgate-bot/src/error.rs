//! Application-wide error types using thiserror.

use chatgate_commands::BuildError;
use chatgate_common::ChatGateError;

/// Main application error type.
#[derive(thiserror::Error, Debug)]
pub enum BotError {
    /// Configuration or platform error.
    #[error(transparent)]
    Common(#[from] ChatGateError),

    /// The dispatcher could not be assembled.
    #[error("Startup error: {0}")]
    Build(#[from] BuildError),

    /// The log subscriber could not be installed.
    #[error("Logging error: {0}")]
    Logging(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for the bot application.
pub type BotResult<T> = Result<T, BotError>;
