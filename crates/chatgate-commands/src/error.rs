//! Error taxonomy of the dispatch pipeline.

use crate::arguments::ArgumentError;
use crate::permissions::DenialReason;
use chatgate_common::{Capability, ChatGateError};
use chatgate_i18n::I18nError;
use std::time::Duration;
use thiserror::Error;

/// Error returned by command bodies and reply handlers.
///
/// The executor catches every one of these, so they never reach the dispatcher's caller.
#[derive(Error, Debug)]
pub enum CommandError {
    /// An outbound platform call failed.
    #[error("platform error: {0}")]
    Platform(#[from] ChatGateError),

    /// The sender supplied input the command cannot use.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The command tried to use a capability it did not declare.
    #[error("command '{command}' did not declare the {capability} capability")]
    CapabilityMissing {
        /// Command name.
        command: String,
        /// The undeclared capability.
        capability: Capability,
    },

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl CommandError {
    /// Creates a generic failure.
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other(message.into())
    }
}

/// Why an invocation was refused before the command body ran.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Wrong number of arguments.
    #[error("invalid arguments: {0}")]
    Validation(#[from] ArgumentError),

    /// The authorization gate denied the request.
    #[error("authorization denied: {0}")]
    AuthorizationDenied(DenialReason),

    /// The (user, command) cooldown is still running.
    #[error("rate limited for another {}ms", remaining.as_millis())]
    RateLimited {
        /// Time until the command may run again.
        remaining: Duration,
    },
}

/// Errors raised while registering commands at startup.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// A command name is empty or contains whitespace.
    #[error("invalid command name '{0}'")]
    InvalidName(String),

    /// Two commands, or one command twice, claim the same name or alias.
    #[error("token '{token}' of command '{command}' is already claimed by '{existing}'")]
    DuplicateToken {
        /// The contested token.
        token: String,
        /// Command being registered.
        command: String,
        /// Command that already owns the token.
        existing: String,
    },

    /// Declared argument bounds are inverted.
    #[error("command '{command}' declares min_args {min} above max_args {max}")]
    InvalidArgBounds {
        /// Command name.
        command: String,
        /// Declared minimum.
        min: usize,
        /// Declared maximum.
        max: usize,
    },

    /// The command declares a capability the platform does not support.
    #[error("command '{command}' declares unsupported capability {capability}")]
    UnsupportedCapability {
        /// Command name.
        command: String,
        /// The unsupported capability.
        capability: Capability,
    },
}

/// Errors raised while assembling a [`Dispatcher`](crate::Dispatcher).
#[derive(Error, Debug)]
pub enum BuildError {
    /// A command could not be registered.
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    /// The notice bundle could not be loaded.
    #[error("failed to load notices: {0}")]
    Notices(#[from] I18nError),

    /// A required collaborator was not supplied.
    #[error("dispatcher is missing its {0}")]
    Missing(&'static str),
}
