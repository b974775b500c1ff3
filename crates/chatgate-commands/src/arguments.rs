//! Arity checking against a command's declared bounds.

use crate::command::Command;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Declared argument bounds of a command. Both bounds are inclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgBounds {
    /// Explicit minimum, if declared.
    pub min: Option<usize>,
    /// Explicit maximum, if declared; `None` is unbounded.
    pub max: Option<usize>,
    /// The command needs arguments but did not say how many.
    pub required: bool,
}

impl ArgBounds {
    /// No arguments accepted.
    pub const NONE: Self = Self {
        min: Some(0),
        max: Some(0),
        required: false,
    };

    /// Exactly `n` arguments.
    pub const fn exactly(n: usize) -> Self {
        Self {
            min: Some(n),
            max: Some(n),
            required: n > 0,
        }
    }

    /// Between `min` and `max` arguments.
    pub const fn between(min: usize, max: usize) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            required: min > 0,
        }
    }

    /// The minimum that is actually enforced: an explicit minimum wins,
    /// otherwise `required` means at least one.
    pub fn effective_min(&self) -> usize {
        self.min.unwrap_or(usize::from(self.required))
    }
}

/// Argument count outside the command's bounds.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentError {
    /// Fewer arguments than the minimum.
    #[error("expected at least {min} argument(s), got {given}")]
    TooFewArgs {
        /// Minimum accepted.
        min: usize,
        /// Number supplied.
        given: usize,
    },
    /// More arguments than the maximum.
    #[error("expected at most {max} argument(s), got {given}")]
    TooManyArgs {
        /// Maximum accepted.
        max: usize,
        /// Number supplied.
        given: usize,
    },
}

/// Checks `args` against the command's bounds.
pub fn validate(command: &Command, args: &[String]) -> Result<(), ArgumentError> {
    validate_count(command.arg_bounds(), args.len())
}

/// Checks an argument count against bounds.
pub fn validate_count(bounds: ArgBounds, given: usize) -> Result<(), ArgumentError> {
    let min = bounds.effective_min();
    if given < min {
        return Err(ArgumentError::TooFewArgs { min, given });
    }
    if let Some(max) = bounds.max {
        if given > max {
            return Err(ArgumentError::TooManyArgs { max, given });
        }
    }
    Ok(())
}
