//! # ChatGate Common
//!
//! Shared types, utilities, and common functionality for ChatGate.
//!
//! This crate provides the platform identifiers, the inbound event shape and
//! the workspace error type used across every other crate in the workspace.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod event;
pub mod types;
pub mod utils;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use event::*;
pub use types::*;
pub use utils::*;
