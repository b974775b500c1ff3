//! # ChatGate Bot
//!
//! A console chat bot built on the ChatGate dispatch core.
//!
//! Messages are read from standard input, dispatched through the command
//! pipeline, and answers are printed with the ids a real platform would issue,
//! so reply sessions can be exercised by quoting those ids.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod bot;
pub mod builtin;
pub mod console;
pub mod error;
pub mod logging;

pub use bot::*;
pub use console::*;
pub use error::*;
pub use logging::*;
