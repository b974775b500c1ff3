//! # ChatGate I18n
//!
//! Localized rendering of every notice the dispatcher sends back to a chat.
//!
//! Notices are Fluent messages. The `en-US` resource is embedded at compile
//! time and always available; other locales can be added at runtime and fall
//! back to `en-US` for anything they do not define.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod bundle;
pub mod error;
pub mod notice;

pub use bundle::*;
pub use error::*;
pub use notice::*;
