//! # ChatGate Commands
//!
//! The message-dispatch core of ChatGate.
//!
//! An inbound chat event is either a reply to a message the bot sent earlier,
//! which is routed to the [`SessionRegistry`], or a fresh command invocation,
//! which flows through the [`CommandRegistry`] resolver, the
//! [`AuthorizationGate`], the [`CooldownLedger`], argument validation and
//! finally the [`Executor`]. Command bodies continue a conversation by
//! registering a new reply session under the id of a message they send.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod arguments;
pub mod command;
pub mod context;
pub mod cooldown;
pub mod directory;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod permissions;
pub mod registry;
pub mod session;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use arguments::*;
pub use command::*;
pub use context::*;
pub use cooldown::*;
pub use directory::*;
pub use dispatcher::*;
pub use error::*;
pub use executor::*;
pub use metrics::*;
pub use permissions::*;
pub use registry::*;
pub use session::*;
