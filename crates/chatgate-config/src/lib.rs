//! # ChatGate Config
//!
//! Type-safe configuration management for ChatGate.
//!
//! This crate provides configuration loading from TOML or YAML, environment
//! overrides, validation, and lock-free caching of the live configuration.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod cache;
pub mod defaults;
pub mod loader;
pub mod schema;
pub mod validator;

pub use cache::*;
pub use loader::*;
pub use schema::*;
pub use validator::*;
