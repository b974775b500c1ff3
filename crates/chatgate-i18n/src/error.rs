//! Error types for the localization layer.

use thiserror::Error;

/// Result type alias for i18n operations.
pub type I18nResult<T> = Result<T, I18nError>;

/// Errors raised while loading or formatting Fluent resources.
#[derive(Error, Debug)]
pub enum I18nError {
    /// The locale code is not a valid BCP-47 language identifier.
    #[error("Invalid locale '{locale}'")]
    InvalidLocale {
        /// The rejected code.
        locale: String,
    },

    /// The Fluent source failed to parse or clashes with existing messages.
    #[error("Failed to load Fluent resource for '{locale}': {errors:?}")]
    Resource {
        /// Locale the resource was added to.
        locale: String,
        /// Parser or bundle errors.
        errors: Vec<String>,
    },

    /// No bundle defines the message.
    #[error("Message '{key}' not found")]
    MessageNotFound {
        /// Fluent message id.
        key: String,
    },

    /// The message exists but formatting reported errors.
    #[error("Failed to format message '{key}': {errors:?}")]
    Format {
        /// Fluent message id.
        key: String,
        /// Formatter errors.
        errors: Vec<String>,
    },
}
