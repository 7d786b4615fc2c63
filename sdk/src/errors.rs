//! Error types and handling
//!
//! This module provides the service-level error taxonomy used throughout
//! Uchronia. Every error implements the `EngineErrorExt` trait, which provides
//! a user-friendly hint and says whether retrying can help.
//!
//! # Security
//!
//! Error messages that reach a client are built from these variants only.
//! Raw provider responses are scrubbed and truncated before they are placed
//! in the `detail` field of `AllProvidersExhausted`.

use thiserror::Error;

/// Trait for Uchronia error extensions
pub trait EngineErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and never contains
    /// credentials or raw provider output.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Recoverable errors may succeed when the same request is sent again
    /// later. Validation failures are not recoverable without changing the
    /// request.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Request**: validation and moderation rejections (client errors)
/// - **Providers**: every configured provider failed
/// - **Throttling**: per-client rate limiting
/// - **Configuration**: invalid or unreadable configuration
/// - **Export**: slide deck packaging failures
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, EngineErrorExt};
///
/// let error = EngineError::Validation("Invention name is required".to_string());
/// assert!(!error.is_recoverable());
///
/// let exhausted = EngineError::AllProvidersExhausted {
///     operation: "simulate".to_string(),
///     detail: "openai: upstream returned 503".to_string(),
/// };
/// assert!(exhausted.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Request errors
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Content rejected by moderation: {0}")]
    ModerationRejected(String),

    #[error("Moderation service unavailable: {0}")]
    ModerationUnavailable(String),

    // Provider errors
    #[error("All providers failed for {operation}: {detail}")]
    AllProvidersExhausted { operation: String, detail: String },

    // Rate limiting errors
    #[error("Rate limit exceeded for {src}: {count}/{limit} requests in {window}")]
    RateLimitExceeded {
        src: String,
        count: usize,
        limit: usize,
        window: String,
    },

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Export errors
    #[error("Export failed: {0}")]
    Export(String),

    // Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Convenience constructor for validation failures
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Returns true for errors caused by the client's request
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::ModerationRejected(_) | Self::RateLimitExceeded { .. }
        )
    }
}

impl EngineErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Validation(_) => "Check the request fields and try again",
            Self::ModerationRejected(_) => "This request contains content that is not allowed",
            Self::ModerationUnavailable(_) => {
                "Content checks are temporarily unavailable. Please try again shortly"
            }
            Self::AllProvidersExhausted { .. } => {
                "All AI providers are unavailable right now. Please try again later"
            }
            Self::RateLimitExceeded { .. } => "Too many requests. Please wait before trying again",
            Self::Config(_) => "Check your config.toml file for errors",
            Self::Export(_) => "The slide deck could not be created",
            Self::Io(_) => "File system operation failed",
        }
    }

    fn is_recoverable(&self) -> bool {
        match self {
            Self::Validation(_) | Self::ModerationRejected(_) | Self::Config(_) => false,
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors() {
        assert!(EngineError::validation("empty").is_client_error());
        assert!(EngineError::ModerationRejected("term".to_string()).is_client_error());
        assert!(!EngineError::Export("zip".to_string()).is_client_error());
    }

    #[test]
    fn test_display_includes_operation() {
        let err = EngineError::AllProvidersExhausted {
            operation: "deconstruct".to_string(),
            detail: "timeout".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "All providers failed for deconstruct: timeout"
        );
    }

    #[test]
    fn test_rate_limit_hint() {
        let err = EngineError::RateLimitExceeded {
            src: "127.0.0.1".to_string(),
            count: 31,
            limit: 30,
            window: "60 seconds".to_string(),
        };
        assert!(err.is_recoverable());
        assert!(err.user_hint().contains("Too many requests"));
    }
}
