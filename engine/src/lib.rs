//! Uchronia Engine Library
//!
//! Alternate-history invention simulator: decomposes an invention, simulates
//! how it could have emerged in another era, and illustrates, narrates and
//! packages the results. Used by the `uchronia` binary and integration tests.

/// Configuration management module
pub mod config;

/// Credential lookup and secret scrubbing
pub mod secrets;

/// In-memory TTL cache for generated results
pub mod cache;

/// Prompt templates
pub mod prompts;

/// AI provider adapters and the fallback router
pub mod llm;

/// Tolerant JSON extraction from model output
pub mod coercion;

/// Content moderation
pub mod moderation;

/// Rate limiting module
pub mod rate_limiter;

/// Generation pipeline
pub mod service;

/// Slide deck export
pub mod export;

/// HTTP API
pub mod server;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Command handlers module
pub mod handlers;
