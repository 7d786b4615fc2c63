//! Uchronia SDK
//!
//! Shared types and errors for Uchronia components.
//! This crate is used by the engine library, its binary, and tests.

/// Error types and handling
pub mod errors;

/// Generation result types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, EngineErrorExt};
pub use types::{
    Component, Decomposition, GeneratedImage, Pathway, Prerequisite, Simulation,
    PLACEHOLDER_MARKER,
};
