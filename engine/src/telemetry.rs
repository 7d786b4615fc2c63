//! Telemetry and Observability
//!
//! Sets up `tracing-subscriber` for structured logging. The filter comes from
//! `RUST_LOG` when set, otherwise from the configured level. Debug builds
//! print human-readable lines; release builds emit JSON with the current span.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive for a level, applied to dependencies and the engine alike
pub fn default_directive(log_level: &str) -> String {
    format!("{},uchronia_engine={}", log_level, log_level)
}

/// Initialize the global subscriber.
///
/// Only the first call installs a subscriber; later calls are ignored.
pub fn init_telemetry_with_level(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().pretty().with_target(false))
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
            .ok();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive_parses() {
        let directive = default_directive("debug");
        assert_eq!(directive, "debug,uchronia_engine=debug");
        assert!(EnvFilter::try_new(directive).is_ok());
    }
}
