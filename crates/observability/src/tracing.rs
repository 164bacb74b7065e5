//! Tracing/logging initialization.
//!
//! `RUST_LOG` wins over the configured default filter when it is set.

use tracing_subscriber::EnvFilter;

/// Output format and fallback filter for the process subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservabilityConfig {
    /// JSON lines when true, human-readable text otherwise.
    pub json: bool,
    /// Filter used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            json: true,
            default_filter: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// Plain-text output, for local runs and tests.
    pub fn pretty() -> Self {
        Self {
            json: false,
            ..Self::default()
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init(config: &ObservabilityConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false);

    let _ = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
}
