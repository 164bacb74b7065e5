//! Tracing and logging setup shared by rolegate binaries and tests.

/// Initialize process-wide observability with the default configuration.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init(&tracing::ObservabilityConfig::default());
}

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use tracing::{ObservabilityConfig, init as init_with};
