//! Tracing subscriber setup shared by binaries and test suites.

pub mod subscriber;

pub use subscriber::{LogFormat, ObservabilityConfig, init_for_tests, init_with};

/// Initialize process-wide logging: JSON lines, filtered by `RUST_LOG`
/// (default `info`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    init_with(&ObservabilityConfig::default());
}
