//! Tracing/logging setup shared by applications and tests using the mapper.

/// Initialize process-wide tracing (`RUST_LOG` filter, `MONGOMAP_LOG_FORMAT` format).
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize compact tracing output captured by the test harness.
pub fn init_for_tests() {
    tracing::init_for_tests();
}

/// Tracing configuration (filters, formats).
pub mod tracing;

pub use tracing::{LogFormat, init_with};
