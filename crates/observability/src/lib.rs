//! Process-wide tracing setup shared by the binaries and test harnesses.

/// Tracing configuration (filters, output format).
pub mod tracing;

pub use crate::tracing::LogFormat;

/// Initialize tracing with JSON output and an `info` default filter.
///
/// Safe to call multiple times; later calls are no-ops.
pub fn init() {
    tracing::init(LogFormat::Json, "info");
}
