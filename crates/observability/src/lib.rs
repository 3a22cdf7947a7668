//! Process-wide logging setup shared by the marketplace binaries.

pub mod tracing;

pub use tracing::LogFormat;

/// Initialize logging with the format named by `BAZAAR_LOG_FORMAT` (JSON by default).
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    let format = std::env::var("BAZAAR_LOG_FORMAT")
        .ok()
        .and_then(|v| LogFormat::parse(&v))
        .unwrap_or_default();
    tracing::init(format);
}
