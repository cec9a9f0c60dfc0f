//! Build and version metadata for `--version`.

use serde_json::json;

/// Version info as a single JSON line, matching what release tooling
/// expects: `{"version": ..., "commit": ..., "date": ...}`.
pub fn version_json() -> String {
    json!({
        "version": env!("CARGO_PKG_VERSION"),
        "commit": option_env!("BUILD_COMMIT").unwrap_or("unknown"),
        "date": option_env!("BUILD_DATE").unwrap_or("unknown"),
    })
    .to_string()
}
