use std::collections::HashSet;

use tracing::warn;

/// Exact-match allowlist check for a provider subpath.
///
/// `subpath` is compared without its leading slash; no prefix or glob matching.
pub fn permit(subpath: &str, allowlist: &HashSet<String>) -> bool {
    let allowed = allowlist.contains(subpath);
    if !allowed {
        warn!("[Proxy] Forbidden subpath requested: {}", subpath);
    }
    allowed
}

/// Normalize the `*path` capture of a route into the allowlist's form.
pub fn normalize_subpath(raw: &str) -> &str {
    raw.trim_start_matches('/')
}
