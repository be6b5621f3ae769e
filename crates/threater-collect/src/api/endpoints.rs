//! API endpoint URL builders

use url::Url;

/// Connectivity probe target used by `check`.
pub const PROBE_PATH: &str = "/lists";

/// Join a base URL and an endpoint path.
///
/// Plain concatenation rather than [`Url::join`]: the base usually carries an
/// API prefix such as `/api/v3` that `join` would replace.
pub fn endpoint_url(base_url: &Url, endpoint_path: &str) -> String {
    let base = base_url.as_str().trim_end_matches('/');
    let path = endpoint_path.trim_start_matches('/');
    format!("{}/{}", base, path)
}

/// Percent-encode `raw` as exactly one path segment, so `/`, `?`, `#` and
/// `%` in an upstream id cannot reshape the request path.
///
/// `None` for `.` and `..`, which no encoding keeps from being resolved as
/// dot segments.
pub fn path_segment(raw: &str) -> Option<String> {
    if raw.is_empty() || raw == "." || raw == ".." {
        return None;
    }
    let mut scratch = Url::parse("http://segment.invalid/").ok()?;
    scratch.path_segments_mut().ok()?.pop_if_empty().push(raw);
    scratch.path().strip_prefix('/').map(str::to_string)
}
