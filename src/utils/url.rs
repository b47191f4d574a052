//! Building backend endpoint URLs.
//!
//! Fixed endpoint paths are joined onto the configured base URL as text.
//! Anything the server hands back, such as a call id, goes through
//! [`endpoint_url_with_segments`] so it lands in exactly one escaped path
//! segment.

use reqwest::Url;

/// Joins `endpoint` onto `base_url` with exactly one slash between them.
///
/// ```
/// use mcp_inspector::utils::url::endpoint_url;
///
/// assert_eq!(
///     endpoint_url("http://127.0.0.1:8080/api/", "/inspector/calls"),
///     "http://127.0.0.1:8080/api/inspector/calls"
/// );
/// ```
pub fn endpoint_url(base_url: &str, endpoint: &str) -> String {
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    )
}

/// Like [`endpoint_url`], then appends each of `segments` as its own
/// percent-encoded path segment.
pub fn endpoint_url_with_segments(
    base_url: &str,
    endpoint: &str,
    segments: &[&str],
) -> Result<Url, String> {
    let mut url = Url::parse(&endpoint_url(base_url, endpoint))
        .map_err(|err| format!("Invalid backend URL '{base_url}': {err}"))?;
    url.path_segments_mut()
        .map_err(|_| format!("Backend URL '{base_url}' cannot carry a path"))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
