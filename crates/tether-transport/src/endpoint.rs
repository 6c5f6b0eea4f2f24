//! Endpoint URL derivation.

/// Append `query` to `url` when it is non-empty.
#[must_use]
pub fn full_url(url: &str, query: &str) -> String {
    if query.is_empty() {
        url.to_string()
    } else {
        format!("{url}?{query}")
    }
}

/// Rewrite an `http`/`https` URL to the matching `ws`/`wss` scheme.
///
/// URLs in any other scheme are returned unchanged.
#[must_use]
pub fn socket_url(url: &str) -> String {
    match url.strip_prefix("http") {
        Some(rest) => format!("ws{rest}"),
        None => url.to_string(),
    }
}
