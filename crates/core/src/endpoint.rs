//! URL resolution and endpoint matching helpers

use url::Url;

/// Join a request URL onto the base URL.
///
/// Absolute `http(s)://` URLs pass through untouched; anything else is
/// appended to the base with exactly one `/` between them.
pub fn resolve_url(base_url: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        return url.to_string();
    }
    if url.is_empty() {
        return base_url.to_string();
    }
    format!("{}/{}", base_url.trim_end_matches('/'), url.trim_start_matches('/'))
}

/// Path component of a request URL after resolution against the base URL.
pub fn target_path(base_url: &str, url: &str) -> String {
    let resolved = resolve_url(base_url, url);
    match Url::parse(&resolved) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => strip_query(url).to_string(),
    }
}

/// True when `path` is `pattern` or ends with it (`/api/login` matches
/// `/login`, `/api/mylogin` does not).
pub fn path_matches(path: &str, pattern: &str) -> bool {
    let path = path.trim_end_matches('/');
    let pattern = pattern.trim_end_matches('/');
    if pattern.is_empty() {
        return false;
    }
    path == pattern || (pattern.starts_with('/') && path.ends_with(pattern))
}

/// URL without its query string or fragment.
pub fn strip_query(url: &str) -> &str {
    url.split(['?', '#']).next().unwrap_or(url)
}
