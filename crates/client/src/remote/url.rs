//! Base URL parsing and per-entity URL construction.

use url::Url;

/// Error type for remote base URL failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL cannot carry path segments: {0}")]
    CannotBeABase(String),
}

/// Parse the configured remote base URL.
///
/// Returns `Ok(None)` for an empty or whitespace-only input, which disables
/// the remote tier. The host is lowercased and any query or fragment dropped.
pub fn parse_base_url(input: &str) -> Result<Option<Url>, UrlError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let mut parsed = Url::parse(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }
    if parsed.cannot_be_a_base() {
        return Err(UrlError::CannotBeABase(trimmed.to_string()));
    }

    if let Some(host) = parsed.host_str().map(str::to_lowercase) {
        parsed.set_host(Some(&host)).map_err(|e| UrlError::InvalidUrl(e.to_string()))?;
    }
    parsed.set_query(None);
    parsed.set_fragment(None);

    Ok(Some(parsed))
}

/// `{base}/{entity_type}/{id}.json`, each segment percent-encoded.
pub fn entity_url(base: &Url, entity_type: &str, id: &str) -> Result<Url, UrlError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| UrlError::CannotBeABase(base.to_string()))?
        .pop_if_empty()
        .push(entity_type)
        .push(&format!("{id}.json"));
    Ok(url)
}
