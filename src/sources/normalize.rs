use url::Url;

/// Canonical dedup key for a discovered link.
///
/// Drops the scheme, fragment, default port and a leading `www.`, lowercases
/// the host and trims trailing slashes; the query string is kept. Anything that
/// is not an absolute http(s) URL yields `None`.
pub fn normalize_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = domain_of(&parsed)?;
    let mut key = host;
    if let Some(port) = parsed.port() {
        key.push_str(&format!(":{}", port));
    }
    let path = parsed.path().trim_end_matches('/');
    key.push_str(path);
    if let Some(query) = parsed.query().filter(|q| !q.is_empty()) {
        key.push('?');
        key.push_str(query);
    }
    Some(key)
}

/// Lowercased Unicode host without a leading `www.`.
///
/// `Url` stores internationalized hosts as punycode; they are decoded so
/// look-alike scripts reach the detectors as written.
pub fn domain_of(url: &Url) -> Option<String> {
    let host = url.host_str()?.trim_end_matches('.');
    if host.is_empty() {
        return None;
    }
    let host = unicode_host(host).to_lowercase();
    Some(host.strip_prefix("www.").map(str::to_string).unwrap_or(host))
}

/// Decodes `xn--` labels; a label that fails to decode is kept as-is.
fn unicode_host(host: &str) -> String {
    if !host.split('.').any(|label| label.starts_with("xn--")) {
        return host.to_string();
    }
    let (decoded, result) = idna::domain_to_unicode(host);
    match result {
        Ok(()) => decoded,
        Err(_) => host.to_string(),
    }
}

pub fn domain_from_str(raw: &str) -> Option<String> {
    Url::parse(raw.trim()).ok().as_ref().and_then(domain_of)
}
