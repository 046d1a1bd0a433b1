use std::time::Duration;

use regex::Regex;
use url::Url;

use crate::core::error::HunterError;
use crate::core::fetcher::Fetcher;
use crate::core::types::SearchResult;
use crate::sources::standard::{backend_error, build_query_url, parse_results};
use crate::sources::{SearchBackend, TokenSpec};

/// Two-step query: fetch the landing page for a one-time token, then search with it.
pub async fn query_token_based(
    fetcher: &dyn Fetcher,
    backend: &SearchBackend,
    spec: &TokenSpec,
    query: &str,
    max_results: usize,
    timeout: Duration,
) -> Result<Vec<SearchResult>, HunterError> {
    let home = build_query_url(&backend.base_url, &spec.home_path, query)?;
    let landing = fetcher
        .fetch(home.as_str(), timeout)
        .await
        .map_err(|e| backend_error(backend, e))?;
    let token = extract_token(&landing, &spec.token_pattern)
        .map_err(|e| backend_error(backend, e))?;
    tracing::debug!(backend = %backend.id, "session token acquired");

    let search = token_search_url(&backend.base_url, spec, query, &token)?;
    let html = fetcher
        .fetch(search.as_str(), timeout)
        .await
        .map_err(|e| backend_error(backend, e))?;
    parse_results(
        &html,
        &search,
        &spec.selectors,
        &spec.redirect,
        &backend.id,
        max_results,
    )
}

pub fn extract_token(landing_html: &str, pattern: &str) -> Result<String, HunterError> {
    let re = Regex::new(pattern)
        .map_err(|e| HunterError::Config(format!("token pattern {:?}: {}", pattern, e)))?;
    re.captures(landing_html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| HunterError::Parse("session token not found on landing page".to_string()))
}

pub fn token_search_url(
    base_url: &str,
    spec: &TokenSpec,
    query: &str,
    token: &str,
) -> Result<Url, HunterError> {
    let mut url = build_query_url(base_url, &spec.search_path, query)?;
    url.query_pairs_mut().append_pair(&spec.token_param, token);
    Ok(url)
}
