use std::time::Duration;

use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::core::error::HunterError;
use crate::core::fetcher::Fetcher;
use crate::core::time::now_utc;
use crate::core::types::SearchResult;
use crate::sources::normalize::domain_of;
use crate::sources::{RedirectRules, ResultSelectors, SearchBackend, SelectorSpec};

pub async fn query_standard(
    fetcher: &dyn Fetcher,
    backend: &SearchBackend,
    spec: &SelectorSpec,
    query: &str,
    max_results: usize,
    timeout: Duration,
) -> Result<Vec<SearchResult>, HunterError> {
    let url = build_query_url(&backend.base_url, &spec.query_path, query)?;
    let html = fetcher
        .fetch(url.as_str(), timeout)
        .await
        .map_err(|e| backend_error(backend, e))?;
    parse_results(
        &html,
        &url,
        &spec.selectors,
        &spec.redirect,
        &backend.id,
        max_results,
    )
}

pub(crate) fn backend_error(backend: &SearchBackend, err: impl std::fmt::Display) -> HunterError {
    HunterError::Backend {
        backend: backend.id.clone(),
        reason: err.to_string(),
    }
}

/// `base_url` + `path_template` with `{query}` replaced by the form-encoded query.
pub fn build_query_url(base_url: &str, path_template: &str, query: &str) -> Result<Url, HunterError> {
    let encoded: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    let path = path_template.replace("{query}", &encoded);
    let joined = format!("{}{}", base_url.trim_end_matches('/'), path);
    Url::parse(&joined).map_err(|e| HunterError::Config(format!("bad backend url {}: {}", joined, e)))
}

/// Pull organic results out of a result page, at most `limit` rows.
pub fn parse_results(
    html: &str,
    page_url: &Url,
    selectors: &ResultSelectors,
    redirect: &RedirectRules,
    backend_id: &str,
    limit: usize,
) -> Result<Vec<SearchResult>, HunterError> {
    let result_sel = parse_selector(&selectors.result)?;
    let container_sel = selectors.container.as_deref().map(parse_selector).transpose()?;
    let description_sel = selectors
        .description
        .as_deref()
        .map(parse_selector)
        .transpose()?;

    let backend_host = domain_of(page_url);
    let document = Html::parse_document(html);
    let mut rows = Vec::new();
    for anchor in document.select(&result_sel) {
        if rows.len() >= limit {
            break;
        }
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(target) = resolve_href(href, page_url, redirect) else {
            continue;
        };
        let target_host = Url::parse(&target).ok().as_ref().and_then(domain_of);
        if target_host.is_none() || target_host == backend_host {
            continue;
        }

        let container = container_sel.as_ref().and_then(|sel| {
            anchor
                .ancestors()
                .filter_map(ElementRef::wrap)
                .find(|el| sel.matches(el))
        });
        let description = match (container, description_sel.as_ref()) {
            (Some(row), Some(sel)) => row.select(sel).next().map(collapse_text),
            (Some(row), None) => Some(collapse_text(row)),
            (None, _) => None,
        };

        rows.push(SearchResult {
            url: target,
            title: collapse_text(anchor),
            description: description.unwrap_or_default(),
            source_backend: backend_id.to_string(),
            found_at: now_utc(),
        });
    }
    Ok(rows)
}

/// Absolute http(s) target of a result link, unwrapping redirect wrappers.
pub fn resolve_href(href: &str, page_url: &Url, redirect: &RedirectRules) -> Option<String> {
    let joined = page_url.join(href.trim()).ok()?;

    if let Some(param) = redirect.param.as_deref() {
        if let Some((_, value)) = joined.query_pairs().find(|(k, _)| k == param) {
            return absolute_web_url(&value);
        }
    }
    if let Some(prefix) = redirect.address_prefix.as_deref() {
        if let Some(rest) = joined.path().strip_prefix(prefix) {
            let host = rest.split('/').next().unwrap_or_default();
            if !host.is_empty() {
                return absolute_web_url(host);
            }
        }
    }
    matches!(joined.scheme(), "http" | "https").then(|| joined.to_string())
}

fn absolute_web_url(target: &str) -> Option<String> {
    let target = target.trim();
    let candidate = if target.starts_with("http://") || target.starts_with("https://") {
        target.to_string()
    } else {
        format!("https://{}", target.trim_start_matches("//"))
    };
    let parsed = Url::parse(&candidate).ok()?;
    parsed.host_str()?;
    Some(parsed.to_string())
}

fn parse_selector(raw: &str) -> Result<Selector, HunterError> {
    Selector::parse(raw).map_err(|e| HunterError::Parse(format!("selector {:?}: {:?}", raw, e)))
}

fn collapse_text(el: ElementRef<'_>) -> String {
    el.text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <div class="results">
          <div class="result">
            <a class="result__a" href="https://acme-login.example/signin">Acme   Login</a>
            <span class="result__snippet">Sign in to your Acme account</span>
          </div>
          <div class="result">
            <a class="result__a" href="/l/?uddg=https%3A%2F%2Facmme.example%2F&rut=x">Acmme</a>
            <span class="result__snippet">Fast payments</span>
          </div>
          <div class="result">
            <a class="result__a" href="/settings">Settings</a>
          </div>
          <div class="result">
            <a class="result__a" href="https://third.example/">Third</a>
          </div>
        </div>"#;

    fn selectors() -> ResultSelectors {
        ResultSelectors {
            result: "a.result__a".into(),
            container: Some("div.result".into()),
            description: Some(".result__snippet".into()),
        }
    }

    #[test]
    fn parses_rows_with_descriptions_and_redirects() {
        let page = Url::parse("https://search.example/html/?q=acme").unwrap();
        let redirect = RedirectRules {
            param: Some("uddg".into()),
            address_prefix: None,
        };
        let rows = parse_results(PAGE, &page, &selectors(), &redirect, "ddg", 10).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].url, "https://acme-login.example/signin");
        assert_eq!(rows[0].title, "Acme Login");
        assert_eq!(rows[0].description, "Sign in to your Acme account");
        assert_eq!(rows[0].source_backend, "ddg");
        assert_eq!(rows[1].url, "https://acmme.example/");
        assert_eq!(rows[2].description, "");
    }

    #[test]
    fn result_cap_is_respected() {
        let page = Url::parse("https://search.example/html/").unwrap();
        let rows = parse_results(PAGE, &page, &selectors(), &RedirectRules::default(), "ddg", 1)
            .unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn invalid_selector_is_a_parse_error() {
        let page = Url::parse("https://search.example/").unwrap();
        let bad = ResultSelectors {
            result: "a[[".into(),
            container: None,
            description: None,
        };
        let err = parse_results(PAGE, &page, &bad, &RedirectRules::default(), "x", 5).unwrap_err();
        assert!(matches!(err, HunterError::Parse(_)));
    }

    #[test]
    fn address_path_form_resolves_to_host() {
        let page = Url::parse("https://flagship.example/search").unwrap();
        let rules = RedirectRules {
            param: None,
            address_prefix: Some("/address/".into()),
        };
        assert_eq!(
            resolve_href("/address/acme-secure.example", &page, &rules).as_deref(),
            Some("https://acme-secure.example/")
        );
    }

    #[test]
    fn query_url_encodes_terms() {
        let url = build_query_url("https://search.example/", "/html/?q={query}", "acme login").unwrap();
        assert_eq!(url.as_str(), "https://search.example/html/?q=acme+login");
    }
}
