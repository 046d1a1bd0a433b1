use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use brand_hunter::core::error::{FetchError, NetworkErrorKind};
use brand_hunter::core::fetcher::Fetcher;
use brand_hunter::sources::aggregator::{Aggregator, SearchOptions};
use brand_hunter::sources::{
    BackendKind, BackendRegistry, RedirectRules, ResultSelectors, SearchBackend, SelectorSpec,
};

/// Serves canned pages by URL prefix; `panic_on` simulates a crashing backend,
/// `slow` one that never answers in time.
#[derive(Default)]
struct CannedFetcher {
    pages: HashMap<String, String>,
    panic_on: Option<String>,
    slow: Option<String>,
}

#[async_trait]
impl Fetcher for CannedFetcher {
    async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
        if self.panic_on.as_deref().is_some_and(|p| url.starts_with(p)) {
            panic!("backend parser exploded");
        }
        if self.slow.as_deref().is_some_and(|p| url.starts_with(p)) {
            tokio::time::sleep(Duration::from_secs(5)).await;
        }
        self.pages
            .iter()
            .find(|(prefix, _)| url.starts_with(prefix.as_str()))
            .map(|(_, body)| body.clone())
            .ok_or_else(|| FetchError::new(url, NetworkErrorKind::ConnectionRefused, "refused"))
    }
}

fn backend(id: &str) -> SearchBackend {
    SearchBackend {
        id: id.to_string(),
        enabled: true,
        base_url: format!("https://{}.search.example", id),
        kind: BackendKind::Standard(SelectorSpec {
            query_path: "/q?{query}".to_string(),
            selectors: ResultSelectors {
                result: "a".to_string(),
                container: None,
                description: None,
            },
            redirect: RedirectRules::default(),
        }),
    }
}

fn links(urls: &[&str]) -> String {
    urls.iter()
        .map(|u| format!(r#"<a href="{}">{}</a>"#, u, u))
        .collect()
}

fn options() -> SearchOptions {
    SearchOptions {
        backends: None,
        max_results_per_backend: 10,
        timeout: Duration::from_millis(200),
    }
}

#[tokio::test]
async fn duplicate_links_across_backends_are_kept_once() {
    let mut fetcher = CannedFetcher::default();
    fetcher.pages.insert(
        "https://alpha.search.example".into(),
        links(&["https://acme-login.example/", "https://acmme.example/pay"]),
    );
    fetcher.pages.insert(
        "https://beta.search.example".into(),
        links(&["http://www.acme-login.example", "https://third.example/"]),
    );
    let registry = BackendRegistry::new(vec![backend("alpha"), backend("beta")]);
    let agg = Aggregator::new(Arc::new(fetcher), Arc::new(registry));

    let out = agg.search("acme", &options()).await;

    assert!(out.errors.is_empty());
    assert_eq!(out.total, 3);
    let acme_login = out
        .results
        .iter()
        .filter(|r| r.url.contains("acme-login.example"))
        .count();
    assert_eq!(acme_login, 1);
}

#[tokio::test]
async fn failing_backends_do_not_cancel_others() {
    let mut fetcher = CannedFetcher {
        panic_on: Some("https://crashy.search.example".into()),
        slow: Some("https://sleepy.search.example".into()),
        ..CannedFetcher::default()
    };
    fetcher.pages.insert(
        "https://alpha.search.example".into(),
        links(&["https://acme-login.example/"]),
    );
    let registry = BackendRegistry::new(vec![
        backend("alpha"),
        backend("crashy"),
        backend("sleepy"),
        backend("offline"),
    ]);
    let agg = Aggregator::new(Arc::new(fetcher), Arc::new(registry));

    let out = agg.search("acme", &options()).await;

    assert_eq!(out.total, 1);
    assert_eq!(out.queried.len(), 4);
    let failed: Vec<&str> = out.errors.iter().map(|e| e.backend.as_str()).collect();
    assert_eq!(failed, vec!["crashy", "sleepy", "offline"]);
    assert!(out.errors[1].error.contains("timed out"));
    assert!(out.errors[2].error.contains("connection refused"));
}

#[tokio::test]
async fn per_backend_cap_applies() {
    let mut fetcher = CannedFetcher::default();
    fetcher.pages.insert(
        "https://alpha.search.example".into(),
        links(&[
            "https://a.example/",
            "https://b.example/",
            "https://c.example/",
        ]),
    );
    let registry = BackendRegistry::new(vec![backend("alpha")]);
    let agg = Aggregator::new(Arc::new(fetcher), Arc::new(registry));
    let opts = SearchOptions {
        max_results_per_backend: 2,
        ..options()
    };

    let out = agg.search("acme", &opts).await;
    assert_eq!(out.total, 2);
    assert_eq!(out.results[0].url, "https://a.example/");
}

#[tokio::test]
async fn disabled_backends_only_run_when_named() {
    let mut fetcher = CannedFetcher::default();
    fetcher.pages.insert(
        "https://alpha.search.example".into(),
        links(&["https://a.example/"]),
    );
    fetcher.pages.insert(
        "https://beta.search.example".into(),
        links(&["https://b.example/"]),
    );
    let mut beta = backend("beta");
    beta.enabled = false;
    let registry = Arc::new(BackendRegistry::new(vec![backend("alpha"), beta]));
    let agg = Aggregator::new(Arc::new(fetcher), Arc::clone(&registry));

    let default_run = agg.search("acme", &options()).await;
    assert_eq!(default_run.queried, vec!["alpha"]);

    let named = SearchOptions {
        backends: Some(vec!["BETA".into()]),
        ..options()
    };
    let named_run = agg.search("acme", &named).await;
    assert_eq!(named_run.queried, vec!["beta"]);
    assert_eq!(named_run.results[0].url, "https://b.example/");
}
