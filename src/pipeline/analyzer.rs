//! Per-candidate analysis: metadata scoring, the crawl gate, page heuristics
//! and finalization into a [`Finding`].

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, warn};

use crate::core::error::FetchError;
use crate::core::fetcher::Fetcher;
use crate::core::hash::finding_id;
use crate::core::profile::BrandProfile;
use crate::core::types::{CandidateSite, Finding, Indicator, StructuralFingerprint};
use crate::detectors::document::HtmlDocument;
use crate::detectors::structure::{compare, fingerprint_of, login_form_in};
use crate::detectors::typosquat::best_match;
use crate::pipeline::extractor::Extractor;
use crate::pipeline::scorer::{score_indicators, tier_for};
use crate::sources::normalize::normalize_url;

pub const SKIP_REASON_LOW_SIMILARITY: &str = "low similarity — skipped for efficiency";

/// Structural similarity must exceed this before it counts as an indicator.
const HTML_SIMILARITY_FLOOR: u8 = 60;
const CREDENTIAL_SAMPLES: usize = 3;

#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub similarity_threshold: u8,
    pub enable_structural_check: bool,
    pub fetch_timeout: Duration,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 70,
            enable_structural_check: true,
            fetch_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrawlStatus {
    Skipped,
    Crawled,
    Failed,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// `None` when the candidate produced no indicators.
    pub finding: Option<Finding>,
    pub crawl: CrawlStatus,
}

pub struct Analyzer {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    profile: Arc<BrandProfile>,
    reference: Option<Arc<StructuralFingerprint>>,
    config: AnalysisConfig,
}

impl Analyzer {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        profile: Arc<BrandProfile>,
        reference: Option<Arc<StructuralFingerprint>>,
        config: AnalysisConfig,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            profile,
            reference,
            config,
        }
    }

    fn structural_reference(&self) -> Option<&StructuralFingerprint> {
        if self.config.enable_structural_check {
            self.reference.as_deref()
        } else {
            None
        }
    }

    pub async fn analyze(&self, candidate: CandidateSite) -> AnalysisOutcome {
        let (mut indicators, best_confidence) = self.metadata_indicators(&candidate);

        if !crawl_gate(
            best_confidence,
            self.config.similarity_threshold,
            self.structural_reference().is_some(),
        ) {
            debug!(url = %candidate.url(), best_confidence, "crawl gate closed");
            let finding = self.finalize(&candidate, indicators, false, None, Some(SKIP_REASON_LOW_SIMILARITY));
            return AnalysisOutcome {
                finding,
                crawl: CrawlStatus::Skipped,
            };
        }

        debug!(url = %candidate.url(), best_confidence, "crawling candidate");
        let crawled = AssertUnwindSafe(self.crawl(candidate.url()))
            .catch_unwind()
            .await;
        let message = match crawled {
            Ok(Ok(page)) => {
                indicators.extend(page);
                return AnalysisOutcome {
                    finding: self.finalize(&candidate, indicators, true, None, None),
                    crawl: CrawlStatus::Crawled,
                };
            }
            Ok(Err(err)) => {
                warn!(url = %candidate.url(), kind = %err.kind, "candidate fetch failed");
                err.to_string()
            }
            Err(payload) => {
                let message = format!("analysis panicked: {}", panic_message(payload.as_ref()));
                warn!(url = %candidate.url(), "{}", message);
                message
            }
        };
        AnalysisOutcome {
            finding: self.finalize(&candidate, indicators, false, Some(message), None),
            crawl: CrawlStatus::Failed,
        }
    }

    /// Fetch plus page heuristics; the part of a candidate that touches collaborators.
    async fn crawl(&self, url: &str) -> Result<Vec<Indicator>, FetchError> {
        let html = self.fetcher.fetch(url, self.config.fetch_timeout).await?;
        Ok(self.page_indicators(&html, url))
    }

    /// Domain and search-metadata indicators, plus the best domain confidence.
    fn metadata_indicators(&self, candidate: &CandidateSite) -> (Vec<Indicator>, u8) {
        let mut indicators = Vec::new();
        let mut best_confidence = 0;
        if let Some(found) = best_match(&candidate.domain, &self.profile.keywords) {
            best_confidence = found.confidence;
            indicators.push(Indicator::DomainSimilarity {
                keyword: found.keyword,
                match_type: found.match_type,
                confidence: found.confidence,
            });
        }

        let metadata = candidate.metadata_text().to_lowercase();
        let in_metadata: Vec<String> = self
            .profile
            .keywords
            .iter()
            .filter(|k| metadata.contains(k.as_str()))
            .cloned()
            .collect();
        if !in_metadata.is_empty() {
            indicators.push(Indicator::KeywordInMetadata {
                keywords: in_metadata,
            });
        }
        (indicators, best_confidence)
    }

    /// Heuristics over a fetched page. Synchronous so the parsed DOM never crosses an await.
    fn page_indicators(&self, html: &str, page_url: &str) -> Vec<Indicator> {
        let mut indicators = Vec::new();
        let extraction = self
            .extractor
            .extract(html, page_url, &self.profile.keywords);

        if !extraction.keyword_hits.is_empty() {
            indicators.push(Indicator::KeywordMatch {
                hits: extraction.keyword_hits,
            });
        }

        let doc = HtmlDocument::parse(html);
        let login_form = login_form_in(&doc);
        if login_form {
            indicators.push(Indicator::LoginFormDetected);
            if let Some(reference) = self.structural_reference() {
                let score = compare(&fingerprint_of(&doc), reference);
                if score.overall > HTML_SIMILARITY_FLOOR {
                    indicators.push(Indicator::HtmlSimilarity { score });
                }
            }
        }

        if !extraction.credential_like_strings.is_empty() {
            indicators.push(Indicator::CredentialsFound {
                count: extraction.credential_like_strings.len(),
                samples: extraction
                    .credential_like_strings
                    .iter()
                    .take(CREDENTIAL_SAMPLES)
                    .map(|s| mask_secret(s))
                    .collect(),
            });
        }

        let mentioned: Vec<String> = self
            .profile
            .domains
            .iter()
            .filter(|d| {
                extraction
                    .outbound_links
                    .iter()
                    .any(|link| link.to_lowercase().contains(d.as_str()))
            })
            .cloned()
            .collect();
        if !mentioned.is_empty() {
            indicators.push(Indicator::CompanyDomainMentioned { domains: mentioned });
        }
        indicators
    }

    fn finalize(
        &self,
        candidate: &CandidateSite,
        indicators: Vec<Indicator>,
        was_crawled: bool,
        crawl_error: Option<String>,
        skip_reason: Option<&str>,
    ) -> Option<Finding> {
        if indicators.is_empty() {
            return None;
        }
        let score = score_indicators(&indicators);
        let key = normalize_url(candidate.url()).unwrap_or_else(|| candidate.url().to_string());
        Some(Finding {
            id: finding_id(&key),
            url: candidate.url().to_string(),
            domain: candidate.domain.clone(),
            source_backend: candidate.result.source_backend.clone(),
            indicators,
            severity_score: score,
            severity_tier: tier_for(score),
            was_crawled,
            crawl_error,
            skip_reason: skip_reason.map(str::to_string),
        })
    }
}

/// Fetch only when the domain already looks suspicious or a reference page is available.
pub fn crawl_gate(best_confidence: u8, threshold: u8, structural_reference: bool) -> bool {
    best_confidence >= threshold || structural_reference
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

fn mask_secret(raw: &str) -> String {
    let visible: String = raw.chars().take(4).collect();
    let hidden = raw.chars().count().saturating_sub(4);
    format!("{}{}", visible, "*".repeat(hidden))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;

    use super::*;
    use crate::core::error::NetworkErrorKind;
    use crate::core::time::now_utc;
    use crate::core::types::{MatchType, SearchResult, SeverityTier};
    use crate::detectors::structure::extract_fingerprint;
    use crate::pipeline::extractor::PageExtractor;

    const PHISH_PAGE: &str = r#"
        <html><head><title>Acme Sign In</title></head>
        <body class="page">
          <form id="login" class="form card">
            <input type="email" name="user" id="user" class="field">
            <input type="password" name="pwd" id="pwd" class="field">
          </form>
          <a href="https://acme.com/terms">Terms</a>
          <!-- api_key=sk_test_9f8e7d6c -->
        </body></html>"#;

    #[derive(Default)]
    struct MapFetcher {
        pages: HashMap<String, Result<String, FetchError>>,
    }

    #[async_trait]
    impl Fetcher for MapFetcher {
        async fn fetch(&self, url: &str, _timeout: Duration) -> Result<String, FetchError> {
            self.pages.get(url).cloned().unwrap_or_else(|| {
                Err(FetchError::new(url, NetworkErrorKind::HttpStatus(404), "not found"))
            })
        }
    }

    fn candidate(url: &str, domain: &str, title: &str) -> CandidateSite {
        CandidateSite {
            result: SearchResult {
                url: url.to_string(),
                title: title.to_string(),
                description: String::new(),
                source_backend: "test".to_string(),
                found_at: now_utc(),
            },
            domain: domain.to_string(),
        }
    }

    struct PanicFetcher;

    #[async_trait]
    impl Fetcher for PanicFetcher {
        async fn fetch(&self, _url: &str, _timeout: Duration) -> Result<String, FetchError> {
            panic!("connection pool poisoned");
        }
    }

    fn analyzer(fetcher: MapFetcher, reference: Option<StructuralFingerprint>) -> Analyzer {
        analyzer_with(Arc::new(fetcher), reference, AnalysisConfig::default())
    }

    fn analyzer_with(
        fetcher: Arc<dyn Fetcher>,
        reference: Option<StructuralFingerprint>,
        config: AnalysisConfig,
    ) -> Analyzer {
        Analyzer::new(
            fetcher,
            Arc::new(PageExtractor),
            Arc::new(BrandProfile::new("Acme", &["acme.com"], &["acme"])),
            reference.map(Arc::new),
            config,
        )
    }

    #[test]
    fn gate_skips_low_confidence_without_reference() {
        assert!(!crawl_gate(60, 70, false));
        assert!(crawl_gate(60, 70, true));
        assert!(crawl_gate(70, 70, false));
    }

    #[tokio::test]
    async fn suspicious_page_is_crawled_and_scored() {
        let mut fetcher = MapFetcher::default();
        fetcher
            .pages
            .insert("https://acmme.example/login".into(), Ok(PHISH_PAGE.into()));
        let outcome = analyzer(fetcher, None)
            .analyze(candidate("https://acmme.example/login", "acmme.example", "Acme login"))
            .await;

        assert_eq!(outcome.crawl, CrawlStatus::Crawled);
        let finding = outcome.finding.unwrap();
        assert!(finding.was_crawled);
        assert_eq!(finding.severity_tier, SeverityTier::Critical);
        assert!(finding.has_indicator("domain_similarity"));
        assert!(finding.has_indicator("keyword_in_metadata"));
        assert!(finding.has_indicator("login_form_detected"));
        assert!(finding.has_indicator("credentials_found"));
        assert!(finding.has_indicator("company_domain_mentioned"));
        assert!(!finding.has_indicator("html_similarity"));
        match &finding.indicators[0] {
            Indicator::DomainSimilarity { match_type, confidence, .. } => {
                assert_eq!(*match_type, MatchType::CharacterAddition);
                assert_eq!(*confidence, 90);
            }
            other => panic!("unexpected first indicator {:?}", other),
        }
    }

    #[tokio::test]
    async fn reference_page_enables_html_similarity() {
        let mut fetcher = MapFetcher::default();
        fetcher
            .pages
            .insert("https://secure-login.example/".into(), Ok(PHISH_PAGE.into()));
        let reference = extract_fingerprint(PHISH_PAGE);
        let outcome = analyzer(fetcher, Some(reference))
            .analyze(candidate("https://secure-login.example/", "secure-login.example", ""))
            .await;
        let finding = outcome.finding.unwrap();
        assert!(!finding.has_indicator("domain_similarity"));
        assert!(finding.has_indicator("html_similarity"));
    }

    #[tokio::test]
    async fn low_similarity_candidate_is_skipped_but_kept() {
        let outcome = analyzer(MapFetcher::default(), None)
            .analyze(candidate("https://news.example/story", "news.example", "Acme earnings"))
            .await;
        assert_eq!(outcome.crawl, CrawlStatus::Skipped);
        let finding = outcome.finding.unwrap();
        assert!(!finding.was_crawled);
        assert_eq!(finding.skip_reason.as_deref(), Some(SKIP_REASON_LOW_SIMILARITY));
        assert_eq!(finding.severity_tier, SeverityTier::Low);
    }

    #[tokio::test]
    async fn unrelated_candidate_is_dropped() {
        let outcome = analyzer(MapFetcher::default(), None)
            .analyze(candidate("https://weather.example/", "weather.example", "Forecast"))
            .await;
        assert_eq!(outcome.crawl, CrawlStatus::Skipped);
        assert!(outcome.finding.is_none());
    }

    #[tokio::test]
    async fn fetch_failure_keeps_metadata_indicators() {
        let outcome = analyzer(MapFetcher::default(), None)
            .analyze(candidate("https://acmme.example/", "acmme.example", ""))
            .await;
        assert_eq!(outcome.crawl, CrawlStatus::Failed);
        let finding = outcome.finding.unwrap();
        assert!(!finding.was_crawled);
        assert!(finding.crawl_error.as_deref().unwrap_or_default().contains("http 404"));
        assert_eq!(finding.indicators.len(), 1);
        assert_eq!(finding.severity_tier, SeverityTier::Critical);
    }

    #[tokio::test]
    async fn disabled_structural_check_ignores_reference() {
        let mut fetcher = MapFetcher::default();
        fetcher
            .pages
            .insert("https://news.example/story".into(), Ok(PHISH_PAGE.into()));
        fetcher
            .pages
            .insert("https://acme-secure.example/".into(), Ok(PHISH_PAGE.into()));
        let config = AnalysisConfig {
            enable_structural_check: false,
            ..AnalysisConfig::default()
        };
        let analyzer = analyzer_with(
            Arc::new(fetcher),
            Some(extract_fingerprint(PHISH_PAGE)),
            config,
        );

        let low = analyzer
            .analyze(candidate("https://news.example/story", "news.example", "Acme earnings"))
            .await;
        assert_eq!(low.crawl, CrawlStatus::Skipped);
        let finding = low.finding.unwrap();
        assert!(!finding.was_crawled);
        assert_eq!(finding.skip_reason.as_deref(), Some(SKIP_REASON_LOW_SIMILARITY));

        // A direct match is still crawled, but never compared with the reference.
        let high = analyzer
            .analyze(candidate("https://acme-secure.example/", "acme-secure.example", ""))
            .await;
        assert_eq!(high.crawl, CrawlStatus::Crawled);
        let finding = high.finding.unwrap();
        assert!(finding.has_indicator("login_form_detected"));
        assert!(!finding.has_indicator("html_similarity"));
    }

    #[tokio::test]
    async fn panicking_fetcher_becomes_crawl_error() {
        let analyzer = analyzer_with(Arc::new(PanicFetcher), None, AnalysisConfig::default());
        let outcome = analyzer
            .analyze(candidate("https://acme-login.example/", "acme-login.example", ""))
            .await;

        assert_eq!(outcome.crawl, CrawlStatus::Failed);
        let finding = outcome.finding.unwrap();
        assert!(!finding.was_crawled);
        assert_eq!(
            finding.crawl_error.as_deref(),
            Some("analysis panicked: connection pool poisoned")
        );
        match &finding.indicators[..] {
            [Indicator::DomainSimilarity { match_type, confidence, .. }] => {
                assert_eq!(*match_type, MatchType::Direct);
                assert_eq!(*confidence, 100);
            }
            other => panic!("unexpected indicators {:?}", other),
        }
        assert_eq!(finding.severity_tier, SeverityTier::Critical);
    }

    #[test]
    fn skip_reason_text_is_stable() {
        assert_eq!(SKIP_REASON_LOW_SIMILARITY, "low similarity — skipped for efficiency");
    }

    #[test]
    fn secrets_are_masked() {
        assert_eq!(mask_secret("AKIAABCD"), "AKIA****");
        assert_eq!(mask_secret("ab"), "ab");
    }
}
