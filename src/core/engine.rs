use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::{
    config::AppConfig,
    core::{
        error::HunterError,
        fetcher::{Fetcher, HttpFetcher},
        profile::BrandProfile,
        time::now_utc,
        types::{CandidateSite, RunMetadata, ScanReport, StructuralFingerprint},
    },
    detectors::structure::extract_fingerprint,
    pipeline::{
        analyzer::{AnalysisConfig, Analyzer, CrawlStatus},
        extractor::{Extractor, PageExtractor},
        reporter::FindingAggregator,
    },
    sources::{
        aggregator::{AggregatedSearch, Aggregator, SearchOptions},
        normalize::domain_from_str,
        BackendRegistry,
    },
};

pub struct Engine {
    pub config: AppConfig,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    registry: Arc<BackendRegistry>,
}

impl Engine {
    pub fn new(config: AppConfig) -> Result<Self, HunterError> {
        config.validate()?;
        let fetcher = HttpFetcher::new(&config.user_agent, config.timeout())?;
        Ok(Self::with_collaborators(
            config,
            Arc::new(fetcher),
            Arc::new(PageExtractor),
        ))
    }

    pub fn with_collaborators(
        config: AppConfig,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        let registry = Arc::new(BackendRegistry::new(config.backends.clone()));
        Self {
            config,
            fetcher,
            extractor,
            registry,
        }
    }

    /// Federated search only; `backends` narrows the run to the named ids.
    pub async fn search(&self, query: &str, backends: Option<&[String]>) -> AggregatedSearch {
        let opts = SearchOptions {
            backends: backends.map(|ids| ids.to_vec()),
            max_results_per_backend: self.config.max_results_per_backend,
            timeout: self.config.timeout(),
        };
        Aggregator::new(Arc::clone(&self.fetcher), Arc::clone(&self.registry))
            .search(query, &opts)
            .await
    }

    /// One full detection run. Only an invalid profile is fatal.
    pub async fn scan(
        &self,
        profile: &BrandProfile,
        query: &str,
        backends: Option<&[String]>,
    ) -> Result<ScanReport, HunterError> {
        profile.validate()?;
        let mut metadata = RunMetadata {
            query: query.to_string(),
            started_at: Some(now_utc()),
            ..RunMetadata::default()
        };

        let reference = self.load_reference(profile).await;
        metadata.reference_page_loaded = reference.is_some();

        let search = self.search(query, backends).await;
        info!(
            query,
            results = search.total,
            failed_backends = search.errors.len(),
            "search finished"
        );
        metadata.backends_queried = search.queried;
        metadata.backend_errors = search.errors;
        metadata.results_total = search.total;

        let mut candidates = Vec::with_capacity(search.results.len());
        for result in search.results {
            let Some(domain) = domain_from_str(&result.url) else {
                continue;
            };
            if profile.owns_domain(&domain) {
                metadata.own_domain_results += 1;
                continue;
            }
            candidates.push(CandidateSite { result, domain });
        }
        metadata.candidates_analyzed = candidates.len();

        let analyzer = Arc::new(Analyzer::new(
            Arc::clone(&self.fetcher),
            Arc::clone(&self.extractor),
            Arc::new(profile.clone()),
            reference,
            AnalysisConfig {
                similarity_threshold: self.config.similarity_threshold,
                enable_structural_check: self.config.enable_structural_check,
                fetch_timeout: self.config.timeout(),
            },
        ));
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_requests.max(1)));

        let mut handles = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|_| HunterError::Config("worker pool closed".into()))?;
            let analyzer = Arc::clone(&analyzer);
            handles.push(tokio::spawn(async move {
                let outcome = analyzer.analyze(candidate).await;
                drop(permit);
                outcome
            }));
        }

        let mut findings = FindingAggregator::new();
        for joined in join_all(handles).await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!("candidate task failed: {}", err);
                    metadata.crawl_failures += 1;
                    continue;
                }
            };
            match outcome.crawl {
                CrawlStatus::Crawled => metadata.candidates_crawled += 1,
                CrawlStatus::Skipped => metadata.candidates_skipped += 1,
                CrawlStatus::Failed => metadata.crawl_failures += 1,
            }
            match outcome.finding {
                Some(finding) => findings.push(finding),
                None => metadata.candidates_dropped += 1,
            }
        }

        metadata.finished_at = Some(now_utc());
        let report = findings.into_report(metadata);
        info!(
            findings = report.findings.len(),
            critical = report.severity_counts.critical,
            high = report.severity_counts.high,
            crawled = report.metadata.candidates_crawled,
            skipped = report.metadata.candidates_skipped,
            "scan finished"
        );
        Ok(report)
    }

    /// Fingerprint of the real login page, fetched once per run.
    async fn load_reference(&self, profile: &BrandProfile) -> Option<Arc<StructuralFingerprint>> {
        if !self.config.enable_structural_check {
            return None;
        }
        let url = profile.real_login_url.as_deref()?;
        match self.fetcher.fetch(url, self.config.timeout()).await {
            Ok(html) => Some(Arc::new(extract_fingerprint(&html))),
            Err(err) => {
                warn!(url, error = %err, "reference login page unavailable; structural comparison disabled");
                None
            }
        }
    }
}
