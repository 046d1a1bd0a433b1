use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row returned by a search backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchResult {
    pub url: String,
    pub title: String,
    pub description: String,
    pub source_backend: String,
    pub found_at: DateTime<Utc>,
}

/// A deduplicated search result queued for analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateSite {
    pub result: SearchResult,
    /// Lowercased host with any leading `www.` removed.
    pub domain: String,
}

impl CandidateSite {
    pub fn url(&self) -> &str {
        &self.result.url
    }

    pub fn metadata_text(&self) -> String {
        format!("{} {}", self.result.title, self.result.description)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    Direct,
    CharacterOmission,
    CharacterAddition,
    CharacterSwap,
    Homoglyph,
    HighSimilarity,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DomainMatch {
    pub keyword: String,
    pub match_type: MatchType,
    pub confidence: u8,
}

impl DomainMatch {
    pub fn none(keyword: &str) -> Self {
        Self {
            keyword: keyword.to_string(),
            match_type: MatchType::None,
            confidence: 0,
        }
    }

    pub fn is_match(&self) -> bool {
        self.match_type != MatchType::None
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InputDescriptor {
    #[serde(rename = "type")]
    pub input_type: String,
    pub name: String,
    pub id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuralFingerprint {
    pub title: String,
    pub inputs: Vec<InputDescriptor>,
    pub css_classes: Vec<String>,
    pub ids: Vec<String>,
    pub links: Vec<String>,
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SimilarityScore {
    pub overall: u8,
    pub input_fields: u8,
    pub css_classes: u8,
    pub ids: u8,
    pub title: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeywordHit {
    pub keyword: String,
    pub count: usize,
}

/// Evidence attached to a finding; each variant adds a fixed amount to the score.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Indicator {
    DomainSimilarity {
        keyword: String,
        match_type: MatchType,
        confidence: u8,
    },
    KeywordInMetadata {
        keywords: Vec<String>,
    },
    KeywordMatch {
        hits: Vec<KeywordHit>,
    },
    LoginFormDetected,
    HtmlSimilarity {
        score: SimilarityScore,
    },
    CredentialsFound {
        count: usize,
        samples: Vec<String>,
    },
    CompanyDomainMentioned {
        domains: Vec<String>,
    },
}

impl Indicator {
    pub fn label(&self) -> &'static str {
        match self {
            Indicator::DomainSimilarity { .. } => "domain_similarity",
            Indicator::KeywordInMetadata { .. } => "keyword_in_metadata",
            Indicator::KeywordMatch { .. } => "keyword_match",
            Indicator::LoginFormDetected => "login_form_detected",
            Indicator::HtmlSimilarity { .. } => "html_similarity",
            Indicator::CredentialsFound { .. } => "credentials_found",
            Indicator::CompanyDomainMentioned { .. } => "company_domain_mentioned",
        }
    }
}

/// Severity bucket; declaration order is the report order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SeverityTier {
    Critical,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    pub id: String,
    pub url: String,
    pub domain: String,
    pub source_backend: String,
    pub indicators: Vec<Indicator>,
    pub severity_score: f64,
    pub severity_tier: SeverityTier,
    pub was_crawled: bool,
    #[serde(default)]
    pub crawl_error: Option<String>,
    #[serde(default)]
    pub skip_reason: Option<String>,
}

impl Finding {
    pub fn has_indicator(&self, label: &str) -> bool {
        self.indicators.iter().any(|i| i.label() == label)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, tier: SeverityTier) {
        match tier {
            SeverityTier::Critical => self.critical += 1,
            SeverityTier::High => self.high += 1,
            SeverityTier::Medium => self.medium += 1,
            SeverityTier::Low => self.low += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendFailure {
    pub backend: String,
    pub error: String,
}

/// Run bookkeeping kept apart from severity counts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunMetadata {
    pub query: String,
    pub backends_queried: Vec<String>,
    pub backend_errors: Vec<BackendFailure>,
    pub results_total: usize,
    pub candidates_analyzed: usize,
    pub candidates_crawled: usize,
    pub candidates_skipped: usize,
    pub crawl_failures: usize,
    pub candidates_dropped: usize,
    pub own_domain_results: usize,
    pub reference_page_loaded: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub findings: Vec<Finding>,
    pub severity_counts: SeverityCounts,
    pub metadata: RunMetadata,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Jsonl,
}
