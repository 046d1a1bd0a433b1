use crate::core::types::{Indicator, SeverityTier};

const CRITICAL_FLOOR: f64 = 9.0;
const HIGH_FLOOR: f64 = 7.0;
const MEDIUM_FLOOR: f64 = 4.0;

/// Points one indicator contributes to a finding's severity score.
pub fn indicator_weight(indicator: &Indicator) -> f64 {
    match indicator {
        Indicator::DomainSimilarity { confidence, .. } => f64::from(*confidence) / 10.0,
        Indicator::KeywordInMetadata { .. } => 1.0,
        Indicator::KeywordMatch { .. } => 2.0,
        Indicator::LoginFormDetected => 3.0,
        Indicator::HtmlSimilarity { score } => f64::from(score.overall) / 10.0,
        Indicator::CredentialsFound { .. } => 5.0,
        Indicator::CompanyDomainMentioned { .. } => 2.0,
    }
}

pub fn score_indicators(indicators: &[Indicator]) -> f64 {
    indicators.iter().map(indicator_weight).sum()
}

pub fn tier_for(score: f64) -> SeverityTier {
    if score >= CRITICAL_FLOOR {
        SeverityTier::Critical
    } else if score >= HIGH_FLOOR {
        SeverityTier::High
    } else if score >= MEDIUM_FLOOR {
        SeverityTier::Medium
    } else {
        SeverityTier::Low
    }
}
