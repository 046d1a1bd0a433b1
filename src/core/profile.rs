use std::path::Path;

use serde::Deserialize;

use crate::core::error::HunterError;

/// The brand being protected.
#[derive(Debug, Clone)]
pub struct BrandProfile {
    pub company_name: String,
    pub domains: Vec<String>,
    pub keywords: Vec<String>,
    pub real_login_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct BrandProfileRaw {
    #[serde(default)]
    company_name: String,
    #[serde(default)]
    domains: Vec<String>,
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    real_login_url: Option<String>,
}

pub fn load_profile(path: &Path) -> Result<BrandProfile, HunterError> {
    let data = std::fs::read_to_string(path)
        .map_err(|e| HunterError::Config(format!("profile {}: {}", path.display(), e)))?;
    let raw: BrandProfileRaw = toml::from_str(&data)?;
    let profile = BrandProfile::from_raw(raw);
    profile.validate()?;
    Ok(profile)
}

impl BrandProfile {
    pub fn new(company_name: &str, domains: &[&str], keywords: &[&str]) -> Self {
        Self::from_raw(BrandProfileRaw {
            company_name: company_name.to_string(),
            domains: domains.iter().map(|s| s.to_string()).collect(),
            keywords: keywords.iter().map(|s| s.to_string()).collect(),
            real_login_url: None,
        })
    }

    pub fn with_login_url(mut self, url: impl Into<String>) -> Self {
        self.real_login_url = Some(url.into());
        self
    }

    pub(crate) fn from_raw(raw: BrandProfileRaw) -> Self {
        Self {
            company_name: raw.company_name.trim().to_string(),
            domains: clean_terms(raw.domains),
            keywords: clean_terms(raw.keywords),
            real_login_url: raw
                .real_login_url
                .map(|u| u.trim().to_string())
                .filter(|u| !u.is_empty()),
        }
    }

    /// Rejects profiles that cannot drive a scan. Runs before any network work.
    pub fn validate(&self) -> Result<(), HunterError> {
        if self.company_name.is_empty() {
            return Err(HunterError::Config(
                "brand profile must include company_name".into(),
            ));
        }
        if self.keywords.is_empty() {
            return Err(HunterError::Config(
                "brand profile must include at least one keyword".into(),
            ));
        }
        Ok(())
    }

    /// True for one of the brand's own domains or any subdomain of one.
    pub fn owns_domain(&self, host: &str) -> bool {
        let host = host.trim().trim_end_matches('.').to_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        self.domains.iter().any(|d| {
            let d = d.strip_prefix("www.").unwrap_or(d);
            host == d || host.ends_with(&format!(".{}", d))
        })
    }
}

fn clean_terms(terms: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for term in terms {
        let term = term.trim().to_lowercase();
        if !term.is_empty() && !out.contains(&term) {
            out.push(term);
        }
    }
    out
}
