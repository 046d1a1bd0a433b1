use std::{fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::core::error::HunterError;
use crate::sources::{
    BackendKind, RedirectRules, ResultSelectors, SearchBackend, SelectorSpec, TokenSpec,
};

pub const DEFAULT_CONFIG_PATH: &str = "config/brand-hunter.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub timeout_ms: u64,
    pub max_concurrent_requests: usize,
    pub max_results_per_backend: usize,
    pub user_agent: String,
    pub similarity_threshold: u8,
    pub enable_structural_check: bool,
    pub backends: Vec<SearchBackend>,
}

impl AppConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), HunterError> {
        if self.timeout_ms == 0 {
            return Err(HunterError::Config("timeout_ms must be positive".into()));
        }
        if self.max_concurrent_requests == 0 {
            return Err(HunterError::Config(
                "max_concurrent_requests must be at least 1".into(),
            ));
        }
        if self.similarity_threshold > 100 {
            return Err(HunterError::Config(
                "similarity_threshold must be within 0..=100".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_concurrent_requests: 5,
            max_results_per_backend: 20,
            user_agent: "brand-hunter/1.0 (+defensive brand monitoring)".to_string(),
            similarity_threshold: 70,
            enable_structural_check: true,
            backends: default_backends(),
        }
    }
}

/// Reads `path` (or the default location). A missing file yields the built-in defaults.
pub fn load_config(path: Option<&str>) -> Result<AppConfig, HunterError> {
    let path = path.map(Path::new).unwrap_or(Path::new(DEFAULT_CONFIG_PATH));

    if !path.exists() {
        tracing::debug!("config {} not found; using defaults", path.display());
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| HunterError::Config(format!("{}: {}", path.display(), e)))?;
    let cfg: AppConfig = toml::from_str(&content)?;
    cfg.validate()?;
    Ok(cfg)
}

fn default_backends() -> Vec<SearchBackend> {
    vec![
        SearchBackend {
            id: "duckduckgo".to_string(),
            enabled: true,
            base_url: "https://html.duckduckgo.com".to_string(),
            kind: BackendKind::Standard(SelectorSpec {
                query_path: "/html/?q={query}".to_string(),
                selectors: ResultSelectors {
                    result: "a.result__a".to_string(),
                    container: Some("div.result".to_string()),
                    description: Some(".result__snippet".to_string()),
                },
                redirect: RedirectRules {
                    param: Some("uddg".to_string()),
                    address_prefix: None,
                },
            }),
        },
        SearchBackend {
            id: "bing".to_string(),
            enabled: true,
            base_url: "https://www.bing.com".to_string(),
            kind: BackendKind::Standard(SelectorSpec {
                query_path: "/search?q={query}".to_string(),
                selectors: ResultSelectors {
                    result: "li.b_algo h2 a".to_string(),
                    container: Some("li.b_algo".to_string()),
                    description: Some(".b_caption p".to_string()),
                },
                redirect: RedirectRules::default(),
            }),
        },
        SearchBackend {
            id: "duckduckgo-lite".to_string(),
            enabled: false,
            base_url: "https://lite.duckduckgo.com".to_string(),
            kind: BackendKind::TokenBased(TokenSpec {
                home_path: "/lite/?q={query}".to_string(),
                token_pattern: r#"name="vqd" value="([^"]+)""#.to_string(),
                token_param: "vqd".to_string(),
                search_path: "/lite/?q={query}".to_string(),
                selectors: ResultSelectors {
                    result: "a.result-link".to_string(),
                    container: Some("tr".to_string()),
                    description: None,
                },
                redirect: RedirectRules {
                    param: Some("uddg".to_string()),
                    address_prefix: None,
                },
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load_config(Some("does/not/exist.toml")).unwrap();
        assert_eq!(cfg.similarity_threshold, 70);
        assert!(cfg.enable_structural_check);
        assert_eq!(cfg.backends.iter().filter(|b| b.enabled).count(), 2);
    }

    #[test]
    fn parses_both_backend_strategies() {
        let cfg: AppConfig = toml::from_str(
            r#"
            timeout_ms = 2500
            similarity_threshold = 80

            [[backends]]
            id = "plain"
            base_url = "https://search.example"
            [backends.kind]
            strategy = "standard"
            query_path = "/?q={query}"
            selectors = { result = "a.r", container = "div.row" }

            [[backends]]
            id = "flagship"
            enabled = false
            base_url = "https://flagship.example"
            [backends.kind]
            strategy = "token_based"
            token_pattern = 'name="tk" value="([^"]+)"'
            token_param = "tk"
            search_path = "/search?text={query}"
            selectors = { result = "a.link" }
            redirect = { param = "redirect_url", address_prefix = "/address/" }
            "#,
        )
        .unwrap();
        assert_eq!(cfg.timeout_ms, 2500);
        assert_eq!(cfg.max_concurrent_requests, 5);
        assert_eq!(cfg.backends.len(), 2);
        assert!(cfg.backends[0].enabled);
        match &cfg.backends[1].kind {
            BackendKind::TokenBased(spec) => {
                assert_eq!(spec.home_path, "/");
                assert_eq!(spec.redirect.address_prefix.as_deref(), Some("/address/"));
            }
            other => panic!("expected token backend, got {:?}", other),
        }
    }

    #[test]
    fn zero_workers_is_rejected() {
        let cfg = AppConfig {
            max_concurrent_requests: 0,
            ..AppConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(HunterError::Config(_))));
    }
}
