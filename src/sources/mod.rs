//! Search backends and the federated aggregator that fans out over them.

use serde::{Deserialize, Serialize};

pub mod aggregator;
pub mod normalize;
pub mod standard;
pub mod token;

/// CSS selectors locating result rows on a backend's result page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResultSelectors {
    /// Anchor for each organic result; its `href` and text become url and title.
    pub result: String,
    /// Nearest ancestor of the anchor holding the row.
    #[serde(default)]
    pub container: Option<String>,
    /// Snippet element inside the container.
    #[serde(default)]
    pub description: Option<String>,
}

/// Redirect wrappers some engines put around outbound links.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RedirectRules {
    /// Query parameter carrying the encoded target, e.g. `redirect_url` or `uddg`.
    #[serde(default)]
    pub param: Option<String>,
    /// Path prefix followed by a bare host, e.g. `/address/`.
    #[serde(default)]
    pub address_prefix: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SelectorSpec {
    /// Path appended to the base URL; `{query}` is replaced by the encoded query.
    pub query_path: String,
    pub selectors: ResultSelectors,
    #[serde(default)]
    pub redirect: RedirectRules,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenSpec {
    #[serde(default = "default_home_path")]
    pub home_path: String,
    /// Regex whose first capture group is the one-time form token.
    pub token_pattern: String,
    /// Query parameter the token is sent back under.
    pub token_param: String,
    pub search_path: String,
    pub selectors: ResultSelectors,
    #[serde(default)]
    pub redirect: RedirectRules,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackendKind {
    Standard(SelectorSpec),
    TokenBased(TokenSpec),
}

impl BackendKind {
    /// Sequential requests one query costs on this backend.
    pub fn request_count(&self) -> u32 {
        match self {
            BackendKind::Standard(_) => 1,
            BackendKind::TokenBased(_) => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchBackend {
    pub id: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub base_url: String,
    pub kind: BackendKind,
}

/// Strategy table keyed by backend id, in configuration order.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: Vec<SearchBackend>,
}

impl BackendRegistry {
    pub fn new(backends: Vec<SearchBackend>) -> Self {
        let mut unique: Vec<SearchBackend> = Vec::new();
        for backend in backends {
            if !unique.iter().any(|b| b.id.eq_ignore_ascii_case(&backend.id)) {
                unique.push(backend);
            }
        }
        Self { backends: unique }
    }

    pub fn get(&self, id: &str) -> Option<&SearchBackend> {
        self.backends.iter().find(|b| b.id.eq_ignore_ascii_case(id))
    }

    pub fn enabled(&self) -> impl Iterator<Item = &SearchBackend> {
        self.backends.iter().filter(|b| b.enabled)
    }
}

fn default_home_path() -> String {
    "/".to_string()
}

fn default_enabled() -> bool {
    true
}
