use std::{fmt, io};

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum HunterError {
    #[error("config error: {0}")]
    Config(String),
    #[error("backend {backend} failed: {reason}")]
    Backend { backend: String, reason: String },
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("parse error: {0}")]
    Parse(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Failure category for a single content retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "status")]
pub enum NetworkErrorKind {
    Timeout,
    ConnectionRefused,
    HostNotFound,
    HttpStatus(u16),
    Tls,
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkErrorKind::Timeout => write!(f, "timeout"),
            NetworkErrorKind::ConnectionRefused => write!(f, "connection refused"),
            NetworkErrorKind::HostNotFound => write!(f, "host not found"),
            NetworkErrorKind::HttpStatus(code) => write!(f, "http {}", code),
            NetworkErrorKind::Tls => write!(f, "tls error"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} fetching {url}: {detail}")]
pub struct FetchError {
    pub url: String,
    pub kind: NetworkErrorKind,
    pub detail: String,
}

impl FetchError {
    pub fn new(url: impl Into<String>, kind: NetworkErrorKind, detail: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            kind,
            detail: detail.into(),
        }
    }

    pub fn from_reqwest(url: &str, err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            NetworkErrorKind::Timeout
        } else if let Some(status) = err.status() {
            NetworkErrorKind::HttpStatus(status.as_u16())
        } else {
            classify_transport(&err)
        };
        FetchError::new(url, kind, err.to_string())
    }
}

fn classify_transport(err: &reqwest::Error) -> NetworkErrorKind {
    let mut chain = err.to_string().to_lowercase();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        chain.push(' ');
        chain.push_str(&inner.to_string().to_lowercase());
        source = inner.source();
    }
    if chain.contains("dns")
        || chain.contains("failed to lookup")
        || chain.contains("name or service not known")
        || chain.contains("no such host")
    {
        NetworkErrorKind::HostNotFound
    } else if chain.contains("certificate") || chain.contains("tls") || chain.contains("ssl") {
        NetworkErrorKind::Tls
    } else {
        NetworkErrorKind::ConnectionRefused
    }
}

impl From<toml::de::Error> for HunterError {
    fn from(err: toml::de::Error) -> Self {
        HunterError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for HunterError {
    fn from(err: reqwest::Error) -> Self {
        let url = err.url().map(|u| u.to_string()).unwrap_or_default();
        HunterError::Fetch(FetchError::from_reqwest(&url, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_display_names_kind_and_url() {
        let err = FetchError::new(
            "https://evil.example/login",
            NetworkErrorKind::HttpStatus(503),
            "service unavailable",
        );
        let text = err.to_string();
        assert!(text.starts_with("http 503"));
        assert!(text.contains("https://evil.example/login"));
    }
}
