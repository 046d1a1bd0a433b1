use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use crate::core::error::{FetchError, HunterError};

/// Retrieves raw HTML. Every failure category is reported as a [`FetchError`].
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError>;
}

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, HunterError> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(4))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        let resp = resp
            .error_for_status()
            .map_err(|e| FetchError::from_reqwest(url, e))?;
        resp.text()
            .await
            .map_err(|e| FetchError::from_reqwest(url, e))
    }
}
