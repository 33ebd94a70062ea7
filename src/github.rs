use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::Url;
use tracing::debug;

use crate::config::Config;
use crate::discovery::{RepositoryDescriptor, StarLister};
use crate::error::ListError;

/// Unauthenticated client for the GitHub starred listing endpoint
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GitHubClient {
    /// Create a client from the listing section of the configuration
    pub fn new(config: &Config) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );

        let mut builder = reqwest::Client::builder()
            .user_agent(config.listing.user_agent.as_str())
            .default_headers(headers);

        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }

        let http = builder.build().context("Failed to create HTTP client")?;

        Self::with_http(http, &config.listing.api_base_url)
    }

    /// Create from an existing reqwest client (for reuse)
    pub fn with_http(http: reqwest::Client, base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid API base URL: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            bail!("Invalid API base URL: {}", base_url);
        }

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// `GET /users/{account}/starred` without the query string
    ///
    /// The account is pushed as a single path segment, so `/`, `?` and `#`
    /// in a handle are percent-encoded rather than reshaping the request.
    pub fn starred_url(&self, account: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend(["users", account, "starred"]);
        }
        url
    }
}

#[async_trait]
impl StarLister for GitHubClient {
    async fn list_starred(
        &self,
        account: &str,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<RepositoryDescriptor>, ListError> {
        let url = self.starred_url(account);
        debug!("GET {}?page={}&per_page={}", url, page, per_page);

        let transport = |source: reqwest::Error| ListError::Transport {
            account: account.to_string(),
            page,
            source: Box::new(source),
        };

        let response = self
            .http
            .get(url)
            .query(&[("page", page), ("per_page", per_page)])
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let body = response.text().await.map_err(transport)?;

        if !status.is_success() {
            return Err(ListError::Status {
                account: account.to_string(),
                page,
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(|source| ListError::Decode {
            account: account.to_string(),
            page,
            source,
            body,
        })
    }
}
