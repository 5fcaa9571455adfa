//! Client for a running `gitzip` server
//!
//! Lets the CLI route searches and downloads through the proxy endpoints
//! instead of calling GitHub directly.

use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use url::Url;

use super::handlers::BranchesResponse;
use crate::archive::TransferReporter;
use crate::config::DEFAULT_TIMEOUT;
use crate::error::{Error, Result};
use crate::github::models::RepositorySearchResults;
use crate::search::{SearchPage, SearchPageSource};

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// JSON calls are bounded as a whole by the timeout. Downloads are not,
/// because the server answers only once it holds the whole archive, and the
/// server already bounds its own upstream stalls. Their body is still failed
/// when it stalls for longer than the timeout.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    http: Client,
    base: Url,
    timeout: Duration,
}

impl ProxyClient {
    pub fn new(base: &str) -> Result<Self> {
        Self::with_timeout(base, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(timeout)
            .user_agent(format!("gitzip/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base: Url::parse(base)?,
            timeout,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    async fn get(&self, url: Url) -> Result<Response> {
        self.send(self.http.get(url).timeout(self.timeout)).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = request.build()?;
        tracing::debug!("{} {}", request.method(), request.url());
        let response = self.http.execute(request).await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let text = response.text().await.unwrap_or_default();
        let body = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error)
            .unwrap_or(text);
        Err(Error::Upstream {
            status: status.as_u16(),
            body,
        })
    }

    /// Starts a download through the server, leaving the body unread
    pub async fn open_download(
        &self,
        repo_url: &str,
        repo_name: &str,
        branch: Option<&str>,
    ) -> Result<TransferReporter<impl Stream<Item = reqwest::Result<Bytes>>>> {
        let mut url = self.endpoint("/api/github/download")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("repoUrl", repo_url).append_pair("repoName", repo_name);
            if let Some(branch) = branch {
                pairs.append_pair("branch", branch);
            }
        }

        let response = self.send(self.http.get(url)).await?;
        let length = response.content_length();
        Ok(TransferReporter::new(response.bytes_stream(), length).with_idle_timeout(self.timeout))
    }

    pub async fn list_branches(&self, repo_url: &str) -> Result<Vec<String>> {
        let mut url = self.endpoint("/api/github/branches")?;
        url.query_pairs_mut().append_pair("repoUrl", repo_url);
        let body: BranchesResponse = self.get(url).await?.json().await?;
        Ok(body.branches)
    }

    pub async fn trending(&self) -> Result<serde_json::Value> {
        let url = self.endpoint("/api/github/trending")?;
        Ok(self.get(url).await?.json().await?)
    }
}

impl SearchPageSource for ProxyClient {
    async fn fetch_page(&self, query: &str, page: u32, per_page: u8) -> Result<SearchPage> {
        let mut url = self.endpoint("/api/github/search")?;
        url.query_pairs_mut()
            .append_pair("q", query)
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &per_page.to_string());

        let bytes = self.get(url).await?.bytes().await?;
        let results: RepositorySearchResults = serde_json::from_slice(&bytes)?;
        Ok(SearchPage {
            items: results.items,
            total_count: results.total_count,
            page_number: page,
        })
    }
}
