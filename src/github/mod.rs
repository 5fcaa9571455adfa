//! GitHub REST client
//!
//! This module provides the outbound side of every proxy endpoint:
//! - Searching GitHub repositories
//! - Fetching repository metadata (default branch)
//! - Listing branches
//! - Fetching the daily trending list
//! - Issuing archive requests without automatic redirects, so the archive
//!   pipeline can follow them itself
//!
//! ## Authentication
//!
//! Requests to GitHub hosts carry `Authorization: Bearer <token>` when a token
//! is configured (see [`crate::config`]). The trending aggregator is a third
//! party and never receives the token.

pub mod branches;
pub mod models;
pub mod reference;

use std::time::Duration;

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, RequestBuilder, redirect};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::{ClientConfig, GithubEndpoints};
use crate::error::{Error, Result};
use models::{RepositoryMetadata, RepositorySearchResults};

pub use models::{RepositoryItem, RepositoryLicense, RepositoryOwner};
pub use reference::{RepositoryReference, parse_repository_url};

/// Accept header for REST API calls
const API_ACCEPT: &str = "application/vnd.github.v3+json";

/// Accept header for archive downloads
const ARCHIVE_ACCEPT: &str = "application/octet-stream";

/// Default page size of repository searches
pub const DEFAULT_PER_PAGE: u8 = 30;

/// GitHub API limit for `per_page`
pub const MAX_PER_PAGE: u8 = 100;

/// Upstream sort applied to every repository search
const SEARCH_SORT: &str = "stars";

/// Upstream order applied to every repository search
const SEARCH_ORDER: &str = "desc";

/// Search parameters for GitHub repository search
///
/// # Parameter Handling
///
/// Results are always sorted by stars, most starred first.
///
/// - `per_page`: Uses 30 if None, clamped to 1..=100 (GitHub API limit)
/// - `page`: Uses 1 if None, minimum 1
/// - `query`: URL encoded to handle special characters
///
/// # Examples
///
/// ```
/// use gitzip::github::GithubSearchParams;
///
/// let params = GithubSearchParams {
///    query: "language:rust stars:>1000".to_string(),
///    per_page: Some(50),
///    page: Some(2),
/// };
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GithubSearchParams {
    /// Number of results per page (1-100)
    pub per_page: Option<u8>,

    /// Page number for pagination (starts at 1)
    pub page: Option<u32>,

    /// Search query for repositories, GitHub search syntax allowed
    pub query: String,
}

impl GithubSearchParams {
    pub fn by_stars(query: impl Into<String>, page: u32, per_page: u8) -> Self {
        Self {
            query: query.into(),
            per_page: Some(per_page),
            page: Some(page),
        }
    }

    pub fn effective_per_page(&self) -> u8 {
        self.per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
    }

    pub fn effective_page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }
}

/// Client for the GitHub REST API and archive hosts
///
/// Holds two `reqwest` clients: one for API calls (redirects followed by
/// reqwest) and one for archive downloads with redirects disabled.
///
/// API calls are bounded as a whole by the configured timeout. Archive
/// requests only get a connect timeout here, since a large body may take
/// far longer than that to arrive. The archive pipeline bounds the wait for
/// headers and for each body chunk with [`GithubClient::transfer_timeout`].
#[derive(Debug, Clone)]
pub struct GithubClient {
    api: Client,
    archive: Client,
    transfer_timeout: Duration,
    github_token: Option<String>,
    endpoints: GithubEndpoints,
    user_agent: String,
}

impl GithubClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let api = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()?;
        let archive = Client::builder()
            .connect_timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .redirect(redirect::Policy::none())
            .build()?;

        Ok(Self {
            api,
            archive,
            transfer_timeout: config.timeout,
            github_token: config.github_token,
            endpoints: config.endpoints,
            user_agent: config.user_agent,
        })
    }

    pub fn endpoints(&self) -> &GithubEndpoints {
        &self.endpoints
    }

    /// Longest an archive transfer may wait for headers or between chunks
    pub fn transfer_timeout(&self) -> Duration {
        self.transfer_timeout
    }

    /// Client with redirects disabled, used by the archive pipeline
    pub fn archive_http(&self) -> &Client {
        &self.archive
    }

    /// Headers sent with archive downloads
    pub fn archive_headers(&self) -> HeaderMap {
        let mut headers = self.base_headers();
        headers.insert(ACCEPT, HeaderValue::from_static(ARCHIVE_ACCEPT));
        headers
    }

    fn base_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.user_agent) {
            headers.insert(USER_AGENT, value);
        }
        if let Some(token) = &self.github_token {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(e) => tracing::warn!("Ignoring GitHub token, not a valid header: {}", e),
            }
        }
        headers
    }

    /// Builds `{api_base}/seg1/seg2/...`, percent-encoding each segment
    pub(crate) fn api_url(&self, segments: &[&str]) -> Result<Url> {
        join_segments(&self.endpoints.api_base, segments)
    }

    pub(crate) fn api_get(&self, url: Url) -> RequestBuilder {
        let mut headers = self.base_headers();
        headers.insert(ACCEPT, HeaderValue::from_static(API_ACCEPT));
        self.api.get(url).headers(headers)
    }

    /// Constructs the GitHub API URL for repository search
    ///
    /// Example: `https://api.github.com/search/repositories?q=rust%20web&sort=stars&order=desc&per_page=30&page=1`
    fn construct_search_url(&self, params: &GithubSearchParams) -> String {
        format!(
            "{}/search/repositories?q={}&sort={}&order={}&per_page={}&page={}",
            self.endpoints.api_base.as_str().trim_end_matches('/'),
            urlencoding::encode(&params.query),
            SEARCH_SORT,
            SEARCH_ORDER,
            params.effective_per_page(),
            params.effective_page()
        )
    }

    /// Executes a repository search and returns GitHub's JSON untouched
    ///
    /// The proxy endpoint passes this value straight through to its caller.
    pub async fn search_repositories_raw(
        &self,
        params: &GithubSearchParams,
    ) -> Result<serde_json::Value> {
        let url = Url::parse(&self.construct_search_url(params))?;
        tracing::debug!("Searching repositories: {}", url);

        let response = self.api_get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Search for GitHub repositories using the GitHub API
    ///
    /// # Rate Limiting
    ///
    /// - Unauthenticated: 10 search requests/minute
    /// - Authenticated: 30 search requests/minute
    pub async fn search_repositories(
        &self,
        params: &GithubSearchParams,
    ) -> Result<RepositorySearchResults> {
        let raw = self.search_repositories_raw(params).await?;
        Ok(serde_json::from_value(raw)?)
    }

    /// Fetches the repository's default branch
    ///
    /// Returns `Ok(None)` when the metadata has no usable `default_branch`.
    /// A non-2xx answer is a [`Error::MetadataFetchFailed`].
    pub async fn fetch_default_branch(&self, reference: &RepositoryReference) -> Result<Option<String>> {
        let url = self.api_url(&["repos", &reference.owner, &reference.name])?;
        let response = self.api_get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::MetadataFetchFailed {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let metadata = match serde_json::from_slice::<RepositoryMetadata>(&bytes) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!("Malformed metadata for {}: {}", reference, e);
                RepositoryMetadata::default()
            }
        };

        Ok(metadata.default_branch.filter(|branch| !branch.is_empty()))
    }

    /// Fetches the daily trending repositories from the third-party aggregator
    pub async fn fetch_trending(&self) -> Result<serde_json::Value> {
        let url = self.endpoints.trending_url.clone();
        let mut request = self.api.get(url.clone());
        if self.endpoints.is_github_host(&url) {
            request = request.headers(self.base_headers());
        }

        tracing::debug!("Fetching trending repositories: {}", url);
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Appends path segments to a base URL, keeping any path prefix of the base
pub(crate) fn join_segments<S: AsRef<str>>(base: &Url, segments: &[S]) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| Error::Url(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .pop_if_empty()
        .extend(segments.iter().map(|s| s.as_ref()));
    Ok(url)
}
