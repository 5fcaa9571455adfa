//! Client configuration
//!
//! ## Authentication
//!
//! Outbound calls to GitHub can be authenticated with a personal access token.
//! The token is resolved in this order:
//!
//! 1. The `--github-token` command line argument
//! 2. The `GITHUB_TOKEN` environment variable
//!
//! Without a token the GitHub API allows 60 requests/hour; with one, 5,000.

use std::time::Duration;

use url::Url;

use crate::error::Result;

/// Environment variable holding the optional GitHub token
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Default timeout for API calls
///
/// Archive transfers use it as a connect timeout and as the longest they may
/// go without receiving data. A slow transfer that keeps making progress is
/// never cut off.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Base URLs of every upstream service the crate talks to
///
/// The defaults point at the public GitHub hosts. Tests replace them with the
/// address of a local mock server.
#[derive(Debug, Clone)]
pub struct GithubEndpoints {
    /// REST API root, e.g. `https://api.github.com`
    pub api_base: Url,
    /// Web host serving `/{owner}/{repo}/archive/...`
    pub web_base: Url,
    /// Mirror host serving `/{owner}/{repo}/zip/...`
    pub codeload_base: Url,
    /// Third-party daily trending aggregator
    pub trending_url: Url,
}

impl GithubEndpoints {
    /// Points every GitHub endpoint at the same base URL
    pub fn with_base(base: &str) -> Result<Self> {
        let base = Url::parse(base)?;
        Ok(Self {
            api_base: base.clone(),
            web_base: base.clone(),
            codeload_base: base.clone(),
            trending_url: base.join("/repositories?since=daily")?,
        })
    }

    /// Whether the URL belongs to a GitHub host that should receive the token
    pub fn is_github_host(&self, url: &Url) -> bool {
        [&self.api_base, &self.web_base, &self.codeload_base]
            .iter()
            .any(|base| base.host_str() == url.host_str() && base.port() == url.port())
    }
}

impl Default for GithubEndpoints {
    fn default() -> Self {
        Self {
            api_base: Url::parse("https://api.github.com").expect("valid literal URL"),
            web_base: Url::parse("https://github.com").expect("valid literal URL"),
            codeload_base: Url::parse("https://codeload.github.com").expect("valid literal URL"),
            trending_url: Url::parse("https://ghapi.huchen.dev/repositories?since=daily")
                .expect("valid literal URL"),
        }
    }
}

/// Everything needed to build a [`crate::github::GithubClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub github_token: Option<String>,
    pub endpoints: GithubEndpoints,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    /// Builds a configuration, falling back to `GITHUB_TOKEN` when no token
    /// is passed explicitly
    pub fn from_env(github_token: Option<String>) -> Self {
        let github_token = github_token
            .or_else(|| std::env::var(GITHUB_TOKEN_ENV).ok())
            .filter(|token| !token.trim().is_empty());

        Self {
            github_token,
            ..Self::default()
        }
    }

    pub fn with_endpoints(mut self, endpoints: GithubEndpoints) -> Self {
        self.endpoints = endpoints;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Human readable authentication status for startup logs
    pub fn auth_status(&self) -> &'static str {
        if self.github_token.is_some() {
            "Authenticated GitHub API access enabled (5,000 requests/hour)"
        } else {
            "Unauthenticated GitHub API access (60 requests/hour limit). Set GITHUB_TOKEN for higher limits."
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            github_token: None,
            endpoints: GithubEndpoints::default(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("gitzip/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}
