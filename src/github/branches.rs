//! Branch listing with GitHub's two pagination styles
//!
//! `GET /repos/{owner}/{repo}/branches` paginates with a `Link` header. Some
//! deployments omit the header; a full page then continues with a `since`
//! parameter set to the last branch name seen. When the header is present it
//! always decides, even if it carries no `rel="next"` target.

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::LINK;
use url::Url;

use super::GithubClient;
use super::models::BranchItem;
use crate::error::{Error, Result};

/// Branches requested per page
pub const BRANCHES_PER_PAGE: usize = 100;

/// Upper bound on pages followed in a single listing
const MAX_BRANCH_PAGES: usize = 100;

/// Returned when nothing could be listed
pub const FALLBACK_BRANCH: &str = "main";

static NEXT_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<([^>]+)>;\s*rel="next""#).expect("valid regex"));

/// Extracts the `rel="next"` target of a `Link` header
pub fn next_link(link_header: &str) -> Option<&str> {
    NEXT_LINK
        .captures(link_header)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str())
}

/// Where the next page of a listing comes from
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Continuation {
    Next(Url),
    Done,
}

/// Decides how to continue after a page, `Link` header first
pub(crate) fn continuation(
    current: &Url,
    link_header: Option<&str>,
    page: &[BranchItem],
) -> Continuation {
    if let Some(link) = link_header {
        return match next_link(link).and_then(|next| current.join(next).ok()) {
            Some(next) => Continuation::Next(next),
            None => Continuation::Done,
        };
    }

    match page.last() {
        Some(last) if page.len() == BRANCHES_PER_PAGE => {
            let mut next = current.clone();
            let retained: Vec<(String, String)> = current
                .query_pairs()
                .filter(|(key, _)| key != "since")
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect();
            next.query_pairs_mut()
                .clear()
                .extend_pairs(retained)
                .append_pair("since", &last.name);
            Continuation::Next(next)
        }
        _ => Continuation::Done,
    }
}

impl GithubClient {
    /// List every branch name of a repository
    ///
    /// Never fails: upstream errors end the listing early, and an empty
    /// result becomes `["main"]`. When the paged listing yields at most one
    /// branch it is repeated without the `per_page` parameter.
    pub async fn list_branches(&self, owner: &str, repo: &str) -> Vec<String> {
        let mut branches = match self.branches_url(owner, repo, true) {
            Ok(url) => self.collect_branches(url).await,
            Err(e) => Err(e),
        };

        if matches!(&branches, Ok(names) if names.len() <= 1) {
            tracing::debug!("Retrying branch listing of {}/{} without per_page", owner, repo);
            branches = match self.branches_url(owner, repo, false) {
                Ok(url) => self.collect_branches(url).await,
                Err(e) => Err(e),
            };
        }

        match branches {
            Ok(names) if !names.is_empty() => names,
            Ok(_) => vec![FALLBACK_BRANCH.to_string()],
            Err(e) => {
                tracing::warn!("Failed to list branches of {}/{}: {}", owner, repo, e);
                vec![FALLBACK_BRANCH.to_string()]
            }
        }
    }

    fn branches_url(&self, owner: &str, repo: &str, paged: bool) -> Result<Url> {
        let mut url = self.api_url(&["repos", owner, repo, "branches"])?;
        if paged {
            url.query_pairs_mut()
                .append_pair("per_page", &BRANCHES_PER_PAGE.to_string());
        }
        Ok(url)
    }

    async fn collect_branches(&self, start: Url) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut next = Some(start);
        let mut pages = 0;

        while let Some(url) = next.take() {
            if pages == MAX_BRANCH_PAGES {
                tracing::warn!("Stopping branch listing after {} pages", MAX_BRANCH_PAGES);
                break;
            }
            pages += 1;

            let response = self.api_get(url.clone()).send().await?;
            if !response.status().is_success() {
                tracing::debug!("Branch listing stopped at {}: {}", url, response.status());
                if names.is_empty() {
                    names.push(FALLBACK_BRANCH.to_string());
                }
                break;
            }

            let link = response
                .headers()
                .get(LINK)
                .and_then(|value| value.to_str().ok())
                .map(str::to_owned);
            let body = response.bytes().await?;
            let page: Vec<BranchItem> = serde_json::from_slice(&body).map_err(Error::from)?;

            if let Continuation::Next(url) = continuation(&url, link.as_deref(), &page) {
                next = Some(url);
            }
            names.extend(page.into_iter().map(|branch| branch.name));
        }

        Ok(names)
    }
}
