//! Domain models for GitHub data
//!
//! These mirror the subset of the GitHub REST payloads that the download
//! pipeline and the search driver actually read. Every field that GitHub may
//! omit is optional, so the same types decode both the raw GitHub responses
//! and the responses passed through by the proxy server.

use serde::{Deserialize, Serialize};

/// Repository search results
///
/// One page of `GET /search/repositories`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositorySearchResults {
    /// Total number of matching repositories
    #[serde(default)]
    pub total_count: Option<u64>,

    /// Indicates if the result was incomplete due to a search timeout
    #[serde(default)]
    pub incomplete_results: bool,

    /// List of repository items
    #[serde(default)]
    pub items: Vec<RepositoryItem>,
}

/// A repository item in search results
///
/// `id` is the identity used to keep accumulated search results free of
/// duplicates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryItem {
    /// Repository ID (unique on GitHub)
    pub id: u64,

    /// Repository name (without owner)
    pub name: String,

    /// `owner/name`
    #[serde(default)]
    pub full_name: String,

    /// Repository owner information
    pub owner: Option<RepositoryOwner>,

    /// URL for viewing the repository in a browser
    pub html_url: Option<String>,

    /// HTTPS clone URL
    pub clone_url: Option<String>,

    /// Repository description
    pub description: Option<String>,

    /// Number of stargazers (stars)
    #[serde(default)]
    pub stargazers_count: u64,

    /// Number of forks
    #[serde(default)]
    pub forks_count: u64,

    /// Primary programming language
    pub language: Option<String>,

    /// Repository topics/tags
    #[serde(default)]
    pub topics: Vec<String>,

    /// Default branch name
    pub default_branch: Option<String>,

    /// When the repository was last updated
    pub updated_at: Option<String>,

    /// Repository license information
    pub license: Option<RepositoryLicense>,
}

/// Repository owner information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryOwner {
    /// Owner's login name
    pub login: String,

    /// Avatar image URL
    pub avatar_url: Option<String>,

    /// Owner type (User or Organization)
    #[serde(rename = "type")]
    pub type_field: Option<String>,
}

/// Repository license information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryLicense {
    /// License key/identifier
    pub key: String,

    /// License name
    pub name: String,
}

/// The part of `GET /repos/{owner}/{repo}` the branch resolver reads
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct RepositoryMetadata {
    #[serde(default)]
    pub default_branch: Option<String>,
}

/// One entry of `GET /repos/{owner}/{repo}/branches`
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct BranchItem {
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_sparse_search_item() {
        let json = r#"{
            "total_count": 1,
            "items": [{"id": 7, "name": "repo", "owner": {"login": "me"}}]
        }"#;
        let results: RepositorySearchResults = serde_json::from_str(json).unwrap();
        assert_eq!(results.total_count, Some(1));
        assert!(!results.incomplete_results);
        let item = &results.items[0];
        assert_eq!(item.id, 7);
        assert_eq!(item.stargazers_count, 0);
        assert!(item.topics.is_empty());
        assert_eq!(item.owner.as_ref().map(|o| o.login.as_str()), Some("me"));
    }

    #[test]
    fn test_missing_total_count_is_none() {
        let results: RepositorySearchResults = serde_json::from_str(r#"{"items": []}"#).unwrap();
        assert_eq!(results.total_count, None);
    }
}
