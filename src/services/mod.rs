use crate::archive::{self, ArchiveRequest, DownloadedArchive, TransferProgress};
use crate::error::Result;
use crate::github::{GithubClient, GithubSearchParams, parse_repository_url};

/// Downloads a repository archive, from URL parsing to the last byte
///
/// This pure function runs the whole pipeline:
/// 1. Parses the repository URL into owner and name
/// 2. Resolves the branch (explicit, else the default branch, else `main`)
/// 3. Follows the archive redirect chain, falling back to the mirror once
/// 4. Streams the body, reporting progress through `on_progress`
///
/// All dependencies are passed in, so the server and the CLI share it.
///
/// # Errors
///
/// - [`crate::error::Error::InvalidReference`] when the URL has no owner/name
/// - upstream errors from metadata, redirects, mirror or the body read
pub async fn download_repository_archive<F>(
    client: &GithubClient,
    repo_url: &str,
    display_name: &str,
    branch: Option<String>,
    on_progress: F,
) -> Result<DownloadedArchive>
where
    F: FnMut(&TransferProgress),
{
    let request = ArchiveRequest::parse(repo_url, display_name, branch)?;
    archive::download_archive(client, &request, on_progress).await
}

/// One page of repository search results as GitHub's raw JSON, stars first
pub async fn search_repository_page(
    client: &GithubClient,
    query: &str,
    page: u32,
    per_page: u8,
) -> Result<serde_json::Value> {
    let params = GithubSearchParams::by_stars(query, page, per_page);
    client.search_repositories_raw(&params).await
}

/// Lists every branch of the repository behind `repo_url`
///
/// Only an unparseable URL is an error; listing failures degrade to `["main"]`.
pub async fn list_repository_branches(client: &GithubClient, repo_url: &str) -> Result<Vec<String>> {
    let reference = parse_repository_url(repo_url)?;
    Ok(client.list_branches(&reference.owner, &reference.name).await)
}

/// Today's trending repositories, passed through verbatim
pub async fn trending_repositories(client: &GithubClient) -> Result<serde_json::Value> {
    client.fetch_trending().await
}
