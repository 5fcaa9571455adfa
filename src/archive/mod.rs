//! Repository archive download pipeline
//!
//! ```text
//! RepositoryReference ──► resolve_branch ──► fetch_with_redirects ──► TransferReporter
//!                                              (primary, then mirror)
//! ```
//!
//! The primary URL is the web host's `/archive/refs/heads/{branch}.zip`, which
//! normally redirects to codeload. If anything along that chain fails the
//! whole chain is retried once against codeload's `/zip/refs/heads/{branch}`.

pub mod redirect;
pub mod transfer;

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use futures::Stream;
use serde::Serialize;
use strum::{AsRefStr, Display};
use url::Url;

use crate::config::GithubEndpoints;
use crate::error::{Error, Result};
use crate::github::{GithubClient, RepositoryReference, join_segments, parse_repository_url};
pub use redirect::{MAX_REDIRECTS, fetch_with_redirects};
pub use transfer::{TransferProgress, TransferReporter};

/// Branch used when a repository reports no default branch
pub const DEFAULT_BRANCH: &str = "main";

/// Suggested file name stem when the caller gives none
pub const DEFAULT_DISPLAY_NAME: &str = "repository";

/// What to download
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRequest {
    pub reference: RepositoryReference,
    /// Stem of the suggested `.zip` file name
    pub display_name: String,
    pub branch: Option<String>,
}

impl ArchiveRequest {
    pub fn new(
        reference: RepositoryReference,
        display_name: impl Into<String>,
        branch: Option<String>,
    ) -> Self {
        Self {
            reference,
            display_name: display_name.into(),
            branch,
        }
    }

    /// Parses a repository URL into a request
    pub fn parse(repo_url: &str, display_name: impl Into<String>, branch: Option<String>) -> Result<Self> {
        Ok(Self::new(parse_repository_url(repo_url)?, display_name, branch))
    }

    pub fn file_name(&self) -> String {
        format!("{}.zip", self.display_name)
    }
}

/// Which host ended up serving the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ArchiveSource {
    Primary,
    Mirror,
}

/// An archive response whose body has not been read yet
#[derive(Debug)]
pub struct ArchiveResponse {
    pub branch: String,
    pub source: ArchiveSource,
    response: reqwest::Response,
    idle_timeout: Duration,
}

impl ArchiveResponse {
    /// Final URL after redirects
    pub fn url(&self) -> &Url {
        self.response.url()
    }

    pub fn into_transfer(self) -> TransferReporter<impl Stream<Item = reqwest::Result<Bytes>>> {
        let length = self.response.content_length();
        TransferReporter::new(self.response.bytes_stream(), length)
            .with_idle_timeout(self.idle_timeout)
    }
}

/// A fully transferred archive
#[derive(Debug, Clone)]
pub struct DownloadedArchive {
    pub file_name: String,
    pub branch: String,
    pub source: ArchiveSource,
    pub bytes: Bytes,
}

/// Branch segments with `.zip` appended to the last one
fn branch_segments(branch: &str, suffix: &str) -> Vec<String> {
    let mut segments: Vec<String> = branch.split('/').map(str::to_owned).collect();
    if let Some(last) = segments.last_mut() {
        last.push_str(suffix);
    }
    segments
}

/// `{web}/{owner}/{repo}/archive/refs/heads/{branch}.zip`
pub fn primary_archive_url(
    endpoints: &GithubEndpoints,
    reference: &RepositoryReference,
    branch: &str,
) -> Result<Url> {
    let mut segments = vec![
        reference.owner.clone(),
        reference.name.clone(),
        "archive".to_string(),
        "refs".to_string(),
        "heads".to_string(),
    ];
    segments.extend(branch_segments(branch, ".zip"));
    join_segments(&endpoints.web_base, &segments)
}

/// `{codeload}/{owner}/{repo}/zip/refs/heads/{branch}`
pub fn mirror_archive_url(
    endpoints: &GithubEndpoints,
    reference: &RepositoryReference,
    branch: &str,
) -> Result<Url> {
    let mut segments = vec![
        reference.owner.clone(),
        reference.name.clone(),
        "zip".to_string(),
        "refs".to_string(),
        "heads".to_string(),
    ];
    segments.extend(branch_segments(branch, ""));
    join_segments(&endpoints.codeload_base, &segments)
}

/// Picks the branch to download
///
/// A non-empty explicit branch is used as given, without checking that it
/// exists. Otherwise the repository's default branch is fetched, falling back
/// to `main` when GitHub does not report one.
pub async fn resolve_branch(
    client: &GithubClient,
    reference: &RepositoryReference,
    explicit: Option<&str>,
) -> Result<String> {
    if let Some(branch) = explicit.filter(|branch| !branch.trim().is_empty()) {
        return Ok(branch.to_string());
    }

    match client.fetch_default_branch(reference).await? {
        Some(branch) => {
            tracing::info!("Default branch of {} is {}", reference, branch);
            Ok(branch)
        }
        None => {
            tracing::warn!("No default branch reported for {}, using {}", reference, DEFAULT_BRANCH);
            Ok(DEFAULT_BRANCH.to_string())
        }
    }
}

/// Runs `fetch` against the primary URL, and once against the mirror if that
/// fails. The mirror's error is the one returned when both fail.
pub async fn with_mirror_fallback<T, F, Fut>(
    primary: Url,
    mirror: Url,
    fetch: F,
) -> Result<(T, ArchiveSource)>
where
    F: Fn(Url) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match fetch(primary.clone()).await {
        Ok(value) => Ok((value, ArchiveSource::Primary)),
        Err(e) => {
            tracing::warn!("Archive fetch from {} failed ({}), trying {}", primary, e, mirror);
            fetch(mirror).await.map(|value| (value, ArchiveSource::Mirror))
        }
    }
}

/// Resolves the branch and follows the archive redirect chain, leaving the
/// body unread
///
/// Each attempt must produce response headers within the client's transfer
/// timeout. A primary attempt that runs out of time falls back to the mirror
/// like any other failure.
pub async fn open_archive(client: &GithubClient, request: &ArchiveRequest) -> Result<ArchiveResponse> {
    let branch = resolve_branch(client, &request.reference, request.branch.as_deref()).await?;

    let endpoints = client.endpoints();
    let primary = primary_archive_url(endpoints, &request.reference, &branch)?;
    let mirror = mirror_archive_url(endpoints, &request.reference, &branch)?;

    let headers = client.archive_headers();
    let http = client.archive_http();
    let idle_timeout = client.transfer_timeout();
    let (response, source) = with_mirror_fallback(primary, mirror, |url| {
        let headers = headers.clone();
        async move {
            let target = url.to_string();
            tokio::time::timeout(idle_timeout, fetch_with_redirects(http, url, headers))
                .await
                .map_err(|_| Error::TimedOut {
                    seconds: idle_timeout.as_secs(),
                    url: target,
                })?
        }
    })
    .await?;

    let archive = ArchiveResponse {
        branch,
        source,
        response,
        idle_timeout,
    };
    tracing::info!(
        "Downloading {} ({}) from {} via {}",
        request.reference,
        archive.branch,
        archive.url(),
        archive.source
    );
    Ok(archive)
}

/// Downloads the whole archive, reporting progress along the way
pub async fn download_archive<F>(
    client: &GithubClient,
    request: &ArchiveRequest,
    on_progress: F,
) -> Result<DownloadedArchive>
where
    F: FnMut(&TransferProgress),
{
    let response = open_archive(client, request).await?;
    let branch = response.branch.clone();
    let source = response.source;

    let bytes = response.into_transfer().run(on_progress).await?;

    Ok(DownloadedArchive {
        file_name: request.file_name(),
        branch,
        source,
        bytes,
    })
}

/// Writes a fully transferred archive to `{output_dir}/{file_name}`
///
/// Only called after the transfer succeeded, so a failed download never
/// leaves a partial file behind. The bytes go to a `.part` sibling first and
/// are renamed into place, so a failed write does not either.
pub async fn save_archive(output_dir: &Path, file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    tokio::fs::create_dir_all(output_dir).await?;
    let path = output_dir.join(file_name);
    let partial = output_dir.join(format!("{}.part", file_name));

    let written = async {
        tokio::fs::write(&partial, bytes).await?;
        tokio::fs::rename(&partial, &path).await
    }
    .await;
    if let Err(e) = written {
        if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
            tracing::debug!("Could not remove {}: {}", partial.display(), cleanup);
        }
        return Err(e.into());
    }

    tracing::info!("Saved {} bytes to {}", bytes.len(), path.display());
    Ok(path)
}

/// `Content-Disposition` value for an archive named after `display_name`
///
/// Quotes, backslashes and control characters would break out of the quoted
/// string and are replaced with `_`.
pub fn attachment_disposition(display_name: &str) -> String {
    let sanitized: String = display_name
        .chars()
        .map(|c| match c {
            '"' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    format!("attachment; filename=\"{}.zip\"", sanitized)
}
