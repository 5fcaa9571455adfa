//! gitzip: GitHub repository search and ZIP archive downloads
//!
//! This library provides:
//! - Repository search with incremental pagination and query auto-correction
//! - ZIP archive downloads of a repository branch, following GitHub's
//!   archive redirect chain with a codeload fallback and streamed progress
//! - Branch listing and the daily trending list
//! - An HTTP proxy server exposing all of the above under `/api/github/*`
//!
//! ## Authentication
//!
//! GitHub operations support both authenticated and unauthenticated access.
//! Authentication is handled through the `GITHUB_TOKEN` environment variable
//! or the `--github-token` flag of the binaries.
//!
//! ```bash
//! # Set GitHub token for authentication (optional)
//! export GITHUB_TOKEN=your_github_token
//! ```
//!
//! - **Rate Limits**:
//!   - Without token: 60 requests/hour (unauthenticated)
//!   - With token: 5,000 requests/hour (authenticated)
//! - **Private Repositories**: Requires token with `repo` scope
//!
//! ## Usage
//!
//! This library can be used in several ways:
//! - As a proxy server (`gitzip http`)
//! - From the terminal (`gitzip-cli`)
//! - Directly as a Rust library
//!
//! ```no_run
//! # async fn run() -> gitzip::error::Result<()> {
//! use gitzip::config::ClientConfig;
//! use gitzip::github::GithubClient;
//!
//! let client = GithubClient::new(ClientConfig::from_env(None))?;
//! let archive = gitzip::services::download_repository_archive(
//!     &client,
//!     "https://github.com/BurntSushi/ripgrep",
//!     "ripgrep",
//!     None,
//!     |progress| println!("{:?}", progress.percent),
//! )
//! .await?;
//! println!("{} bytes from branch {}", archive.bytes.len(), archive.branch);
//! # Ok(())
//! # }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod github;
pub mod search;
pub mod services;
pub mod transport;
