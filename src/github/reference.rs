use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Host prefixes stripped by the permissive fallback parser
const KNOWN_HOST_PREFIXES: [&str; 3] = ["https://github.com/", "git@github.com:", "github.com/"];

/// `owner/name` pair identifying a GitHub repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryReference {
    /// GitHub username or organization
    pub owner: String,
    /// Repository name
    pub name: String,
}

impl RepositoryReference {
    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Canonical browser URL of the repository
    pub fn html_url(&self) -> String {
        format!("https://github.com/{}/{}", self.owner, self.name)
    }
}

impl std::fmt::Display for RepositoryReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

impl std::str::FromStr for RepositoryReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        parse_repository_url(s)
    }
}

/// Parse a loosely formatted repository locator into owner and name
///
/// Accepted forms include:
/// - `https://github.com/user/repo` (any host, trailing `/` or `.git`)
/// - `github:user/repo`
/// - `git@github.com:user/repo.git`
/// - `user/repo`
///
/// Strict URL parsing is attempted first. When the input is not a URL the
/// known GitHub host prefixes are stripped and the remainder is split on `/`.
///
/// # Examples
///
/// ```
/// use gitzip::github::parse_repository_url;
///
/// let reference = parse_repository_url("https://github.com/BurntSushi/ripgrep.git").unwrap();
/// assert_eq!(reference.owner, "BurntSushi");
/// assert_eq!(reference.name, "ripgrep");
/// ```
pub fn parse_repository_url(input: &str) -> Result<RepositoryReference> {
    let trimmed = input.trim();

    let path = match Url::parse(trimmed) {
        Ok(url) => url.path().to_string(),
        Err(_) => {
            tracing::debug!("Not a URL, using permissive parsing: {}", trimmed);
            KNOWN_HOST_PREFIXES
                .iter()
                .find_map(|prefix| trimmed.strip_prefix(prefix))
                .unwrap_or(trimmed)
                .to_string()
        }
    };

    owner_and_name(&path).ok_or_else(|| Error::InvalidReference(input.to_string()))
}

fn owner_and_name(path: &str) -> Option<RepositoryReference> {
    let path = path.trim_start_matches('/').trim_end_matches('/');
    let path = path.strip_suffix(".git").unwrap_or(path);

    let mut parts = path.split('/');
    let owner = parts.next().filter(|s| !s.is_empty())?;
    let name = parts.next().filter(|s| !s.is_empty())?;

    Some(RepositoryReference {
        owner: owner.to_string(),
        name: name.to_string(),
    })
}
