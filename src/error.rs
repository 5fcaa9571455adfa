//! Error types shared by the download pipeline, the search driver and the
//! GitHub client.
//!
//! Every failure that can reach a caller is one of the variants below. The
//! HTTP layer maps them onto status codes in
//! [`crate::transport::handlers::ApiError`].

/// Result alias used throughout the crate
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The repository locator could not be parsed into `owner/name`
    #[error("Unable to parse repository owner/name from URL: {0}")]
    InvalidReference(String),

    /// The repository metadata endpoint answered with a non-2xx status
    #[error("Failed to fetch repo metadata: {status} {body}")]
    MetadataFetchFailed { status: u16, body: String },

    /// An upstream endpoint answered with a non-2xx, non-redirect status
    #[error("Upstream responded {status}: {body}")]
    Upstream { status: u16, body: String },

    /// A 3xx response carried no `Location` header
    #[error("Redirect without Location header ({status} from {url})")]
    MissingRedirectTarget { status: u16, url: String },

    /// The redirect chain was longer than the hop limit
    #[error("Too many redirects (more than {limit}) starting at {url}")]
    TooManyRedirects { limit: usize, url: String },

    /// No response headers arrived within the timeout
    #[error("No response from {url} within {seconds}s")]
    TimedOut { seconds: u64, url: String },

    /// The response body failed or stalled mid-transfer
    #[error("Failed to read response body: {0}")]
    StreamRead(String),

    /// Transport level failure (connect, timeout, TLS)
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// A JSON body could not be decoded
    #[error("Failed to parse response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Writing a finished archive to disk failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than by an
    /// upstream service
    pub fn is_user_error(&self) -> bool {
        matches!(self, Error::InvalidReference(_))
    }

    /// Upstream HTTP status carried by the error, if any
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Error::MetadataFetchFailed { status, .. }
            | Error::Upstream { status, .. }
            | Error::MissingRedirectTarget { status, .. } => Some(*status),
            Error::Request(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
