//! Manual redirect following
//!
//! Archive URLs on the web host answer with a 302 to the codeload host. The
//! archive client has automatic redirects disabled so each hop is classified
//! here, the hop count is bounded, and credentials stay on the host they were
//! configured for.

use reqwest::header::{AUTHORIZATION, HeaderMap, LOCATION};
use reqwest::{Client, Response};
use url::Url;

use crate::error::{Error, Result};

/// Redirect hops followed before giving up
pub const MAX_REDIRECTS: usize = 5;

/// Outcome of a single request in the chain
enum Hop {
    Done(Response),
    Follow(Url),
}

/// GET `url`, following at most [`MAX_REDIRECTS`] redirects by hand
///
/// Returns the first 2xx response with its body still unread. `Location` is
/// resolved relative to the URL that produced it. `Authorization` is dropped
/// once a hop leaves the host of the starting URL.
pub async fn fetch_with_redirects(client: &Client, url: Url, headers: HeaderMap) -> Result<Response> {
    let origin = url.clone();
    let mut current = url;
    let mut headers = headers;
    let mut redirects = 0;

    loop {
        tracing::debug!("GET {} (redirect {}/{})", current, redirects, MAX_REDIRECTS);
        let response = client.get(current.clone()).headers(headers.clone()).send().await?;

        match classify(&current, response).await? {
            Hop::Done(response) => return Ok(response),
            Hop::Follow(next) => {
                if redirects == MAX_REDIRECTS {
                    return Err(Error::TooManyRedirects {
                        limit: MAX_REDIRECTS,
                        url: origin.to_string(),
                    });
                }
                redirects += 1;

                if !same_host(&origin, &next) && headers.remove(AUTHORIZATION).is_some() {
                    tracing::debug!("Dropping Authorization for cross-host redirect to {}", next);
                }
                current = next;
            }
        }
    }
}

async fn classify(current: &Url, response: Response) -> Result<Hop> {
    let status = response.status();

    if status.is_success() {
        return Ok(Hop::Done(response));
    }

    if status.is_redirection() {
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| Error::MissingRedirectTarget {
                status: status.as_u16(),
                url: current.to_string(),
            })?;
        return Ok(Hop::Follow(current.join(location)?));
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Upstream {
        status: status.as_u16(),
        body,
    })
}

fn same_host(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_host_ignores_path_and_default_port() {
        let a = Url::parse("https://github.com/a/b/archive/refs/heads/main.zip").unwrap();
        let b = Url::parse("https://github.com:443/other").unwrap();
        let c = Url::parse("https://codeload.github.com/a/b/zip/refs/heads/main").unwrap();
        assert!(same_host(&a, &b));
        assert!(!same_host(&a, &c));
    }
}
