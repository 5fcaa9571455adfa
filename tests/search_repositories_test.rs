//! Tests for repository search against the GitHub search endpoint
//!
//! These tests verify:
//! 1. The query string sent upstream (stars first, page size, page number)
//! 2. Decoding of sparse search payloads
//! 3. Error handling for non-2xx answers

use gitzip::config::{ClientConfig, GithubEndpoints};
use gitzip::github::{GithubClient, GithubSearchParams};
use gitzip::search::SearchPageSource;
use mockito::{Matcher, Server, ServerGuard};
use serde_json::json;

fn client_for(server: &ServerGuard) -> GithubClient {
    let endpoints = GithubEndpoints::with_base(&server.url()).unwrap();
    GithubClient::new(ClientConfig::default().with_endpoints(endpoints)).unwrap()
}

fn search_body() -> String {
    json!({
        "total_count": 2,
        "incomplete_results": false,
        "items": [
            {
                "id": 1,
                "name": "tokio",
                "full_name": "tokio-rs/tokio",
                "owner": {"login": "tokio-rs", "avatar_url": "https://avatars.example/1", "type": "Organization"},
                "html_url": "https://github.com/tokio-rs/tokio",
                "description": "A runtime for writing reliable asynchronous applications",
                "stargazers_count": 25000,
                "forks_count": 2300,
                "language": "Rust",
                "topics": ["async", "rust"],
                "default_branch": "master",
                "license": {"key": "mit", "name": "MIT License"}
            },
            {"id": 2, "name": "mio", "full_name": "tokio-rs/mio", "stargazers_count": 6000}
        ]
    })
    .to_string()
}

#[tokio::test]
async fn test_search_sends_stars_desc_query() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("q".into(), "async runtime".into()),
            Matcher::UrlEncoded("sort".into(), "stars".into()),
            Matcher::UrlEncoded("order".into(), "desc".into()),
            Matcher::UrlEncoded("per_page".into(), "30".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(search_body())
        .create_async()
        .await;

    let client = client_for(&server);
    let results = client
        .search_repositories(&GithubSearchParams::by_stars("async runtime", 2, 30))
        .await
        .unwrap();

    mock.assert_async().await;
    assert_eq!(results.total_count, Some(2));
    assert_eq!(results.items.len(), 2);

    let tokio = &results.items[0];
    assert_eq!(tokio.full_name, "tokio-rs/tokio");
    assert_eq!(tokio.owner.as_ref().unwrap().type_field.as_deref(), Some("Organization"));
    assert_eq!(tokio.license.as_ref().unwrap().key, "mit");
    assert_eq!(results.items[1].language, None);
}

#[tokio::test]
async fn test_raw_search_passes_json_through() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(r#"{"total_count": 0, "items": [], "extra": {"kept": true}}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let raw = client
        .search_repositories_raw(&GithubSearchParams::by_stars("nothing", 1, 30))
        .await
        .unwrap();
    assert_eq!(raw["extra"]["kept"], json!(true));
}

#[tokio::test]
async fn test_page_source_reports_page_number() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::UrlEncoded("page".into(), "3".into()))
        .with_status(200)
        .with_body(search_body())
        .create_async()
        .await;

    let client = client_for(&server);
    let page = client.fetch_page("tokio", 3, 2).await.unwrap();
    assert_eq!(page.page_number, 3);
    assert_eq!(page.total_count, Some(2));
    assert_eq!(page.items.len(), 2);
}

#[tokio::test]
async fn test_search_error_keeps_upstream_status() {
    let mut server = Server::new_async().await;
    let _mock = server
        .mock("GET", "/search/repositories")
        .match_query(Matcher::Any)
        .with_status(403)
        .with_body(r#"{"message":"API rate limit exceeded"}"#)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = client
        .search_repositories(&GithubSearchParams::by_stars("tokio", 1, 30))
        .await
        .unwrap_err();
    assert_eq!(err.upstream_status(), Some(403));
    assert!(err.to_string().contains("rate limit"));
}
