//! Tests for the download pipeline: branch resolution, the primary archive
//! URL with its codeload redirect, the mirror fallback and progress
//! reporting.

use std::io::Write;
use std::time::Duration;

use gitzip::archive::{self, ArchiveRequest, ArchiveSource};
use gitzip::config::{ClientConfig, GithubEndpoints};
use gitzip::error::Error;
use gitzip::github::{GithubClient, parse_repository_url};
use mockito::{Server, ServerGuard};
use tokio_test::assert_ok;
use url::Url;

const ARCHIVE_BYTES: &[u8] = b"PK\x03\x04 not really a zip but close enough";

fn client_for(server: &ServerGuard) -> GithubClient {
    let endpoints = GithubEndpoints::with_base(&server.url()).unwrap();
    GithubClient::new(ClientConfig::default().with_endpoints(endpoints)).unwrap()
}

fn client_with_timeout(server: &ServerGuard, timeout: Duration) -> GithubClient {
    let endpoints = GithubEndpoints::with_base(&server.url()).unwrap();
    let config = ClientConfig::default().with_endpoints(endpoints).with_timeout(timeout);
    GithubClient::new(config).unwrap()
}

fn request(branch: Option<&str>) -> ArchiveRequest {
    ArchiveRequest::parse("https://github.com/octo/hello", "hello", branch.map(String::from)).unwrap()
}

#[tokio::test]
async fn test_explicit_branch_skips_metadata() {
    let mut server = Server::new_async().await;
    let metadata = server
        .mock("GET", "/repos/octo/hello")
        .expect(0)
        .create_async()
        .await;
    let primary = server
        .mock("GET", "/octo/hello/archive/refs/heads/dev.zip")
        .with_status(200)
        .with_body(ARCHIVE_BYTES)
        .create_async()
        .await;

    let client = client_for(&server);
    let archive = assert_ok!(archive::download_archive(&client, &request(Some("dev")), |_| {}).await);

    assert_eq!(archive.branch, "dev");
    assert_eq!(archive.source, ArchiveSource::Primary);
    assert_eq!(archive.file_name, "hello.zip");
    assert_eq!(&archive.bytes[..], ARCHIVE_BYTES);
    metadata.assert_async().await;
    primary.assert_async().await;
}

#[tokio::test]
async fn test_default_branch_and_codeload_redirect() {
    let mut server = Server::new_async().await;
    let _metadata = server
        .mock("GET", "/repos/octo/hello")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"full_name": "octo/hello", "default_branch": "trunk"}"#)
        .create_async()
        .await;
    let _primary = server
        .mock("GET", "/octo/hello/archive/refs/heads/trunk.zip")
        .with_status(302)
        .with_header("location", "/octo/hello/zip/refs/heads/trunk")
        .create_async()
        .await;
    let codeload = server
        .mock("GET", "/octo/hello/zip/refs/heads/trunk")
        .with_status(200)
        .with_body(ARCHIVE_BYTES)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let mut percents = Vec::new();
    let archive = archive::download_archive(&client, &request(None), |p| percents.push(p.percent))
        .await
        .unwrap();

    assert_eq!(archive.branch, "trunk");
    // Redirected by the primary host, not a fallback
    assert_eq!(archive.source, ArchiveSource::Primary);
    assert!(percents.len() >= 2);
    assert_eq!(percents.last(), Some(&Some(100)));
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    codeload.assert_async().await;
}

#[tokio::test]
async fn test_missing_default_branch_falls_back_to_main() {
    let mut server = Server::new_async().await;
    let _metadata = server
        .mock("GET", "/repos/octo/hello")
        .with_status(200)
        .with_body(r#"{"full_name": "octo/hello"}"#)
        .create_async()
        .await;
    let _primary = server
        .mock("GET", "/octo/hello/archive/refs/heads/main.zip")
        .with_status(200)
        .with_body(ARCHIVE_BYTES)
        .create_async()
        .await;

    let client = client_for(&server);
    let reference = parse_repository_url("octo/hello").unwrap();
    let branch = archive::resolve_branch(&client, &reference, None).await.unwrap();
    assert_eq!(branch, "main");

    // An empty explicit branch counts as absent
    let branch = archive::resolve_branch(&client, &reference, Some("")).await.unwrap();
    assert_eq!(branch, "main");
}

#[tokio::test]
async fn test_metadata_failure_is_fatal() {
    let mut server = Server::new_async().await;
    let _metadata = server
        .mock("GET", "/repos/octo/hello")
        .with_status(404)
        .with_body(r#"{"message":"Not Found"}"#)
        .create_async()
        .await;
    let primary = server
        .mock("GET", "/octo/hello/archive/refs/heads/main.zip")
        .expect(0)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = archive::download_archive(&client, &request(None), |_| {})
        .await
        .unwrap_err();

    match err {
        Error::MetadataFetchFailed { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("Not Found"));
        }
        other => panic!("unexpected error: {}", other),
    }
    primary.assert_async().await;
}

#[tokio::test]
async fn test_primary_failure_tries_mirror_once() {
    let mut server = Server::new_async().await;
    let primary = server
        .mock("GET", "/octo/hello/archive/refs/heads/main.zip")
        .with_status(500)
        .with_body("primary broken")
        .expect(1)
        .create_async()
        .await;
    let mirror = server
        .mock("GET", "/octo/hello/zip/refs/heads/main")
        .with_status(200)
        .with_body(ARCHIVE_BYTES)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let archive = archive::download_archive(&client, &request(Some("main")), |_| {})
        .await
        .unwrap();

    assert_eq!(archive.source, ArchiveSource::Mirror);
    assert_eq!(&archive.bytes[..], ARCHIVE_BYTES);
    primary.assert_async().await;
    mirror.assert_async().await;
}

#[tokio::test]
async fn test_both_hosts_failing_surfaces_mirror_error() {
    let mut server = Server::new_async().await;
    let _primary = server
        .mock("GET", "/octo/hello/archive/refs/heads/main.zip")
        .with_status(404)
        .with_body("primary gone")
        .create_async()
        .await;
    let mirror = server
        .mock("GET", "/octo/hello/zip/refs/heads/main")
        .with_status(503)
        .with_body("mirror down")
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let err = archive::download_archive(&client, &request(Some("main")), |_| {})
        .await
        .unwrap_err();

    assert_eq!(err.upstream_status(), Some(503));
    assert!(err.to_string().contains("mirror down"));
    mirror.assert_async().await;
}

#[tokio::test]
async fn test_token_sent_to_github_hosts() {
    let mut server = Server::new_async().await;
    let metadata = server
        .mock("GET", "/repos/octo/hello")
        .match_header("authorization", "Bearer secret-token")
        .match_header("accept", "application/vnd.github.v3+json")
        .with_status(200)
        .with_body(r#"{"default_branch": "main"}"#)
        .create_async()
        .await;
    let primary = server
        .mock("GET", "/octo/hello/archive/refs/heads/main.zip")
        .match_header("authorization", "Bearer secret-token")
        .match_header("accept", "application/octet-stream")
        .with_status(200)
        .with_body(ARCHIVE_BYTES)
        .create_async()
        .await;

    let config = ClientConfig {
        github_token: Some("secret-token".to_string()),
        ..ClientConfig::default()
    }
    .with_endpoints(GithubEndpoints::with_base(&server.url()).unwrap());
    let client = GithubClient::new(config).unwrap();

    assert_ok!(archive::download_archive(&client, &request(None), |_| {}).await);
    metadata.assert_async().await;
    primary.assert_async().await;
}

#[tokio::test]
async fn test_save_archive_creates_output_dir() {
    let mut server = Server::new_async().await;
    let _primary = mock_primary(&mut server).await;

    let client = client_for(&server);
    let archive = archive::download_archive(&client, &request(Some("main")), |_| {})
        .await
        .unwrap();

    let temp_dir = tempfile::tempdir().expect("Failed to create temporary directory");
    let output_dir = temp_dir.path().join("nested").join("downloads");
    let path = archive::save_archive(&output_dir, &archive.file_name, &archive.bytes)
        .await
        .unwrap();

    assert_eq!(path, output_dir.join("hello.zip"));
    assert_eq!(std::fs::read(&path).unwrap(), ARCHIVE_BYTES);
    assert!(!output_dir.join("hello.zip.part").exists());
}

#[tokio::test]
async fn test_primary_missing_location_tries_mirror() {
    let mut server = Server::new_async().await;
    let _primary = server
        .mock("GET", "/octo/hello/archive/refs/heads/main.zip")
        .with_status(302)
        .create_async()
        .await;
    let mirror = server
        .mock("GET", "/octo/hello/zip/refs/heads/main")
        .with_status(200)
        .with_body(ARCHIVE_BYTES)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let archive = archive::download_archive(&client, &request(Some("main")), |_| {})
        .await
        .unwrap();

    assert_eq!(archive.source, ArchiveSource::Mirror);
    mirror.assert_async().await;
}

#[tokio::test]
async fn test_primary_redirect_loop_tries_mirror() {
    let mut server = Server::new_async().await;
    let primary = server
        .mock("GET", "/octo/hello/archive/refs/heads/main.zip")
        .with_status(302)
        .with_header("location", "/octo/hello/archive/refs/heads/main.zip")
        .expect_at_least(2)
        .create_async()
        .await;
    let mirror = server
        .mock("GET", "/octo/hello/zip/refs/heads/main")
        .with_status(200)
        .with_body(ARCHIVE_BYTES)
        .expect(1)
        .create_async()
        .await;

    let client = client_for(&server);
    let archive = archive::download_archive(&client, &request(Some("main")), |_| {})
        .await
        .unwrap();

    assert_eq!(archive.source, ArchiveSource::Mirror);
    assert_eq!(&archive.bytes[..], ARCHIVE_BYTES);
    primary.assert_async().await;
    mirror.assert_async().await;
}

#[tokio::test]
async fn test_unreachable_primary_host_tries_mirror() {
    let mut server = Server::new_async().await;
    let mirror = server
        .mock("GET", "/octo/hello/zip/refs/heads/main")
        .with_status(200)
        .with_body(ARCHIVE_BYTES)
        .expect(1)
        .create_async()
        .await;

    let mut endpoints = GithubEndpoints::with_base(&server.url()).unwrap();
    // Nothing listens on port 1, so the connection is refused
    endpoints.web_base = Url::parse("http://127.0.0.1:1/").unwrap();
    let client = GithubClient::new(ClientConfig::default().with_endpoints(endpoints)).unwrap();

    let archive = archive::download_archive(&client, &request(Some("main")), |_| {})
        .await
        .unwrap();

    assert_eq!(archive.source, ArchiveSource::Mirror);
    mirror.assert_async().await;
}

#[tokio::test]
async fn test_slow_body_outlasting_timeout_completes() {
    let mut server = Server::new_async().await;
    let _primary = server
        .mock("GET", "/octo/hello/archive/refs/heads/main.zip")
        .with_status(200)
        .with_chunked_body(|w| {
            for _ in 0..8 {
                w.write_all(&[7u8; 1024])?;
                std::thread::sleep(Duration::from_millis(150));
            }
            Ok(())
        })
        .create_async()
        .await;

    // The whole body takes about 1.2s, but no gap reaches the 500ms limit
    let client = client_with_timeout(&server, Duration::from_millis(500));
    let archive = archive::download_archive(&client, &request(Some("main")), |_| {})
        .await
        .unwrap();

    assert_eq!(archive.bytes.len(), 8 * 1024);
    assert!(archive.bytes.iter().all(|b| *b == 7));
}

#[tokio::test]
async fn test_stalled_body_fails() {
    let mut server = Server::new_async().await;
    let _primary = server
        .mock("GET", "/octo/hello/archive/refs/heads/main.zip")
        .with_status(200)
        .with_chunked_body(|w| {
            w.write_all(&[7u8; 1024])?;
            std::thread::sleep(Duration::from_millis(1500));
            w.write_all(&[7u8; 1024])
        })
        .create_async()
        .await;

    let client = client_with_timeout(&server, Duration::from_millis(300));
    let err = archive::download_archive(&client, &request(Some("main")), |_| {})
        .await
        .unwrap_err();

    assert!(
        matches!(err, Error::StreamRead(ref msg) if msg.contains("no data received")),
        "unexpected error: {}",
        err
    );
}

#[tokio::test]
async fn test_failed_save_leaves_no_partial_file() {
    let temp_dir = tempfile::tempdir().expect("Failed to create temporary directory");
    let output_dir = temp_dir.path();
    // A directory in the way makes the final rename fail
    std::fs::create_dir(output_dir.join("hello.zip")).unwrap();

    let result = archive::save_archive(output_dir, "hello.zip", ARCHIVE_BYTES).await;

    assert!(matches!(result, Err(Error::Io(_))));
    assert!(!output_dir.join("hello.zip.part").exists());
    assert!(output_dir.join("hello.zip").is_dir());
}

async fn mock_primary(server: &mut ServerGuard) -> mockito::Mock {
    server
        .mock("GET", "/octo/hello/archive/refs/heads/main.zip")
        .with_status(200)
        .with_body(ARCHIVE_BYTES)
        .create_async()
        .await
}
