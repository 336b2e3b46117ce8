//! Output downloads: redirects, gzip bodies and HTTP failures.

mod common;

use std::io::Write;
use std::time::Duration;

use boa_api::ApiError;
use boa_api::api::OutputFetcher;
use flate2::Compression;
use flate2::write::GzEncoder;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(max_redirects: usize) -> OutputFetcher {
    OutputFetcher::new(max_redirects, Duration::from_secs(5)).unwrap()
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

async fn mount_redirect(server: &MockServer, from: &str, status: u16, to: &str) {
    Mock::given(method("GET"))
        .and(path(from))
        .respond_with(ResponseTemplate::new(status).insert_header("Location", to))
        .mount(server)
        .await;
}

async fn mount_body(server: &MockServer, at: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_plain_body() {
    common::init_logging();
    let server = MockServer::start().await;
    mount_body(&server, "/out", "counts[] = 3\n").await;

    let body = fetcher(10)
        .fetch(&format!("{}/out", server.uri()))
        .await
        .unwrap();
    assert_eq!(body, b"counts[] = 3\n");
}

#[tokio::test]
async fn test_follows_moved_permanently() {
    let server = MockServer::start().await;
    mount_redirect(&server, "/a", 301, "/b").await;
    mount_body(&server, "/b", "final").await;

    let body = fetcher(10)
        .fetch(&format!("{}/a", server.uri()))
        .await
        .unwrap();
    assert_eq!(body, b"final");
}

#[tokio::test]
async fn test_follows_redirect_chain() {
    let server = MockServer::start().await;
    mount_redirect(&server, "/a", 302, "/b").await;
    mount_redirect(&server, "/b", 307, &format!("{}/c", server.uri())).await;
    mount_body(&server, "/c", "after two hops").await;

    let body = fetcher(2)
        .fetch(&format!("{}/a", server.uri()))
        .await
        .unwrap();
    assert_eq!(body, b"after two hops");
}

#[tokio::test]
async fn test_redirect_loop_is_bounded() {
    let server = MockServer::start().await;
    mount_redirect(&server, "/loop", 302, "/loop").await;

    let err = fetcher(3)
        .fetch(&format!("{}/loop", server.uri()))
        .await
        .unwrap_err();
    assert!(err.is_transport_error());
    assert!(err.to_string().contains("gave up after 3 redirects"));

    // The initial request plus three followed hops
    let seen = server.received_requests().await.unwrap_or_default();
    assert_eq!(seen.len(), 4);
}

#[tokio::test]
async fn test_gzip_body_matches_plain() {
    let server = MockServer::start().await;
    let payload = b"project[] = 1\nproject[] = 2\n";
    mount_body(&server, "/plain", std::str::from_utf8(payload).unwrap()).await;
    Mock::given(method("GET"))
        .and(path("/packed"))
        .and(header("Accept-Encoding", "gzip"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Encoding", "gzip")
                .set_body_bytes(gzip(payload)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher(10);
    let plain = fetcher
        .fetch(&format!("{}/plain", server.uri()))
        .await
        .unwrap();
    let packed = fetcher
        .fetch(&format!("{}/packed", server.uri()))
        .await
        .unwrap();
    assert_eq!(plain, packed);
}

#[tokio::test]
async fn test_bad_gzip_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Encoding", "gzip")
                .set_body_string("not compressed"),
        )
        .mount(&server)
        .await;

    let err = fetcher(10)
        .fetch(&format!("{}/broken", server.uri()))
        .await
        .unwrap_err();
    assert!(matches!(err, ApiError::MalformedResponse { .. }));
}

#[tokio::test]
async fn test_not_found_is_transport_error() {
    let server = MockServer::start().await;

    let err = fetcher(10)
        .fetch(&format!("{}/missing", server.uri()))
        .await
        .unwrap_err();
    assert!(err.is_transport_error());
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn test_redirect_without_location_is_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/nowhere"))
        .respond_with(ResponseTemplate::new(302))
        .mount(&server)
        .await;

    let err = fetcher(10)
        .fetch(&format!("{}/nowhere", server.uri()))
        .await
        .unwrap_err();
    assert!(err.is_transport_error());
    assert!(err.to_string().contains("302"));
}
