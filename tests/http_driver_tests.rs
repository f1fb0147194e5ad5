use std::collections::HashMap;

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tug::core::model::Resource;
use tug::http::driver::HttpDriver;
use tug::http::{DriverContext, TransferDriver};

fn resource(uri: String) -> Resource {
    Resource { uri, headers: HashMap::new() }
}

fn fast_ctx(retries: u32) -> DriverContext {
    DriverContext { retries, retry_backoff_ms: 1, ..DriverContext::default() }
}

#[tokio::test]
async fn probe_reports_no_range_support_on_plain_servers() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/file.bin"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world".to_vec()))
        .mount(&server)
        .await;

    let driver = HttpDriver::new();
    let res = resource(format!("{}/file.bin", server.uri()));
    let (total, supports_ranges) = driver.probe(&res, &fast_ctx(0)).await.unwrap();

    assert!(total.is_none());
    assert!(!supports_ranges);

    let body = driver.download_all(&res, &fast_ctx(0)).await.unwrap();
    assert_eq!(&body[..], b"hello world");
}

#[tokio::test]
async fn probe_derives_the_total_from_content_range() {
    let server = MockServer::start().await;
    Mock::given(method("HEAD"))
        .and(path("/file.bin"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/file.bin"))
        .and(header("range", "bytes=0-0"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 0-0/11")
                .set_body_bytes(b"h".to_vec()),
        )
        .mount(&server)
        .await;

    let driver = HttpDriver::new();
    let res = resource(format!("{}/file.bin", server.uri()));
    let (total, supports_ranges) = driver.probe(&res, &fast_ctx(0)).await.unwrap();

    assert_eq!(total, Some(11));
    assert!(supports_ranges);
}

#[tokio::test]
async fn download_range_returns_the_requested_window() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/file.bin"))
        .and(header("range", "bytes=4-8"))
        .respond_with(
            ResponseTemplate::new(206)
                .insert_header("content-range", "bytes 4-8/11")
                .set_body_bytes(b"o wor".to_vec()),
        )
        .mount(&server)
        .await;

    let driver = HttpDriver::new();
    let res = resource(format!("{}/file.bin", server.uri()));
    let bytes = driver.download_range(&res, &fast_ctx(0), 4, 8).await.unwrap();

    assert_eq!(&bytes[..], b"o wor");
}

#[tokio::test]
async fn not_found_fails_without_retrying() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing.bin"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let driver = HttpDriver::new();
    let res = resource(format!("{}/missing.bin", server.uri()));
    let err = driver.download_all(&res, &fast_ctx(2)).await.unwrap_err();

    assert!(err.to_string().contains("404"), "{err}");
    server.verify().await;
}

#[tokio::test]
async fn server_errors_surface_after_retries_are_exhausted() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky.bin"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let driver = HttpDriver::new();
    let res = resource(format!("{}/flaky.bin", server.uri()));
    let err = driver.download_all(&res, &fast_ctx(2)).await.unwrap_err();

    assert!(err.to_string().contains("500"), "{err}");
    server.verify().await;
}
