use scout_http::{Fetch, HttpClient, HttpError, RequestOpts};
use std::time::Duration;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_client() -> HttpClient {
    HttpClient::new("scout-tests/1.0")
        .unwrap()
        .with_timeout(Duration::from_millis(300))
        .with_retries(2)
        .with_backoff(Duration::from_millis(5))
}

#[tokio::test]
async fn returns_body_text_on_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/jobs"))
        .and(header("user-agent", "scout-tests/1.0"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<a href='/jobs/1'>Designer</a>"))
        .expect(1)
        .mount(&server)
        .await;

    let body = fast_client()
        .get_text(&format!("{}/jobs", server.uri()), RequestOpts::default())
        .await
        .unwrap();
    assert!(body.contains("Designer"));
}

#[tokio::test]
async fn retries_server_errors_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let body = fast_client()
        .get_text(&format!("{}/flaky", server.uri()), RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn rate_limit_honors_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "0"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(200).set_body_string("calm"))
        .mount(&server)
        .await;

    let started = std::time::Instant::now();
    let body = fast_client()
        .get_text(&format!("{}/busy", server.uri()), RequestOpts::default())
        .await
        .unwrap();
    assert_eq!(body, "calm");
    // Retry-After: 0 overrides the 429 floor.
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/gone"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such page"))
        .expect(1)
        .mount(&server)
        .await;

    let err = fast_client()
        .get_text(&format!("{}/gone", server.uri()), RequestOpts::default())
        .await
        .unwrap_err();
    match err {
        HttpError::Status { status, message } => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(message, "no such page");
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn timeouts_exhaust_the_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let client = fast_client().with_timeout(Duration::from_millis(50)).with_retries(1);
    let url = format!("{}/slow", server.uri());
    let failure = client.fetch(&url).await.unwrap_err();
    assert_eq!(failure.url, url);
    assert!(failure.transient);

    let seen = server.received_requests().await.unwrap();
    assert_eq!(seen.len(), 2, "one attempt plus one retry");
}

#[tokio::test]
async fn malformed_urls_fail_without_network() {
    let failure = fast_client().fetch("jobs.example.com/no-scheme").await.unwrap_err();
    assert!(!failure.transient);
    assert!(failure.reason.contains("invalid URL"));
}

#[tokio::test]
async fn per_request_options_apply() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let opts = RequestOpts {
        retries: Some(0),
        query: Some(vec![("page", "2".into())]),
        ..Default::default()
    };
    let err = fast_client()
        .get_text(&format!("{}/search", server.uri()), opts)
        .await
        .unwrap_err();
    assert!(err.is_transient());
}
