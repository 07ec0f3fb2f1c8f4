mod common;

use std::path::Path;
use std::time::Duration;

use scout_common::{RecordKind, ScoutError};
use scout_config::{ScoutConfig, ScoutConfigLoader};
use scout_http::HttpClient;
use scout_notify::RecordingTransport;
use scout_pipeline::Pipeline;
use scout_store::Store;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MAIL: &str = "sender: bot@scout.test\nsecret: app-password\nrecipient: me@scout.test\n";

fn config(data_dir: &Path, body: &str) -> ScoutConfig {
    let yaml = format!("data_dir: \"{}\"\n{MAIL}{body}", data_dir.display());
    ScoutConfigLoader::new().with_yaml_str(&yaml).load().unwrap()
}

fn client() -> HttpClient {
    HttpClient::new("scout-tests/1.0")
        .unwrap()
        .with_timeout(Duration::from_millis(200))
        .with_retries(1)
        .with_backoff(Duration::from_millis(5))
}

async fn page(server: &MockServer, at: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

#[tokio::test]
async fn second_run_over_the_same_pages_finds_nothing_new() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    page(
        &server,
        "/contact",
        "<title>Acme</title><p>hr@acme.test or jobs@acme.test</p>",
    )
    .await;
    let dir = tempfile::tempdir().unwrap();
    let cfg = config(
        dir.path(),
        &format!("sources: [\"{}/contact\"]\n", server.uri()),
    );
    let pipeline = Pipeline::new(RecordKind::Lead, &cfg);
    let transport = RecordingTransport::new();

    let first = pipeline.run(&client(), &transport).await.unwrap();
    assert_eq!(first.new_records, 2);
    assert_eq!(first.store_size, 2);
    assert!(first.notified);

    let second = pipeline.run(&client(), &transport).await.unwrap();
    assert_eq!(second.candidates, 2);
    assert_eq!(second.new_records, 0);
    assert_eq!(second.store_size, 2);

    let sent = transport.sent();
    assert_eq!(sent.len(), 2, "one message per run, even when empty");
    assert!(sent[0].plain.contains("hr@acme.test"));
    assert_eq!(sent[1].plain, "No new company contacts (emails) found today.");
}

#[tokio::test]
async fn a_dead_source_does_not_hold_back_the_others() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;
    page(&server, "/fast", "<p>talent@studio.test</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let cfg = config(
        dir.path(),
        &format!(
            "sources: [\"{0}/slow\", \"{0}/fast\"]\n",
            server.uri()
        ),
    );
    let transport = RecordingTransport::new();
    let report = Pipeline::new(RecordKind::Lead, &cfg)
        .run(&client(), &transport)
        .await
        .unwrap();

    assert_eq!(report.sources, 2);
    assert_eq!(report.failed_sources.len(), 1);
    assert!(report.failed_sources[0].url.ends_with("/slow"));
    assert_eq!(report.new_records, 1);
    assert!(transport.sent()[0].plain.contains("talent@studio.test"));
}

#[tokio::test]
async fn missing_credentials_stop_the_run_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let yaml = format!(
        "data_dir: \"{}\"\nsender: bot@scout.test\nsecret: \"\"\nrecipient: me@scout.test\nsources: [\"{}/x\"]\n",
        dir.path().display(),
        server.uri()
    );
    let cfg = ScoutConfigLoader::new().with_yaml_str(&yaml).load().unwrap();
    let transport = RecordingTransport::new();
    let err = Pipeline::new(RecordKind::Lead, &cfg)
        .run(&client(), &transport)
        .await
        .unwrap_err();
    assert!(matches!(err, ScoutError::Config(_)), "{err:?}");
    assert!(transport.sent().is_empty());
    assert!(!Store::path_for(dir.path(), RecordKind::Lead).exists());
}

#[tokio::test]
async fn persistence_failure_is_fatal_and_nothing_is_sent() {
    let server = MockServer::start().await;
    page(&server, "/contact", "<p>hr@acme.test</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let blocker = Store::path_for(dir.path(), RecordKind::Lead);
    std::fs::create_dir(&blocker).unwrap();
    std::fs::write(blocker.join("occupied"), "x").unwrap();

    let cfg = config(dir.path(), &format!("sources: [\"{}/contact\"]\n", server.uri()));
    let transport = RecordingTransport::new();
    let err = Pipeline::new(RecordKind::Lead, &cfg)
        .run(&client(), &transport)
        .await
        .unwrap_err();
    assert!(matches!(err, ScoutError::Persistence(_)), "{err:?}");
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn delivery_failure_keeps_the_collected_data() {
    let server = MockServer::start().await;
    page(&server, "/contact", "<p>hr@acme.test</p>").await;

    let dir = tempfile::tempdir().unwrap();
    let cfg = config(dir.path(), &format!("sources: [\"{}/contact\"]\n", server.uri()));
    let transport = RecordingTransport::failing("connection refused");
    let report = Pipeline::new(RecordKind::Lead, &cfg)
        .run(&client(), &transport)
        .await
        .unwrap();

    assert!(!report.notified);
    assert!(report.notify_error.unwrap().contains("connection refused"));
    let reloaded = Store::open(dir.path(), RecordKind::Lead);
    assert!(reloaded.contains("hr@acme.test"));
}

#[tokio::test]
async fn job_postings_are_enriched_from_their_pages() {
    common::init_test_tracing();
    let server = MockServer::start().await;
    page(
        &server,
        "/careers",
        r#"<a href="/jobs/42">Senior Graphic Design Lead</a><a href="/about">About</a>"#,
    )
    .await;
    page(
        &server,
        "/jobs/42",
        r#"<h1>Senior Graphic Design Lead</h1><div class="company-name">Oak &amp; Ink</div>"#,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let cfg = config(
        dir.path(),
        &format!(
            "sources: [\"{}/careers\"]\nkeywords: [\"graphic design\"]\n",
            server.uri()
        ),
    );
    let transport = RecordingTransport::new();
    let report = Pipeline::new(RecordKind::Job, &cfg)
        .run(&client(), &transport)
        .await
        .unwrap();
    assert_eq!(report.new_records, 1);

    let store = Store::open(dir.path(), RecordKind::Job);
    let record = &store.records()[0];
    assert_eq!(record.field("link"), format!("{}/jobs/42", server.uri()));
    assert_eq!(record.field("company"), "Oak & Ink");
    assert_eq!(record.field("title"), "Senior Graphic Design Lead");

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["kind"], "jobs");
    assert_eq!(json["new_records"], 1);

    let sent = transport.sent();
    assert!(sent[0].subject.starts_with("Daily Job Alerts - "));
    assert!(sent[0].html.contains("Oak &amp; Ink"));
}

#[tokio::test]
async fn known_postings_are_not_fetched_again() {
    let server = MockServer::start().await;
    page(&server, "/careers", r#"<a href="/jobs/7">Logo Designer</a>"#).await;
    Mock::given(method("GET"))
        .and(path("/jobs/7"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<h1>Logo Designer</h1>"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let cfg = config(
        dir.path(),
        &format!("sources: [\"{}/careers\"]\nkeywords: [logo]\n", server.uri()),
    );
    let pipeline = Pipeline::new(RecordKind::Job, &cfg);
    let transport = RecordingTransport::new();
    pipeline.run(&client(), &transport).await.unwrap();
    let again = pipeline.run(&client(), &transport).await.unwrap();
    assert_eq!(again.new_records, 0);
}
