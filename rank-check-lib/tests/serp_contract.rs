// rank-check-lib/tests/serp_contract.rs

//! SERP API contract tests.
//!
//! These tests run the real HTTP client against a wiremock server and verify:
//! - Request format (method, path, Basic auth, task body)
//! - Response parsing of `tasks[0].result[0].items`
//! - Classification of bad statuses, malformed bodies and transport errors
//! - End-to-end runs where failing keywords degrade to not-found

use rank_check_lib::{
    QueryParams, QueryRequest, RankCheckError, RankChecker, RankConfig, SerpClient, SerpFetcher,
    SerpResponse,
};
use serde_json::{json, Value};
use std::time::Duration;
use wiremock::matchers::{body_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_PATH: &str = "/v3/serp/google/organic/live/advanced";

fn config_for(server: &MockServer) -> RankConfig {
    RankConfig::default()
        .with_credentials("login", "secret")
        .with_endpoint(format!("{}{}", server.uri(), API_PATH))
        .with_timeout(Duration::from_secs(5))
}

fn serp_body(items: Value) -> Value {
    json!({
        "status_code": 20000,
        "status_message": "Ok.",
        "tasks_count": 1,
        "tasks": [{
            "status_code": 20000,
            "status_message": "Ok.",
            "result": [{
                "keyword": "running shoes",
                "items_count": 3,
                "items": items
            }]
        }]
    })
}

fn sample_items() -> Value {
    json!([
        {"type": "organic", "rank_absolute": 1, "url": "https://www.nike.com/running", "title": "Nike", "description": "Just do it"},
        {"type": "organic", "rank_absolute": 2, "url": "https://www.example.com/shoes", "title": "Example Shoes", "description": "Shoes for everyone"},
        {"type": "organic", "rank_absolute": 5, "url": "https://example.com/other", "title": "Other", "description": "Later match"}
    ])
}

// ────────────────────────────────────────────────────────────────────────────
// Request Format
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_request_carries_auth_and_task_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .and(header("authorization", "Basic bG9naW46c2VjcmV0"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!([{
            "keyword": "running shoes",
            "location_code": 2840,
            "language_code": "en",
            "device": "desktop",
            "os": "windows",
            "depth": 100
        }])))
        .respond_with(ResponseTemplate::new(200).set_body_json(serp_body(sample_items())))
        .expect(1)
        .mount(&server)
        .await;

    let client = SerpClient::new(&config_for(&server)).unwrap();
    let request = QueryRequest::new("running shoes", &QueryParams::default());
    let response = client.fetch(&request).await;

    match response {
        SerpResponse::Success { items } => {
            assert_eq!(items.len(), 3);
            assert_eq!(items[1].rank_absolute, Some(2));
            assert_eq!(items[1].url.as_deref(), Some("https://www.example.com/shoes"));
        }
        SerpResponse::Failure(e) => panic!("expected success, got {}", e),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Response Classification
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_created_status_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serp_body(sample_items())))
        .mount(&server)
        .await;

    let client = SerpClient::new(&config_for(&server)).unwrap();
    let response = client
        .fetch(&QueryRequest::new("shoes", &QueryParams::default()))
        .await;
    assert!(!response.is_failure());
}

#[tokio::test]
async fn test_error_status_is_classified_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(401).set_body_string("You are not authorized"))
        .mount(&server)
        .await;

    let client = SerpClient::new(&config_for(&server)).unwrap();
    let response = client
        .fetch(&QueryRequest::new("shoes", &QueryParams::default()))
        .await;

    match response {
        SerpResponse::Failure(RankCheckError::ApiError {
            keyword,
            status_code,
            body,
        }) => {
            assert_eq!(keyword, "shoes");
            assert_eq!(status_code, 401);
            assert!(body.contains("not authorized"));
        }
        other => panic!("expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_empty_tasks_is_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"tasks": []})))
        .mount(&server)
        .await;

    let client = SerpClient::new(&config_for(&server)).unwrap();
    let response = client
        .fetch(&QueryRequest::new("shoes", &QueryParams::default()))
        .await;
    assert!(matches!(
        response,
        SerpResponse::Failure(RankCheckError::ParseError { .. })
    ));
}

#[tokio::test]
async fn test_non_json_body_is_parse_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = SerpClient::new(&config_for(&server)).unwrap();
    let response = client
        .fetch(&QueryRequest::new("shoes", &QueryParams::default()))
        .await;
    assert!(matches!(
        response,
        SerpResponse::Failure(RankCheckError::ParseError { .. })
    ));
}

#[tokio::test]
async fn test_connection_refused_is_transport_failure() {
    let config = RankConfig::default()
        .with_credentials("login", "secret")
        .with_endpoint("http://127.0.0.1:1/v3/serp");
    let client = SerpClient::new(&config).unwrap();

    let response = client
        .fetch(&QueryRequest::new("shoes", &QueryParams::default()))
        .await;
    assert!(matches!(
        response,
        SerpResponse::Failure(RankCheckError::NetworkError { .. })
    ));
}

// ────────────────────────────────────────────────────────────────────────────
// End-to-End Runs
// ────────────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_checker_end_to_end_with_isolated_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(body_string_contains(r#""keyword":"broken""#))
        .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(body_string_contains(r#""keyword":"empty""#))
        .respond_with(ResponseTemplate::new(200).set_body_json(serp_body(json!([]))))
        .with_priority(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(API_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(serp_body(sample_items())))
        .mount(&server)
        .await;

    let checker = RankChecker::new(
        config_for(&server)
            .with_concurrency(2)
            .with_requests_per_window(10),
    )
    .unwrap();

    let keywords: Vec<String> = ["running shoes", "broken", "empty", "trail shoes"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let report = checker
        .check_keywords_detailed(&keywords, "EXAMPLE.com")
        .await
        .unwrap();

    assert_eq!(report.records.len(), 4);
    assert_eq!(report.failures, 1);
    assert_eq!(report.pauses, 0);

    let running = &report.records[0];
    assert_eq!(running.keyword, "running shoes");
    assert_eq!(running.position, Some(2));
    assert_eq!(running.url, "https://www.example.com/shoes");
    assert_eq!(running.title, "Example Shoes");
    assert_eq!(running.snippet, "Shoes for everyone");

    let broken = &report.records[1];
    assert_eq!(broken.position, Some(100));
    assert!(broken.url.is_empty());
    assert!(broken.error_message.as_deref().unwrap().contains("HTTP 500"));

    let empty = &report.records[2];
    assert_eq!(empty.position, Some(100));
    assert!(!empty.is_failed());

    assert_eq!(report.records[3].position, Some(2));
}

#[tokio::test]
async fn test_slow_response_times_out_into_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serp_body(sample_items()))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let checker = RankChecker::new(
        config_for(&server).with_timeout(Duration::from_millis(200)),
    )
    .unwrap();

    let record = checker
        .check_keyword("running shoes", "example.com")
        .await
        .unwrap();
    assert_eq!(record.position, Some(100));
    assert!(record.error_message.unwrap().contains("Timeout"));
}

#[tokio::test]
async fn test_unresolvable_endpoint_aborts_run() {
    let config = RankConfig::default()
        .with_credentials("login", "secret")
        .with_endpoint("https://serp-endpoint.invalid/v3/serp");
    let checker = RankChecker::new(config).unwrap();

    let keywords = vec!["shoes".to_string()];
    let err = checker
        .check_keywords(&keywords, "example.com")
        .await
        .unwrap_err();
    match &err {
        RankCheckError::EndpointUnreachable { host, .. } => {
            assert_eq!(host, "serp-endpoint.invalid");
        }
        other => panic!("expected unreachable endpoint, got {:?}", other),
    }
    assert!(err.is_systemic());
}
