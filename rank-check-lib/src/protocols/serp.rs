//! SERP API client.
//!
//! This module issues one ranking query per keyword against the DataForSEO
//! "live advanced" endpoint and classifies the outcome. It never retries and
//! never returns an error to the caller from [`SerpFetcher::fetch`]: every
//! failure is folded into [`SerpResponse::Failure`].

use crate::error::RankCheckError;
use crate::types::{QueryRequest, RankConfig, SerpItem, SerpResponse};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Source of SERP responses consumed by the dispatcher.
///
/// [`SerpClient`] is the production implementation; tests substitute
/// instrumented fetchers.
#[async_trait]
pub trait SerpFetcher: Send + Sync {
    /// Issue one query. Failures are returned as `SerpResponse::Failure`.
    async fn fetch(&self, request: &QueryRequest) -> SerpResponse;

    /// Checks run once before a dispatch starts. An error aborts the run
    /// before any request is sent.
    async fn preflight(&self) -> Result<(), RankCheckError> {
        Ok(())
    }
}

/// HTTP client for the SERP API.
#[derive(Clone)]
pub struct SerpClient {
    /// HTTP client shared by every request of a run
    http_client: reqwest::Client,
    /// Parsed endpoint receiving the POST
    endpoint: Url,
    username: String,
    password: String,
}

impl SerpClient {
    /// Create a client from the run configuration.
    ///
    /// # Errors
    ///
    /// Returns `RankCheckError` if:
    /// - The credentials cannot form a Basic auth header
    /// - The endpoint is not an absolute http(s) URL
    /// - The HTTP client cannot be built
    pub fn new(config: &RankConfig) -> Result<Self, RankCheckError> {
        validate_credentials(&config.username, &config.password)?;
        let endpoint = parse_endpoint(&config.endpoint)?;

        let http_client = reqwest::Client::builder()
            // Backstop only; the dispatcher enforces the per-call deadline.
            .timeout(config.limits.request_timeout.saturating_add(Duration::from_secs(2)))
            .user_agent(concat!("rank-check/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                RankCheckError::network_with_source("Failed to create HTTP client", e.to_string())
            })?;

        Ok(Self {
            http_client,
            endpoint,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// The endpoint this client posts to.
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// POST one task and parse the ordered result items.
    async fn post_query(&self, request: &QueryRequest) -> Result<Vec<SerpItem>, RankCheckError> {
        tracing::debug!(keyword = %request.keyword, "sending SERP request");

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .basic_auth(&self.username, Some(&self.password))
            .json(&[request])
            .send()
            .await?;

        let status = response.status();
        tracing::debug!(keyword = %request.keyword, status = status.as_u16(), "SERP response");

        if !is_accepted(status) {
            let body = response.text().await.unwrap_or_default();
            return Err(RankCheckError::api_with_status(
                &request.keyword,
                status.as_u16(),
                truncate(&body, MAX_ERROR_BODY),
            ));
        }

        let body = response.text().await?;
        parse_items(&body)
    }
}

#[async_trait]
impl SerpFetcher for SerpClient {
    async fn fetch(&self, request: &QueryRequest) -> SerpResponse {
        self.post_query(request).await.into()
    }

    /// Resolve the endpoint host so an unreachable API fails the run up front.
    async fn preflight(&self) -> Result<(), RankCheckError> {
        let host = self
            .endpoint
            .host_str()
            .ok_or_else(|| RankCheckError::config("SERP endpoint has no host"))?;
        let port = self.endpoint.port_or_known_default().unwrap_or(443);

        let mut addrs = tokio::net::lookup_host((host, port))
            .await
            .map_err(|e| RankCheckError::endpoint_unreachable(host, e.to_string()))?;

        if addrs.next().is_none() {
            return Err(RankCheckError::endpoint_unreachable(
                host,
                "resolved to no addresses",
            ));
        }
        Ok(())
    }
}

/// Status codes the API uses for a completed task.
fn is_accepted(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::CREATED
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    tasks: Option<Vec<ApiTask>>,
}

#[derive(Debug, Deserialize)]
struct ApiTask {
    #[serde(default)]
    status_code: Option<u32>,
    #[serde(default)]
    status_message: Option<String>,
    #[serde(default)]
    result: Option<Vec<ApiResult>>,
}

#[derive(Debug, Deserialize)]
struct ApiResult {
    #[serde(default)]
    items: Option<Vec<SerpItem>>,
}

/// Parse `tasks[0].result[0].items[]` from a response body.
///
/// A missing or `null` items array is an empty result set, not an error.
/// Missing tasks or results are parse errors.
pub fn parse_items(body: &str) -> Result<Vec<SerpItem>, RankCheckError> {
    let malformed = |message: String| {
        RankCheckError::parse_with_content(message, truncate(body, MAX_ERROR_BODY))
    };

    let envelope: ApiEnvelope = serde_json::from_str(body)
        .map_err(|e| malformed(format!("JSON parsing failed: {}", e)))?;

    let task = envelope
        .tasks
        .and_then(|tasks| tasks.into_iter().next())
        .ok_or_else(|| malformed("Response contains no tasks".to_string()))?;

    let result = task
        .result
        .and_then(|results| results.into_iter().next())
        .ok_or_else(|| {
            malformed(format!(
                "Task returned no result (status {}: {})",
                task.status_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                task.status_message.as_deref().unwrap_or("no message")
            ))
        })?;

    Ok(result.items.unwrap_or_default())
}

/// Reject credentials that cannot authenticate before any request is sent.
pub fn validate_credentials(username: &str, password: &str) -> Result<(), RankCheckError> {
    if username.trim().is_empty() {
        return Err(RankCheckError::invalid_credentials("API username is empty"));
    }
    // Basic auth joins the pair with ':' so the username cannot contain one.
    if username.contains(':') {
        return Err(RankCheckError::invalid_credentials(
            "API username cannot contain ':'",
        ));
    }
    if password.is_empty() {
        return Err(RankCheckError::invalid_credentials("API password is empty"));
    }
    Ok(())
}

fn parse_endpoint(endpoint: &str) -> Result<Url, RankCheckError> {
    let url = Url::parse(endpoint.trim()).map_err(|e| {
        RankCheckError::config(format!("Invalid SERP endpoint '{}': {}", endpoint, e))
    })?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(RankCheckError::config(format!(
            "SERP endpoint must use http or https, got '{}'",
            url.scheme()
        )));
    }
    if url.host_str().is_none() {
        return Err(RankCheckError::config(format!(
            "SERP endpoint '{}' has no host",
            endpoint
        )));
    }
    Ok(url)
}

fn truncate(text: &str, max: usize) -> String {
    if text.len() <= max {
        return text.to_string();
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}
