//! Core data types for ranking lookups.
//!
//! This module defines the main data structures used throughout the library:
//! the per-keyword query, the parsed SERP payload, the ranking record produced
//! for every keyword, and the run configuration.

use crate::error::RankCheckError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Position reported when the target domain is absent from the results
/// or the query failed.
pub const NOT_FOUND_POSITION: u32 = 100;

/// Live "advanced" organic endpoint of the DataForSEO SERP API.
pub const DEFAULT_ENDPOINT: &str = "https://api.dataforseo.com/v3/serp/google/organic/live/advanced";

/// Fixed search parameters sent with every query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    /// DataForSEO location code (2840 = United States)
    pub location_code: u32,

    /// Search language (e.g. "en")
    pub language_code: String,

    /// Device class ("desktop" or "mobile")
    pub device: String,

    /// Operating system reported for the device
    pub os: String,

    /// Number of results requested. Must cover the top 100.
    pub depth: u32,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            location_code: 2840,
            language_code: "en".to_string(),
            device: "desktop".to_string(),
            os: "windows".to_string(),
            depth: 100,
        }
    }
}

/// One task object in the POST body. Built once per keyword and never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub keyword: String,
    pub location_code: u32,
    pub language_code: String,
    pub device: String,
    pub os: String,
    pub depth: u32,
}

impl QueryRequest {
    /// Build the request for `keyword` using the fixed search parameters.
    pub fn new(keyword: &str, params: &QueryParams) -> Self {
        Self {
            keyword: keyword.to_string(),
            location_code: params.location_code,
            language_code: params.language_code.clone(),
            device: params.device.clone(),
            os: params.os.clone(),
            depth: params.depth,
        }
    }
}

/// A single result item, in the order the API returned it.
///
/// Every field is optional on the wire; absent and `null` deserialize to `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SerpItem {
    #[serde(default)]
    pub rank_absolute: Option<u32>,

    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    /// Snippet text shown under the title
    #[serde(default)]
    pub description: Option<String>,
}

/// Outcome of one SERP query: the ordered items or a classified failure.
#[derive(Debug, Clone)]
pub enum SerpResponse {
    Success { items: Vec<SerpItem> },
    Failure(RankCheckError),
}

impl SerpResponse {
    pub fn is_failure(&self) -> bool {
        matches!(self, SerpResponse::Failure(_))
    }
}

impl From<Result<Vec<SerpItem>, RankCheckError>> for SerpResponse {
    fn from(result: Result<Vec<SerpItem>, RankCheckError>) -> Self {
        match result {
            Ok(items) => SerpResponse::Success { items },
            Err(e) => SerpResponse::Failure(e),
        }
    }
}

/// Ranking fact produced for exactly one input keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankingRecord {
    /// The keyword this record answers
    pub keyword: String,

    /// Where the target domain ranks.
    /// - `Some(n)`: 1-based absolute rank of the first matching item
    /// - `Some(100)`: not found, or the query failed
    /// - `None`: matched, but the API omitted `rank_absolute`
    pub position: Option<u32>,

    pub url: String,
    pub title: String,
    pub snippet: String,

    /// Why this keyword degraded to not-found, if it failed
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_message: Option<String>,

    /// [`RankCheckError::category`] of that failure
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_category: Option<String>,
}

impl RankingRecord {
    /// The canonical not-found record for `keyword`.
    pub fn not_found<K: Into<String>>(keyword: K) -> Self {
        Self {
            keyword: keyword.into(),
            position: Some(NOT_FOUND_POSITION),
            url: String::new(),
            title: String::new(),
            snippet: String::new(),
            error_message: None,
            error_category: None,
        }
    }

    /// Not-found record annotated with the failure that caused it.
    pub fn failed<K: Into<String>>(keyword: K, error: &RankCheckError) -> Self {
        Self {
            error_message: Some(error.to_string()),
            error_category: Some(error.category().to_string()),
            ..Self::not_found(keyword)
        }
    }

    /// Whether the target domain was located in the results.
    pub fn is_found(&self) -> bool {
        !self.url.is_empty()
    }

    pub fn is_failed(&self) -> bool {
        self.error_message.is_some()
    }

    /// Position as written to tabular output. Unknown ranks become an empty cell.
    pub fn position_cell(&self) -> String {
        self.position.map(|p| p.to_string()).unwrap_or_default()
    }
}

/// Limits applied by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchLimits {
    /// Maximum SERP calls in flight at any instant
    pub concurrency: usize,

    /// Maximum requests issued per window
    pub requests_per_window: usize,

    /// Pause between consecutive windows
    pub window_duration: Duration,

    /// Bounded wait for a single call
    pub request_timeout: Duration,
}

impl Default for DispatchLimits {
    fn default() -> Self {
        Self {
            concurrency: 200,
            requests_per_window: 2000,
            window_duration: Duration::from_secs(60),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl DispatchLimits {
    /// Reject limits that would stall or never issue a request.
    pub fn validate(&self) -> Result<(), RankCheckError> {
        if self.concurrency == 0 {
            return Err(RankCheckError::config("Concurrency limit must be at least 1"));
        }
        if self.requests_per_window == 0 {
            return Err(RankCheckError::config(
                "Requests per window must be at least 1",
            ));
        }
        if self.window_duration.is_zero() {
            return Err(RankCheckError::config("Window duration must be positive"));
        }
        if self.request_timeout.is_zero() {
            return Err(RankCheckError::config("Request timeout must be positive"));
        }
        Ok(())
    }
}

/// Complete configuration for a ranking run.
///
/// Passed explicitly into the client and dispatcher; nothing here is global.
#[derive(Clone)]
pub struct RankConfig {
    /// SERP API endpoint receiving the POST
    pub endpoint: String,

    /// API login
    pub username: String,

    /// API password
    pub password: String,

    /// Concurrency, rate and timeout limits
    pub limits: DispatchLimits,

    /// Fixed search parameters
    pub query: QueryParams,
}

impl Default for RankConfig {
    /// Defaults match the API's published ceiling of 2000 requests a minute.
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            username: String::new(),
            password: String::new(),
            limits: DispatchLimits::default(),
            query: QueryParams::default(),
        }
    }
}

impl RankConfig {
    /// Set API credentials.
    pub fn with_credentials<U: Into<String>, P: Into<String>>(
        mut self,
        username: U,
        password: P,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Point the client at a different endpoint (mock servers, sandboxes).
    pub fn with_endpoint<E: Into<String>>(mut self, endpoint: E) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.limits.concurrency = concurrency;
        self
    }

    pub fn with_requests_per_window(mut self, requests: usize) -> Self {
        self.limits.requests_per_window = requests;
        self
    }

    pub fn with_window_duration(mut self, window: Duration) -> Self {
        self.limits.window_duration = window;
        self
    }

    /// Set the bounded wait for each SERP call.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.limits.request_timeout = timeout;
        self
    }

    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }
}

// Password is never printed.
impl fmt::Debug for RankConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RankConfig")
            .field("endpoint", &self.endpoint)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("limits", &self.limits)
            .field("query", &self.query)
            .finish()
    }
}

impl fmt::Display for RankingRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.position {
            Some(position) if self.is_found() => {
                write!(f, "{}: #{} {}", self.keyword, position, self.url)
            }
            None => write!(f, "{}: rank unknown {}", self.keyword, self.url),
            Some(_) => write!(f, "{}: not found", self.keyword),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_request_carries_fixed_params() {
        let req = QueryRequest::new("running shoes", &QueryParams::default());
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["keyword"], "running shoes");
        assert_eq!(json["location_code"], 2840);
        assert_eq!(json["language_code"], "en");
        assert_eq!(json["device"], "desktop");
        assert_eq!(json["os"], "windows");
        assert_eq!(json["depth"], 100);
    }

    #[test]
    fn test_not_found_record() {
        let record = RankingRecord::not_found("shoes");
        assert_eq!(record.position, Some(NOT_FOUND_POSITION));
        assert!(record.url.is_empty());
        assert!(record.title.is_empty());
        assert!(record.snippet.is_empty());
        assert!(!record.is_found());
        assert!(!record.is_failed());
        assert_eq!(record.position_cell(), "100");
    }

    #[test]
    fn test_failed_record_keeps_sentinel() {
        let err = RankCheckError::network("connection reset");
        let record = RankingRecord::failed("shoes", &err);
        assert_eq!(record.position, Some(100));
        assert!(record.is_failed());
        assert_eq!(record.error_category.as_deref(), Some("network"));
        assert!(record.error_message.unwrap().contains("connection reset"));
    }

    #[test]
    fn test_unknown_position_cell_is_empty() {
        let record = RankingRecord {
            position: None,
            url: "https://example.com/".to_string(),
            ..RankingRecord::not_found("shoes")
        };
        assert_eq!(record.position_cell(), "");
        assert!(record.is_found());
    }

    #[test]
    fn test_serp_item_tolerates_nulls() {
        let item: SerpItem = serde_json::from_value(serde_json::json!({
            "type": "organic",
            "rank_absolute": 4,
            "url": "https://example.com/",
            "title": null
        }))
        .unwrap();
        assert_eq!(item.rank_absolute, Some(4));
        assert_eq!(item.title, None);
        assert_eq!(item.description, None);
    }

    #[test]
    fn test_limits_validation() {
        assert!(DispatchLimits::default().validate().is_ok());

        let zero_concurrency = DispatchLimits {
            concurrency: 0,
            ..Default::default()
        };
        assert!(zero_concurrency.validate().is_err());

        let zero_rate = DispatchLimits {
            requests_per_window: 0,
            ..Default::default()
        };
        assert!(zero_rate.validate().is_err());

        let zero_window = DispatchLimits {
            window_duration: Duration::ZERO,
            ..Default::default()
        };
        assert!(matches!(
            zero_window.validate(),
            Err(RankCheckError::ConfigError { .. })
        ));

        let zero_timeout = DispatchLimits {
            request_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(zero_timeout.validate().is_err());
    }

    #[test]
    fn test_config_debug_redacts_password() {
        let config = RankConfig::default().with_credentials("user", "hunter2");
        let debug = format!("{:?}", config);
        assert!(debug.contains("user"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_config_builders() {
        let config = RankConfig::default()
            .with_concurrency(5)
            .with_requests_per_window(10)
            .with_window_duration(Duration::from_secs(2))
            .with_timeout(Duration::from_secs(3));
        assert_eq!(config.limits.concurrency, 5);
        assert_eq!(config.limits.requests_per_window, 10);
        assert_eq!(config.limits.window_duration, Duration::from_secs(2));
        assert_eq!(config.limits.request_timeout, Duration::from_secs(3));
    }
}
