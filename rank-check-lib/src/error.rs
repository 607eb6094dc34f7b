//! Error handling for ranking lookups.
//!
//! This module defines one error type covering every way a lookup can fail,
//! from a single keyword's bad HTTP status to a run that cannot start at all.
//! Per-keyword variants end up as diagnostics on not-found records; systemic
//! variants abort a run before the first request is sent.

use std::fmt;
use std::time::Duration;

/// Main error type for ranking lookups.
#[derive(Debug, Clone)]
pub enum RankCheckError {
    /// Keyword rejected before dispatch (empty or whitespace only)
    InvalidKeyword { keyword: String, reason: String },

    /// Target domain rejected before dispatch
    InvalidDomain { domain: String, reason: String },

    /// Credentials that cannot possibly authenticate
    InvalidCredentials { message: String },

    /// Transport-level failures (connection, DNS, reset)
    NetworkError {
        message: String,
        source: Option<String>,
    },

    /// The API answered with a status outside the accepted set
    ApiError {
        keyword: String,
        status_code: u16,
        body: String,
    },

    /// The SERP endpoint host cannot be resolved, so no request can succeed
    EndpointUnreachable { host: String, message: String },

    /// Accepted status but the task/result structure is empty or malformed
    ParseError {
        message: String,
        content: Option<String>,
    },

    /// Invalid settings (limits, endpoint, config file contents)
    ConfigError { message: String },

    /// File I/O errors when reading keywords or writing records
    FileError { path: String, message: String },

    /// A request exceeded its bounded wait
    Timeout {
        operation: String,
        duration: Duration,
    },

    /// Generic internal errors that don't fit other categories
    Internal { message: String },
}

impl RankCheckError {
    /// Create a new invalid keyword error.
    pub fn invalid_keyword<K: Into<String>, R: Into<String>>(keyword: K, reason: R) -> Self {
        Self::InvalidKeyword {
            keyword: keyword.into(),
            reason: reason.into(),
        }
    }

    /// Create a new invalid domain error.
    pub fn invalid_domain<D: Into<String>, R: Into<String>>(domain: D, reason: R) -> Self {
        Self::InvalidDomain {
            domain: domain.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_credentials<M: Into<String>>(message: M) -> Self {
        Self::InvalidCredentials {
            message: message.into(),
        }
    }

    /// Create a new network error.
    pub fn network<M: Into<String>>(message: M) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new network error with source information.
    pub fn network_with_source<M: Into<String>, S: Into<String>>(message: M, source: S) -> Self {
        Self::NetworkError {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new API error carrying the rejected status and response body.
    pub fn api_with_status<K: Into<String>, B: Into<String>>(
        keyword: K,
        status_code: u16,
        body: B,
    ) -> Self {
        Self::ApiError {
            keyword: keyword.into(),
            status_code,
            body: body.into(),
        }
    }

    /// Create an error for an endpoint host that does not resolve.
    pub fn endpoint_unreachable<H: Into<String>, M: Into<String>>(host: H, message: M) -> Self {
        Self::EndpointUnreachable {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create a new parse error.
    pub fn parse<M: Into<String>>(message: M) -> Self {
        Self::ParseError {
            message: message.into(),
            content: None,
        }
    }

    /// Create a new parse error keeping (part of) the offending body.
    pub fn parse_with_content<M: Into<String>, C: Into<String>>(message: M, content: C) -> Self {
        Self::ParseError {
            message: message.into(),
            content: Some(content.into()),
        }
    }

    /// Create a new configuration error.
    pub fn config<M: Into<String>>(message: M) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// Create a new file error.
    pub fn file_error<P: Into<String>, M: Into<String>>(path: P, message: M) -> Self {
        Self::FileError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new timeout error.
    pub fn timeout<O: Into<String>>(operation: O, duration: Duration) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration,
        }
    }

    /// Create a new internal error.
    pub fn internal<M: Into<String>>(message: M) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error must abort a whole run rather than a single keyword.
    ///
    /// Systemic errors are raised before any request is issued, so spending
    /// the rate budget on them would only produce guaranteed failures.
    pub fn is_systemic(&self) -> bool {
        matches!(
            self,
            Self::InvalidKeyword { .. }
                | Self::InvalidDomain { .. }
                | Self::InvalidCredentials { .. }
                | Self::EndpointUnreachable { .. }
                | Self::ConfigError { .. }
                | Self::FileError { .. }
        )
    }

    /// Short category label used for aggregated error reporting.
    pub fn category(&self) -> &'static str {
        match self {
            Self::InvalidKeyword { .. } => "invalid keyword",
            Self::InvalidDomain { .. } => "invalid domain",
            Self::InvalidCredentials { .. } => "credentials",
            Self::NetworkError { .. } => "network",
            Self::EndpointUnreachable { .. } => "unreachable",
            Self::ApiError { .. } => "api",
            Self::ParseError { .. } => "parse",
            Self::ConfigError { .. } => "config",
            Self::FileError { .. } => "file",
            Self::Timeout { .. } => "timeout",
            Self::Internal { .. } => "internal",
        }
    }
}

impl fmt::Display for RankCheckError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidKeyword { keyword, reason } => {
                write!(f, "Invalid keyword '{}': {}", keyword, reason)
            }
            Self::InvalidDomain { domain, reason } => {
                write!(f, "Invalid domain '{}': {}", domain, reason)
            }
            Self::InvalidCredentials { message } => {
                write!(f, "Invalid credentials: {}", message)
            }
            Self::NetworkError { message, source } => {
                if let Some(source) = source {
                    write!(f, "Network error: {} (source: {})", message, source)
                } else {
                    write!(f, "Network error: {}", message)
                }
            }
            Self::EndpointUnreachable { host, message } => {
                write!(f, "SERP endpoint '{}' is unreachable: {}", host, message)
            }
            Self::ApiError {
                keyword,
                status_code,
                body,
            } => {
                write!(
                    f,
                    "SERP API error for '{}' (HTTP {}): {}",
                    keyword, status_code, body
                )
            }
            Self::ParseError { message, content: _ } => {
                write!(f, "Parse error: {}", message)
            }
            Self::ConfigError { message } => {
                write!(f, "Configuration error: {}", message)
            }
            Self::FileError { path, message } => {
                write!(f, "File error at '{}': {}", path, message)
            }
            Self::Timeout {
                operation,
                duration,
            } => {
                write!(f, "Timeout after {:?} during: {}", duration, operation)
            }
            Self::Internal { message } => {
                write!(f, "Internal error: {}", message)
            }
        }
    }
}

impl std::error::Error for RankCheckError {}

impl From<reqwest::Error> for RankCheckError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network_with_source("Request timed out", err.to_string())
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err.to_string())
        } else {
            Self::network_with_source("HTTP request failed", err.to_string())
        }
    }
}

impl From<serde_json::Error> for RankCheckError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError {
            message: format!("JSON parsing failed: {}", err),
            content: None,
        }
    }
}

impl From<std::io::Error> for RankCheckError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal {
            message: format!("I/O error: {}", err),
        }
    }
}

impl From<csv::Error> for RankCheckError {
    fn from(err: csv::Error) -> Self {
        Self::Internal {
            message: format!("CSV error: {}", err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_systemic_classification() {
        assert!(RankCheckError::invalid_credentials("empty username").is_systemic());
        assert!(RankCheckError::config("concurrency must be positive").is_systemic());
        assert!(RankCheckError::invalid_domain("", "empty").is_systemic());
        assert!(RankCheckError::invalid_keyword(" ", "Keyword cannot be empty").is_systemic());
        assert!(
            RankCheckError::endpoint_unreachable("serp.invalid", "no such host").is_systemic()
        );

        assert!(!RankCheckError::network("reset").is_systemic());
        assert!(!RankCheckError::api_with_status("shoes", 500, "oops").is_systemic());
        assert!(!RankCheckError::timeout("SERP request", Duration::from_secs(1)).is_systemic());
    }

    #[test]
    fn test_display_includes_status_and_body() {
        let err = RankCheckError::api_with_status("running shoes", 401, "unauthorized");
        let msg = err.to_string();
        assert!(msg.contains("running shoes"));
        assert!(msg.contains("HTTP 401"));
        assert!(msg.contains("unauthorized"));
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(RankCheckError::network("x").category(), "network");
        assert_eq!(
            RankCheckError::timeout("x", Duration::from_millis(5)).category(),
            "timeout"
        );
        assert_eq!(RankCheckError::parse("x").category(), "parse");
        assert_eq!(
            RankCheckError::endpoint_unreachable("h", "x").category(),
            "unreachable"
        );
    }
}
