//! Ranking extraction from SERP responses.
//!
//! Turns one parsed response into exactly one [`RankingRecord`] by scanning
//! items in API order and stopping at the first item hosted on the target
//! domain.

use crate::error::RankCheckError;
use crate::types::{RankingRecord, SerpResponse};
use url::Url;

/// Extracts the target domain's ranking from SERP responses.
///
/// The target domain is normalized once on construction and reused for
/// every response.
#[derive(Debug, Clone)]
pub struct RankExtractor {
    target: String,
}

impl RankExtractor {
    /// Create an extractor for `target_domain`.
    ///
    /// # Errors
    ///
    /// Returns `RankCheckError::InvalidDomain` if the domain is empty after
    /// normalization.
    pub fn new(target_domain: &str) -> Result<Self, RankCheckError> {
        Ok(Self {
            target: normalize_domain(target_domain)?,
        })
    }

    /// The normalized domain items are compared against.
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Produce the ranking record for `keyword` from `response`.
    ///
    /// Failures and empty result sets yield the not-found record. Otherwise
    /// the first item whose host matches wins; later matches are ignored.
    pub fn extract(&self, response: &SerpResponse, keyword: &str) -> RankingRecord {
        let items = match response {
            SerpResponse::Success { items } => items,
            SerpResponse::Failure(e) => return RankingRecord::failed(keyword, e),
        };

        let matched = items.iter().find(|item| {
            item.url
                .as_deref()
                .and_then(normalize_host)
                .is_some_and(|host| host == self.target)
        });

        match matched {
            Some(item) => {
                if item.rank_absolute.is_none() {
                    tracing::warn!(
                        keyword,
                        url = item.url.as_deref().unwrap_or_default(),
                        "matching item has no rank_absolute; position left unknown"
                    );
                }
                RankingRecord {
                    keyword: keyword.to_string(),
                    position: item.rank_absolute,
                    url: item.url.clone().unwrap_or_default(),
                    title: item.title.clone().unwrap_or_default(),
                    snippet: item.description.clone().unwrap_or_default(),
                    error_message: None,
                    error_category: None,
                }
            }
            None => RankingRecord::not_found(keyword),
        }
    }
}

/// Normalize a caller-supplied target domain.
///
/// Accepts a bare domain (`Example.com`) or a full URL
/// (`https://www.example.com/path`) and returns the host in the same form
/// [`normalize_host`] gives result URLs: lower-cased, punycode for
/// internationalized names, with any leading `www.` and trailing dot removed.
pub fn normalize_domain(domain: &str) -> Result<String, RankCheckError> {
    let trimmed = domain.trim();

    if trimmed.is_empty() {
        return Err(RankCheckError::invalid_domain(
            domain,
            "Target domain cannot be empty",
        ));
    }
    if trimmed.contains(char::is_whitespace) {
        return Err(RankCheckError::invalid_domain(
            domain,
            "Target domain cannot contain whitespace",
        ));
    }

    let host = if trimmed.contains("://") {
        normalize_host(trimmed)
    } else {
        normalize_host(&format!("http://{}", trimmed))
    };

    host.ok_or_else(|| {
        RankCheckError::invalid_domain(domain, "Target domain is not a valid host name")
    })
}

/// Normalized host of a result URL, or `None` when the URL has no host.
///
/// Scheme, port, path, query and fragment are dropped; the host is
/// lower-cased and a single leading `www.` is stripped.
pub fn normalize_host(url: &str) -> Option<String> {
    let parsed = Url::parse(url.trim()).ok()?;
    let host = parsed.host_str()?.to_lowercase();
    let host = strip_www(&host).trim_end_matches('.');
    if host.is_empty() {
        return None;
    }
    Some(host.to_string())
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}
