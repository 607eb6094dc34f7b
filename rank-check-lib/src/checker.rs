//! Main ranking checker implementation.
//!
//! This module provides the `RankChecker` struct, the high-level entry point
//! that wires a [`SerpClient`] into a [`RateLimitedDispatcher`] from a single
//! [`RankConfig`].

use crate::concurrent::{DispatchReport, ProgressFn, RateLimitedDispatcher};
use crate::error::RankCheckError;
use crate::protocols::SerpClient;
use crate::types::{RankConfig, RankingRecord};

/// Checks where a domain ranks for a set of keywords.
///
/// # Example
///
/// ```rust,no_run
/// use rank_check_lib::{RankChecker, RankConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = RankConfig::default().with_credentials("login", "password");
///     let checker = RankChecker::new(config)?;
///
///     let keywords = vec!["running shoes".to_string(), "trail shoes".to_string()];
///     for record in checker.check_keywords(&keywords, "example.com").await? {
///         println!("{}", record);
///     }
///     Ok(())
/// }
/// ```
pub struct RankChecker {
    /// Configuration settings for this checker instance
    config: RankConfig,
    dispatcher: RateLimitedDispatcher<SerpClient>,
}

impl RankChecker {
    /// Create a checker from `config`.
    ///
    /// # Errors
    ///
    /// Fails fast on malformed credentials, an invalid endpoint, or invalid
    /// limits, before any request is issued.
    pub fn new(config: RankConfig) -> Result<Self, RankCheckError> {
        config.limits.validate()?;
        let client = SerpClient::new(&config)?;
        let dispatcher =
            RateLimitedDispatcher::new(client, config.limits, config.query.clone());

        Ok(Self { config, dispatcher })
    }

    /// Report progress after every completed keyword.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.dispatcher = self.dispatcher.with_progress(progress);
        self
    }

    /// Rank `target_domain` for a single keyword.
    pub async fn check_keyword(
        &self,
        keyword: &str,
        target_domain: &str,
    ) -> Result<RankingRecord, RankCheckError> {
        let mut records = self
            .dispatcher
            .run(&[keyword.to_string()], target_domain)
            .await?;
        records
            .pop()
            .ok_or_else(|| RankCheckError::internal("No record produced for keyword"))
    }

    /// Rank `target_domain` for every keyword, one record per keyword in
    /// input order.
    pub async fn check_keywords(
        &self,
        keywords: &[String],
        target_domain: &str,
    ) -> Result<Vec<RankingRecord>, RankCheckError> {
        self.dispatcher.run(keywords, target_domain).await
    }

    /// Like [`check_keywords`](Self::check_keywords) with run statistics.
    pub async fn check_keywords_detailed(
        &self,
        keywords: &[String],
        target_domain: &str,
    ) -> Result<DispatchReport, RankCheckError> {
        self.dispatcher.run_detailed(keywords, target_domain).await
    }

    /// Get the configuration for this checker.
    pub fn config(&self) -> &RankConfig {
        &self.config
    }
}
