//! # Rank Check Library
//!
//! Finds where a domain ranks in Google for a list of keywords, using the
//! DataForSEO SERP API.
//!
//! Queries are dispatched in rate-limited windows with a bounded number of
//! requests in flight. A failing keyword never fails the run: it degrades to
//! the not-found record (position 100) and the run always returns exactly one
//! record per keyword.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use rank_check_lib::{RankChecker, RankConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let checker = RankChecker::new(RankConfig::default().with_credentials("login", "password"))?;
//!     let record = checker.check_keyword("running shoes", "example.com").await?;
//!
//!     println!("{}: {:?}", record.keyword, record.position);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Admission gate**: a semaphore caps in-flight requests
//! - **Window pacing**: at most `requests_per_window` requests per window
//! - **Failure isolation**: per-keyword errors become not-found records
//! - **Fail fast**: bad credentials, endpoints or limits abort before any request

// Re-export main public API types and functions
pub use checker::RankChecker;
pub use concurrent::{
    plan_windows, DispatchProgress, DispatchReport, ProgressFn, RateLimitedDispatcher,
};
pub use config::{
    load_env_config, load_env_config_from, parse_duration_string, validate_concurrency,
    validate_depth, ApiConfig, ConfigManager, DefaultsConfig, EnvConfig, FileConfig, OutputConfig,
    QueryConfig, MAX_CONCURRENCY, MAX_DEPTH,
};
pub use error::RankCheckError;
pub use extract::{normalize_domain, normalize_host, RankExtractor};
pub use io::{
    read_keywords, read_keywords_from_path, write_csv, write_csv_file, write_json, CSV_HEADERS,
};
pub use protocols::{parse_items, validate_credentials, SerpClient, SerpFetcher};
pub use types::{
    DispatchLimits, QueryParams, QueryRequest, RankConfig, RankingRecord, SerpItem, SerpResponse,
    DEFAULT_ENDPOINT, NOT_FOUND_POSITION,
};

// Internal modules - these are not part of the public API
mod checker;
mod concurrent;
mod config;
mod error;
mod extract;
mod io;
mod protocols;
mod types;

// Type alias for convenience
pub type Result<T> = std::result::Result<T, RankCheckError>;

// Library version and metadata
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
