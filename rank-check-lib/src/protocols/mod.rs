//! Protocol implementations for ranking lookups.
//!
//! This module contains the client for the remote SERP API and the trait
//! the dispatcher uses to talk to it.

/// DataForSEO SERP API client
pub mod serp;

// Re-export commonly used functions and types
pub use serp::{parse_items, validate_credentials, SerpClient, SerpFetcher};
