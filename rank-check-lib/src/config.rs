//! Configuration file parsing and management.
//!
//! This module handles loading configuration from TOML files and `RC_*`
//! environment variables, and merging configuration files with proper
//! precedence rules. Values are only parsed and validated here; callers fold
//! them into a [`RankConfig`](crate::RankConfig).

use crate::error::RankCheckError;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Upper bound on concurrent requests accepted from configuration.
pub const MAX_CONCURRENCY: usize = 1000;

/// Largest result depth the SERP API serves.
pub const MAX_DEPTH: u32 = 700;

/// Configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    /// Run defaults that map to CLI options
    #[serde(skip_serializing_if = "Option::is_none")]
    pub defaults: Option<DefaultsConfig>,

    /// API endpoint and credentials
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api: Option<ApiConfig>,

    /// Fixed search parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<QueryConfig>,

    /// Output formatting preferences
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputConfig>,
}

/// Default values for run options.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DefaultsConfig {
    /// Maximum in-flight requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub concurrency: Option<usize>,

    /// Requests allowed per window
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requests_per_window: Option<usize>,

    /// Window length (e.g. "60s", "1m")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window: Option<String>,

    /// Per-request timeout (e.g. "30s")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Target domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// SERP API access.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ApiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// Search parameters sent with each query.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueryConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_code: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub language_code: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth: Option<u32>,
}

/// Output formatting configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OutputConfig {
    /// "csv" or "json"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    /// Directory receiving generated output files
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<String>,
}

/// Configuration discovery and loading functionality.
#[derive(Debug, Default)]
pub struct ConfigManager;

impl ConfigManager {
    pub fn new() -> Self {
        Self
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unreadable, not valid TOML,
    /// or contains out-of-range values.
    pub fn load_file<P: AsRef<Path>>(&self, path: P) -> Result<FileConfig, RankCheckError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(RankCheckError::file_error(
                path.to_string_lossy(),
                "Configuration file not found",
            ));
        }

        let content = fs::read_to_string(path).map_err(|e| {
            RankCheckError::file_error(
                path.to_string_lossy(),
                format!("Failed to read configuration file: {}", e),
            )
        })?;

        let config: FileConfig = toml::from_str(&content)
            .map_err(|e| RankCheckError::config(format!("Failed to parse TOML configuration: {}", e)))?;

        self.validate_config(&config)?;

        Ok(config)
    }

    /// Discover and load configuration files in precedence order.
    ///
    /// XDG config is lowest, then the home directory, then the current
    /// directory. Files that fail to load are skipped with a warning.
    pub fn discover_and_load(&self) -> Result<FileConfig, RankCheckError> {
        let mut merged_config = FileConfig::default();
        let mut loaded_files = Vec::new();

        let candidates = [
            self.get_xdg_config_path(),
            self.get_global_config_path(),
            self.get_local_config_path(),
        ];

        for path in candidates.into_iter().flatten() {
            match self.load_file(&path) {
                Ok(config) => {
                    merged_config = self.merge_configs(merged_config, config);
                    loaded_files.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping config file");
                }
            }
        }

        for path in &loaded_files {
            tracing::debug!(path = %path.display(), "loaded config file");
        }

        Ok(merged_config)
    }

    /// Look for configuration files in the current directory.
    fn get_local_config_path(&self) -> Option<PathBuf> {
        let candidates = ["./rank-check.toml", "./.rank-check.toml"];

        candidates
            .iter()
            .map(Path::new)
            .find(|path| path.exists())
            .map(Path::to_path_buf)
    }

    /// Look for configuration files in the user's home directory.
    fn get_global_config_path(&self) -> Option<PathBuf> {
        let home = env::var_os("HOME")?;
        [".rank-check.toml", "rank-check.toml"]
            .iter()
            .map(|candidate| Path::new(&home).join(candidate))
            .find(|path| path.exists())
    }

    /// Follows the XDG Base Directory Specification.
    fn get_xdg_config_path(&self) -> Option<PathBuf> {
        let config_dir = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| env::var_os("HOME").map(|home| Path::new(&home).join(".config")))?;

        let path = config_dir.join("rank-check").join("config.toml");
        if path.exists() {
            Some(path)
        } else {
            None
        }
    }

    /// Merge two configurations. Values from `higher` win field by field.
    fn merge_configs(&self, lower: FileConfig, higher: FileConfig) -> FileConfig {
        FileConfig {
            defaults: merge_section(lower.defaults, higher.defaults, |lo, hi| DefaultsConfig {
                concurrency: hi.concurrency.or(lo.concurrency),
                requests_per_window: hi.requests_per_window.or(lo.requests_per_window),
                window: hi.window.or(lo.window),
                timeout: hi.timeout.or(lo.timeout),
                domain: hi.domain.or(lo.domain),
            }),
            api: merge_section(lower.api, higher.api, |lo, hi| ApiConfig {
                endpoint: hi.endpoint.or(lo.endpoint),
                username: hi.username.or(lo.username),
                password: hi.password.or(lo.password),
            }),
            query: merge_section(lower.query, higher.query, |lo, hi| QueryConfig {
                location_code: hi.location_code.or(lo.location_code),
                language_code: hi.language_code.or(lo.language_code),
                device: hi.device.or(lo.device),
                os: hi.os.or(lo.os),
                depth: hi.depth.or(lo.depth),
            }),
            output: merge_section(lower.output, higher.output, |lo, hi| OutputConfig {
                format: hi.format.or(lo.format),
                directory: hi.directory.or(lo.directory),
            }),
        }
    }

    /// Validate a configuration for common issues.
    fn validate_config(&self, config: &FileConfig) -> Result<(), RankCheckError> {
        if let Some(defaults) = &config.defaults {
            if let Some(concurrency) = defaults.concurrency {
                validate_concurrency(concurrency)?;
            }

            if defaults.requests_per_window == Some(0) {
                return Err(RankCheckError::config(
                    "requests_per_window must be at least 1",
                ));
            }

            if let Some(window) = &defaults.window {
                match parse_duration_string(window) {
                    Some(d) if !d.is_zero() => {}
                    _ => return Err(invalid_duration("window", window)),
                }
            }

            if let Some(timeout) = &defaults.timeout {
                match parse_duration_string(timeout) {
                    Some(d) if !d.is_zero() => {}
                    _ => return Err(invalid_duration("timeout", timeout)),
                }
            }
        }

        if let Some(query) = &config.query {
            if let Some(depth) = query.depth {
                validate_depth(depth)?;
            }
            if let Some(device) = &query.device {
                if !matches!(device.as_str(), "desktop" | "mobile") {
                    return Err(RankCheckError::config(format!(
                        "Invalid device '{}', use 'desktop' or 'mobile'",
                        device
                    )));
                }
            }
        }

        if let Some(format) = config.output.as_ref().and_then(|o| o.format.as_deref()) {
            if !matches!(format, "csv" | "json") {
                return Err(RankCheckError::config(format!(
                    "Invalid output format '{}', use 'csv' or 'json'",
                    format
                )));
            }
        }

        Ok(())
    }
}

fn merge_section<T>(lower: Option<T>, higher: Option<T>, merge: impl FnOnce(T, T) -> T) -> Option<T> {
    match (lower, higher) {
        (Some(lo), Some(hi)) => Some(merge(lo, hi)),
        (lo, hi) => hi.or(lo),
    }
}

fn invalid_duration(field: &str, value: &str) -> RankCheckError {
    RankCheckError::config(format!(
        "Invalid {} '{}'. Use format like '30s', '2m' or '500ms'",
        field, value
    ))
}

/// Check a concurrency limit is within 1..=MAX_CONCURRENCY.
pub fn validate_concurrency(concurrency: usize) -> Result<(), RankCheckError> {
    if concurrency == 0 || concurrency > MAX_CONCURRENCY {
        return Err(RankCheckError::config(format!(
            "Concurrency must be between 1 and {}",
            MAX_CONCURRENCY
        )));
    }
    Ok(())
}

/// Check a result depth covers the top 100 and stays within the API maximum.
pub fn validate_depth(depth: u32) -> Result<(), RankCheckError> {
    if !(100..=MAX_DEPTH).contains(&depth) {
        return Err(RankCheckError::config(format!(
            "Depth must be between 100 and {}",
            MAX_DEPTH
        )));
    }
    Ok(())
}

/// Environment variable configuration that mirrors CLI options.
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub username: Option<String>,
    pub password: Option<String>,
    pub endpoint: Option<String>,
    pub domain: Option<String>,
    pub concurrency: Option<usize>,
    pub requests_per_window: Option<usize>,
    pub window: Option<Duration>,
    pub timeout: Option<Duration>,
    pub config: Option<String>,
}

/// Load configuration from `RC_*` environment variables.
///
/// Invalid values are logged and ignored.
pub fn load_env_config() -> EnvConfig {
    load_env_config_from(|key| env::var(key).ok())
}

/// Same as [`load_env_config`] with an injectable variable source.
pub fn load_env_config_from<F>(lookup: F) -> EnvConfig
where
    F: Fn(&str) -> Option<String>,
{
    let text = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let concurrency = text("RC_CONCURRENCY").and_then(|val| match val.parse::<usize>() {
        Ok(c) if validate_concurrency(c).is_ok() => Some(c),
        _ => {
            tracing::warn!(
                "Invalid RC_CONCURRENCY='{}', must be 1-{}",
                val,
                MAX_CONCURRENCY
            );
            None
        }
    });

    let requests_per_window = text("RC_RATE_LIMIT").and_then(|val| match val.parse::<usize>() {
        Ok(r) if r > 0 => Some(r),
        _ => {
            tracing::warn!("Invalid RC_RATE_LIMIT='{}', must be a positive integer", val);
            None
        }
    });

    let duration = |key: &str| {
        text(key).and_then(|val| {
            let parsed = parse_duration_string(&val).filter(|d| !d.is_zero());
            if parsed.is_none() {
                tracing::warn!(
                    "Invalid {}='{}', use a positive duration like '30s', '2m'",
                    key,
                    val
                );
            }
            parsed
        })
    };

    let env_config = EnvConfig {
        username: text("RC_USERNAME"),
        // Passwords may legitimately carry surrounding spaces.
        password: lookup("RC_PASSWORD").filter(|v| !v.is_empty()),
        endpoint: text("RC_ENDPOINT"),
        domain: text("RC_DOMAIN"),
        concurrency,
        requests_per_window,
        window: duration("RC_WINDOW"),
        timeout: duration("RC_TIMEOUT"),
        config: text("RC_CONFIG"),
    };

    tracing::debug!(
        username = env_config.username.is_some(),
        password = env_config.password.is_some(),
        endpoint = ?env_config.endpoint,
        concurrency = ?env_config.concurrency,
        "environment configuration loaded"
    );

    env_config
}

/// Parse a duration like "500ms", "30s", "2m" or a bare number of seconds.
pub fn parse_duration_string(value: &str) -> Option<Duration> {
    let value = value.trim().to_lowercase();

    if let Some(ms) = value.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = value.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = value.strip_suffix('m') {
        mins.trim()
            .parse::<u64>()
            .ok()
            .and_then(|m| m.checked_mul(60))
            .map(Duration::from_secs)
    } else {
        value.parse::<u64>().ok().map(Duration::from_secs)
    }
}
