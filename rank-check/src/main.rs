//! Rank Check CLI Application
//!
//! A command-line interface for finding where a domain ranks in Google for a
//! list of keywords. This CLI application provides a user-friendly interface
//! to the rank-check-lib library.

mod ui;

use chrono::{DateTime, Local};
use clap::builder::styling::{AnsiColor, Effects, Styles};
use clap::Parser;
use console::Term;
use rank_check_lib::{
    load_env_config, normalize_domain, parse_duration_string, read_keywords_from_path, write_csv,
    write_csv_file, write_json, ConfigManager, DispatchProgress, EnvConfig, FileConfig,
    RankChecker, RankConfig, RankingRecord,
};
use std::error::Error;
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Yellow.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

/// Exit status used when the run is interrupted with Ctrl-C.
const EXIT_INTERRUPTED: i32 = 130;

/// CLI arguments for rank-check
#[derive(Parser, Debug)]
#[command(name = "rank-check")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Find where a domain ranks in Google for a list of keywords")]
#[command(
    long_about = "Find where a domain ranks in Google for a list of keywords using the DataForSEO SERP API.\n\nRequests are sent concurrently and paced in rate-limited windows. Keywords whose lookup fails are reported as not found (position 100)."
)]
#[command(styles = STYLES)]
pub struct Args {
    /// Keywords to check
    #[arg(value_name = "KEYWORDS", help_heading = "Input")]
    pub keywords: Vec<String>,

    /// Input file with keywords (first CSV column, one per line)
    #[arg(short = 'f', long = "file", value_name = "FILE", help_heading = "Input")]
    pub file: Option<String>,

    /// Domain to look for in the results (e.g. example.com)
    #[arg(long = "domain", value_name = "DOMAIN", help_heading = "Input")]
    pub domain: Option<String>,

    /// Output file (default: rankings_<domain>_<timestamp>.csv)
    #[arg(
        short = 'o',
        long = "output",
        value_name = "FILE",
        help_heading = "Output Format"
    )]
    pub output: Option<String>,

    /// Output results as JSON on stdout
    #[arg(short = 'j', long = "json", help_heading = "Output Format")]
    pub json: bool,

    /// Write CSV to stdout instead of a file
    #[arg(long = "stdout", help_heading = "Output Format")]
    pub stdout: bool,

    /// Max requests in flight (default: 200, max: 1000)
    #[arg(short = 'c', long = "concurrency", help_heading = "Rate Limiting")]
    pub concurrency: Option<usize>,

    /// Max requests started per window (default: 2000)
    #[arg(long = "rate-limit", value_name = "N", help_heading = "Rate Limiting")]
    pub rate_limit: Option<usize>,

    /// Window length, e.g. "60s" or "1m" (default: 60s)
    #[arg(long = "window", value_name = "DURATION", help_heading = "Rate Limiting")]
    pub window: Option<String>,

    /// Per-request deadline, e.g. "30s" (default: 30s)
    #[arg(long = "timeout", value_name = "DURATION", help_heading = "Rate Limiting")]
    pub timeout: Option<String>,

    /// SERP API endpoint URL
    #[arg(long = "endpoint", value_name = "URL", help_heading = "API")]
    pub endpoint: Option<String>,

    /// API login
    #[arg(long = "username", value_name = "LOGIN", help_heading = "API")]
    pub username: Option<String>,

    /// API password
    #[arg(long = "password", value_name = "PASSWORD", help_heading = "API")]
    pub password: Option<String>,

    /// Use specific config file instead of automatic discovery
    #[arg(long = "config", value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<String>,

    /// Show detailed debug information and error messages
    #[arg(long = "debug", help_heading = "Configuration")]
    pub debug: bool,

    /// Verbose logging
    #[arg(short = 'v', long = "verbose", help_heading = "Configuration")]
    pub verbose: bool,
}

/// Output encoding of the ranking records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum OutputFormat {
    #[default]
    Csv,
    Json,
}

/// Where the records end up.
#[derive(Debug, Clone, PartialEq, Eq)]
enum OutputTarget {
    Stdout(OutputFormat),
    File(PathBuf, OutputFormat),
}

/// Fully resolved run settings after merging file, environment and CLI.
#[derive(Debug, Default)]
struct Settings {
    config: RankConfig,
    domain: Option<String>,
    format: OutputFormat,
    directory: Option<String>,
}

/// Coarse failure classes used for the end-of-run error summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ErrorKind {
    Timeout,
    Network,
    Api,
    Parse,
    Other,
}

/// Error statistics for aggregated reporting
#[derive(Debug, Default)]
pub(crate) struct ErrorStats {
    pub(crate) timeouts: Vec<String>,
    pub(crate) network_errors: Vec<String>,
    pub(crate) api_errors: Vec<String>,
    pub(crate) parsing_errors: Vec<String>,
    pub(crate) other_errors: Vec<String>,
}

impl ErrorKind {
    /// Bucket for a failed record, from the category its error was tagged with.
    pub(crate) fn of(record: &RankingRecord) -> Option<Self> {
        let category = record.error_category.as_deref()?;
        Some(match category {
            "timeout" => Self::Timeout,
            "network" | "unreachable" => Self::Network,
            "api" => Self::Api,
            "parse" => Self::Parse,
            _ => Self::Other,
        })
    }
}

impl ErrorStats {
    fn from_records(records: &[RankingRecord]) -> Self {
        let mut stats = Self::default();
        for record in records.iter().filter(|r| r.is_failed()) {
            stats.add_error(record);
        }
        stats
    }

    fn add_error(&mut self, record: &RankingRecord) {
        let bucket = match ErrorKind::of(record).unwrap_or(ErrorKind::Other) {
            ErrorKind::Timeout => &mut self.timeouts,
            ErrorKind::Network => &mut self.network_errors,
            ErrorKind::Api => &mut self.api_errors,
            ErrorKind::Parse => &mut self.parsing_errors,
            ErrorKind::Other => &mut self.other_errors,
        };
        bucket.push(record.keyword.clone());
    }

    pub(crate) fn has_errors(&self) -> bool {
        !self.timeouts.is_empty()
            || !self.network_errors.is_empty()
            || !self.api_errors.is_empty()
            || !self.parsing_errors.is_empty()
            || !self.other_errors.is_empty()
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Validate arguments
    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }

    init_logging(&args);

    let code = tokio::select! {
        result = run_rank_check(args) => match result {
            Ok(()) => 0,
            Err(e) => {
                eprintln!("Error: {}", e);
                1
            }
        },
        _ = tokio::signal::ctrl_c() => {
            let _ = Term::stderr().clear_line();
            eprintln!("Interrupted, no results written");
            EXIT_INTERRUPTED
        }
    };

    if code != 0 {
        process::exit(code);
    }
}

/// Install the stderr log subscriber. `RUST_LOG` overrides the flag levels.
fn init_logging(args: &Args) {
    let level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,rank_check={level},rank_check_lib={level}",
            level = level
        ))
    });

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(args.debug)
        .try_init();
}

/// Validate command line arguments
fn validate_args(args: &Args) -> Result<(), String> {
    // Must have either keywords or a file
    if args.keywords.is_empty() && args.file.is_none() {
        return Err("You must specify keywords or a file with --file".to_string());
    }

    if args.json && args.stdout {
        return Err("Cannot specify both --json and --stdout".to_string());
    }

    if args.stdout && args.output.is_some() {
        return Err("Cannot specify both --stdout and --output".to_string());
    }

    if let Some(concurrency) = args.concurrency {
        if concurrency == 0 || concurrency > 1000 {
            return Err("Concurrency must be between 1 and 1000".to_string());
        }
    }

    if args.rate_limit == Some(0) {
        return Err("Rate limit must be at least 1 request per window".to_string());
    }

    for (flag, value) in [("--window", &args.window), ("--timeout", &args.timeout)] {
        if let Some(value) = value {
            match parse_duration_string(value) {
                Some(d) if !d.is_zero() => {}
                _ => {
                    return Err(format!(
                        "Invalid {} '{}'. Use format like '30s', '2m' or '500ms'",
                        flag, value
                    ))
                }
            }
        }
    }

    Ok(())
}

/// Main ranking logic
async fn run_rank_check(args: Args) -> Result<(), Box<dyn Error>> {
    let settings = build_config(&args)?;

    let domain = settings.domain.clone().ok_or(
        "You must specify the domain to look for with --domain (or RC_DOMAIN, or `domain` under [defaults] in the config file)",
    )?;
    let target = normalize_domain(&domain)?;

    if settings.config.username.is_empty() || settings.config.password.is_empty() {
        return Err(
            "Missing API credentials. Use --username/--password, RC_USERNAME/RC_PASSWORD, or the [api] config section"
                .into(),
        );
    }

    let keywords = collect_keywords(&args)?;
    if keywords.is_empty() {
        return Err("No keywords to check".into());
    }

    let completed = Arc::new(AtomicUsize::new(0));
    let counter = completed.clone();
    let checker = RankChecker::new(settings.config.clone())?.with_progress(Box::new(
        move |progress: &DispatchProgress<'_>| {
            counter.store(progress.completed, Ordering::Relaxed);
            tracing::debug!(
                keyword = %progress.record.keyword,
                completed = progress.completed,
                total = progress.total,
                window = progress.window,
                "keyword done"
            );
        },
    ));

    ui::print_header(keywords.len(), &target, &checker.config().limits);

    // Log lines would tear through the spinner line.
    let interactive = Term::stderr().is_term() && !args.verbose && !args.debug;
    let spinner = interactive.then(|| {
        ui::Spinner::start(
            format!("Checking {} keywords...", keywords.len()),
            completed.clone(),
            keywords.len(),
        )
    });

    let result = checker.check_keywords_detailed(&keywords, &target).await;

    if let Some(spinner) = spinner {
        spinner.stop().await;
    }
    let report = result?;

    let output = resolve_output(&args, &settings, &target, &Local::now());
    write_output(&output, &report.records)?;

    ui::print_summary(&report);
    ui::print_error_summary(&ErrorStats::from_records(&report.records));

    Ok(())
}

/// Collect keywords from positional arguments followed by the keyword file.
fn collect_keywords(args: &Args) -> Result<Vec<String>, Box<dyn Error>> {
    let mut keywords: Vec<String> = args
        .keywords
        .iter()
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
        .collect();

    if let Some(file) = &args.file {
        keywords.extend(read_keywords_from_path(file)?);
    }

    Ok(keywords)
}

/// Build configuration by merging CLI args, environment variables, and config files.
///
/// Precedence order (highest to lowest):
/// 1. CLI arguments (explicit user input)
/// 2. Environment variables (RC_*)
/// 3. Local config file (./rank-check.toml or ./.rank-check.toml)
/// 4. Global config file (~/.rank-check.toml)
/// 5. XDG config file (~/.config/rank-check/config.toml)
/// 6. Built-in defaults
fn build_config(args: &Args) -> Result<Settings, Box<dyn Error>> {
    let env_config = load_env_config();
    let config_manager = ConfigManager::new();

    let file_config = if let Some(explicit_config_path) = &args.config {
        tracing::info!(path = %explicit_config_path, "using config file from --config");
        config_manager
            .load_file(explicit_config_path)
            .map_err(|e| format!("Failed to load config file '{}': {}", explicit_config_path, e))?
    } else if let Some(env_config_path) = &env_config.config {
        tracing::info!(path = %env_config_path, "using config file from RC_CONFIG");
        config_manager
            .load_file(env_config_path)
            .map_err(|e| format!("Failed to load config file '{}': {}", env_config_path, e))?
    } else {
        tracing::info!("discovering config files");
        config_manager.discover_and_load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "config discovery failed, using defaults");
            FileConfig::default()
        })
    };

    resolve_settings(file_config, &env_config, args)
}

/// Layer file config, environment and CLI arguments over the defaults.
fn resolve_settings(
    file_config: FileConfig,
    env_config: &EnvConfig,
    args: &Args,
) -> Result<Settings, Box<dyn Error>> {
    let settings = merge_file_config(Settings::default(), file_config);
    let settings = apply_environment_config(settings, env_config);
    apply_cli_args(settings, args)
}

/// Merge FileConfig into Settings
fn merge_file_config(mut settings: Settings, file_config: FileConfig) -> Settings {
    if let Some(defaults) = file_config.defaults {
        if let Some(concurrency) = defaults.concurrency {
            settings.config.limits.concurrency = concurrency;
        }
        if let Some(requests) = defaults.requests_per_window {
            settings.config.limits.requests_per_window = requests;
        }
        // Durations were validated when the file was loaded.
        if let Some(window) = defaults.window.as_deref().and_then(parse_duration_string) {
            settings.config.limits.window_duration = window;
        }
        if let Some(timeout) = defaults.timeout.as_deref().and_then(parse_duration_string) {
            settings.config.limits.request_timeout = timeout;
        }
        if defaults.domain.is_some() {
            settings.domain = defaults.domain;
        }
    }

    if let Some(api) = file_config.api {
        if let Some(endpoint) = api.endpoint {
            settings.config.endpoint = endpoint;
        }
        if let Some(username) = api.username {
            settings.config.username = username;
        }
        if let Some(password) = api.password {
            settings.config.password = password;
        }
    }

    if let Some(query) = file_config.query {
        let params = &mut settings.config.query;
        if let Some(location_code) = query.location_code {
            params.location_code = location_code;
        }
        if let Some(language_code) = query.language_code {
            params.language_code = language_code;
        }
        if let Some(device) = query.device {
            params.device = device;
        }
        if let Some(os) = query.os {
            params.os = os;
        }
        if let Some(depth) = query.depth {
            params.depth = depth;
        }
    }

    if let Some(output) = file_config.output {
        if output.format.as_deref() == Some("json") {
            settings.format = OutputFormat::Json;
        }
        settings.directory = output.directory;
    }

    settings
}

/// Apply RC_* environment variables (already validated by the library).
fn apply_environment_config(mut settings: Settings, env_config: &EnvConfig) -> Settings {
    if let Some(username) = &env_config.username {
        settings.config.username = username.clone();
    }
    if let Some(password) = &env_config.password {
        settings.config.password = password.clone();
    }
    if let Some(endpoint) = &env_config.endpoint {
        settings.config.endpoint = endpoint.clone();
    }
    if let Some(domain) = &env_config.domain {
        settings.domain = Some(domain.clone());
    }
    if let Some(concurrency) = env_config.concurrency {
        settings.config.limits.concurrency = concurrency;
    }
    if let Some(requests) = env_config.requests_per_window {
        settings.config.limits.requests_per_window = requests;
    }
    if let Some(window) = env_config.window {
        settings.config.limits.window_duration = window;
    }
    if let Some(timeout) = env_config.timeout {
        settings.config.limits.request_timeout = timeout;
    }

    settings
}

/// Apply CLI arguments to settings (highest precedence).
fn apply_cli_args(mut settings: Settings, args: &Args) -> Result<Settings, Box<dyn Error>> {
    if let Some(concurrency) = args.concurrency {
        settings.config.limits.concurrency = concurrency;
    }
    if let Some(requests) = args.rate_limit {
        settings.config.limits.requests_per_window = requests;
    }
    if let Some(window) = &args.window {
        settings.config.limits.window_duration = parse_duration_string(window)
            .ok_or_else(|| format!("Invalid --window '{}'", window))?;
    }
    if let Some(timeout) = &args.timeout {
        settings.config.limits.request_timeout = parse_duration_string(timeout)
            .ok_or_else(|| format!("Invalid --timeout '{}'", timeout))?;
    }
    if let Some(endpoint) = &args.endpoint {
        settings.config.endpoint = endpoint.clone();
    }
    if let Some(username) = &args.username {
        settings.config.username = username.clone();
    }
    if let Some(password) = &args.password {
        settings.config.password = password.clone();
    }
    if let Some(domain) = &args.domain {
        settings.domain = Some(domain.clone());
    }
    if args.json {
        settings.format = OutputFormat::Json;
    }

    Ok(settings)
}

/// Decide where the records go.
///
/// An explicit `--output` always wins. Without it, JSON and `--stdout` go to
/// stdout and CSV goes to a timestamped file named after the domain.
fn resolve_output(
    args: &Args,
    settings: &Settings,
    domain: &str,
    now: &DateTime<Local>,
) -> OutputTarget {
    if let Some(path) = &args.output {
        return OutputTarget::File(PathBuf::from(path), settings.format);
    }
    if args.stdout || settings.format == OutputFormat::Json {
        return OutputTarget::Stdout(settings.format);
    }
    OutputTarget::File(
        default_output_path(domain, settings.directory.as_deref(), now),
        OutputFormat::Csv,
    )
}

/// `rankings_<domain>_<YYYYmmdd_HHMMSS>.csv`, optionally inside `directory`.
fn default_output_path(domain: &str, directory: Option<&str>, now: &DateTime<Local>) -> PathBuf {
    let safe_domain: String = domain
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let file_name = format!(
        "rankings_{}_{}.csv",
        safe_domain,
        now.format("%Y%m%d_%H%M%S")
    );

    match directory {
        Some(dir) => Path::new(dir).join(file_name),
        None => PathBuf::from(file_name),
    }
}

fn write_output(output: &OutputTarget, records: &[RankingRecord]) -> Result<(), Box<dyn Error>> {
    match output {
        OutputTarget::Stdout(OutputFormat::Json) => write_json(io::stdout().lock(), records)?,
        OutputTarget::Stdout(OutputFormat::Csv) => write_csv(io::stdout().lock(), records)?,
        OutputTarget::File(path, format) => {
            match format {
                OutputFormat::Csv => write_csv_file(path, records)?,
                OutputFormat::Json => {
                    let file = File::create(path).map_err(|e| {
                        format!("Cannot create output file '{}': {}", path.display(), e)
                    })?;
                    write_json(BufWriter::new(file), records)?;
                }
            }

            for record in records {
                ui::print_result(record);
            }
            println!();
            eprintln!("Results written to {}", path.display());
        }
    }

    Ok(())
}
