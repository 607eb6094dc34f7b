//! Terminal display logic for the rank-check CLI.
//!
//! Everything meant for humans (spinner, header, summaries) goes to stderr so
//! that stdout stays clean for `--json` and `--stdout` output. Result lines
//! are printed to stdout only when the records were written to a file.

use console::{pad_str, style, Alignment, Term};
use rank_check_lib::{DispatchLimits, DispatchReport, RankingRecord};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::ErrorStats;

// ── Spinner ──────────────────────────────────────────────────────────────────

const SPINNER_FRAMES: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// An async braille-dot spinner with a `[done/total]` counter, drawn on stderr.
pub struct Spinner {
    running: Arc<AtomicBool>,
    handle: Option<tokio::task::JoinHandle<()>>,
}

impl Spinner {
    /// Start a spinner that reads the completed count from `completed`.
    pub fn start(message: String, completed: Arc<AtomicUsize>, total: usize) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let running_clone = running.clone();

        let handle = tokio::spawn(async move {
            let term = Term::stderr();
            let mut idx = 0usize;
            while running_clone.load(Ordering::Relaxed) {
                let frame = SPINNER_FRAMES[idx % SPINNER_FRAMES.len()];
                let done = completed.load(Ordering::Relaxed);
                let _ = term.clear_line();
                let _ = term.write_str(&format!(
                    "{} {} {}",
                    style(frame).cyan(),
                    message,
                    style(format!("[{}/{}]", done, total)).dim()
                ));
                idx += 1;
                tokio::time::sleep(Duration::from_millis(80)).await;
            }
            let _ = term.clear_line();
        });

        Self {
            running,
            handle: Some(handle),
        }
    }

    /// Stop the spinner and clear the line.
    pub async fn stop(mut self) {
        self.running.store(false, Ordering::Relaxed);
        if let Some(h) = self.handle.take() {
            let _ = h.await;
        }
    }
}

// ── Header ───────────────────────────────────────────────────────────────────

/// Print a styled header at the start of a run.
pub fn print_header(keyword_count: usize, domain: &str, limits: &DispatchLimits) {
    eprintln!(
        "{} {} {}",
        style("rank-check").bold(),
        style(format!("v{}", env!("CARGO_PKG_VERSION"))).dim(),
        style(format!(
            "- Ranking {} for {} keyword{}",
            domain,
            keyword_count,
            plural(keyword_count)
        ))
        .dim(),
    );

    let windows = keyword_count.div_ceil(limits.requests_per_window.max(1));
    eprintln!(
        "{}",
        style(format!(
            "Concurrency: {} | Rate: {} per {}s | Windows: {} | Timeout: {}s",
            limits.concurrency,
            limits.requests_per_window,
            limits.window_duration.as_secs(),
            windows,
            limits.request_timeout.as_secs(),
        ))
        .dim()
    );
    eprintln!();
}

// ── Result lines ─────────────────────────────────────────────────────────────

/// Print one ranking record as an aligned, colored line.
pub fn print_result(record: &RankingRecord) {
    let keyword_width = 32;
    let padded = pad_str(&record.keyword, keyword_width, Alignment::Left, Some(".."));

    if record.is_failed() {
        println!(
            "  {}  {}  {}",
            style(&padded).white(),
            style("FAILED").yellow().bold(),
            style(brief_error(record)).dim(),
        );
    } else if !record.is_found() {
        println!(
            "  {}  {}",
            style(&padded).white(),
            style("NOT FOUND").red(),
        );
    } else {
        println!(
            "  {}  {}  {}",
            style(&padded).white(),
            style(format_position(record)).green().bold(),
            style(&record.url).dim(),
        );
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

/// Print the final summary bar with colored counts.
pub fn print_summary(report: &DispatchReport) {
    let total = report.records.len();
    let found = report.found();
    let failed = report.failures;
    let not_found = total - found - failed;

    eprintln!(
        "  {}",
        style("────────────────────────────────────────────────────").dim()
    );
    eprintln!(
        "  {} keyword{} in {:.1}s  {}  {}  {}  {}  {}  {}",
        style(total).bold(),
        plural(total),
        report.elapsed.as_secs_f64(),
        style("|").dim(),
        style(format!("{} found", found)).green(),
        style("|").dim(),
        style(format!("{} not found", not_found)).red(),
        style("|").dim(),
        style(format!("{} failed", failed)).yellow(),
    );
    if report.pauses > 0 {
        eprintln!(
            "  {}",
            style(format!(
                "{} windows, {} rate-limit pause{}",
                report.windows,
                report.pauses,
                plural(report.pauses)
            ))
            .dim()
        );
    }
}

// ── Error summary ────────────────────────────────────────────────────────────

/// Print a categorized summary of keywords whose lookup failed.
pub fn print_error_summary(error_stats: &ErrorStats) {
    if !error_stats.has_errors() {
        return;
    }

    eprintln!(
        "  {}",
        style("Some keywords could not be checked (reported as not found):").yellow()
    );

    let groups: [(&str, &[String]); 5] = [
        ("timeout", &error_stats.timeouts),
        ("network error", &error_stats.network_errors),
        ("API error", &error_stats.api_errors),
        ("parsing error", &error_stats.parsing_errors),
        ("other error", &error_stats.other_errors),
    ];

    for (label, keywords) in groups {
        if keywords.is_empty() {
            continue;
        }
        eprintln!(
            "  {} {} {}{}: {}",
            style("•").dim(),
            keywords.len(),
            label,
            plural(keywords.len()),
            format_list(keywords, 5),
        );
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

/// `#N` for a known rank, `rank ?` when the matching item carried none.
pub fn format_position(record: &RankingRecord) -> String {
    match record.position {
        Some(position) => format!("#{}", position),
        None => "rank ?".to_string(),
    }
}

/// Extract a brief error reason from a failed record.
fn brief_error(record: &RankingRecord) -> &'static str {
    match crate::ErrorKind::of(record) {
        Some(crate::ErrorKind::Timeout) => "(timeout)",
        Some(crate::ErrorKind::Network) => "(network error)",
        Some(crate::ErrorKind::Api) => "(API error)",
        Some(crate::ErrorKind::Parse) => "(parsing error)",
        Some(crate::ErrorKind::Other) => "(error)",
        None => "(unknown error)",
    }
}

fn format_list(keywords: &[String], max_show: usize) -> String {
    if keywords.len() <= max_show {
        keywords.join(", ")
    } else {
        let shown = &keywords[..max_show];
        let remaining = keywords.len() - max_show;
        format!("{}, ... and {} more", shown.join(", "), remaining)
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
