//! Rate-limited, concurrent dispatch of SERP queries.
//!
//! Keywords are split into consecutive windows of at most
//! `requests_per_window` keywords. Each window runs concurrently behind a
//! counting semaphore of `concurrency` permits, is drained completely, and is
//! followed by a `window_duration` pause unless it was the last one.
//!
//! Dropping the future returned by [`RateLimitedDispatcher::run`] cancels
//! every in-flight request and releases their permits; no partial record set
//! is ever returned.

use crate::error::RankCheckError;
use crate::extract::RankExtractor;
use crate::protocols::SerpFetcher;
use crate::types::{DispatchLimits, QueryParams, QueryRequest, RankingRecord, SerpResponse};
use futures::stream::{FuturesUnordered, StreamExt};
use std::ops::Range;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Progress notification emitted once per completed keyword.
#[derive(Debug)]
pub struct DispatchProgress<'a> {
    /// Record just produced
    pub record: &'a RankingRecord,
    /// Keywords completed so far, including this one
    pub completed: usize,
    /// Total keywords in the run
    pub total: usize,
    /// 1-based window the keyword belonged to
    pub window: usize,
}

/// Callback invoked for every completed keyword.
pub type ProgressFn = Box<dyn Fn(&DispatchProgress<'_>) + Send + Sync>;

/// Outcome of a complete dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchReport {
    /// One record per input keyword, in input order
    pub records: Vec<RankingRecord>,
    /// Number of windows the keywords were split into
    pub windows: usize,
    /// Pacing pauses taken between windows
    pub pauses: usize,
    /// Keywords that degraded to not-found because their query failed
    pub failures: usize,
    /// Wall time of the run, pauses included
    pub elapsed: Duration,
}

impl DispatchReport {
    /// Keywords where the target domain was located.
    pub fn found(&self) -> usize {
        self.records.iter().filter(|r| r.is_found()).count()
    }
}

/// Drives SERP queries under a concurrency ceiling and a per-window rate ceiling.
pub struct RateLimitedDispatcher<F> {
    fetcher: F,
    limits: DispatchLimits,
    query: QueryParams,
    progress: Option<ProgressFn>,
}

impl<F: SerpFetcher> RateLimitedDispatcher<F> {
    /// Create a dispatcher issuing queries through `fetcher`.
    pub fn new(fetcher: F, limits: DispatchLimits, query: QueryParams) -> Self {
        Self {
            fetcher,
            limits,
            query,
            progress: None,
        }
    }

    /// Register a callback invoked after every completed keyword.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn limits(&self) -> &DispatchLimits {
        &self.limits
    }

    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Rank `target_domain` for every keyword.
    ///
    /// Returns exactly one record per keyword, in input order. Duplicate
    /// keywords are queried and reported once per occurrence.
    ///
    /// # Errors
    ///
    /// Only systemic failures are returned, and always before the first
    /// request is issued: invalid limits, an empty keyword, an invalid target
    /// domain, or a failed preflight check.
    pub async fn run(
        &self,
        keywords: &[String],
        target_domain: &str,
    ) -> Result<Vec<RankingRecord>, RankCheckError> {
        Ok(self.run_detailed(keywords, target_domain).await?.records)
    }

    /// Same as [`run`](Self::run) but also reports windows, pauses and failures.
    pub async fn run_detailed(
        &self,
        keywords: &[String],
        target_domain: &str,
    ) -> Result<DispatchReport, RankCheckError> {
        self.limits.validate()?;
        let extractor = RankExtractor::new(target_domain)?;
        if let Some(empty) = keywords.iter().find(|k| k.trim().is_empty()) {
            return Err(RankCheckError::invalid_keyword(
                empty.as_str(),
                "Keyword cannot be empty",
            ));
        }

        let start = Instant::now();
        if keywords.is_empty() {
            return Ok(DispatchReport {
                records: Vec::new(),
                windows: 0,
                pauses: 0,
                failures: 0,
                elapsed: start.elapsed(),
            });
        }

        self.fetcher.preflight().await?;

        let windows = plan_windows(keywords.len(), self.limits.requests_per_window);
        let gate = Semaphore::new(self.limits.concurrency);
        let mut slots: Vec<Option<RankingRecord>> = vec![None; keywords.len()];
        let mut completed = 0usize;
        let mut failures = 0usize;
        let mut pauses = 0usize;

        tracing::info!(
            keywords = keywords.len(),
            windows = windows.len(),
            concurrency = self.limits.concurrency,
            domain = extractor.target(),
            "starting ranking run"
        );

        for (index, window) in windows.iter().enumerate() {
            if index > 0 {
                tracing::info!(
                    pause = ?self.limits.window_duration,
                    "pausing between windows to respect the rate limit"
                );
                tokio::time::sleep(self.limits.window_duration).await;
                pauses += 1;
            }

            tracing::info!(
                window = index + 1,
                of = windows.len(),
                size = window.len(),
                "dispatching window"
            );

            let mut in_flight: FuturesUnordered<_> = window
                .clone()
                .map(|slot| self.dispatch_one(&gate, &extractor, slot, &keywords[slot]))
                .collect();

            // The window is done only once every call has resolved.
            while let Some((slot, record)) = in_flight.next().await {
                completed += 1;
                if record.is_failed() {
                    failures += 1;
                }
                if let Some(progress) = &self.progress {
                    progress(&DispatchProgress {
                        record: &record,
                        completed,
                        total: keywords.len(),
                        window: index + 1,
                    });
                }
                slots[slot] = Some(record);
            }
        }

        let records = slots
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| RankCheckError::internal("A keyword finished without a record"))?;

        let elapsed = start.elapsed();
        tracing::info!(
            records = records.len(),
            failures,
            elapsed = ?elapsed,
            "ranking run complete"
        );

        Ok(DispatchReport {
            records,
            windows: windows.len(),
            pauses,
            failures,
            elapsed,
        })
    }

    /// Query one keyword behind the admission gate and extract its record.
    async fn dispatch_one(
        &self,
        gate: &Semaphore,
        extractor: &RankExtractor,
        slot: usize,
        keyword: &str,
    ) -> (usize, RankingRecord) {
        let request = QueryRequest::new(keyword, &self.query);

        let response = match gate.acquire().await {
            Ok(permit) => {
                let response = self.fetch_with_deadline(&request).await;
                drop(permit);
                response
            }
            Err(_) => SerpResponse::Failure(RankCheckError::internal("Admission gate closed")),
        };

        if let SerpResponse::Failure(e) = &response {
            tracing::warn!(
                keyword,
                category = e.category(),
                error = %e,
                "query failed; recording not-found"
            );
        }

        (slot, extractor.extract(&response, keyword))
    }

    async fn fetch_with_deadline(&self, request: &QueryRequest) -> SerpResponse {
        let deadline = self.limits.request_timeout;
        match tokio::time::timeout(deadline, self.fetcher.fetch(request)).await {
            Ok(response) => response,
            Err(_) => SerpResponse::Failure(RankCheckError::timeout("SERP request", deadline)),
        }
    }
}

/// Split `total` keywords into consecutive windows of at most `per_window`.
///
/// When `per_window` covers everything a single window is returned. A
/// `per_window` of zero is treated as unbounded.
pub fn plan_windows(total: usize, per_window: usize) -> Vec<Range<usize>> {
    if total == 0 {
        return Vec::new();
    }
    let size = if per_window == 0 || per_window >= total {
        total
    } else {
        per_window
    };
    (0..total)
        .step_by(size)
        .map(|start| start..(start + size).min(total))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SerpItem;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Fetcher answering every keyword with the target at rank 1, after a delay.
    struct EchoFetcher {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl EchoFetcher {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl SerpFetcher for EchoFetcher {
        async fn fetch(&self, request: &QueryRequest) -> SerpResponse {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            SerpResponse::Success {
                items: vec![SerpItem {
                    rank_absolute: Some(1),
                    url: Some(format!("https://example.com/{}", request.keyword)),
                    title: Some(request.keyword.clone()),
                    description: None,
                }],
            }
        }
    }

    fn limits(concurrency: usize, per_window: usize, window_secs: u64) -> DispatchLimits {
        DispatchLimits {
            concurrency,
            requests_per_window: per_window,
            window_duration: Duration::from_secs(window_secs),
            request_timeout: Duration::from_secs(5),
        }
    }

    fn keywords(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("kw-{}", i)).collect()
    }

    #[test]
    fn test_plan_windows() {
        assert_eq!(plan_windows(25, 10), vec![0..10, 10..20, 20..25]);
        assert_eq!(plan_windows(20, 10), vec![0..10, 10..20]);
        assert_eq!(plan_windows(5, 10), vec![0..5]);
        assert_eq!(plan_windows(10, 10), vec![0..10]);
        assert_eq!(plan_windows(3, 0), vec![0..3]);
        assert!(plan_windows(0, 10).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_records_keep_input_order() {
        let dispatcher = RateLimitedDispatcher::new(
            EchoFetcher::new(Duration::from_millis(10)),
            limits(4, 100, 60),
            QueryParams::default(),
        );
        let input = keywords(12);
        let records = dispatcher.run(&input, "example.com").await.unwrap();

        let output: Vec<&str> = records.iter().map(|r| r.keyword.as_str()).collect();
        assert_eq!(output, input.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(records.iter().all(|r| r.position == Some(1)));
    }

    #[test]
    fn test_empty_input_issues_no_requests() {
        let dispatcher = RateLimitedDispatcher::new(
            EchoFetcher::new(Duration::ZERO),
            limits(4, 10, 60),
            QueryParams::default(),
        );
        let report = tokio_test::assert_ok!(tokio_test::block_on(
            dispatcher.run_detailed(&[], "example.com")
        ));
        assert!(report.records.is_empty());
        assert_eq!(report.windows, 0);
        assert_eq!(dispatcher.fetcher().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_systemic_errors_abort_before_requests() {
        let dispatcher = RateLimitedDispatcher::new(
            EchoFetcher::new(Duration::ZERO),
            limits(4, 10, 60),
            QueryParams::default(),
        );

        let err = dispatcher.run(&keywords(3), "  ").await.unwrap_err();
        assert!(err.is_systemic());

        let with_blank = vec!["ok".to_string(), " ".to_string()];
        let err = dispatcher.run(&with_blank, "example.com").await.unwrap_err();
        assert!(matches!(err, RankCheckError::InvalidKeyword { .. }));
        assert!(err.is_systemic());

        let zero = RateLimitedDispatcher::new(
            EchoFetcher::new(Duration::ZERO),
            limits(0, 10, 60),
            QueryParams::default(),
        );
        assert!(zero.run(&keywords(3), "example.com").await.is_err());

        let no_pause = RateLimitedDispatcher::new(
            EchoFetcher::new(Duration::ZERO),
            limits(4, 1, 0),
            QueryParams::default(),
        );
        let err = no_pause.run(&keywords(3), "example.com").await.unwrap_err();
        assert!(err.is_systemic());
        assert_eq!(no_pause.fetcher().calls.load(Ordering::SeqCst), 0);

        assert_eq!(dispatcher.fetcher().calls.load(Ordering::SeqCst), 0);
        assert_eq!(zero.fetcher().calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_call_times_out_into_not_found() {
        let dispatcher = RateLimitedDispatcher::new(
            EchoFetcher::new(Duration::from_secs(3600)),
            DispatchLimits {
                request_timeout: Duration::from_secs(2),
                ..limits(2, 10, 60)
            },
            QueryParams::default(),
        );
        let report = dispatcher
            .run_detailed(&keywords(3), "example.com")
            .await
            .unwrap();

        assert_eq!(report.records.len(), 3);
        assert_eq!(report.failures, 3);
        for record in &report.records {
            assert_eq!(record.position, Some(100));
            assert!(record.error_message.as_deref().unwrap().contains("Timeout"));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_called_per_keyword() {
        let seen = Arc::new(AtomicUsize::new(0));
        let seen_in_callback = seen.clone();
        let dispatcher = RateLimitedDispatcher::new(
            EchoFetcher::new(Duration::from_millis(5)),
            limits(3, 4, 1),
            QueryParams::default(),
        )
        .with_progress(Box::new(move |p: &DispatchProgress<'_>| {
            assert!(p.completed <= p.total);
            assert!(p.window >= 1 && p.window <= 3);
            seen_in_callback.fetch_add(1, Ordering::SeqCst);
        }));

        let report = dispatcher
            .run_detailed(&keywords(10), "example.com")
            .await
            .unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 10);
        assert_eq!(report.windows, 3);
        assert_eq!(report.pauses, 2);
        assert_eq!(report.found(), 10);
    }
}
