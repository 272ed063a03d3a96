use crate::error::ScrapeError;
use crate::results::{BatchError, BatchReport, ScrapeResult};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;

/// Runs `pipeline` over every URL with at most `max_concurrency` in flight.
///
/// Each URL ends up in exactly one of `results` or `errors`. A failing or
/// panicking pipeline only affects its own URL. Outcomes are reported in
/// input order.
pub async fn run_batch<F, Fut>(urls: &[String], max_concurrency: usize, pipeline: F) -> BatchReport
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ScrapeResult, ScrapeError>> + Send + 'static,
{
    let start_time = std::time::Instant::now();
    ::log::info!(
        "Starting batch of {} URLs with concurrency {}",
        urls.len(),
        max_concurrency
    );

    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let pipeline = Arc::new(pipeline);

    let handles: Vec<(String, JoinHandle<Result<ScrapeResult, ScrapeError>>)> = urls
        .iter()
        .map(|url| {
            let semaphore = Arc::clone(&semaphore);
            let pipeline = Arc::clone(&pipeline);
            let task_url = url.clone();
            let handle = tokio::spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| ScrapeError::Browser(format!("batch scheduler closed: {}", e)))?;
                ::log::debug!("Processing {}", task_url);
                pipeline(task_url).await
            });
            (url.clone(), handle)
        })
        .collect();

    let mut report = BatchReport::default();
    for (url, handle) in handles {
        let outcome = match handle.await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => {
                ::log::warn!("Failed to process {}: {}", url, e);
                Err(BatchError::new(url, &e))
            }
            Err(e) => {
                ::log::error!("Worker for {} did not finish: {}", url, e);
                Err(BatchError::new(
                    url,
                    &ScrapeError::Extraction(format!("worker aborted: {}", e)),
                ))
            }
        };
        report.push(outcome);
    }

    ::log::info!(
        "Batch complete - {} succeeded, {} failed in {:.2} seconds",
        report.success_count,
        report.error_count,
        start_time.elapsed().as_secs_f64()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, TimeoutStage};
    use crate::extractors::Extracted;
    use crate::fetchers::FetchSource;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn ok(url: String) -> ScrapeResult {
        ScrapeResult {
            url,
            fetched_with: FetchSource::Static,
            status: Some(200),
            data: Extracted::Links { links: Vec::new() },
            screenshot: None,
        }
    }

    fn urls(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_every_url_has_one_outcome() {
        let input = urls(&["a", "bad-1", "b", "bad-2", "c"]);
        let report = run_batch(&input, 2, |url: String| async move {
            if url.starts_with("bad") {
                Err(ScrapeError::InvalidUrl(url))
            } else {
                Ok(ok(url))
            }
        })
        .await;

        assert_eq!(report.total_processed, 5);
        assert_eq!(report.success_count + report.error_count, report.total_processed);
        let succeeded: Vec<_> = report.results.iter().map(|r| r.url.as_str()).collect();
        let failed: Vec<_> = report.errors.iter().map(|e| e.url.as_str()).collect();
        assert_eq!(succeeded, vec!["a", "b", "c"]);
        assert_eq!(failed, vec!["bad-1", "bad-2"]);
        assert!(report.errors.iter().all(|e| e.kind == ErrorKind::InvalidUrl));
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let input = urls(&["slow", "fast"]);
        let report = run_batch(&input, 4, |url: String| async move {
            if url == "slow" {
                Err(ScrapeError::timeout(
                    TimeoutStage::Navigation,
                    Duration::from_millis(5),
                ))
            } else {
                Ok(ok(url))
            }
        })
        .await;

        assert_eq!(report.success_count, 1);
        assert_eq!(report.errors[0].url, "slow");
        assert_eq!(report.errors[0].kind, ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_panicking_pipeline_becomes_error_entry() {
        let input = urls(&["boom", "fine"]);
        let report = run_batch(&input, 2, |url: String| async move {
            if url == "boom" {
                panic!("pipeline exploded");
            }
            Ok(ok(url))
        })
        .await;

        assert_eq!(report.total_processed, 2);
        assert_eq!(report.results[0].url, "fine");
        assert_eq!(report.errors[0].url, "boom");
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let input: Vec<String> = (0..10).map(|i| format!("u{}", i)).collect();

        let (a, p) = (Arc::clone(&active), Arc::clone(&peak));
        let report = run_batch(&input, 3, move |url: String| {
            let active = Arc::clone(&a);
            let peak = Arc::clone(&p);
            async move {
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                active.fetch_sub(1, Ordering::SeqCst);
                Ok(ok(url))
            }
        })
        .await;

        assert_eq!(report.success_count, 10);
        assert!(peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let report = run_batch(&[], 4, |url: String| async move { Ok(ok(url)) }).await;
        assert_eq!(report, BatchReport::default());
    }
}
