use crate::browser::{BrowserSession, Page, ReadyState};
use crate::error::{ScrapeError, TimeoutStage};
use crate::options::{FetchOptions, WaitUntil};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::future::Future;
use std::time::{Duration, Instant};
use url::Url;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// How long resource counts must hold steady to call the network idle
const IDLE_WINDOW: Duration = Duration::from_millis(500);
const SCROLL_INTERVAL: Duration = Duration::from_millis(100);
const MAX_SCROLL_STEPS: usize = 50;

/// A page as the browser left it after rendering
#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub final_url: String,
    /// Serialized DOM after scripts ran
    pub html: String,
    /// Base64 PNG, when requested
    pub screenshot: Option<String>,
}

/// Load `url` in a fresh page and return the rendered document.
///
/// The page is released on every path, including timeouts.
pub async fn render(
    session: &BrowserSession,
    url: &Url,
    options: &FetchOptions,
) -> Result<RenderedDocument, ScrapeError> {
    let start = Instant::now();
    let timeout = options.render_timeout();

    let guard = bounded(TimeoutStage::BrowserLaunch, timeout, session.open_page()).await?;
    let result = drive(guard.page(), url, options).await;
    guard.release().await;

    match &result {
        Ok(doc) => ::log::debug!(
            "Rendered {} ({} bytes) in {:.2} seconds",
            doc.final_url,
            doc.html.len(),
            start.elapsed().as_secs_f64()
        ),
        Err(e) => ::log::error!("Failed to render {}: {}", url, e),
    }
    result
}

/// Render `url` and return only its screenshot
pub async fn capture_screenshot(
    session: &BrowserSession,
    url: &Url,
    options: &FetchOptions,
) -> Result<String, ScrapeError> {
    let options = FetchOptions {
        include_screenshot: true,
        ..options.clone()
    };
    render(session, url, &options)
        .await?
        .screenshot
        .ok_or_else(|| ScrapeError::Browser(format!("no screenshot captured for {}", url)))
}

async fn bounded<T, F>(stage: TimeoutStage, after: Duration, future: F) -> Result<T, ScrapeError>
where
    F: Future<Output = Result<T, ScrapeError>>,
{
    match tokio::time::timeout(after, future).await {
        Ok(result) => result,
        Err(_) => Err(ScrapeError::timeout(stage, after)),
    }
}

async fn drive(
    page: &dyn Page,
    url: &Url,
    options: &FetchOptions,
) -> Result<RenderedDocument, ScrapeError> {
    let timeout = options.render_timeout();
    let viewport = options.viewport();

    bounded(TimeoutStage::Navigation, timeout, async {
        page.set_viewport(viewport).await?;
        page.goto(url.as_str()).await?;
        wait_for_load(page, options.wait_until()).await
    })
    .await?;

    if let Some(selector) = &options.wait_for_selector {
        let bound = options.selector_timeout();
        match wait_for_selector(page, selector, bound).await {
            Ok(true) => ::log::debug!("Selector {} appeared on {}", selector, url),
            Ok(false) => ::log::warn!(
                "Selector {} did not appear on {} within {:?}, continuing",
                selector,
                url,
                bound
            ),
            Err(e) => ::log::warn!("Waiting for {} on {} failed: {}", selector, url, e),
        }
    }

    if let Some(ms) = options.wait_time_ms {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    if options.scroll_to_load {
        let steps = bounded(
            TimeoutStage::Scroll,
            timeout,
            scroll_to_end(page, viewport.height.max(1)),
        )
        .await?;
        ::log::debug!("Scrolled {} in {} steps", url, steps);
    }

    let html = bounded(TimeoutStage::PageRead, timeout, page.content()).await?;
    let final_url = bounded(TimeoutStage::PageRead, timeout, page.current_url()).await?;

    let screenshot = if options.include_screenshot {
        let png = bounded(TimeoutStage::Screenshot, timeout, page.screenshot()).await?;
        Some(STANDARD.encode(png))
    } else {
        None
    };

    Ok(RenderedDocument {
        final_url,
        html,
        screenshot,
    })
}

/// Poll the page until it satisfies the navigation-completion policy
async fn wait_for_load(page: &dyn Page, wait_until: WaitUntil) -> Result<(), ScrapeError> {
    let allowance = match wait_until {
        WaitUntil::NetworkIdle => Some(0),
        WaitUntil::NetworkAlmostIdle => Some(2),
        WaitUntil::DomContentLoaded | WaitUntil::Load => None,
    };
    let mut quiet_since: Option<(tokio::time::Instant, usize)> = None;

    loop {
        let progress = page.load_progress().await?;
        let ready = match wait_until {
            WaitUntil::DomContentLoaded => progress.ready_state != ReadyState::Loading,
            _ => progress.ready_state == ReadyState::Complete,
        };

        if ready {
            let Some(allowance) = allowance else {
                return Ok(());
            };
            let still_quiet = matches!(
                quiet_since,
                Some((_, baseline)) if progress.resources.saturating_sub(baseline) <= allowance
            );
            if !still_quiet {
                quiet_since = Some((tokio::time::Instant::now(), progress.resources));
            } else if let Some((since, _)) = quiet_since {
                if since.elapsed() >= IDLE_WINDOW {
                    return Ok(());
                }
            }
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Poll for `selector` until it matches or `bound` passes.
///
/// Each check is a separate page command, so other pages sharing the
/// browser keep running between polls.
async fn wait_for_selector(
    page: &dyn Page,
    selector: &str,
    bound: Duration,
) -> Result<bool, ScrapeError> {
    let deadline = tokio::time::Instant::now() + bound;
    loop {
        if page.has_selector(selector).await? {
            return Ok(true);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

/// Scroll one viewport at a time until the bottom is reached or the step cap hits
async fn scroll_to_end(page: &dyn Page, step: u32) -> Result<usize, ScrapeError> {
    for steps in 1..=MAX_SCROLL_STEPS {
        let position = page.scroll_by(step).await?;
        if position.at_end() {
            return Ok(steps);
        }
        tokio::time::sleep(SCROLL_INTERVAL).await;
    }
    ::log::warn!(
        "Page kept growing; stopped scrolling after {} steps",
        MAX_SCROLL_STEPS
    );
    Ok(MAX_SCROLL_STEPS)
}
