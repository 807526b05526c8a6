//! Snapshot capture through a headless browser
//!
//! The browser process is launched once per run with its traffic routed
//! through the same SOCKS proxy as the document fetcher. Each capture opens
//! a child page, renders the target, and closes the page again before the
//! call returns, whatever the outcome.

use crate::output::{write_artifact, WriteError};
use crate::targets::Target;
use crate::transport::ProxyEndpoint;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use std::fmt;
use std::future::Future;
use std::ops::Deref;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

/// Wall-clock budget for one capture, page load and settling included
pub const CAPTURE_TIMEOUT: Duration = Duration::from_secs(90);

/// Pause between readiness and capture so late dynamic content can render
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Element whose presence marks the document as ready
pub const READY_SELECTOR: &str = "body";

const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);
const WINDOW_SIZE: (u32, u32) = (1366, 768);

/// Browser step that failed during a capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStep {
    OpenPage,
    Navigate,
    WaitReady,
    Screenshot,
}

impl fmt::Display for CaptureStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::OpenPage => "open page",
            Self::Navigate => "navigate",
            Self::WaitReady => "wait ready",
            Self::Screenshot => "screenshot",
        };
        f.write_str(name)
    }
}

/// Per-target snapshot failure; never fatal to the run
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{step} failed: {message}")]
    Navigation { step: CaptureStep, message: String },

    #[error("empty png buffer")]
    EmptyOutput,

    #[error("write failed: {0}")]
    Write(#[from] WriteError),

    #[error("browser launch failed: {0}")]
    Launch(String),
}

impl CaptureError {
    fn at(step: CaptureStep, e: impl fmt::Display) -> Self {
        Self::Navigation {
            step,
            message: e.to_string(),
        }
    }
}

/// Something that can render a target into a PNG file
///
/// The orchestrator only depends on this seam, so a run can be driven by
/// the real browser session or by any other renderer.
pub trait Capturer: Send + Sync {
    /// Renders `target` and writes the image to `output`
    ///
    /// Must return within a bounded time and must not leave a file behind
    /// on failure.
    fn capture(
        &self,
        target: &Target,
        output: &Path,
    ) -> impl Future<Output = Result<(), CaptureError>> + Send;
}

/// RAII guard for a child page
///
/// `close` is the normal path. If the guard is dropped instead (capture
/// timed out mid-step, or a panic unwound through it), the page is closed
/// from a background task so it never outlives its capture call.
struct PageGuard {
    page: Option<Page>,
    url: String,
    runtime_handle: tokio::runtime::Handle,
}

impl PageGuard {
    fn new(page: Page, url: &str) -> Self {
        Self {
            page: Some(page),
            url: url.to_string(),
            runtime_handle: tokio::runtime::Handle::current(),
        }
    }

    async fn close(mut self) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                tracing::warn!("Failed to close page for {}: {}", self.url, e);
            }
        }
    }
}

impl Deref for PageGuard {
    type Target = Page;

    fn deref(&self) -> &Page {
        // Only `close` and `drop` take the page, and both consume the guard
        match self.page.as_ref() {
            Some(page) => page,
            None => unreachable!("page taken before guard was consumed"),
        }
    }
}

impl Drop for PageGuard {
    fn drop(&mut self) {
        if let Some(page) = self.page.take() {
            let url = std::mem::take(&mut self.url);
            self.runtime_handle.spawn(async move {
                if let Err(e) = page.close().await {
                    tracing::warn!("Background page close failed for {}: {}", url, e);
                }
            });
        }
    }
}

/// Long-lived browser bound to the anonymizing proxy
pub struct BrowserSession {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl BrowserSession {
    /// Launches a headless browser routed through `proxy`
    ///
    /// # Arguments
    ///
    /// * `proxy` - SOCKS endpoint shared with the document fetcher
    /// * `executable` - Browser binary; auto-detected when `None`
    pub async fn launch(
        proxy: &ProxyEndpoint,
        executable: Option<&Path>,
    ) -> Result<Self, CaptureError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .window_size(WINDOW_SIZE.0, WINDOW_SIZE.1)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--ignore-certificate-errors")
            .arg(format!("--proxy-server={}", proxy.browser_proxy_url()));

        if let Some(path) = executable {
            builder = builder.chrome_executable(path);
        }

        let config = builder.build().map_err(CaptureError::Launch)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CaptureError::Launch(e.to_string()))?;

        let handler = tokio::spawn(drive_handler(handler));

        tracing::debug!("Browser session routed through {}", proxy);
        Ok(Self {
            browser,
            handler,
        })
    }

    /// Shuts the browser down and waits for the process to exit
    pub async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            tracing::warn!("Failed to reap browser process: {}", e);
        }
        self.handler.abort();
    }

    async fn render(&self, target: &Target) -> Result<Vec<u8>, CaptureError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| CaptureError::at(CaptureStep::OpenPage, e))?;
        let guard = PageGuard::new(page, target.as_str());

        let result = render_page(&guard, target.as_str()).await;
        guard.close().await;
        result
    }
}

impl Capturer for BrowserSession {
    async fn capture(&self, target: &Target, output: &Path) -> Result<(), CaptureError> {
        let png = with_deadline(CAPTURE_TIMEOUT, self.render(target)).await?;
        store_snapshot(output, &png)
    }
}

/// Pumps browser events until the connection closes
///
/// Individual errors (such as CDP messages this client cannot decode) are
/// skipped; only the end of the stream stops the loop.
async fn drive_handler<H, E>(mut handler: H)
where
    H: futures::Stream<Item = Result<(), E>> + Unpin,
    E: fmt::Display,
{
    while let Some(event) = handler.next().await {
        if let Err(e) = event {
            tracing::debug!("Browser handler error: {}", e);
        }
    }
    tracing::debug!("Browser handler stopped");
}

/// Navigate, wait for readiness, settle, then capture the full page
async fn render_page(page: &Page, url: &str) -> Result<Vec<u8>, CaptureError> {
    page.goto(url)
        .await
        .map_err(|e| CaptureError::at(CaptureStep::Navigate, e))?;

    wait_ready(page).await?;
    tokio::time::sleep(SETTLE_DELAY).await;

    let params = ScreenshotParams::builder()
        .format(CaptureScreenshotFormat::Png)
        .full_page(true)
        .build();

    page.screenshot(params)
        .await
        .map_err(|e| CaptureError::at(CaptureStep::Screenshot, e))
}

/// Polls for the ready selector; the capture deadline bounds the loop
async fn wait_ready(page: &Page) -> Result<(), CaptureError> {
    loop {
        match page.find_element(READY_SELECTOR).await {
            Ok(_) => return Ok(()),
            Err(e) => tracing::trace!("{} not ready yet: {}", READY_SELECTOR, e),
        }
        tokio::time::sleep(READY_POLL_INTERVAL).await;
    }
}

/// Runs `fut` under a wall-clock budget
///
/// When the budget runs out the future is dropped, which releases any
/// guards it holds.
pub async fn with_deadline<T, F>(budget: Duration, fut: F) -> Result<T, CaptureError>
where
    F: Future<Output = Result<T, CaptureError>>,
{
    tokio::time::timeout(budget, fut)
        .await
        .unwrap_or(Err(CaptureError::Timeout(budget)))
}

/// Persists a rendered image; an empty buffer is a failure, not an artifact
pub fn store_snapshot(output: &Path, png: &[u8]) -> Result<(), CaptureError> {
    if png.is_empty() {
        return Err(CaptureError::EmptyOutput);
    }
    write_artifact(output, png)?;
    Ok(())
}
