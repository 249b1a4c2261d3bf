//! Retrieval of the day's cause list from the court portal
//!
//! The portal renders a calendar widget per month; clicking the day cell
//! triggers the PDF download. A headless browser drives the widget and the
//! download lands in a scoped temporary directory owned by the fetcher, so
//! everything is cleaned up when the fetcher is dropped, on every exit
//! path.
//!
//! "Nothing published today" is a frequent, expected condition and is
//! modeled as [`FetchOutcome::NotPublished`] rather than an error; only a
//! portal that cannot be reached at all surfaces as [`FetchError`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::{
    SetDownloadBehaviorBehavior, SetDownloadBehaviorParams,
};
use chromiumoxide::Page;
use futures::StreamExt;
use tempfile::TempDir;
use thiserror::Error;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, instrument, warn};

use causelist_core::ListingLocator;

/// Budget for loading the month listing page.
const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(90);
/// Budget for the day cell to appear in the calendar widget.
const SELECTOR_TIMEOUT: Duration = Duration::from_secs(90);
/// Budget for the download to start after clicking the day cell.
const DOWNLOAD_START_TIMEOUT: Duration = Duration::from_secs(15);
/// Budget for a started download to finish.
const DOWNLOAD_COMPLETE_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to launch browser: {0}")]
    Browser(String),

    #[error("Failed to reach portal: {0}")]
    Navigation(String),

    #[error("Download did not complete: {0}")]
    Download(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The retrieved day's document: its bytes plus where it was saved.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub bytes: Vec<u8>,
    pub path: PathBuf,
}

/// Outcome of a fetch attempt. `NotPublished` is the expected branch on
/// days without a list and ends the run cleanly.
#[derive(Debug)]
pub enum FetchOutcome {
    Retrieved(SourceDocument),
    NotPublished,
}

/// Headless-browser fetcher for the court portal.
///
/// Owns the browser process, its event handler task, and the scoped
/// download directory for the duration of the run.
pub struct PortalFetcher {
    browser: Browser,
    handler_task: tokio::task::JoinHandle<()>,
    download_dir: TempDir,
}

impl PortalFetcher {
    /// Launch a headless browser with downloads routed to a scoped
    /// temporary directory.
    pub async fn launch() -> Result<Self, FetchError> {
        let download_dir = TempDir::new()?;

        let config = BrowserConfig::builder()
            .no_sandbox()
            .build()
            .map_err(FetchError::Browser)?;

        info!("launching headless browser");
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            browser,
            handler_task,
            download_dir,
        })
    }

    /// Locate and retrieve the day's document.
    ///
    /// A missing day cell or a click that never starts a download are the
    /// `NotPublished` outcome. Navigation failures and downloads that
    /// start but never finish are errors, so the operator log can tell
    /// "nothing published" apart from "portal unreachable".
    #[instrument(skip(self, locator), fields(url = %locator.url))]
    pub async fn fetch(&self, locator: &ListingLocator) -> Result<FetchOutcome, FetchError> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;

        let outcome = self.fetch_on_page(&page, locator).await;

        // The page is scoped to this fetch regardless of the outcome.
        let _ = page.close().await;
        outcome
    }

    async fn fetch_on_page(
        &self,
        page: &Page,
        locator: &ListingLocator,
    ) -> Result<FetchOutcome, FetchError> {
        self.allow_downloads(page).await?;

        debug!("navigating to month listing");
        timeout(NAVIGATION_TIMEOUT, page.goto(&locator.url))
            .await
            .map_err(|_| FetchError::Navigation(format!("timed out loading {}", locator.url)))?
            .map_err(|e| FetchError::Navigation(e.to_string()))?;

        if !self.wait_for_day_cell(page, &locator.day_cell_selector).await {
            info!("day cell not present; no list published for this date");
            return Ok(FetchOutcome::NotPublished);
        }

        debug!(selector = %locator.day_cell_selector, "clicking day cell");
        if let Ok(element) = page.find_element(&locator.day_cell_selector).await {
            if let Err(e) = element.click().await {
                warn!("day cell click failed: {}", e);
                return Ok(FetchOutcome::NotPublished);
            }
        } else {
            return Ok(FetchOutcome::NotPublished);
        }

        let Some(path) = self.wait_for_download_start().await else {
            info!("no download started; no PDF available for this date");
            return Ok(FetchOutcome::NotPublished);
        };

        let path = self.wait_for_download_complete(path).await?;
        let bytes = tokio::fs::read(&path).await?;
        info!(size = bytes.len(), path = %path.display(), "cause list downloaded");

        Ok(FetchOutcome::Retrieved(SourceDocument { bytes, path }))
    }

    /// Route downloads into the fetcher's scoped directory.
    async fn allow_downloads(&self, page: &Page) -> Result<(), FetchError> {
        let params = SetDownloadBehaviorParams::builder()
            .behavior(SetDownloadBehaviorBehavior::Allow)
            .download_path(self.download_dir.path().to_string_lossy().to_string())
            .build()
            .map_err(FetchError::Browser)?;
        page.execute(params)
            .await
            .map_err(|e| FetchError::Browser(e.to_string()))?;
        Ok(())
    }

    /// Poll for the day cell until it appears or the budget runs out.
    async fn wait_for_day_cell(&self, page: &Page, selector: &str) -> bool {
        let deadline = Instant::now() + SELECTOR_TIMEOUT;
        while Instant::now() < deadline {
            if page.find_element(selector).await.is_ok() {
                return true;
            }
            sleep(Duration::from_millis(500)).await;
        }
        false
    }

    /// Wait for any file to appear in the download directory.
    async fn wait_for_download_start(&self) -> Option<PathBuf> {
        let deadline = Instant::now() + DOWNLOAD_START_TIMEOUT;
        while Instant::now() < deadline {
            if let Some(path) = newest_file(self.download_dir.path()) {
                return Some(path);
            }
            sleep(POLL_INTERVAL).await;
        }
        None
    }

    /// Wait until the browser has finished writing the download: the
    /// in-progress suffix is gone and the size is stable across polls.
    async fn wait_for_download_complete(&self, mut path: PathBuf) -> Result<PathBuf, FetchError> {
        let deadline = Instant::now() + DOWNLOAD_COMPLETE_TIMEOUT;
        let mut last_size = 0u64;
        while Instant::now() < deadline {
            // The partial file is renamed when the download finishes.
            if is_partial_download(&path) {
                sleep(POLL_INTERVAL).await;
                if let Some(latest) = newest_file(self.download_dir.path()) {
                    path = latest;
                }
                continue;
            }
            let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
            if size > 0 && size == last_size {
                return Ok(path);
            }
            last_size = size;
            sleep(POLL_INTERVAL).await;
        }
        Err(FetchError::Download(format!(
            "file still incomplete after {DOWNLOAD_COMPLETE_TIMEOUT:?}"
        )))
    }

    /// Shut the browser down. Temp files go with the fetcher either way.
    pub async fn close(mut self) -> Result<(), FetchError> {
        info!("closing browser");
        let _ = self.browser.close().await;
        self.handler_task.abort();
        Ok(())
    }
}

/// Most recently modified regular file in `dir`, if any.
fn newest_file(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .max_by_key(|entry| {
            entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(std::time::UNIX_EPOCH)
        })
        .map(|entry| entry.path())
}

/// Chromium writes in-flight downloads with a `.crdownload` suffix.
fn is_partial_download(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == "crdownload")
        .unwrap_or(false)
}
