//! Headless browser sessions.
//!
//! [`SessionFactory`] hands out one exclusively owned [`BrowserSession`] per
//! call. The production factory launches a dedicated headless Chromium over
//! CDP (chromiumoxide); tests substitute an in-memory page.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

// ── Constants ────────────────────────────────────────────────────────────────

pub const DESKTOP_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/134.0.6998.166 Safari/537.36";

const POLL_INTERVAL: Duration = Duration::from_millis(250);

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ScrapeError {
    #[error("browser launch failed: {0}")]
    Launch(String),
    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },
    #[error("navigation to {0} timed out")]
    NavigationTimeout(String),
    #[error("reading page content failed: {0}")]
    Content(String),
    #[error("closing browser failed: {0}")]
    Close(String),
}

// ── Session seam ─────────────────────────────────────────────────────────────

#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, ScrapeError>;
}

#[async_trait]
pub trait BrowserSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), ScrapeError>;

    /// Poll until `selector` matches or `timeout` elapses. A timeout is not
    /// an error; the caller reads whatever has rendered so far.
    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, ScrapeError>;

    async fn content(&mut self) -> Result<String, ScrapeError>;

    /// Tear the session down and release its OS resources.
    async fn close(self: Box<Self>) -> Result<(), ScrapeError>;
}

// ── Chromium ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ChromiumSessions {
    pub executable: Option<PathBuf>,
    pub navigation_timeout: Duration,
}

impl ChromiumSessions {
    pub fn new(executable: Option<PathBuf>, navigation_timeout: Duration) -> Self {
        Self {
            executable,
            navigation_timeout,
        }
    }

    fn config(&self, profile_dir: &std::path::Path) -> Result<BrowserConfig, ScrapeError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg(format!("--user-agent={}", DESKTOP_USER_AGENT))
            .user_data_dir(profile_dir)
            .window_size(1920, 1080);

        if let Some(path) = &self.executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(ScrapeError::Launch)
    }
}

#[async_trait]
impl SessionFactory for ChromiumSessions {
    async fn open(&self) -> Result<Box<dyn BrowserSession>, ScrapeError> {
        // Each session gets its own profile so concurrent browsers do not
        // contend for Chromium's singleton lock.
        let profile = tempfile::Builder::new()
            .prefix("outfit-chromium-")
            .tempdir()
            .map_err(|e| ScrapeError::Launch(e.to_string()))?;

        let config = self.config(profile.path())?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Launch(e.to_string()))?;

        // The handler drives the CDP connection and must be polled.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("CDP handler loop ended");
                    break;
                }
            }
        });

        let page = match browser.new_page("about:blank").await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    warn!("closing browser after failed page open: {}", close_err);
                }
                if let Err(wait_err) = browser.wait().await {
                    warn!("reaping Chromium process failed: {}", wait_err);
                }
                handler_task.abort();
                return Err(ScrapeError::Launch(e.to_string()));
            }
        };

        debug!("headless Chromium session opened");
        Ok(Box::new(ChromiumSession {
            browser: Some(browser),
            page,
            handler_task,
            navigation_timeout: self.navigation_timeout,
            profile: Some(profile),
        }))
    }
}

/// Check `check` immediately, then every [`POLL_INTERVAL`] until it returns
/// true or `timeout` has elapsed. The last check happens at the deadline.
pub(crate) async fn poll_until<F, Fut>(mut check: F, timeout: Duration) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
    }
}

/// Run `cleanup` on the current runtime without blocking the caller. Outside
/// a runtime the future is dropped, which still drops everything it owns.
fn defer_cleanup<F>(cleanup: F)
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        handle.spawn(cleanup);
    }
}

struct ChromiumSession {
    browser: Option<Browser>,
    page: Page,
    handler_task: JoinHandle<()>,
    navigation_timeout: Duration,
    profile: Option<tempfile::TempDir>,
}

#[async_trait]
impl BrowserSession for ChromiumSession {
    async fn navigate(&mut self, url: &str) -> Result<(), ScrapeError> {
        match tokio::time::timeout(self.navigation_timeout, self.page.goto(url)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(ScrapeError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(ScrapeError::NavigationTimeout(url.to_string())),
        }
    }

    async fn wait_for(&mut self, selector: &str, timeout: Duration) -> Result<bool, ScrapeError> {
        let page = &self.page;
        let found = poll_until(
            || async move { page.find_element(selector).await.is_ok() },
            timeout,
        )
        .await;
        Ok(found)
    }

    async fn content(&mut self) -> Result<String, ScrapeError> {
        self.page
            .content()
            .await
            .map_err(|e| ScrapeError::Content(e.to_string()))
    }

    async fn close(mut self: Box<Self>) -> Result<(), ScrapeError> {
        let closed = match self.browser.take() {
            Some(mut browser) => {
                let closed = browser.close().await;
                if let Err(e) = browser.wait().await {
                    warn!("reaping Chromium process failed: {}", e);
                }
                closed.map(|_| ()).map_err(|e| ScrapeError::Close(e.to_string()))
            }
            None => Ok(()),
        };
        self.handler_task.abort();
        drop(self.profile.take());
        debug!("headless Chromium session closed");
        closed
    }
}

// A session dropped without `close` (the request future was cancelled) must
// not delete its profile while Chromium is still running in it.
impl Drop for ChromiumSession {
    fn drop(&mut self) {
        self.handler_task.abort();
        let Some(mut browser) = self.browser.take() else {
            return;
        };
        let profile = self.profile.take();
        warn!("Chromium session dropped without close; killing browser");
        defer_cleanup(async move {
            if let Some(Err(e)) = browser.kill().await {
                warn!("killing Chromium failed: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("reaping Chromium process failed: {}", e);
            }
            drop(profile);
        });
    }
}
