use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::browser::{BrowserSession, ScrapeError, SessionFactory};
use crate::extract::{extract_products, PRODUCT_CARD};
use crate::models::ProductEntry;
use crate::query;

pub struct ProductScraper {
    sessions: Arc<dyn SessionFactory>,
    origin: String,
    render_timeout: Duration,
}

impl ProductScraper {
    pub fn new(sessions: Arc<dyn SessionFactory>, origin: impl Into<String>, render_timeout: Duration) -> Self {
        Self {
            sessions,
            origin: origin.into(),
            render_timeout,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Fetch the catalog listing for `query` and return at most five
    /// products. Failures degrade to an empty list.
    pub async fn scrape(&self, query: &str) -> Vec<ProductEntry> {
        let url = query::search_url(&self.origin, query);
        info!("scraping URL: {}", url);

        let mut session = match self.sessions.open().await {
            Ok(session) => session,
            Err(e) => {
                warn!("error scraping {}: {}", url, e);
                return Vec::new();
            }
        };

        let outcome = self.collect(session.as_mut(), &url).await;

        if let Err(e) = session.close().await {
            warn!("{}", e);
        }

        match outcome {
            Ok(products) => products,
            Err(e) => {
                warn!("error scraping {}: {}", url, e);
                Vec::new()
            }
        }
    }

    async fn collect(&self, session: &mut dyn BrowserSession, url: &str) -> Result<Vec<ProductEntry>, ScrapeError> {
        session.navigate(url).await?;

        if !session.wait_for(PRODUCT_CARD, self.render_timeout).await? {
            info!("no product cards rendered within {:?} for {}", self.render_timeout, url);
        }

        let html = session.content().await?;
        Ok(extract_products(&html, &self.origin))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::browser::{BrowserSession, ScrapeError, SessionFactory};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FailAt {
        Nowhere,
        Open,
        Navigate,
        Content,
    }

    /// In-memory session factory that serves a fixed page and counts
    /// session lifecycles.
    pub struct FakeSessions {
        pub html: String,
        pub fail_at: FailAt,
        pub opened: AtomicUsize,
        pub closed: Arc<AtomicUsize>,
        pub visited: Arc<Mutex<Vec<String>>>,
    }

    impl FakeSessions {
        pub fn serving(html: impl Into<String>) -> Self {
            Self {
                html: html.into(),
                fail_at: FailAt::Nowhere,
                opened: AtomicUsize::new(0),
                closed: Arc::new(AtomicUsize::new(0)),
                visited: Arc::new(Mutex::new(Vec::new())),
            }
        }

        pub fn failing_at(fail_at: FailAt) -> Self {
            Self {
                fail_at,
                ..Self::serving("")
            }
        }

        pub fn opened(&self) -> usize {
            self.opened.load(Ordering::SeqCst)
        }

        pub fn closed(&self) -> usize {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SessionFactory for FakeSessions {
        async fn open(&self) -> Result<Box<dyn BrowserSession>, ScrapeError> {
            if self.fail_at == FailAt::Open {
                return Err(ScrapeError::Launch("no browser".into()));
            }
            self.opened.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeSession {
                html: self.html.clone(),
                fail_at: self.fail_at,
                closed: self.closed.clone(),
                visited: self.visited.clone(),
            }))
        }
    }

    struct FakeSession {
        html: String,
        fail_at: FailAt,
        closed: Arc<AtomicUsize>,
        visited: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl BrowserSession for FakeSession {
        async fn navigate(&mut self, url: &str) -> Result<(), ScrapeError> {
            self.visited.lock().unwrap().push(url.to_string());
            if self.fail_at == FailAt::Navigate {
                return Err(ScrapeError::Navigation {
                    url: url.to_string(),
                    reason: "net::ERR_NAME_NOT_RESOLVED".into(),
                });
            }
            Ok(())
        }

        async fn wait_for(&mut self, selector: &str, _timeout: Duration) -> Result<bool, ScrapeError> {
            Ok(self.html.contains(selector.trim_start_matches("li.")))
        }

        async fn content(&mut self) -> Result<String, ScrapeError> {
            if self.fail_at == FailAt::Content {
                return Err(ScrapeError::Content("target closed".into()));
            }
            Ok(self.html.clone())
        }

        async fn close(self: Box<Self>) -> Result<(), ScrapeError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
