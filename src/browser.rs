use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page::CaptureScreenshotFormatOption;
use headless_chrome::{Browser, LaunchOptions, Tab};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ScrapeError;

static USER_AGENTS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
        "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
    ]
});

// ============================================================================
// Document client capability
// ============================================================================

/// A rendering-capable browser shared for the whole run. Hands out one
/// short-lived page per target attempt.
#[async_trait]
pub trait DocumentClient: Send + Sync {
    async fn open_page(&self) -> Result<Box<dyn PageSession>, ScrapeError>;
}

/// One page (tab). Every wait takes an explicit bound; a missed wait comes
/// back as `ScrapeError::Timeout`.
#[async_trait]
pub trait PageSession: Send + Sync {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError>;

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), ScrapeError>;

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), ScrapeError>;

    async fn press_key(&self, key: &str) -> Result<(), ScrapeError>;

    async fn click(&self, selector: &str) -> Result<(), ScrapeError>;

    /// Visible text of every element matching `selector`. With `label`, the
    /// text of the first matching descendant of each element is used instead
    /// (falling back to the element's own text).
    async fn element_texts(
        &self,
        selector: &str,
        label: Option<&str>,
    ) -> Result<Vec<String>, ScrapeError>;

    /// Clicks the `index`-th element matching `selector`, or its first
    /// descendant matching `inner` when given.
    async fn click_nth(
        &self,
        selector: &str,
        index: usize,
        inner: Option<&str>,
    ) -> Result<(), ScrapeError>;

    /// Visible text of the first element matching `selector`, if any.
    async fn text_of(&self, selector: &str) -> Result<Option<String>, ScrapeError>;

    async fn document_html(&self) -> Result<String, ScrapeError>;

    async fn capture_snapshot(&self, path: &Path) -> Result<(), ScrapeError>;

    async fn close(&self) -> Result<(), ScrapeError>;
}

// ============================================================================
// headless_chrome implementation
// ============================================================================

const STEALTH_SCRIPT: &str = r#"
    Object.defineProperty(navigator, 'webdriver', { get: () => undefined });
    Object.defineProperty(navigator, 'hardwareConcurrency', { get: () => 4 });
    window.chrome = { runtime: {}, loadTimes: function() {}, csi: function() {}, app: {} };
"#;

pub struct ChromeDriver {
    browser: Browser,
}

impl ChromeDriver {
    pub fn launch(headless: bool) -> Result<Self, ScrapeError> {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36");
        debug!(user_agent, "launching browser");

        let ua_arg = format!("--user-agent={}", user_agent);
        let args = vec![
            OsStr::new("--disable-blink-features=AutomationControlled"),
            OsStr::new("--no-sandbox"),
            OsStr::new("--disable-setuid-sandbox"),
            OsStr::new("--disable-dev-shm-usage"),
            OsStr::new("--disable-infobars"),
            OsStr::new(&ua_arg),
        ];

        let browser = Browser::new(LaunchOptions {
            headless,
            window_size: Some((1920, 1080)),
            args,
            // Pacing plus retries can leave the browser idle for a while.
            idle_browser_timeout: Duration::from_secs(300),
            ..Default::default()
        })
        .map_err(|e| ScrapeError::Page(format!("failed to launch browser: {}", e)))?;

        info!(headless, "browser launched");
        Ok(Self { browser })
    }
}

#[async_trait]
impl DocumentClient for ChromeDriver {
    async fn open_page(&self) -> Result<Box<dyn PageSession>, ScrapeError> {
        let tab = self.browser.new_tab().map_err(ScrapeError::page)?;
        tab.call_method(headless_chrome::protocol::cdp::Page::AddScriptToEvaluateOnNewDocument {
            source: STEALTH_SCRIPT.to_string(),
            world_name: None,
            include_command_line_api: None,
            run_immediately: None,
        })
        .map_err(ScrapeError::page)?;
        Ok(Box::new(ChromePage::new(tab)))
    }
}

pub struct ChromePage {
    tab: Arc<Tab>,
    closed: AtomicBool,
}

impl ChromePage {
    fn new(tab: Arc<Tab>) -> Self {
        Self {
            tab,
            closed: AtomicBool::new(false),
        }
    }

    fn timeout(selector: &str, timeout: Duration) -> ScrapeError {
        ScrapeError::Timeout {
            selector: selector.to_string(),
            timeout,
        }
    }
}

#[async_trait]
impl PageSession for ChromePage {
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<(), ScrapeError> {
        self.tab.set_default_timeout(timeout);
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| ScrapeError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<(), ScrapeError> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, timeout)
            .map(|_| ())
            .map_err(|_| Self::timeout(selector, timeout))
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), ScrapeError> {
        let element = self.tab.find_element(selector).map_err(ScrapeError::page)?;
        element.click().map_err(ScrapeError::page)?;
        self.tab.type_str(text).map_err(ScrapeError::page)?;
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), ScrapeError> {
        self.tab.press_key(key).map_err(ScrapeError::page)?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), ScrapeError> {
        let element = self.tab.find_element(selector).map_err(ScrapeError::page)?;
        element.click().map_err(ScrapeError::page)?;
        Ok(())
    }

    async fn element_texts(
        &self,
        selector: &str,
        label: Option<&str>,
    ) -> Result<Vec<String>, ScrapeError> {
        let elements = self.tab.find_elements(selector).map_err(ScrapeError::page)?;
        let mut texts = Vec::with_capacity(elements.len());
        for element in &elements {
            let labelled = label.and_then(|inner| {
                element
                    .find_element(inner)
                    .and_then(|e| e.get_inner_text())
                    .ok()
            });
            let text = match labelled {
                Some(text) => text,
                None => element.get_inner_text().unwrap_or_default(),
            };
            texts.push(text);
        }
        Ok(texts)
    }

    async fn click_nth(
        &self,
        selector: &str,
        index: usize,
        inner: Option<&str>,
    ) -> Result<(), ScrapeError> {
        let elements = self.tab.find_elements(selector).map_err(ScrapeError::page)?;
        let element = elements.get(index).ok_or_else(|| {
            ScrapeError::Page(format!(
                "candidate {} of `{}` vanished ({} present)",
                index,
                selector,
                elements.len()
            ))
        })?;
        match inner {
            Some(inner) => {
                let target = element.find_element(inner).map_err(ScrapeError::page)?;
                target.click().map_err(ScrapeError::page)?;
            }
            None => {
                element.click().map_err(ScrapeError::page)?;
            }
        }
        Ok(())
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>, ScrapeError> {
        match self.tab.find_element(selector) {
            Ok(element) => Ok(Some(element.get_inner_text().map_err(ScrapeError::page)?)),
            Err(_) => Ok(None),
        }
    }

    async fn document_html(&self) -> Result<String, ScrapeError> {
        self.tab.get_content().map_err(ScrapeError::page)
    }

    async fn capture_snapshot(&self, path: &Path) -> Result<(), ScrapeError> {
        let png = self
            .tab
            .capture_screenshot(CaptureScreenshotFormatOption::Png, None, None, true)
            .map_err(ScrapeError::page)?;
        std::fs::write(path, png)?;
        Ok(())
    }

    async fn close(&self) -> Result<(), ScrapeError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.tab
            .close(false)
            .map(|_| ())
            .map_err(|e| ScrapeError::Resource(e.to_string()))
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            if let Err(e) = self.tab.close(false) {
                warn!(error = %e, "failed to close page on drop");
            }
        }
    }
}
