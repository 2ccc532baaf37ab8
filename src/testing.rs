//! Scripted stand-ins for the browser, the site, the store and the
//! per-target processor.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::browser::{DocumentClient, PageSession};
use crate::config::SiteConfig;
use crate::db::ResultStore;
use crate::error::ScrapeError;
use crate::models::{Candidate, ExtractionResult, Target, NOT_FOUND};
use crate::scheduler::TargetProcessor;
use crate::site::Site;

pub fn site_config() -> SiteConfig {
    SiteConfig::from_json(
        r##"{
            "name": "example",
            "target_url": "https://example.com/people/",
            "search_input_locator": "#search",
            "no_results_locator": ".empty",
            "candidate_locators": [".card"],
            "field_container_locator": ".education",
            "element_timeout_ms": 10,
            "settle_delay_ms": 0,
            "retry_cooldown_ms": 0,
            "pacing_min_ms": 0,
            "pacing_max_ms": 0
        }"##,
    )
    .unwrap()
}

fn timeout(selector: &str) -> ScrapeError {
    ScrapeError::Timeout {
        selector: selector.to_string(),
        timeout: Duration::from_millis(10),
    }
}

// ============================================================================
// Page
// ============================================================================

#[derive(Default)]
pub struct FakePage {
    texts: HashMap<String, String>,
    elements: HashMap<String, Vec<String>>,
    present: HashSet<String>,
    html: String,
    fail_document: bool,
    calls: Mutex<Vec<String>>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, selector: &str, text: &str) -> Self {
        self.texts.insert(selector.to_string(), text.to_string());
        self
    }

    pub fn with_elements(mut self, selector: &str, texts: &[&str]) -> Self {
        self.elements.insert(
            selector.to_string(),
            texts.iter().map(|t| t.to_string()).collect(),
        );
        self
    }

    pub fn with_present(mut self, selectors: &[&str]) -> Self {
        self.present
            .extend(selectors.iter().map(|s| s.to_string()));
        self
    }

    pub fn with_html(mut self, html: &str) -> Self {
        self.html = html.to_string();
        self
    }

    pub fn failing_document(mut self) -> Self {
        self.fail_document = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn has(&self, selector: &str) -> bool {
        self.present.contains(selector)
            || self.texts.contains_key(selector)
            || self.elements.contains_key(selector)
    }
}

#[async_trait]
impl PageSession for FakePage {
    async fn navigate(&self, url: &str, _timeout: Duration) -> Result<(), ScrapeError> {
        self.record(format!("navigate {}", url));
        Ok(())
    }

    async fn wait_for(&self, selector: &str, _timeout: Duration) -> Result<(), ScrapeError> {
        self.record(format!("wait {}", selector));
        if self.has(selector) {
            Ok(())
        } else {
            Err(timeout(selector))
        }
    }

    async fn type_into(&self, selector: &str, text: &str) -> Result<(), ScrapeError> {
        self.record(format!("type {} {}", selector, text));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<(), ScrapeError> {
        self.record(format!("key {}", key));
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<(), ScrapeError> {
        self.record(format!("click {}", selector));
        Ok(())
    }

    async fn element_texts(
        &self,
        selector: &str,
        _label: Option<&str>,
    ) -> Result<Vec<String>, ScrapeError> {
        Ok(self.elements.get(selector).cloned().unwrap_or_default())
    }

    async fn click_nth(
        &self,
        selector: &str,
        index: usize,
        inner: Option<&str>,
    ) -> Result<(), ScrapeError> {
        match inner {
            Some(inner) => {
                self.record(format!("click_nth {} {} > {}", selector, index, inner));
                if !self.present.contains(inner) {
                    return Err(ScrapeError::Page(format!(
                        "no descendant `{}` under `{}`",
                        inner, selector
                    )));
                }
            }
            None => self.record(format!("click_nth {} {}", selector, index)),
        }
        Ok(())
    }

    async fn text_of(&self, selector: &str) -> Result<Option<String>, ScrapeError> {
        Ok(self.texts.get(selector).cloned())
    }

    async fn document_html(&self) -> Result<String, ScrapeError> {
        if self.fail_document {
            return Err(ScrapeError::Page("target closed".into()));
        }
        Ok(self.html.clone())
    }

    async fn capture_snapshot(&self, path: &Path) -> Result<(), ScrapeError> {
        self.record(format!("snapshot {}", path.display()));
        Ok(())
    }

    async fn close(&self) -> Result<(), ScrapeError> {
        self.record("close".to_string());
        Ok(())
    }
}

// ============================================================================
// Client
// ============================================================================

pub struct FakeClient {
    open_calls: AtomicUsize,
    opened: AtomicUsize,
    closed: std::sync::Arc<AtomicUsize>,
    fail_open: bool,
    fail_close: bool,
}

impl FakeClient {
    pub fn new() -> Self {
        Self {
            open_calls: AtomicUsize::new(0),
            opened: AtomicUsize::new(0),
            closed: std::sync::Arc::new(AtomicUsize::new(0)),
            fail_open: false,
            fail_close: false,
        }
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

struct CountingPage {
    inner: FakePage,
    closed: std::sync::Arc<AtomicUsize>,
    fail_close: bool,
}

#[async_trait]
impl PageSession for CountingPage {
    async fn navigate(&self, url: &str, t: Duration) -> Result<(), ScrapeError> {
        self.inner.navigate(url, t).await
    }
    async fn wait_for(&self, selector: &str, t: Duration) -> Result<(), ScrapeError> {
        self.inner.wait_for(selector, t).await
    }
    async fn type_into(&self, selector: &str, text: &str) -> Result<(), ScrapeError> {
        self.inner.type_into(selector, text).await
    }
    async fn press_key(&self, key: &str) -> Result<(), ScrapeError> {
        self.inner.press_key(key).await
    }
    async fn click(&self, selector: &str) -> Result<(), ScrapeError> {
        self.inner.click(selector).await
    }
    async fn element_texts(
        &self,
        selector: &str,
        label: Option<&str>,
    ) -> Result<Vec<String>, ScrapeError> {
        self.inner.element_texts(selector, label).await
    }
    async fn click_nth(
        &self,
        selector: &str,
        index: usize,
        inner: Option<&str>,
    ) -> Result<(), ScrapeError> {
        self.inner.click_nth(selector, index, inner).await
    }
    async fn text_of(&self, selector: &str) -> Result<Option<String>, ScrapeError> {
        self.inner.text_of(selector).await
    }
    async fn document_html(&self) -> Result<String, ScrapeError> {
        self.inner.document_html().await
    }
    async fn capture_snapshot(&self, path: &Path) -> Result<(), ScrapeError> {
        self.inner.capture_snapshot(path).await
    }
    async fn close(&self) -> Result<(), ScrapeError> {
        self.closed.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(ScrapeError::Resource("tab already gone".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentClient for FakeClient {
    async fn open_page(&self) -> Result<Box<dyn PageSession>, ScrapeError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_open {
            return Err(ScrapeError::Page("browser connection lost".into()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CountingPage {
            inner: FakePage::new(),
            closed: self.closed.clone(),
            fail_close: self.fail_close,
        }))
    }
}

// ============================================================================
// Site
// ============================================================================

/// What the fake site does when a given term is searched.
pub enum TermScript {
    NoResults,
    /// Result list never shows up.
    NoList,
    Candidates(Vec<&'static str>),
    /// Lists the candidates, but none of them can be opened.
    Unclickable(Vec<&'static str>),
    /// The search box times out.
    Fail,
    /// The search page cannot be loaded at all.
    Unreachable,
    /// Times out the first time, then behaves like the inner script.
    FailOnce(Box<TermScript>),
}

#[derive(Default)]
pub struct FakeSite {
    scripts: HashMap<String, TermScript>,
    fields: HashMap<String, Option<String>>,
    headers: Vec<String>,
    searched: Mutex<Vec<String>>,
    failed_once: Mutex<HashSet<String>>,
    opened: Mutex<Vec<String>>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self {
            headers: vec!["Education".to_string()],
            ..Self::default()
        }
    }

    pub fn script(mut self, term: &str, script: TermScript) -> Self {
        self.scripts.insert(term.to_string(), script);
        self
    }

    /// Field container text behind a candidate's profile; `None` means the
    /// container never appears.
    pub fn field(mut self, candidate: &str, text: Option<&str>) -> Self {
        self.fields
            .insert(candidate.to_string(), text.map(str::to_string));
        self
    }

    pub fn searched(&self) -> Vec<String> {
        self.searched.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    fn current_script(&self) -> Option<&TermScript> {
        let term = self.searched.lock().unwrap().last().cloned()?;
        match self.scripts.get(&term)? {
            TermScript::FailOnce(inner) => Some(inner.as_ref()),
            other => Some(other),
        }
    }
}

#[async_trait]
impl Site for FakeSite {
    async fn search(&self, _page: &dyn PageSession, term: &str) -> Result<(), ScrapeError> {
        self.searched.lock().unwrap().push(term.to_string());
        match self.scripts.get(term) {
            Some(TermScript::Fail) => Err(timeout("#search")),
            Some(TermScript::Unreachable) => Err(ScrapeError::Navigation {
                url: "https://example.com/people/".into(),
                reason: "net::ERR_NAME_NOT_RESOLVED".into(),
            }),
            Some(TermScript::FailOnce(_)) => {
                if self.failed_once.lock().unwrap().insert(term.to_string()) {
                    Err(timeout("#search"))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    async fn has_no_results(&self, _page: &dyn PageSession) -> Result<bool, ScrapeError> {
        Ok(matches!(self.current_script(), None | Some(TermScript::NoResults)))
    }

    async fn candidates(
        &self,
        _page: &dyn PageSession,
    ) -> Result<Option<Vec<Candidate>>, ScrapeError> {
        Ok(match self.current_script() {
            Some(TermScript::Candidates(names)) | Some(TermScript::Unclickable(names)) => Some(
                names
                    .iter()
                    .enumerate()
                    .map(|(index, name)| Candidate {
                        display_name: name.to_string(),
                        locator: ".card".to_string(),
                        index,
                    })
                    .collect(),
            ),
            _ => None,
        })
    }

    async fn open_candidate(
        &self,
        _page: &dyn PageSession,
        candidate: &Candidate,
    ) -> Result<(), ScrapeError> {
        if let Some(TermScript::Unclickable(_)) = self.current_script() {
            return Err(ScrapeError::Page(format!(
                "candidate {} of `{}` vanished (0 present)",
                candidate.index, candidate.locator
            )));
        }
        self.opened
            .lock()
            .unwrap()
            .push(candidate.display_name.clone());
        Ok(())
    }

    async fn field_text(&self, _page: &dyn PageSession) -> Result<Option<String>, ScrapeError> {
        let last = self.opened.lock().unwrap().last().cloned();
        Ok(last.and_then(|name| self.fields.get(&name).cloned().flatten()))
    }

    fn header_phrases(&self) -> &[String] {
        &self.headers
    }
}

// ============================================================================
// Store
// ============================================================================

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<String, String>>,
    failing: HashSet<String>,
    attempts: Mutex<HashMap<String, usize>>,
    unreadable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, key: &str) -> Self {
        self.failing.insert(key.to_string());
        self
    }

    pub fn unreadable(mut self) -> Self {
        self.unreadable = true;
        self
    }

    pub fn insert(&self, result: ExtractionResult) {
        self.rows
            .lock()
            .unwrap()
            .insert(result.target_key, result.field_value);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.rows.lock().unwrap().get(key).cloned()
    }

    pub fn snapshot(&self) -> HashMap<String, String> {
        self.rows.lock().unwrap().clone()
    }

    pub fn upsert_attempts(&self, key: &str) -> usize {
        self.attempts.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn resolved_keys(&self) -> Result<HashSet<String>, ScrapeError> {
        if self.unreadable {
            return Err(ScrapeError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "store offline",
            )));
        }
        Ok(self.rows.lock().unwrap().keys().cloned().collect())
    }

    async fn upsert(&self, result: &ExtractionResult) -> Result<(), ScrapeError> {
        *self
            .attempts
            .lock()
            .unwrap()
            .entry(result.target_key.clone())
            .or_default() += 1;
        if self.failing.contains(&result.target_key) {
            return Err(ScrapeError::Persistence {
                target: result.target_key.clone(),
                reason: "write rejected".into(),
            });
        }
        self.insert(result.clone());
        Ok(())
    }
}

// ============================================================================
// Processor
// ============================================================================

pub struct FakeProcessor {
    value: String,
    missing: HashSet<String>,
    seen: Mutex<Vec<String>>,
}

impl FakeProcessor {
    pub fn found_for_all(value: &str) -> Self {
        Self {
            value: value.to_string(),
            missing: HashSet::new(),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn not_found_for(mut self, name: &str) -> Self {
        self.missing.insert(name.to_string());
        self
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl TargetProcessor for FakeProcessor {
    async fn process(&self, target: &Target) -> ExtractionResult {
        self.seen.lock().unwrap().push(target.name.clone());
        if self.missing.contains(&target.name) {
            ExtractionResult::new(target.name.clone(), NOT_FOUND)
        } else {
            ExtractionResult::new(target.name.clone(), self.value.clone())
        }
    }
}
