use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::ScrapeError;

fn default_no_results_phrase() -> String {
    "no results".to_string()
}
fn default_header_phrases() -> Vec<String> {
    vec!["Education".to_string()]
}
fn default_batch_size() -> usize {
    10
}
fn default_retry_count() -> u32 {
    2
}
fn default_debug_path() -> PathBuf {
    PathBuf::from("./debug")
}
fn default_navigation_timeout_ms() -> u64 {
    30_000
}
fn default_element_timeout_ms() -> u64 {
    15_000
}
fn default_settle_delay_ms() -> u64 {
    3_000
}
fn default_retry_cooldown_ms() -> u64 {
    3_000
}
fn default_pacing_min_ms() -> u64 {
    1_000
}
fn default_pacing_max_ms() -> u64 {
    2_000
}
fn default_true() -> bool {
    true
}

/// Everything that differs between directory sites. Loaded once, never
/// mutated afterwards.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    pub target_url: String,
    /// Some sites only reveal the search box after a menu entry is clicked.
    #[serde(default)]
    pub menu_locator: Option<String>,
    pub search_input_locator: String,
    pub no_results_locator: String,
    #[serde(default = "default_no_results_phrase")]
    pub no_results_phrase: String,
    /// Tried in order; the first locator present on the page defines the result set.
    pub candidate_locators: Vec<CandidateLocator>,
    /// Inner locator holding a card's displayed name.
    #[serde(default)]
    pub candidate_name_locator: Option<String>,
    /// Inner locator to click for plain `candidate_locators` entries; the
    /// card itself when absent.
    #[serde(default)]
    pub candidate_click_locator: Option<String>,
    pub field_container_locator: String,
    #[serde(default = "default_header_phrases")]
    pub header_phrases: Vec<String>,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[serde(default = "default_debug_path")]
    pub debug_path: PathBuf,
    #[serde(default = "default_true")]
    pub capture_debug: bool,

    #[serde(default = "default_navigation_timeout_ms")]
    pub navigation_timeout_ms: u64,
    #[serde(default = "default_element_timeout_ms")]
    pub element_timeout_ms: u64,
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    #[serde(default = "default_retry_cooldown_ms")]
    pub retry_cooldown_ms: u64,
    #[serde(default = "default_pacing_min_ms")]
    pub pacing_min_ms: u64,
    #[serde(default = "default_pacing_max_ms")]
    pub pacing_max_ms: u64,
}

/// One way of finding result cards. A bare string uses the site-wide
/// `candidate_click_locator`; the object form names its own click target,
/// with no `click` meaning the card itself.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum CandidateLocator {
    Plain(String),
    Explicit {
        locator: String,
        #[serde(default)]
        click: Option<String>,
    },
}

impl CandidateLocator {
    pub fn locator(&self) -> &str {
        match self {
            CandidateLocator::Plain(locator) => locator,
            CandidateLocator::Explicit { locator, .. } => locator,
        }
    }

    /// Inner locator to click, given the site-wide default.
    pub fn click<'a>(&'a self, default: Option<&'a str>) -> Option<&'a str> {
        match self {
            CandidateLocator::Plain(_) => default,
            CandidateLocator::Explicit { click, .. } => click.as_deref(),
        }
    }
}

impl From<&str> for CandidateLocator {
    fn from(locator: &str) -> Self {
        CandidateLocator::Plain(locator.to_string())
    }
}

impl SiteConfig {
    pub fn from_json(raw: &str) -> Result<Self, ScrapeError> {
        let config: SiteConfig = serde_json::from_str(raw)
            .map_err(|e| ScrapeError::Config(format!("invalid site config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ScrapeError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ScrapeError::Config(format!("cannot read site config {}: {}", path.display(), e))
        })?;
        Self::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), ScrapeError> {
        let required = [
            ("target_url", &self.target_url),
            ("search_input_locator", &self.search_input_locator),
            ("no_results_locator", &self.no_results_locator),
            ("field_container_locator", &self.field_container_locator),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ScrapeError::Config(format!("`{}` must not be empty", field)));
            }
        }
        if self
            .candidate_locators
            .iter()
            .all(|l| l.locator().trim().is_empty())
        {
            return Err(ScrapeError::Config(
                "`candidate_locators` needs at least one locator".into(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ScrapeError::Config("`batch_size` must be at least 1".into()));
        }
        if self.retry_count == 0 {
            return Err(ScrapeError::Config("`retry_count` must be at least 1".into()));
        }
        if self.pacing_min_ms > self.pacing_max_ms {
            return Err(ScrapeError::Config(format!(
                "pacing range is inverted ({}ms > {}ms)",
                self.pacing_min_ms, self.pacing_max_ms
            )));
        }
        Ok(())
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn element_timeout(&self) -> Duration {
        Duration::from_millis(self.element_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn retry_cooldown(&self) -> Duration {
        Duration::from_millis(self.retry_cooldown_ms)
    }

    /// Click target for cards found by `locator`.
    pub fn click_locator_for(&self, locator: &str) -> Option<&str> {
        let default = self.candidate_click_locator.as_deref();
        match self
            .candidate_locators
            .iter()
            .find(|l| l.locator() == locator)
        {
            Some(entry) => entry.click(default),
            None => default,
        }
    }
}

/// Where the names come from.
#[derive(Debug, Clone)]
pub enum TargetSource {
    File(PathBuf),
    Table,
}

/// Process-level settings read from the environment (after `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub site: SiteConfig,
    pub targets: TargetSource,
    pub headless: bool,
    pub port: u16,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ScrapeError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup so tests don't have to
    /// touch the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ScrapeError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ScrapeError::Config("DATABASE_URL must be set".into()))?;
        let site_path = lookup("SITE_CONFIG")
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| ScrapeError::Config("SITE_CONFIG must be set".into()))?;

        let mut site = SiteConfig::load(Path::new(&site_path))?;
        if let Some(path) = lookup("DEBUG_PATH") {
            site.debug_path = PathBuf::from(path);
        }
        if let Some(raw) = lookup("BATCH_SIZE") {
            site.batch_size = parse_number("BATCH_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("RETRY_COUNT") {
            site.retry_count = parse_number("RETRY_COUNT", &raw)?;
        }
        site.validate()?;

        let targets = match lookup("TARGETS_FILE") {
            Some(path) if !path.trim().is_empty() => TargetSource::File(PathBuf::from(path)),
            _ => TargetSource::Table,
        };
        let headless = lookup("HEADLESS")
            .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no"))
            .unwrap_or(true);
        let port = match lookup("PORT") {
            Some(raw) => parse_number("PORT", &raw)?,
            None => 3000,
        };

        Ok(Self {
            database_url,
            site,
            targets,
            headless,
            port,
        })
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ScrapeError> {
    raw.trim()
        .parse()
        .map_err(|_| ScrapeError::Config(format!("{} is not a valid number: {:?}", key, raw)))
}
