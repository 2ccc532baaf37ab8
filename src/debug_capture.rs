use once_cell::sync::Lazy;
use regex::Regex;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::browser::PageSession;
use crate::error::ScrapeError;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Why a search term did not produce a confirmed profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureTag {
    NoResults,
    NoCandidates,
    NoMatch,
    NoFieldContainer,
    NavigationFailure,
    SearchInputFailure,
    CandidateFailure,
    FieldFailure,
}

impl FailureTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureTag::NoResults => "no-results",
            FailureTag::NoCandidates => "no-candidates",
            FailureTag::NoMatch => "no-match",
            FailureTag::NoFieldContainer => "no-field-container",
            FailureTag::NavigationFailure => "navigation-failure",
            FailureTag::SearchInputFailure => "search-input-failure",
            FailureTag::CandidateFailure => "candidate-failure",
            FailureTag::FieldFailure => "field-failure",
        }
    }
}

/// Writes an HTML dump and a screenshot for failed search terms.
/// Never fails the caller.
#[derive(Debug, Clone)]
pub struct DebugCapturer {
    dir: PathBuf,
    enabled: bool,
}

impl DebugCapturer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        match std::fs::create_dir_all(&dir) {
            Ok(()) => info!(dir = %dir.display(), "debug folder ready"),
            Err(e) => warn!(dir = %dir.display(), error = %e, "could not create debug folder"),
        }
        Self { dir, enabled: true }
    }

    pub fn disabled() -> Self {
        Self {
            dir: PathBuf::new(),
            enabled: false,
        }
    }

    /// `{target}_{term}_{tag}` with whitespace turned into `_` and anything
    /// else unsafe percent-encoded.
    pub fn artifact_stem(target: &str, term: &str, tag: FailureTag) -> String {
        format!("{}_{}_{}", safe_part(target), safe_part(term), tag.as_str())
    }

    pub async fn capture(&self, page: &dyn PageSession, target: &str, term: &str, tag: FailureTag) {
        if !self.enabled {
            return;
        }
        let stem = Self::artifact_stem(target, term, tag);
        if let Err(e) = self.write_artifacts(page, &stem).await {
            warn!(target = %target, term = %term, tag = tag.as_str(), error = %e, "debug capture failed");
        }
    }

    async fn write_artifacts(&self, page: &dyn PageSession, stem: &str) -> Result<(), ScrapeError> {
        let html_path = self.dir.join(format!("{}.html", stem));
        let html = page.document_html().await?;
        tokio::fs::write(&html_path, html).await?;
        info!(path = %html_path.display(), "saved debug HTML");

        let png_path = self.dir.join(format!("{}.png", stem));
        page.capture_snapshot(&png_path).await?;
        info!(path = %png_path.display(), "saved debug screenshot");
        Ok(())
    }
}

fn safe_part(raw: &str) -> String {
    let underscored = WHITESPACE.replace_all(raw.trim(), "_");
    urlencoding::encode(&underscored).into_owned()
}
