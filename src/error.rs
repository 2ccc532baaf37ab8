use std::time::Duration;
use thiserror::Error;

/// Faults raised while driving a directory site.
///
/// Expected misses (no results, no matching candidate, missing field
/// container) are not errors; they are ordinary outcomes of the strategy
/// chain. Everything here is a fault that either gets retried or ends the
/// target (or, for `Config`, the run).
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("timed out after {timeout:?} waiting for `{selector}`")]
    Timeout { selector: String, timeout: Duration },

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("unexpected page state: {0}")]
    Page(String),

    #[error("failed to release page: {0}")]
    Resource(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to persist result for '{target}': {reason}")]
    Persistence { target: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// What the retry controller should do with a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Retry,
    Abort,
}

impl ScrapeError {
    pub fn page(err: impl std::fmt::Display) -> Self {
        ScrapeError::Page(err.to_string())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ScrapeError::Timeout { .. })
    }

    /// Classification for a whole target attempt. Page and navigation
    /// trouble is transient; configuration problems never get better by
    /// trying again.
    pub fn disposition(&self) -> Disposition {
        match self {
            ScrapeError::Timeout { .. }
            | ScrapeError::Navigation { .. }
            | ScrapeError::Page(_)
            | ScrapeError::Resource(_)
            | ScrapeError::Io(_) => Disposition::Retry,
            ScrapeError::Config(_) => Disposition::Abort,
            ScrapeError::Persistence { .. } | ScrapeError::Database(_) => Disposition::Retry,
        }
    }
}
