use tracing::{info, warn};

use crate::browser::PageSession;
use crate::debug_capture::{DebugCapturer, FailureTag};
use crate::error::ScrapeError;
use crate::extractor;
use crate::matcher;
use crate::models::{SearchTerm, Target, Tier};
use crate::site::Site;

/// Search terms for a name, most specific first: the full name, its first
/// two tokens, its first token. Duplicates and empties are dropped.
pub fn derive_terms(name: &str) -> Vec<SearchTerm> {
    let tokens: Vec<&str> = name.split_whitespace().collect();
    if tokens.is_empty() {
        return Vec::new();
    }

    let mut attempts = vec![(tokens.join(" "), Tier::FullName)];
    if tokens.len() >= 2 {
        attempts.push((tokens[..2].join(" "), Tier::FirstTwo));
    }
    attempts.push((tokens[0].to_string(), Tier::FirstToken));

    let mut terms: Vec<SearchTerm> = Vec::with_capacity(attempts.len());
    for (text, tier) in attempts {
        if text.is_empty() || terms.iter().any(|t| t.text == text) {
            continue;
        }
        terms.push(SearchTerm { text, tier });
    }
    terms
}

/// How a full pass over the terms ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// A profile was confirmed. `value` is the sentinel when the container
    /// held nothing but headers.
    Found { value: String, term: SearchTerm },
    /// Every term was a miss.
    Exhausted,
}

enum TermOutcome {
    Miss(FailureTag),
    Value(String),
}

pub struct StrategyChain<'a> {
    site: &'a dyn Site,
    capturer: &'a DebugCapturer,
}

impl<'a> StrategyChain<'a> {
    pub fn new(site: &'a dyn Site, capturer: &'a DebugCapturer) -> Self {
        Self { site, capturer }
    }

    /// Tries each term in order until one yields a confirmed profile.
    /// Misses advance to the next term; faults propagate to the caller.
    pub async fn run(
        &self,
        page: &dyn PageSession,
        target: &Target,
    ) -> Result<Resolution, ScrapeError> {
        for term in derive_terms(&target.name) {
            info!(target = %target.name, term = %term.text, tier = term.tier.as_str(), "searching");

            match self.try_term(page, target, &term).await? {
                TermOutcome::Value(value) => return Ok(Resolution::Found { value, term }),
                TermOutcome::Miss(tag) => {
                    info!(
                        target = %target.name,
                        term = %term.text,
                        reason = tag.as_str(),
                        "search term missed"
                    );
                    self.capturer
                        .capture(page, &target.name, &term.text, tag)
                        .await;
                }
            }
        }

        info!(target = %target.name, "all search terms exhausted");
        Ok(Resolution::Exhausted)
    }

    async fn try_term(
        &self,
        page: &dyn PageSession,
        target: &Target,
        term: &SearchTerm,
    ) -> Result<TermOutcome, ScrapeError> {
        if let Err(e) = self.site.search(page, &term.text).await {
            let tag = match &e {
                ScrapeError::Navigation { .. } => FailureTag::NavigationFailure,
                _ => FailureTag::SearchInputFailure,
            };
            return Err(self.fault(page, target, term, tag, e).await);
        }

        match self.confirm_candidate(page, target, term).await {
            Ok(Some(tag)) => return Ok(TermOutcome::Miss(tag)),
            Ok(None) => {}
            Err(e) => {
                return Err(self
                    .fault(page, target, term, FailureTag::CandidateFailure, e)
                    .await)
            }
        }

        match extractor::extract(self.site, page, target).await {
            Ok(Some(value)) => Ok(TermOutcome::Value(value)),
            Ok(None) => Ok(TermOutcome::Miss(FailureTag::NoFieldContainer)),
            Err(e) => Err(self
                .fault(page, target, term, FailureTag::FieldFailure, e)
                .await),
        }
    }

    /// Opens the matching profile. `Some(tag)` when there was nothing to open.
    async fn confirm_candidate(
        &self,
        page: &dyn PageSession,
        target: &Target,
        term: &SearchTerm,
    ) -> Result<Option<FailureTag>, ScrapeError> {
        if self.site.has_no_results(page).await? {
            return Ok(Some(FailureTag::NoResults));
        }

        let candidates = match self.site.candidates(page).await? {
            Some(found) if !found.is_empty() => found,
            _ => return Ok(Some(FailureTag::NoCandidates)),
        };

        match matcher::resolve(self.site, page, &candidates, target, term.tier).await? {
            Some(_) => Ok(None),
            None => Ok(Some(FailureTag::NoMatch)),
        }
    }

    async fn fault(
        &self,
        page: &dyn PageSession,
        target: &Target,
        term: &SearchTerm,
        tag: FailureTag,
        error: ScrapeError,
    ) -> ScrapeError {
        warn!(
            target = %target.name,
            term = %term.text,
            reason = tag.as_str(),
            error = %error,
            "search term faulted"
        );
        self.capturer
            .capture(page, &target.name, &term.text, tag)
            .await;
        error
    }
}
