use tracing::{debug, info};

use crate::browser::PageSession;
use crate::error::ScrapeError;
use crate::models::{Candidate, Target, Tier};
use crate::site::Site;

/// Picks the candidate to open from one result set.
///
/// A lone result under a narrowed (non full-name) search is accepted as is.
/// Otherwise the first two tokens of the target name must each occur inside
/// some token of the candidate's displayed name, in any order.
pub fn select_candidate<'a>(
    candidates: &'a [Candidate],
    target: &Target,
    tier: Tier,
) -> Option<&'a Candidate> {
    if candidates.len() == 1 && tier != Tier::FullName {
        return candidates.first();
    }

    let wanted = match_tokens(target);
    if wanted.is_empty() {
        return None;
    }
    candidates.iter().find(|candidate| {
        let matched = name_matches(&wanted, &candidate.display_name);
        if !matched {
            debug!(target = %target.name, candidate = %candidate.display_name, "candidate rejected");
        }
        matched
    })
}

/// Lower-cased first two name tokens, or the only one.
fn match_tokens(target: &Target) -> Vec<String> {
    target
        .tokens()
        .into_iter()
        .take(2)
        .map(str::to_lowercase)
        .collect()
}

fn name_matches(wanted: &[String], display_name: &str) -> bool {
    let display = display_name.to_lowercase();
    let words: Vec<&str> = display.split_whitespace().collect();
    wanted
        .iter()
        .all(|token| words.iter().any(|word| word.contains(token.as_str())))
}

/// Selects a candidate and navigates to it. `None` means no candidate in the
/// set is an acceptable match.
pub async fn resolve(
    site: &dyn Site,
    page: &dyn PageSession,
    candidates: &[Candidate],
    target: &Target,
    tier: Tier,
) -> Result<Option<Candidate>, ScrapeError> {
    let Some(chosen) = select_candidate(candidates, target, tier) else {
        return Ok(None);
    };
    site.open_candidate(page, chosen).await?;
    info!(
        target = %target.name,
        candidate = %chosen.display_name,
        tier = tier.as_str(),
        of = candidates.len(),
        "opened candidate profile"
    );
    Ok(Some(chosen.clone()))
}
