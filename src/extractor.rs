use tracing::{debug, info};

use crate::browser::PageSession;
use crate::error::ScrapeError;
use crate::models::{Target, NOT_FOUND};
use crate::site::Site;

/// Reads the field from an opened profile page.
///
/// `Ok(None)` means the field container never appeared, which is a miss for
/// the current search term rather than a fault.
pub async fn extract(
    site: &dyn Site,
    page: &dyn PageSession,
    target: &Target,
) -> Result<Option<String>, ScrapeError> {
    let Some(raw) = site.field_text(page).await? else {
        debug!(target = %target.name, "field container did not appear");
        return Ok(None);
    };
    let value = normalize(&raw, site.header_phrases());
    info!(target = %target.name, value = %value, "field extracted");
    Ok(Some(value))
}

/// Drops blank lines and bare section headers, trims what is left.
/// Falls back to the sentinel when nothing survives.
pub fn normalize(raw: &str, header_phrases: &[String]) -> String {
    let kept: Vec<&str> = raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !is_header(line, header_phrases))
        .collect();

    if kept.is_empty() {
        NOT_FOUND.to_string()
    } else {
        kept.join("\n")
    }
}

fn is_header(line: &str, header_phrases: &[String]) -> bool {
    let line = line.trim_end_matches(':').trim();
    header_phrases
        .iter()
        .any(|phrase| phrase.trim().eq_ignore_ascii_case(line))
}
