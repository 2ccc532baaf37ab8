use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::debug;

use crate::browser::PageSession;
use crate::config::SiteConfig;
use crate::error::ScrapeError;
use crate::models::Candidate;

/// The handful of things the engine needs from a directory site. Site
/// layouts differ only in how these are carried out.
#[async_trait]
pub trait Site: Send + Sync {
    /// Loads the search page and submits `term`.
    async fn search(&self, page: &dyn PageSession, term: &str) -> Result<(), ScrapeError>;

    /// True when the site explicitly reports an empty result set.
    async fn has_no_results(&self, page: &dyn PageSession) -> Result<bool, ScrapeError>;

    /// The current result set, or `None` when no result list ever appeared.
    async fn candidates(&self, page: &dyn PageSession)
        -> Result<Option<Vec<Candidate>>, ScrapeError>;

    async fn open_candidate(
        &self,
        page: &dyn PageSession,
        candidate: &Candidate,
    ) -> Result<(), ScrapeError>;

    /// Raw text of the field container, or `None` if it never appeared.
    async fn field_text(&self, page: &dyn PageSession) -> Result<Option<String>, ScrapeError>;

    fn header_phrases(&self) -> &[String];
}

/// A site described entirely by its `SiteConfig` locators.
pub struct ConfiguredSite {
    config: Arc<SiteConfig>,
}

impl ConfiguredSite {
    pub fn new(config: Arc<SiteConfig>) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Site for ConfiguredSite {
    async fn search(&self, page: &dyn PageSession, term: &str) -> Result<(), ScrapeError> {
        let cfg = &self.config;
        page.navigate(&cfg.target_url, cfg.navigation_timeout()).await?;

        if let Some(menu) = &cfg.menu_locator {
            page.wait_for(menu, cfg.element_timeout()).await?;
            page.click(menu).await?;
            debug!(menu = %menu, "clicked menu item");
        }

        page.wait_for(&cfg.search_input_locator, cfg.element_timeout())
            .await?;
        page.type_into(&cfg.search_input_locator, term).await?;
        page.press_key("Enter").await?;
        debug!(term, "search submitted");

        sleep(cfg.settle_delay()).await;
        Ok(())
    }

    async fn has_no_results(&self, page: &dyn PageSession) -> Result<bool, ScrapeError> {
        let phrase = self.config.no_results_phrase.to_lowercase();
        let text = page.text_of(&self.config.no_results_locator).await?;
        Ok(text.map_or(false, |t| t.to_lowercase().contains(&phrase)))
    }

    async fn candidates(
        &self,
        page: &dyn PageSession,
    ) -> Result<Option<Vec<Candidate>>, ScrapeError> {
        let cfg = &self.config;
        let locators = cfg
            .candidate_locators
            .iter()
            .map(|l| l.locator())
            .filter(|l| !l.trim().is_empty());
        for locator in locators {
            match page.wait_for(locator, cfg.element_timeout()).await {
                Ok(()) => {}
                Err(e) if e.is_timeout() => {
                    debug!(locator = %locator, "candidate locator not present");
                    continue;
                }
                Err(e) => return Err(e),
            }

            let names = page
                .element_texts(locator, cfg.candidate_name_locator.as_deref())
                .await?;
            let candidates = names
                .into_iter()
                .enumerate()
                .map(|(index, name)| Candidate {
                    display_name: name.trim().to_string(),
                    locator: locator.to_string(),
                    index,
                })
                .collect();
            return Ok(Some(candidates));
        }
        Ok(None)
    }

    async fn open_candidate(
        &self,
        page: &dyn PageSession,
        candidate: &Candidate,
    ) -> Result<(), ScrapeError> {
        page.click_nth(
            &candidate.locator,
            candidate.index,
            self.config.click_locator_for(&candidate.locator),
        )
        .await?;
        sleep(self.config.settle_delay()).await;
        Ok(())
    }

    async fn field_text(&self, page: &dyn PageSession) -> Result<Option<String>, ScrapeError> {
        let cfg = &self.config;
        match page
            .wait_for(&cfg.field_container_locator, cfg.element_timeout())
            .await
        {
            Ok(()) => page.text_of(&cfg.field_container_locator).await,
            Err(e) if e.is_timeout() => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn header_phrases(&self) -> &[String] {
        &self.config.header_phrases
    }
}
