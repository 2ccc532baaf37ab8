use async_trait::async_trait;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::browser::DocumentClient;
use crate::debug_capture::DebugCapturer;
use crate::error::ScrapeError;
use crate::models::{ExtractionResult, Target, NOT_FOUND};
use crate::retry::RetryPolicy;
use crate::scheduler::TargetProcessor;
use crate::site::Site;
use crate::strategy::{Resolution, StrategyChain};

/// Per-target pipeline: page acquisition, strategy chain, retries.
pub struct Pipeline {
    client: Arc<dyn DocumentClient>,
    site: Arc<dyn Site>,
    capturer: DebugCapturer,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(
        client: Arc<dyn DocumentClient>,
        site: Arc<dyn Site>,
        capturer: DebugCapturer,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            client,
            site,
            capturer,
            retry,
        }
    }

    /// One full pass over the strategy chain on a fresh page. The page is
    /// released on every path out of here.
    async fn attempt(&self, target: &Target, attempt: u32) -> Result<Resolution, ScrapeError> {
        let page = self.client.open_page().await?;
        info!(target = %target.name, attempt, "page opened");

        let chain = StrategyChain::new(self.site.as_ref(), &self.capturer);
        let outcome = chain.run(page.as_ref(), target).await;

        if let Err(e) = page.close().await {
            warn!(target = %target.name, error = %e, "failed to close page");
        }
        outcome
    }
}

#[async_trait]
impl TargetProcessor for Pipeline {
    async fn process(&self, target: &Target) -> ExtractionResult {
        let outcome = self
            .retry
            .run(
                &target.name,
                |attempt| self.attempt(target, attempt),
                ScrapeError::disposition,
            )
            .await;

        let value = match outcome {
            Ok(Resolution::Found { value, term }) => {
                info!(target = %target.name, term = %term.text, "target resolved");
                value
            }
            Ok(Resolution::Exhausted) => {
                info!(target = %target.name, "no matching profile found");
                NOT_FOUND.to_string()
            }
            Err(e) => {
                error!(target = %target.name, error = %e, "giving up on target");
                NOT_FOUND.to_string()
            }
        };
        ExtractionResult::new(target.name.clone(), value)
    }
}
