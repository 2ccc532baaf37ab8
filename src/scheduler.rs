use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{error, info};

use crate::db::ResultStore;
use crate::error::ScrapeError;
use crate::models::{ExtractionResult, Target};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;

/// Turns one target into its final result. Never fails: faults degrade to
/// the sentinel inside the implementation.
#[async_trait]
pub trait TargetProcessor: Send + Sync {
    async fn process(&self, target: &Target) -> ExtractionResult;
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub total: usize,
    pub already_resolved: usize,
    pub processed: usize,
    pub found: usize,
    pub not_found: usize,
    pub persistence_failures: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunReport {
    fn start(total: usize, already_resolved: usize) -> Self {
        Self {
            total,
            already_resolved,
            processed: 0,
            found: 0,
            not_found: 0,
            persistence_failures: 0,
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Targets not yet present in the store, in source order.
pub fn pending(targets: &[Target], resolved: &HashSet<String>) -> Vec<Target> {
    targets
        .iter()
        .filter(|t| !resolved.contains(t.key()))
        .cloned()
        .collect()
}

pub struct BatchScheduler {
    batch_size: usize,
    persist_retry: RetryPolicy,
}

impl BatchScheduler {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
            persist_retry: RetryPolicy::new(3, Duration::from_secs(2)),
        }
    }

    #[cfg(test)]
    pub fn with_persist_retry(mut self, policy: RetryPolicy) -> Self {
        self.persist_retry = policy;
        self
    }

    /// Processes every target the store hasn't seen yet, one at a time,
    /// writing each result before moving on. Safe to re-run after a partial
    /// run. Only failure to read the store up front is an error.
    pub async fn run(
        &self,
        targets: &[Target],
        store: &dyn ResultStore,
        processor: &dyn TargetProcessor,
        pacer: &mut RateLimiter,
    ) -> Result<RunReport, ScrapeError> {
        let resolved = store.resolved_keys().await?;
        let todo = pending(targets, &resolved);
        let mut report = RunReport::start(targets.len(), targets.len() - todo.len());

        info!(
            total = targets.len(),
            resolved = report.already_resolved,
            pending = todo.len(),
            "computed pending targets"
        );
        if todo.is_empty() {
            info!("all targets have already been processed");
            report.finished_at = Some(Utc::now());
            return Ok(report);
        }

        let batch_count = todo.len().div_ceil(self.batch_size);
        let mut remaining = todo.len();
        for (batch_index, batch) in todo.chunks(self.batch_size).enumerate() {
            info!(batch = batch_index + 1, of = batch_count, size = batch.len(), "processing batch");

            for target in batch {
                info!(target = %target.name, "scraping target");
                let result = processor.process(target).await;
                report.processed += 1;
                if result.is_found() {
                    report.found += 1;
                } else {
                    report.not_found += 1;
                }

                if self.persist(store, &result).await {
                    info!(target = %result.target_key, value = %result.field_value, "saved result");
                } else {
                    report.persistence_failures += 1;
                }

                remaining -= 1;
                if remaining > 0 {
                    pacer.pause().await;
                }
            }
        }

        report.finished_at = Some(Utc::now());
        info!(
            processed = report.processed,
            found = report.found,
            not_found = report.not_found,
            persistence_failures = report.persistence_failures,
            "run finished"
        );
        Ok(report)
    }

    async fn persist(&self, store: &dyn ResultStore, result: &ExtractionResult) -> bool {
        let outcome = self
            .persist_retry
            .run(
                &result.target_key,
                |_| store.upsert(result),
                ScrapeError::disposition,
            )
            .await;
        match outcome {
            Ok(()) => true,
            Err(e) => {
                error!(target = %result.target_key, error = %e, "failed to save result");
                false
            }
        }
    }
}
