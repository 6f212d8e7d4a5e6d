//! Batch processing with failure isolation and a single retry pass.
//!
//! Every pipeline stage is a [`StageProcessor`] driven by [`run_stage`]: items
//! are processed once in input order, items that failed are processed once
//! more in their original order, and the resulting [`StageReport`] decides
//! the stage's exit status.

use async_trait::async_trait;
use log::{error, info, warn};
use std::fmt::Display;

use crate::output::BatchProgress;

/// Result of processing one work item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Nothing to do for this item; counts as success and is never retried
    Skipped(String),
    Failed(String),
}

#[async_trait]
pub trait StageProcessor: Send + Sync {
    type Item: Clone + Display + Send + Sync;

    /// Stage name used in logs and summaries (e.g., "Clone")
    fn name(&self) -> &'static str;

    /// Processes a single item. Item-local errors must be turned into
    /// [`Outcome::Failed`] rather than propagated.
    async fn process(&self, item: &Self::Item) -> Outcome;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedItem<T> {
    pub item: T,
    pub cause: String,
}

/// Final state of a stage run after the retry pass.
#[derive(Debug, Clone)]
pub struct StageReport<T> {
    pub stage: &'static str,
    /// First-pass successes in input order, followed by items that succeeded on retry
    pub succeeded: Vec<T>,
    /// How many of `succeeded` were skips
    pub skipped: usize,
    /// Items that failed both attempts, in input order
    pub failed: Vec<FailedItem<T>>,
    /// Attempts made per input position
    pub attempts: Vec<u8>,
}

impl<T> StageReport<T> {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.attempts.len()
    }
}

impl<T: Display> StageReport<T> {
    /// Logs the end-of-stage summary line(s).
    pub fn log_summary(&self) {
        info!(
            "{} stage completed: {} successful ({} skipped), {} failed",
            self.stage,
            self.succeeded.len(),
            self.skipped,
            self.failed.len()
        );

        if self.failed.is_empty() {
            info!("All {} items processed successfully", self.total());
        } else {
            let names: Vec<String> = self.failed.iter().map(|f| f.item.to_string()).collect();
            warn!("{} stage failed for: {}", self.stage, names.join(", "));
        }
    }
}

/// Runs `processor` over `items` with exactly one retry pass for failures.
pub async fn run_stage<P>(processor: &P, items: Vec<P::Item>) -> StageReport<P::Item>
where
    P: StageProcessor + ?Sized,
{
    let stage = processor.name();
    let progress = BatchProgress::start(stage, items.len());

    let mut attempts = vec![0u8; items.len()];
    let mut causes: Vec<Option<String>> = vec![None; items.len()];
    let mut succeeded = Vec::new();
    let mut skipped = 0;
    let mut retry_queue = Vec::new();

    for (index, item) in items.iter().enumerate() {
        progress.set_item(item);
        attempts[index] += 1;

        match processor.process(item).await {
            Outcome::Success => succeeded.push(item.clone()),
            Outcome::Skipped(reason) => {
                info!("Skipping {item}: {reason}");
                skipped += 1;
                succeeded.push(item.clone());
            }
            Outcome::Failed(cause) => {
                error!("{stage} failed for {item}: {cause}");
                causes[index] = Some(cause);
                retry_queue.push(index);
            }
        }

        progress.inc();
    }

    if !retry_queue.is_empty() {
        info!("Retrying {} failed items", retry_queue.len());
        progress.start_retry(retry_queue.len());

        for index in retry_queue {
            let item = &items[index];
            info!("Retrying {item}");
            progress.set_item(item);
            attempts[index] += 1;

            match processor.process(item).await {
                Outcome::Success => {
                    causes[index] = None;
                    succeeded.push(item.clone());
                }
                Outcome::Skipped(reason) => {
                    info!("Skipping {item}: {reason}");
                    causes[index] = None;
                    skipped += 1;
                    succeeded.push(item.clone());
                }
                Outcome::Failed(cause) => {
                    error!("{stage} failed again for {item}: {cause}");
                    causes[index] = Some(cause);
                }
            }

            progress.inc();
        }
    }

    progress.finish();

    let failed = items
        .into_iter()
        .zip(causes)
        .filter_map(|(item, cause)| cause.map(|cause| FailedItem { item, cause }))
        .collect();

    StageReport {
        stage,
        succeeded,
        skipped,
        failed,
        attempts,
    }
}
