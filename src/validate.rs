//! Image existence validation
//!
//! Every manifest row names an image object at `{images_prefix}{item_id}`.
//! The validator issues one existence probe (HEAD) per row and partitions the
//! rows into three buckets:
//!
//! - **found**: the row is kept in the published manifest
//! - **missing**: the store reported "not found"; the id goes to the missing log
//! - **unresolved**: any other failure, after retries; the row is excluded from
//!   both the manifest and the missing log and reported separately
//!
//! Probes run with bounded concurrency but results are consumed in row order,
//! so the partition never depends on completion order.

use crate::reshape::Manifest;

use futures::stream::{self, StreamExt};
use metrics::counter;
use object_store::path::Path;
use object_store::ObjectStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Base backoff duration in milliseconds between probe retries
const BASE_BACKOFF_MS: u64 = 100;

/// Upper bound on a single retry delay
const MAX_BACKOFF_MS: u64 = 5_000;

/// Rows between progress log lines
const PROGRESS_INTERVAL: usize = 500;

/// Result of probing a single image object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    Found,
    Missing,
    /// The store failed with something other than "not found"
    Unresolved(String),
}

impl ProbeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeOutcome::Found => "found",
            ProbeOutcome::Missing => "missing",
            ProbeOutcome::Unresolved(_) => "unresolved",
        }
    }
}

/// A row whose image could not be classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedProbe {
    pub item_id: String,
    pub error: String,
}

/// Partition of a manifest by image existence.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    /// Rows whose image exists, in manifest order
    pub valid: Manifest,
    /// Item ids whose image was not found, in manifest order
    pub missing: Vec<String>,
    /// Rows that could not be classified, in manifest order
    pub unresolved: Vec<UnresolvedProbe>,
}

/// Probes image objects for manifest rows
pub struct Validator {
    object_store: Arc<dyn ObjectStore>,
    images_prefix: String,
    concurrency: usize,
    retries: u32,
}

impl Validator {
    /// Create a new validator issuing at most `concurrency` probes at once.
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        images_prefix: impl Into<String>,
        concurrency: usize,
        retries: u32,
    ) -> Self {
        Self {
            object_store,
            images_prefix: images_prefix.into(),
            concurrency: concurrency.max(1),
            retries,
        }
    }

    /// Object key of the image for `item_id`.
    pub fn image_path(&self, item_id: &str) -> Path {
        Path::from(format!("{}{}", self.images_prefix, item_id))
    }

    /// Probe one image, retrying failures other than "not found".
    pub async fn probe(&self, item_id: &str) -> ProbeOutcome {
        let path = self.image_path(item_id);
        let mut attempt = 0;
        loop {
            match self.object_store.head(&path).await {
                Ok(_) => return ProbeOutcome::Found,
                Err(object_store::Error::NotFound { .. }) => return ProbeOutcome::Missing,
                Err(e) if attempt < self.retries => {
                    let backoff_ms = backoff_ms(attempt);
                    debug!(
                        item_id,
                        attempt = attempt + 1,
                        backoff_ms,
                        error = %e,
                        "Existence probe failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    attempt += 1;
                }
                Err(e) => {
                    warn!(item_id, error = %e, "Unexpected error probing image");
                    return ProbeOutcome::Unresolved(e.to_string());
                }
            }
        }
    }

    /// Probe every row of `manifest` and partition the rows.
    pub async fn validate(&self, manifest: &Manifest) -> ValidationReport {
        let total = manifest.len();
        info!(
            rows = total,
            concurrency = self.concurrency,
            "Starting data quality check"
        );

        let mut outcomes = Vec::with_capacity(total);
        let mut probes = stream::iter(manifest.rows())
            .map(|row| self.probe(&row.item_id))
            .buffered(self.concurrency);
        while let Some(outcome) = probes.next().await {
            counter!("dataset_manifest_probes_total", "outcome" => outcome.as_str()).increment(1);
            outcomes.push(outcome);
            if outcomes.len() % PROGRESS_INTERVAL == 0 {
                debug!(done = outcomes.len(), total, "Verifying images");
            }
        }

        let report = partition(manifest, outcomes);
        info!(
            valid = report.valid.len(),
            missing = report.missing.len(),
            unresolved = report.unresolved.len(),
            "Data quality check complete"
        );
        report
    }
}

/// Exponential delay before retry `attempt + 1`, capped at [`MAX_BACKOFF_MS`].
fn backoff_ms(attempt: u32) -> u64 {
    BASE_BACKOFF_MS
        .saturating_mul(2_u64.saturating_pow(attempt))
        .min(MAX_BACKOFF_MS)
}

/// Split `manifest` according to per-row `outcomes` (same order and length).
pub fn partition(manifest: &Manifest, outcomes: Vec<ProbeOutcome>) -> ValidationReport {
    let mut keep = Vec::with_capacity(outcomes.len());
    let mut missing = Vec::new();
    let mut unresolved = Vec::new();

    for (row, outcome) in manifest.rows().iter().zip(outcomes) {
        keep.push(outcome == ProbeOutcome::Found);
        match outcome {
            ProbeOutcome::Found => {}
            ProbeOutcome::Missing => missing.push(row.item_id.clone()),
            ProbeOutcome::Unresolved(error) => unresolved.push(UnresolvedProbe {
                item_id: row.item_id.clone(),
                error,
            }),
        }
    }

    ValidationReport {
        valid: manifest.filter(&keep),
        missing,
        unresolved,
    }
}
