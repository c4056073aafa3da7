//! Sequential pipeline: collect, reshape, validate, publish.

use crate::collector::Collector;
use crate::publish::{PublishSummary, Publisher};
use crate::reshape::Reshaper;
use crate::validate::Validator;
use crate::{PipelineConfig, Result};

use object_store::ObjectStore;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Counts and keys of a completed run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Label tuples collected from annotation objects
    pub labels: usize,
    /// Manifest rows before validation
    pub manifest_rows: usize,
    pub started_at: chrono::DateTime<chrono::Utc>,
    pub publish: PublishSummary,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// No labels under the annotations prefix; nothing was written
    NoLabels,
    /// Manifest and logs were published
    Published(RunSummary),
}

/// A configured pipeline bound to one object store
pub struct Pipeline {
    config: PipelineConfig,
    object_store: Arc<dyn ObjectStore>,
}

impl Pipeline {
    /// Create a pipeline, rejecting invalid configuration.
    pub fn new(config: PipelineConfig, object_store: Arc<dyn ObjectStore>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            object_store,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every stage once, in order.
    ///
    /// Store listing, download and upload failures abort the run.
    pub async fn run(&self) -> Result<RunOutcome> {
        let started_at = chrono::Utc::now();
        let start = Instant::now();

        let collector = Collector::new(
            Arc::clone(&self.object_store),
            self.config.annotations_prefix.clone(),
            self.config.malformed_policy,
        )
        .with_staging_dir(self.config.staging_dir.clone());
        let collection = collector.collect().await?;

        if collection.is_empty() {
            info!(prefix = %self.config.annotations_prefix, "No labels found, exiting");
            return Ok(RunOutcome::NoLabels);
        }

        let manifest = Reshaper::new().reshape(&collection.labels);

        let validator = Validator::new(
            Arc::clone(&self.object_store),
            self.config.images_prefix.clone(),
            self.config.probe_concurrency,
            self.config.probe_retries,
        );
        let report = validator.validate(&manifest).await;

        let publisher = Publisher::new(
            Arc::clone(&self.object_store),
            self.config.destination_prefix.clone(),
            self.config.output_dir.clone(),
        );
        let publish = publisher.publish(&report).await?;

        info!(
            labels = collection.labels.len(),
            rows = manifest.len(),
            valid = publish.manifest_rows,
            missing = publish.missing_count,
            unresolved = publish.unresolved_count,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pipeline complete"
        );

        Ok(RunOutcome::Published(RunSummary {
            labels: collection.labels.len(),
            manifest_rows: manifest.len(),
            started_at,
            publish,
        }))
    }
}
