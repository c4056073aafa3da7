//! # dataset-manifest
//!
//! Builds a training-ready dataset manifest from label files scattered across
//! object storage.
//!
//! Annotation objects each carry a list of `(item_id, filename, key, value)`
//! label tuples. The pipeline merges them, pivots them into one row per data
//! item, and checks that every referenced image object exists before the
//! manifest is published back to the store.
//!
//! ## Architecture
//!
//! - **Collector**: lists and downloads annotation objects, flattens their labels
//! - **Reshaper**: pivots the long label sequence into a wide manifest table
//! - **Validator**: probes the store for each row's image, partitions rows
//! - **Publisher**: writes the CSV manifest and missing/unresolved logs
//!
//! The stages run strictly in sequence; see [`pipeline::Pipeline`].

pub mod collector;
pub mod config;
pub mod pipeline;
pub mod publish;
pub mod reshape;
pub mod schema;
pub mod telemetry;
pub mod validate;

mod error;

pub use error::{Error, Result};

use std::path::PathBuf;

/// Configuration for a single pipeline run.
///
/// Every component receives the parts it needs from here; nothing is read
/// from process-wide state once a `PipelineConfig` is built.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Object storage configuration
    pub storage: StorageConfig,
    /// Prefix holding the annotation JSON objects
    pub annotations_prefix: String,
    /// Prefix holding the image objects, keyed by item id
    pub images_prefix: String,
    /// Prefix the manifest and logs are uploaded under
    pub destination_prefix: String,
    /// Local directory the artifacts are written to before upload
    pub output_dir: PathBuf,
    /// Optional local directory receiving a copy of every downloaded annotation
    pub staging_dir: Option<PathBuf>,
    /// What to do with annotation objects that fail to parse
    pub malformed_policy: collector::MalformedPolicy,
    /// Maximum number of existence probes in flight
    pub probe_concurrency: usize,
    /// Extra attempts for probes failing with anything other than "not found"
    pub probe_retries: u32,
}

/// Largest accepted `probe_retries`
pub const MAX_PROBE_RETRIES: u32 = 10;

impl PipelineConfig {
    /// Check the values that cannot be expressed in the types.
    pub fn validate(&self) -> Result<()> {
        if self.probe_concurrency == 0 {
            return Err(Error::Config(
                "probe concurrency must be at least 1".to_string(),
            ));
        }
        if self.probe_retries > MAX_PROBE_RETRIES {
            return Err(Error::Config(format!(
                "probe retries must be at most {}, got {}",
                MAX_PROBE_RETRIES, self.probe_retries
            )));
        }
        if self.storage.provider == CloudProvider::Aws && self.storage.bucket.trim().is_empty() {
            return Err(Error::Config(
                "a bucket name is required for the aws provider".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            annotations_prefix: "dataset_annotations/".to_string(),
            images_prefix: "data_items/".to_string(),
            destination_prefix: "datasets/v1/".to_string(),
            output_dir: PathBuf::from("."),
            staging_dir: None,
            malformed_policy: collector::MalformedPolicy::Fail,
            probe_concurrency: 8,
            probe_retries: 1,
        }
    }
}

/// Object storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Backend holding annotations, images and published artifacts.
    pub provider: CloudProvider,
    /// Provider bucket name.
    pub bucket: String,
    /// Root directory for the `local` provider.
    pub local_root: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            provider: CloudProvider::Aws,
            bucket: "neuron-box-items-bucket".to_string(),
            local_root: None,
        }
    }
}

/// Supported object storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudProvider {
    Memory,
    Aws,
    Local,
}

impl CloudProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Aws => "aws",
            Self::Local => "local",
        }
    }

    pub fn object_store_scheme(&self) -> &'static str {
        match self {
            Self::Memory => "memory",
            Self::Aws => "s3",
            Self::Local => "file",
        }
    }
}

impl std::str::FromStr for CloudProvider {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "aws" | "s3" => Ok(Self::Aws),
            "local" | "file" => Ok(Self::Local),
            other => Err(format!(
                "unknown cloud provider '{}'; expected one of memory, aws, local",
                other
            )),
        }
    }
}

/// Re-exports for convenience
pub mod prelude {
    pub use crate::collector::{Collector, MalformedPolicy};
    pub use crate::pipeline::{Pipeline, RunOutcome};
    pub use crate::publish::{PublishSummary, Publisher};
    pub use crate::reshape::{Manifest, ManifestRow, Reshaper};
    pub use crate::schema::{AnnotationRecord, LabelTuple};
    pub use crate::validate::{ProbeOutcome, ValidationReport, Validator};
    pub use crate::{CloudProvider, Error, PipelineConfig, Result, StorageConfig};
}
