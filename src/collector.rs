//! Annotation collection
//!
//! Lists every object under the annotations prefix, downloads the non-empty
//! ones and flattens their `labels` lists into a single sequence.

use crate::schema::{AnnotationRecord, LabelTuple};
use crate::{Error, Result};

use futures::TryStreamExt;
use metrics::counter;
use object_store::path::Path;
use object_store::{ObjectMeta, ObjectStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Handling of annotation objects that are not valid annotation JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MalformedPolicy {
    /// Abort the run with [`Error::MalformedAnnotation`]
    #[default]
    Fail,
    /// Log a warning and continue with the next object
    Skip,
}

impl std::str::FromStr for MalformedPolicy {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            other => Err(format!(
                "unknown malformed policy '{}'; expected fail or skip",
                other
            )),
        }
    }
}

/// Labels gathered from the annotation prefix.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    /// Flattened labels, in object key order then in-object order
    pub labels: Vec<LabelTuple>,
    /// Objects downloaded and parsed
    pub objects_read: usize,
    /// Zero-byte entries ignored (directory placeholders)
    pub objects_empty: usize,
    /// Objects skipped under [`MalformedPolicy::Skip`]
    pub objects_malformed: usize,
}

impl Collection {
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Downloads and merges annotation objects
pub struct Collector {
    object_store: Arc<dyn ObjectStore>,
    prefix: String,
    malformed_policy: MalformedPolicy,
    staging_dir: Option<PathBuf>,
}

impl Collector {
    /// Create a new collector
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        prefix: impl Into<String>,
        malformed_policy: MalformedPolicy,
    ) -> Self {
        Self {
            object_store,
            prefix: prefix.into(),
            malformed_policy,
            staging_dir: None,
        }
    }

    /// Also write every downloaded object to `dir`, named by its basename.
    pub fn with_staging_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.staging_dir = dir;
        self
    }

    /// Gather all label tuples under the prefix.
    ///
    /// Listing and download failures abort the collection. Objects are read in
    /// key order so that later stages see a deterministic label sequence.
    pub async fn collect(&self) -> Result<Collection> {
        info!(prefix = %self.prefix, "Listing annotation objects");

        let prefix = Path::from(self.prefix.as_str());
        let mut objects: Vec<ObjectMeta> = self
            .object_store
            .list(Some(&prefix))
            .try_collect()
            .await?;
        objects.sort_by(|a, b| a.location.cmp(&b.location));

        if let Some(dir) = &self.staging_dir {
            tokio::fs::create_dir_all(dir).await?;
        }

        let mut collection = Collection::default();
        for meta in objects {
            if meta.size == 0 {
                debug!(key = %meta.location, "Skipping zero-byte object");
                collection.objects_empty += 1;
                continue;
            }

            let record = match self.read_record(&meta.location).await? {
                Some(record) => record,
                None => {
                    collection.objects_malformed += 1;
                    continue;
                }
            };

            debug!(
                key = %meta.location,
                labels = record.labels.len(),
                "Read annotation object"
            );
            collection.objects_read += 1;
            collection.labels.extend(record.labels);
        }

        counter!("dataset_manifest_annotation_objects_total", "status" => "read")
            .increment(collection.objects_read as u64);
        counter!("dataset_manifest_annotation_objects_total", "status" => "empty")
            .increment(collection.objects_empty as u64);
        counter!("dataset_manifest_annotation_objects_total", "status" => "malformed")
            .increment(collection.objects_malformed as u64);
        counter!("dataset_manifest_labels_collected_total")
            .increment(collection.labels.len() as u64);

        info!(
            objects = collection.objects_read,
            empty = collection.objects_empty,
            malformed = collection.objects_malformed,
            labels = collection.labels.len(),
            "Annotation collection complete"
        );

        Ok(collection)
    }

    /// Download and parse one object. `None` means it was malformed and skipped.
    async fn read_record(&self, location: &Path) -> Result<Option<AnnotationRecord>> {
        let bytes = self.object_store.get(location).await?.bytes().await?;

        if let Some(dir) = &self.staging_dir {
            let name = location.filename().unwrap_or("annotation.json");
            tokio::fs::write(dir.join(name), &bytes).await?;
        }

        match serde_json::from_slice::<AnnotationRecord>(&bytes) {
            Ok(record) => Ok(Some(record)),
            Err(e) => match self.malformed_policy {
                MalformedPolicy::Fail => Err(Error::MalformedAnnotation {
                    key: location.to_string(),
                    reason: e.to_string(),
                }),
                MalformedPolicy::Skip => {
                    warn!(key = %location, error = %e, "Skipping malformed annotation object");
                    Ok(None)
                }
            },
        }
    }
}
