//! Artifact publishing
//!
//! Writes the validated manifest and the missing/unresolved logs to a local
//! output directory and uploads each one under the destination prefix.

use crate::reshape::Manifest;
use crate::validate::{UnresolvedProbe, ValidationReport};
use crate::Result;

use arrow::csv::WriterBuilder;
use bytes::Bytes;
use metrics::counter;
use object_store::path::Path;
use object_store::ObjectStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File name of the published manifest
pub const MANIFEST_FILE: &str = "annotations.csv";

/// File name of the missing image log
pub const MISSING_FILE: &str = "missing_files.log";

/// File name of the unresolved probe log
pub const UNRESOLVED_FILE: &str = "unresolved_files.log";

/// What a publish wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSummary {
    /// Remote key of the manifest
    pub manifest_key: String,
    /// Rows in the published manifest
    pub manifest_rows: usize,
    /// Remote key of the missing log, when one was written
    pub missing_key: Option<String>,
    pub missing_count: usize,
    /// Remote key of the unresolved log, when one was written
    pub unresolved_key: Option<String>,
    pub unresolved_count: usize,
}

/// Writes pipeline artifacts locally and to the object store
pub struct Publisher {
    object_store: Arc<dyn ObjectStore>,
    destination_prefix: String,
    output_dir: PathBuf,
}

impl Publisher {
    /// Create a new publisher
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        destination_prefix: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            object_store,
            destination_prefix: destination_prefix.into(),
            output_dir: output_dir.into(),
        }
    }

    /// Remote key for an artifact named `name`.
    pub fn destination_key(&self, name: &str) -> String {
        format!("{}{}", self.destination_prefix, name)
    }

    /// Publish the outcome of a validation.
    ///
    /// The logs are only written when they have entries, and a log left by an
    /// earlier run is removed otherwise. The manifest is always written, with
    /// just a header when no row survived.
    pub async fn publish(&self, report: &ValidationReport) -> Result<PublishSummary> {
        tokio::fs::create_dir_all(&self.output_dir).await?;

        let missing_key = if report.missing.is_empty() {
            self.clear_artifact(MISSING_FILE).await?;
            None
        } else {
            warn!(
                count = report.missing.len(),
                "Found missing image files"
            );
            Some(
                self.write_artifact(MISSING_FILE, render_missing(&report.missing))
                    .await?,
            )
        };

        let unresolved_key = if report.unresolved.is_empty() {
            self.clear_artifact(UNRESOLVED_FILE).await?;
            None
        } else {
            warn!(
                count = report.unresolved.len(),
                "Some images could not be verified"
            );
            Some(
                self.write_artifact(UNRESOLVED_FILE, render_unresolved(&report.unresolved))
                    .await?,
            )
        };

        let manifest_key = self
            .write_artifact(MANIFEST_FILE, encode_csv(&report.valid)?)
            .await?;

        info!(
            manifest_key = %manifest_key,
            rows = report.valid.len(),
            "Final manifest published"
        );

        Ok(PublishSummary {
            manifest_key,
            manifest_rows: report.valid.len(),
            missing_key,
            missing_count: report.missing.len(),
            unresolved_key,
            unresolved_count: report.unresolved.len(),
        })
    }

    /// Remove a previously published artifact, locally and remotely.
    async fn clear_artifact(&self, name: &str) -> Result<()> {
        let local_path = self.output_dir.join(name);
        match tokio::fs::remove_file(&local_path).await {
            Ok(()) => debug!(local = %local_path.display(), "Removed stale artifact"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let key = self.destination_key(name);
        match self.object_store.delete(&Path::from(key.as_str())).await {
            Ok(()) | Err(object_store::Error::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Write `contents` to the output directory, then upload it. Returns the remote key.
    async fn write_artifact(&self, name: &str, contents: Vec<u8>) -> Result<String> {
        let local_path = self.output_dir.join(name);
        tokio::fs::write(&local_path, &contents).await?;

        let key = self.destination_key(name);
        self.object_store
            .put(&Path::from(key.as_str()), Bytes::from(contents).into())
            .await?;

        counter!("dataset_manifest_artifacts_written_total", "artifact" => name.to_string())
            .increment(1);
        info!(
            local = %local_path.display(),
            key = %key,
            "Uploaded artifact"
        );
        Ok(key)
    }
}

/// Encode `manifest` as CSV with a header row. Empty cells stay empty.
pub fn encode_csv(manifest: &Manifest) -> Result<Vec<u8>> {
    let batch = manifest.to_record_batch()?;
    let mut buffer = Vec::new();
    {
        let mut writer = WriterBuilder::new().with_header(true).build(&mut buffer);
        writer.write(&batch)?;
    }
    Ok(buffer)
}

/// One item id per line.
pub fn render_missing(ids: &[String]) -> Vec<u8> {
    let mut out = String::new();
    for id in ids {
        out.push_str(id);
        out.push('\n');
    }
    out.into_bytes()
}

/// `item_id<TAB>error` per line, with the error flattened to one line.
pub fn render_unresolved(probes: &[UnresolvedProbe]) -> Vec<u8> {
    let mut out = String::new();
    for probe in probes {
        out.push_str(&probe.item_id);
        out.push('\t');
        out.push_str(&probe.error.replace(['\n', '\r'], " "));
        out.push('\n');
    }
    out.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reshape::Reshaper;
    use crate::schema::LabelTuple;
    use object_store::memory::InMemory;
    use tempfile::tempdir;

    fn scenario_manifest() -> Manifest {
        Reshaper::new().reshape(&[
            LabelTuple::new("abc123", "a.jpg", "label", "cat"),
            LabelTuple::new("abc123", "a.jpg", "confidence", "0.9"),
            LabelTuple::new("def456", "b.jpg", "label", "dog"),
        ])
    }

    async fn read_remote(store: &InMemory, key: &str) -> String {
        let bytes = store
            .get(&Path::from(key))
            .await
            .unwrap()
            .bytes()
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn csv_has_header_and_empty_cells() {
        let csv = String::from_utf8(encode_csv(&scenario_manifest()).unwrap()).unwrap();
        assert_eq!(
            csv,
            "item_id,filename,confidence,label\nabc123,a.jpg,0.9,cat\ndef456,b.jpg,,dog\n"
        );
    }

    #[test]
    fn csv_quotes_values_with_commas() {
        let manifest = Reshaper::new().reshape(&[LabelTuple::new(
            "x",
            "x.jpg",
            "caption",
            "a cat, sleeping",
        )]);
        let csv = String::from_utf8(encode_csv(&manifest).unwrap()).unwrap();
        assert_eq!(csv, "item_id,filename,caption\nx,x.jpg,\"a cat, sleeping\"\n");
    }

    #[test]
    fn empty_manifest_still_has_header() {
        let manifest = scenario_manifest().filter(&[false, false]);
        let csv = String::from_utf8(encode_csv(&manifest).unwrap()).unwrap();
        assert_eq!(csv, "item_id,filename,confidence,label\n");
    }

    #[test]
    fn unresolved_log_is_one_line_per_probe() {
        let rendered = render_unresolved(&[UnresolvedProbe {
            item_id: "b".to_string(),
            error: "denied\nby policy".to_string(),
        }]);
        assert_eq!(String::from_utf8(rendered).unwrap(), "b\tdenied by policy\n");
    }

    #[tokio::test]
    async fn publishes_manifest_and_missing_log() {
        let store = Arc::new(InMemory::new());
        let dir = tempdir().unwrap();
        let publisher = Publisher::new(store.clone(), "datasets/v1/", dir.path());

        let manifest = scenario_manifest();
        let report = ValidationReport {
            valid: manifest.filter(&[true, false]),
            missing: vec!["def456".to_string()],
            unresolved: Vec::new(),
        };

        let summary = publisher.publish(&report).await.unwrap();

        assert_eq!(summary.manifest_key, "datasets/v1/annotations.csv");
        assert_eq!(summary.manifest_rows, 1);
        assert_eq!(summary.missing_key.as_deref(), Some("datasets/v1/missing_files.log"));
        assert_eq!(summary.unresolved_key, None);

        assert_eq!(read_remote(&store, "datasets/v1/missing_files.log").await, "def456\n");
        assert_eq!(
            read_remote(&store, "datasets/v1/annotations.csv").await,
            "item_id,filename,confidence,label\nabc123,a.jpg,0.9,cat\n"
        );

        let local = std::fs::read_to_string(dir.path().join(MISSING_FILE)).unwrap();
        assert_eq!(local, "def456\n");
        assert!(dir.path().join(MANIFEST_FILE).exists());
        assert!(!dir.path().join(UNRESOLVED_FILE).exists());
    }

    #[tokio::test]
    async fn stale_logs_are_removed_when_buckets_are_empty() {
        let store = Arc::new(InMemory::new());
        let dir = tempdir().unwrap();
        let publisher = Publisher::new(store.clone(), "datasets/v1/", dir.path());

        let first = ValidationReport {
            valid: scenario_manifest().filter(&[false, false]),
            missing: vec!["def456".to_string()],
            unresolved: vec![UnresolvedProbe {
                item_id: "abc123".to_string(),
                error: "throttled".to_string(),
            }],
        };
        publisher.publish(&first).await.unwrap();
        assert!(dir.path().join(MISSING_FILE).exists());
        assert!(dir.path().join(UNRESOLVED_FILE).exists());

        let second = ValidationReport {
            valid: scenario_manifest(),
            missing: Vec::new(),
            unresolved: Vec::new(),
        };
        let summary = publisher.publish(&second).await.unwrap();

        assert_eq!(summary.missing_key, None);
        assert_eq!(summary.unresolved_key, None);
        assert!(!dir.path().join(MISSING_FILE).exists());
        assert!(!dir.path().join(UNRESOLVED_FILE).exists());
        assert!(store
            .head(&Path::from("datasets/v1/missing_files.log"))
            .await
            .is_err());
        assert!(store
            .head(&Path::from("datasets/v1/unresolved_files.log"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn no_missing_log_when_everything_exists() {
        let store = Arc::new(InMemory::new());
        let dir = tempdir().unwrap();
        let publisher = Publisher::new(store.clone(), "datasets/v1/", dir.path());

        let report = ValidationReport {
            valid: scenario_manifest(),
            missing: Vec::new(),
            unresolved: Vec::new(),
        };
        let summary = publisher.publish(&report).await.unwrap();

        assert_eq!(summary.missing_key, None);
        assert!(store
            .head(&Path::from("datasets/v1/missing_files.log"))
            .await
            .is_err());
        assert!(!dir.path().join(MISSING_FILE).exists());
    }
}
