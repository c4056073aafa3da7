//! Long-to-wide reshaping of label tuples
//!
//! Labels arrive one fact per tuple. The reshaper groups them by
//! `(item_id, filename)` and spreads the keys into columns, producing one
//! manifest row per image.

use crate::schema::{render_value, LabelTuple, FILENAME_COLUMN, ITEM_ID_COLUMN};
use crate::Result;

use arrow_array::{ArrayRef, RecordBatch, StringArray};
use arrow_schema::{DataType, Field, Schema};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{info, warn};

/// One row of the wide manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestRow {
    pub item_id: String,
    pub filename: String,
    /// Label key -> rendered value. Keys absent here are empty cells.
    pub values: BTreeMap<String, Option<String>>,
}

impl ManifestRow {
    /// Cell for `key`, `None` when the item has no value for it.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_deref())
    }
}

/// Wide manifest table.
///
/// Rows are sorted by `(item_id, filename)`; label columns are sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    key_columns: Vec<String>,
    rows: Vec<ManifestRow>,
}

impl Manifest {
    /// Build a manifest from already-grouped rows.
    pub fn new(key_columns: Vec<String>, rows: Vec<ManifestRow>) -> Self {
        Self { key_columns, rows }
    }

    /// Label key columns, without the fixed item id and filename columns.
    pub fn key_columns(&self) -> &[String] {
        &self.key_columns
    }

    /// Full header: item id, filename, then every label key.
    pub fn columns(&self) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.key_columns.len() + 2);
        columns.push(ITEM_ID_COLUMN.to_string());
        columns.push(FILENAME_COLUMN.to_string());
        columns.extend(self.key_columns.iter().cloned());
        columns
    }

    pub fn rows(&self) -> &[ManifestRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Same columns, restricted to the rows selected by `keep`.
    pub fn filter(&self, keep: &[bool]) -> Manifest {
        let rows = self
            .rows
            .iter()
            .zip(keep)
            .filter(|(_, keep)| **keep)
            .map(|(row, _)| row.clone())
            .collect();
        Manifest {
            key_columns: self.key_columns.clone(),
            rows,
        }
    }

    /// Arrow schema: every column is a Utf8 string, label columns nullable.
    pub fn schema(&self) -> Schema {
        let mut fields = vec![
            Field::new(ITEM_ID_COLUMN, DataType::Utf8, false),
            Field::new(FILENAME_COLUMN, DataType::Utf8, false),
        ];
        fields.extend(
            self.key_columns
                .iter()
                .map(|key| Field::new(key, DataType::Utf8, true)),
        );
        Schema::new(fields)
    }

    /// Convert to a single Arrow record batch for encoding.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(self.key_columns.len() + 2);
        columns.push(Arc::new(StringArray::from_iter_values(
            self.rows.iter().map(|r| r.item_id.as_str()),
        )));
        columns.push(Arc::new(StringArray::from_iter_values(
            self.rows.iter().map(|r| r.filename.as_str()),
        )));
        for key in &self.key_columns {
            columns.push(Arc::new(
                self.rows.iter().map(|r| r.get(key)).collect::<StringArray>(),
            ));
        }

        Ok(RecordBatch::try_new(Arc::new(self.schema()), columns)?)
    }
}

/// Pivots label tuples into a [`Manifest`].
#[derive(Debug, Default)]
pub struct Reshaper;

impl Reshaper {
    pub fn new() -> Self {
        Self
    }

    /// Pivot `labels` into one row per distinct `(item_id, filename)`.
    ///
    /// When the same `(item_id, filename, key)` occurs more than once, the
    /// last occurrence in input order wins. Keys that would shadow the fixed
    /// `item_id`/`filename` columns are dropped, but their row is still emitted.
    pub fn reshape(&self, labels: &[LabelTuple]) -> Manifest {
        let mut groups: BTreeMap<(String, String), BTreeMap<String, Option<String>>> =
            BTreeMap::new();
        let mut keys = BTreeSet::new();
        let mut overwritten = 0usize;
        let mut reserved = 0usize;

        for label in labels {
            let row = groups
                .entry((label.item_id.clone(), label.filename.clone()))
                .or_default();
            if label.key == ITEM_ID_COLUMN || label.key == FILENAME_COLUMN {
                reserved += 1;
                continue;
            }
            if row
                .insert(label.key.clone(), render_value(&label.value))
                .is_some()
            {
                overwritten += 1;
            }
            keys.insert(label.key.clone());
        }

        if reserved > 0 {
            warn!(
                dropped = reserved,
                "Dropped labels whose key collides with a fixed manifest column"
            );
        }
        if overwritten > 0 {
            warn!(
                overwritten,
                "Duplicate labels for the same item and key; last value kept"
            );
        }

        let rows: Vec<ManifestRow> = groups
            .into_iter()
            .map(|((item_id, filename), values)| ManifestRow {
                item_id,
                filename,
                values,
            })
            .collect();
        let manifest = Manifest::new(keys.into_iter().collect(), rows);

        info!(
            rows = manifest.len(),
            columns = ?manifest.columns(),
            "Reshaping complete"
        );
        manifest
    }
}
