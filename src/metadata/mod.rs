//! Entity metadata ingestion.
//!
//! Sources hand back loosely typed [`MetadataRow`]s; [`ingest`] is the single
//! boundary where they become validated [`EntitySpec`]s. Invalid rows are
//! collected as rejections and never stop the run.

mod document;
mod tabular;

pub use document::DocumentMetadataSource;
pub use tabular::CsvMetadataSource;

use crate::error::{CompileError, Rejection, SpecViolation};
use crate::model::EntitySpec;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Something that yields metadata rows in declaration order.
pub trait MetadataSource {
    /// Human-readable origin, for logs.
    fn describe(&self) -> String;

    fn rows(&self) -> Result<Vec<MetadataRow>>;
}

impl MetadataSource for Vec<MetadataRow> {
    fn describe(&self) -> String {
        format!("{} in-memory row(s)", self.len())
    }

    fn rows(&self) -> Result<Vec<MetadataRow>> {
        Ok(self.clone())
    }
}

/// A list-valued cell: either one string joined with the list separator
/// (CSV) or a native list (JSON, YAML, TOML).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ListCell {
    Joined(String),
    Items(Vec<String>),
}

impl Default for ListCell {
    fn default() -> Self {
        ListCell::Joined(String::new())
    }
}

impl ListCell {
    /// Trimmed, non-empty items in their original order.
    pub fn items(&self, separator: char) -> Vec<String> {
        let raw: Vec<&str> = match self {
            ListCell::Joined(joined) => joined.split(separator).collect(),
            ListCell::Items(items) => items.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// One unvalidated metadata row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
    #[serde(default, alias = "entity_name", alias = "name")]
    pub table_name: String,
    #[serde(default, alias = "entity_type", alias = "kind", alias = "type")]
    pub table_type: String,
    #[serde(default)]
    pub business_key: ListCell,
    #[serde(default, alias = "columns")]
    pub descriptive_fields: ListCell,
    #[serde(default)]
    pub source_table: String,
}

/// Result of ingesting a batch of rows.
#[derive(Debug, Default)]
pub struct Ingested {
    pub specs: Vec<EntitySpec>,
    /// 1-based metadata row of each entry in `specs`.
    pub spec_rows: Vec<usize>,
    pub rejections: Vec<Rejection>,
}

impl Ingested {
    /// Metadata row an accepted entity came from.
    pub fn row_of(&self, entity: &str) -> Option<usize> {
        self.specs
            .iter()
            .position(|spec| spec.name().as_str().eq_ignore_ascii_case(entity))
            .map(|index| self.spec_rows[index])
    }

    /// Drops the accepted spec at `index` and records it as rejected, keeping
    /// rejections in row order.
    pub fn reject(&mut self, index: usize, error: &CompileError) {
        let spec = self.specs.remove(index);
        let row = self.spec_rows.remove(index);
        warn!(row, entity = %spec.name(), error = %error, "entity rejected");
        self.rejections
            .push(Rejection::new(Some(row), spec.name().as_str(), error));
        self.rejections.sort_by_key(|rejection| rejection.row);
    }
}

/// Validates `rows` into specs.
///
/// Row numbers in rejections are 1-based positions in `rows`. A repeated
/// entity name rejects the later row and keeps the first.
pub fn ingest(rows: &[MetadataRow], separator: char) -> Ingested {
    let mut ingested = Ingested::default();
    let mut first_seen: HashMap<String, usize> = HashMap::new();

    for (index, row) in rows.iter().enumerate() {
        let row_number = index + 1;
        let entity = row.table_name.trim();

        match to_spec(row, separator) {
            Ok(spec) => {
                let key = spec.name().as_str().to_ascii_lowercase();
                if let Some(&first_row) = first_seen.get(&key) {
                    let error = spec.reject(SpecViolation::DuplicateEntity { first_row });
                    warn!(row = row_number, entity, error = %error, "metadata row rejected");
                    ingested
                        .rejections
                        .push(Rejection::new(Some(row_number), entity, &error));
                    continue;
                }
                first_seen.insert(key, row_number);
                debug!(row = row_number, entity, kind = %spec.kind(), "metadata row accepted");
                ingested.specs.push(spec);
                ingested.spec_rows.push(row_number);
            }
            Err(error) => {
                warn!(row = row_number, entity, error = %error, "metadata row rejected");
                ingested
                    .rejections
                    .push(Rejection::new(Some(row_number), entity, &error));
            }
        }
    }
    ingested
}

fn to_spec(row: &MetadataRow, separator: char) -> Result<EntitySpec, CompileError> {
    let business_key = row.business_key.items(separator);
    let descriptive_fields = row.descriptive_fields.items(separator);
    let keys: Vec<&str> = business_key.iter().map(String::as_str).collect();
    let fields: Vec<&str> = descriptive_fields.iter().map(String::as_str).collect();
    EntitySpec::parse(
        &row.table_name,
        &row.table_type,
        &keys,
        &fields,
        &row.source_table,
    )
}

/// Picks a source for `path` by extension: `.csv`, or a `.json`, `.yaml`,
/// `.yml`, `.toml` document with an `entities` array.
pub fn open_source(path: &Path) -> Result<Box<dyn MetadataSource>> {
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "csv" => Ok(Box::new(CsvMetadataSource::new(path))),
        "json" | "yaml" | "yml" | "toml" => Ok(Box::new(DocumentMetadataSource::new(path))),
        other => anyhow::bail!("unsupported metadata extension: {other:?}"),
    }
}
