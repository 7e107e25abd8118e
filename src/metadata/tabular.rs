use super::{ListCell, MetadataRow, MetadataSource};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;

/// CSV metadata with a header row. Columns are matched by name; unknown
/// columns are ignored.
#[derive(Debug, Clone)]
pub struct CsvMetadataSource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRecord {
    #[serde(default, alias = "entity_name", alias = "name")]
    table_name: Option<String>,
    #[serde(default, alias = "entity_type", alias = "kind", alias = "type")]
    table_type: Option<String>,
    #[serde(default)]
    business_key: Option<String>,
    #[serde(default, alias = "columns")]
    descriptive_fields: Option<String>,
    #[serde(default)]
    source_table: Option<String>,
}

impl From<CsvRecord> for MetadataRow {
    fn from(record: CsvRecord) -> Self {
        MetadataRow {
            table_name: record.table_name.unwrap_or_default(),
            table_type: record.table_type.unwrap_or_default(),
            business_key: ListCell::Joined(record.business_key.unwrap_or_default()),
            descriptive_fields: ListCell::Joined(record.descriptive_fields.unwrap_or_default()),
            source_table: record.source_table.unwrap_or_default(),
        }
    }
}

impl CsvMetadataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parses CSV text from any reader.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<MetadataRow>> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);
        let mut rows = Vec::new();
        for (index, record) in csv_reader.deserialize::<CsvRecord>().enumerate() {
            let record = record.with_context(|| format!("malformed metadata row {}", index + 1))?;
            rows.push(record.into());
        }
        Ok(rows)
    }
}

impl MetadataSource for CsvMetadataSource {
    fn describe(&self) -> String {
        format!("csv {}", self.path.display())
    }

    fn rows(&self) -> Result<Vec<MetadataRow>> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("failed to open metadata file {:?}", self.path))?;
        Self::parse(file).with_context(|| format!("failed to parse metadata file {:?}", self.path))
    }
}
