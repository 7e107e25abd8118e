use super::{MetadataRow, MetadataSource};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

/// JSON, YAML or TOML document holding an `entities` array.
#[derive(Debug, Clone)]
pub struct DocumentMetadataSource {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct MetadataDocument {
    #[serde(default)]
    entities: Vec<MetadataRow>,
}

impl DocumentMetadataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parses `contents` according to `extension` (`json`, `yaml`, `yml`,
    /// `toml`).
    pub fn parse(contents: &str, extension: &str) -> Result<Vec<MetadataRow>> {
        let document: MetadataDocument = match extension.to_ascii_lowercase().as_str() {
            "json" => serde_json::from_str(contents).context("failed to parse JSON metadata")?,
            "yaml" | "yml" => {
                serde_yaml::from_str(contents).context("failed to parse YAML metadata")?
            }
            "toml" => toml::from_str(contents).context("failed to parse TOML metadata")?,
            other => anyhow::bail!("unsupported metadata document extension: {other:?}"),
        };
        Ok(document.entities)
    }
}

impl MetadataSource for DocumentMetadataSource {
    fn describe(&self) -> String {
        format!("document {}", self.path.display())
    }

    fn rows(&self) -> Result<Vec<MetadataRow>> {
        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read metadata file {:?}", self.path))?;
        let ext = self
            .path
            .extension()
            .and_then(|os| os.to_str())
            .unwrap_or("");
        Self::parse(&contents, ext).with_context(|| format!("in metadata file {:?}", self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::ListCell;

    #[test]
    fn yaml_accepts_native_lists() {
        let yaml = r#"
entities:
  - name: order_customer
    kind: link
    business_key: [customer_id, order_id]
    source_table: stg.orders
"#;
        let rows = DocumentMetadataSource::parse(yaml, "yaml").unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(
            rows[0].business_key,
            ListCell::Items(vec!["customer_id".into(), "order_id".into()])
        );
    }

    #[test]
    fn json_accepts_joined_lists() {
        let json = r#"{"entities": [{"table_name": "customer_details", "table_type": "satellite",
            "business_key": "customer_id", "descriptive_fields": "email|status",
            "source_table": "stg.customer"}]}"#;
        let rows = DocumentMetadataSource::parse(json, "json").unwrap();
        assert_eq!(rows[0].descriptive_fields.items('|'), vec!["email", "status"]);
    }

    #[test]
    fn toml_entities_table_array() {
        let toml = r#"
[[entities]]
name = "customer"
kind = "hub"
business_key = ["customer_id"]
source_table = "stg.customer"
"#;
        let rows = DocumentMetadataSource::parse(toml, "toml").unwrap();
        assert_eq!(rows[0].table_type, "hub");
    }
}
