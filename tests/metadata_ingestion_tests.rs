//! Metadata ingestion: file formats, validation and rejection reporting.

use assert_matches::assert_matches;
use std::fs;
use tempfile::TempDir;
use vault_sqlx::error::{CompileError, ErrorCode, SpecViolation};
use vault_sqlx::metadata::{MetadataSource, ingest, open_source};
use vault_sqlx::model::{EntityKind, EntitySpec};

const CSV: &str = "\
table_name,table_type,business_key,descriptive_fields,source_table
customer,hub,customer_id,,stg.customer
order_customer,link,customer_id|order_id,,stg.orders
customer_details,Satellite,customer_id,email|status,stg.customer
orphan_link,link,customer_id,,stg.orders
customer,hub,customer_no,,stg.customer_v2
weird,dimension,id,,stg.weird
bad name,hub,id,,stg.bad
,hub,id,,stg.unnamed
customer_flags,sat,customer_id,,stg.customer
";

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn csv_rows_are_validated_individually() {
    let dir = TempDir::new().unwrap();
    let source = open_source(&write(&dir, "metadata.csv", CSV)).unwrap();
    let ingested = ingest(&source.rows().unwrap(), '|');

    let names: Vec<&str> = ingested.specs.iter().map(|s| s.name().as_str()).collect();
    assert_eq!(names, ["customer", "order_customer", "customer_details"]);
    assert_eq!(ingested.spec_rows, [1, 2, 3]);
    assert_eq!(ingested.specs[2].kind(), EntityKind::Satellite);

    let rejected: Vec<(Option<usize>, ErrorCode)> = ingested
        .rejections
        .iter()
        .map(|r| (r.row, r.code))
        .collect();
    assert_eq!(
        rejected,
        [
            (Some(4), ErrorCode::InvalidSpec),
            (Some(5), ErrorCode::InvalidSpec),
            (Some(6), ErrorCode::UnknownKind),
            (Some(7), ErrorCode::InvalidSpec),
            (Some(8), ErrorCode::InvalidSpec),
            (Some(9), ErrorCode::InvalidSpec),
        ]
    );
    assert!(ingested.rejections[1].message.contains("already declared on row 1"));
}

#[test]
fn link_key_order_is_preserved_verbatim() {
    let dir = TempDir::new().unwrap();
    let csv = "name,kind,business_key,source_table\nol,link,order_id|customer_id,stg.orders\n";
    let source = open_source(&write(&dir, "links.csv", csv)).unwrap();
    let ingested = ingest(&source.rows().unwrap(), '|');
    let keys: Vec<&str> = ingested.specs[0]
        .business_key()
        .iter()
        .map(|k| k.as_str())
        .collect();
    assert_eq!(keys, ["order_id", "customer_id"]);
}

#[test]
fn yaml_and_json_documents_are_equivalent() {
    let dir = TempDir::new().unwrap();
    let yaml = write(
        &dir,
        "metadata.yaml",
        r#"
entities:
  - name: customer_details
    kind: satellite
    business_key: [customer_id]
    descriptive_fields: [email, status]
    source_table: stg.customer
"#,
    );
    let json = write(
        &dir,
        "metadata.json",
        r#"{"entities": [{"entity_name": "customer_details", "entity_type": "SAT",
            "business_key": "customer_id", "columns": "email|status",
            "source_table": "stg.customer"}]}"#,
    );

    let from_yaml = ingest(&open_source(&yaml).unwrap().rows().unwrap(), '|');
    let from_json = ingest(&open_source(&json).unwrap().rows().unwrap(), '|');
    assert_eq!(from_yaml.specs, from_json.specs);
    assert!(from_yaml.rejections.is_empty());
}

#[test]
fn missing_file_is_an_error_with_context() {
    let dir = TempDir::new().unwrap();
    let source = open_source(&dir.path().join("absent.csv")).unwrap();
    let err = source.rows().unwrap_err();
    assert!(format!("{err:#}").contains("absent.csv"));
}

#[test]
fn spec_constructor_enforces_shape() {
    assert_matches!(
        EntitySpec::parse("h", "hub", &[], &[], "stg.h"),
        Err(CompileError::InvalidSpec {
            violation: SpecViolation::KeyCount { min: 1, actual: 0, .. },
            ..
        })
    );
    assert_matches!(
        EntitySpec::parse("h", "hub", &["id"], &["extra"], "stg.h"),
        Err(CompileError::InvalidSpec {
            violation: SpecViolation::DescriptiveFieldsNotAllowed(EntityKind::Hub),
            ..
        })
    );
    assert_matches!(
        EntitySpec::parse("s", "satellite", &["id"], &["ID"], "stg.s"),
        Err(CompileError::InvalidSpec {
            violation: SpecViolation::DuplicateField(_),
            ..
        })
    );
    assert_matches!(
        EntitySpec::parse("s", "satellite", &["id"], &["a;drop"], "stg.s"),
        Err(CompileError::InvalidSpec {
            violation: SpecViolation::InvalidIdentifier { field: _, .. },
            ..
        })
    );
    assert_matches!(
        EntitySpec::parse("x", "bridge", &["id"], &[], "stg.x"),
        Err(CompileError::UnknownKind { .. })
    );
}
