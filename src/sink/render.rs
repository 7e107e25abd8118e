//! File rendering of artifacts: a Dataform SQLX `config {}` block or a SQL
//! comment header, followed by the statement body.

use crate::config::OutputFormat;
use crate::model::GeneratedArtifact;
use std::fmt::Write as _;

pub fn render(artifact: &GeneratedArtifact, format: OutputFormat) -> String {
    match format {
        OutputFormat::Sqlx => render_sqlx(artifact),
        OutputFormat::Sql => render_sql(artifact),
    }
}

/// JSON string literal; JavaScript accepts the same escapes.
fn js_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn js_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| js_string(v)).collect();
    format!("[{}]", items.join(", "))
}

fn render_sqlx(artifact: &GeneratedArtifact) -> String {
    let header = &artifact.header;
    let mut entries = vec![
        format!("type: {}", js_string(artifact.sqlx_type())),
        format!("name: {}", js_string(artifact.target_name.as_str())),
        format!("schema: {}", js_string(&header.schema)),
    ];
    if !header.description.is_empty() {
        entries.push(format!("description: {}", js_string(&header.description)));
    }
    if !header.tags.is_empty() {
        entries.push(format!("tags: {}", js_list(&header.tags)));
    }

    let mut warehouse = Vec::new();
    if let Some(partition) = &header.partition_by {
        warehouse.push(format!("partitionBy: {}", js_string(partition)));
    }
    if !header.cluster_by.is_empty() {
        warehouse.push(format!("clusterBy: {}", js_list(&header.cluster_by)));
    }
    if !warehouse.is_empty() {
        entries.push(format!("bigquery: {{\n    {}\n  }}", warehouse.join(",\n    ")));
    }

    if !header.columns.is_empty() {
        let columns: Vec<String> = header
            .columns
            .iter()
            .map(|(name, doc)| format!("{name}: {}", js_string(doc)))
            .collect();
        entries.push(format!("columns: {{\n    {}\n  }}", columns.join(",\n    ")));
    }

    let mut out = String::new();
    out.push_str("config {\n  ");
    out.push_str(&entries.join(",\n  "));
    out.push_str("\n}\n\n");
    out.push_str(&artifact.body);
    out
}

fn one_line(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn render_sql(artifact: &GeneratedArtifact) -> String {
    let header = &artifact.header;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "-- {}.{} ({})",
        header.schema,
        artifact.target_name,
        artifact.sqlx_type()
    );
    if !header.description.is_empty() {
        let _ = writeln!(out, "-- {}", one_line(&header.description));
    }
    if !header.tags.is_empty() {
        let _ = writeln!(out, "-- tags: {}", header.tags.join(", "));
    }
    if let Some(partition) = &header.partition_by {
        let _ = writeln!(out, "-- partition by: {partition}");
    }
    if !header.cluster_by.is_empty() {
        let _ = writeln!(out, "-- cluster by: {}", header.cluster_by.join(", "));
    }
    for (name, doc) in &header.columns {
        let _ = writeln!(out, "--   {name}: {}", one_line(doc));
    }
    out.push('\n');
    out.push_str(&artifact.body);
    out
}
