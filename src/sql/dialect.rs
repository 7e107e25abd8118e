//! Target-warehouse dialects.
//!
//! Generators build dialect-neutral [`Expr`](super::Expr) trees; a
//! [`Dialect`] supplies the handful of functions that differ between
//! warehouses: the relation resolver, text casts, the hex digest function,
//! string literal escaping and the clock functions.

use super::ident::TableRef;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fmt::Write as _;
use strum::{Display, EnumString};

/// Selectable dialects.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    ValueEnum,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DialectKind {
    /// BigQuery SQL inside Dataform SQLX; relations resolve through `${ref(...)}`.
    #[default]
    #[value(name = "bigquery", alias = "dataform")]
    #[serde(alias = "dataform")]
    #[strum(to_string = "bigquery", serialize = "dataform")]
    BigQuery,
    /// PostgreSQL 15+ (MERGE support), relations rendered as qualified names.
    #[value(name = "postgres", alias = "pg")]
    #[serde(alias = "pg")]
    #[strum(to_string = "postgres", serialize = "pg")]
    Postgres,
}

impl DialectKind {
    pub fn dialect(self) -> Box<dyn Dialect> {
        match self {
            DialectKind::BigQuery => Box::new(BigQuery),
            DialectKind::Postgres => Box::new(Postgres),
        }
    }
}

/// How a warehouse keeps the first row of each partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDedup {
    /// `QUALIFY ROW_NUMBER() OVER (PARTITION BY .. ORDER BY ..) = 1`
    Qualify,
    /// `SELECT DISTINCT ON (..) .. ORDER BY ..`
    DistinctOn,
}

/// Functions and syntax that vary between target warehouses.
pub trait Dialect: fmt::Debug + Send + Sync {
    fn kind(&self) -> DialectKind;

    /// Renders a relation reference. This is the single resolution point for
    /// every source and target table in generated SQL.
    fn resolve(&self, table: &TableRef) -> String;

    /// Name of the variable-length text type used by casts.
    fn text_type(&self) -> &'static str;

    fn cast_text(&self, expr: &str) -> String {
        format!("CAST({expr} AS {})", self.text_type())
    }

    /// Lowercase hex SHA-256 of a text expression.
    fn hex_digest(&self, expr: &str) -> String;

    /// Length of a text expression in characters (not bytes).
    fn char_length(&self, expr: &str) -> String {
        format!("CHAR_LENGTH({expr})")
    }

    fn concat(&self, parts: &[String]) -> String {
        format!("CONCAT({})", parts.join(", "))
    }

    fn string_literal(&self, value: &str) -> String;

    fn current_timestamp(&self) -> &'static str;

    fn current_date(&self) -> &'static str;

    /// Terminator appended after a complete statement.
    fn statement_terminator(&self) -> &'static str {
        ""
    }

    fn row_dedup(&self) -> RowDedup;
}

/// BigQuery Standard SQL as compiled by Dataform.
#[derive(Debug, Clone, Copy, Default)]
pub struct BigQuery;

impl Dialect for BigQuery {
    fn kind(&self) -> DialectKind {
        DialectKind::BigQuery
    }

    fn resolve(&self, table: &TableRef) -> String {
        let quoted = |s: &str| format!("\"{s}\"");
        match table.parts() {
            [name] => format!("${{ref({})}}", quoted(name.as_str())),
            [schema, name] => format!(
                "${{ref({}, {})}}",
                quoted(schema.as_str()),
                quoted(name.as_str())
            ),
            parts => {
                let (database, rest) = parts.split_at(parts.len() - 2);
                let database = database
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(".");
                format!(
                    "${{ref({{database: {}, schema: {}, name: {}}})}}",
                    quoted(&database),
                    quoted(rest[0].as_str()),
                    quoted(rest[1].as_str())
                )
            }
        }
    }

    fn text_type(&self) -> &'static str {
        "STRING"
    }

    fn hex_digest(&self, expr: &str) -> String {
        format!("TO_HEX(SHA256({expr}))")
    }

    fn string_literal(&self, value: &str) -> String {
        let mut out = String::with_capacity(value.len() + 2);
        out.push('\'');
        for c in value.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                c if c.is_control() => {
                    let _ = write!(out, "\\x{:02x}", c as u32);
                }
                c => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP()"
    }

    fn current_date(&self) -> &'static str {
        "CURRENT_DATE()"
    }

    fn row_dedup(&self) -> RowDedup {
        RowDedup::Qualify
    }
}

/// PostgreSQL 15 or later.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    fn resolve(&self, table: &TableRef) -> String {
        table.dotted()
    }

    fn text_type(&self) -> &'static str {
        "TEXT"
    }

    fn hex_digest(&self, expr: &str) -> String {
        format!("ENCODE(SHA256(CONVERT_TO({expr}, 'UTF8')), 'hex')")
    }

    fn string_literal(&self, value: &str) -> String {
        let needs_escape = value.chars().any(|c| c.is_control() || c == '\\');
        if !needs_escape {
            return format!("'{}'", value.replace('\'', "''"));
        }
        let mut out = String::with_capacity(value.len() + 3);
        out.push_str("E'");
        for c in value.chars() {
            match c {
                '\\' => out.push_str("\\\\"),
                '\'' => out.push_str("\\'"),
                c if c.is_control() && (c as u32) < 0x80 => {
                    let _ = write!(out, "\\x{:02x}", c as u32);
                }
                c if c.is_control() => {
                    let _ = write!(out, "\\u{:04x}", c as u32);
                }
                c => out.push(c),
            }
        }
        out.push('\'');
        out
    }

    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    fn current_date(&self) -> &'static str {
        "CURRENT_DATE"
    }

    fn statement_terminator(&self) -> &'static str {
        ";"
    }

    fn row_dedup(&self) -> RowDedup {
        RowDedup::DistinctOn
    }
}
