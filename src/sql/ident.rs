//! Validated SQL identifiers and relation references.
//!
//! Every column and table name that reaches rendered SQL passes through
//! [`Ident`], so generated statements never need quoting or escaping of
//! names: anything that could break out of an identifier position is
//! rejected at the ingestion boundary instead.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Longest identifier accepted (BigQuery's column limit is 300, Postgres
/// truncates at 63; 128 keeps generated `_hk`/`_bk` suffixes portable).
pub const MAX_IDENT_LEN: usize = 128;

/// Maximum number of dotted parts in a table reference (project.dataset.table).
pub const MAX_TABLE_PARTS: usize = 3;

static IDENT_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Reasons an identifier or table reference is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentError {
    #[error("identifier cannot be empty")]
    Empty,

    #[error("identifier '{0}' exceeds {MAX_IDENT_LEN} characters")]
    TooLong(String),

    #[error("identifier '{0}' must start with a letter or underscore and contain only letters, digits and underscores")]
    InvalidCharacters(String),

    #[error("table reference '{0}' has more than {MAX_TABLE_PARTS} parts")]
    TooManyParts(String),
}

/// A SQL identifier restricted to `[A-Za-z_][A-Za-z0-9_]*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ident(String);

impl Ident {
    pub fn new(value: impl Into<String>) -> Result<Self, IdentError> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdentError::Empty);
        }
        if value.len() > MAX_IDENT_LEN {
            return Err(IdentError::TooLong(value));
        }
        if !IDENT_PATTERN.is_match(&value) {
            return Err(IdentError::InvalidCharacters(value));
        }
        Ok(Self(value))
    }

    /// Wraps a compile-time constant known to match the identifier pattern.
    pub(crate) fn trusted(value: &'static str) -> Self {
        debug_assert!(IDENT_PATTERN.is_match(value), "{value} is not an identifier");
        Self(value.to_string())
    }

    /// Appends `_<suffix>` to this identifier.
    ///
    /// Suffixes are internal constants, so the result stays a valid
    /// identifier unless the length limit is exceeded.
    pub fn with_suffix(&self, suffix: &str) -> Result<Self, IdentError> {
        Self::new(format!("{}_{}", self.0, suffix))
    }

    /// Joins identifiers with `_`.
    pub fn joined<'a, I>(parts: I) -> Result<Self, IdentError>
    where
        I: IntoIterator<Item = &'a Ident>,
    {
        let joined = parts
            .into_iter()
            .map(Ident::as_str)
            .collect::<Vec<_>>()
            .join("_");
        Self::new(joined)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison, matching how both supported warehouses
    /// resolve unquoted column names.
    pub fn eq_ignore_case(&self, other: &Ident) -> bool {
        self.0.eq_ignore_ascii_case(&other.0)
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ident {
    type Err = IdentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for Ident {
    type Error = IdentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Ident> for String {
    fn from(value: Ident) -> Self {
        value.0
    }
}

impl AsRef<str> for Ident {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A possibly qualified relation name such as `stg.customer`.
///
/// The reference is opaque to generation: dialects decide how to resolve it
/// (a Dataform `${ref(...)}` placeholder, or a plain qualified name).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableRef {
    parts: Vec<Ident>,
}

impl TableRef {
    pub fn parse(value: &str) -> Result<Self, IdentError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(IdentError::Empty);
        }
        let parts = trimmed
            .split('.')
            .map(|part| Ident::new(part.trim()))
            .collect::<Result<Vec<_>, _>>()?;
        if parts.len() > MAX_TABLE_PARTS {
            return Err(IdentError::TooManyParts(trimmed.to_string()));
        }
        Ok(Self { parts })
    }

    /// An unqualified reference to a single relation name.
    pub fn bare(name: Ident) -> Self {
        Self { parts: vec![name] }
    }

    /// `schema.name`
    pub fn qualified(schema: Ident, name: Ident) -> Self {
        Self {
            parts: vec![schema, name],
        }
    }

    pub fn parts(&self) -> &[Ident] {
        &self.parts
    }

    /// The relation name without qualifiers.
    pub fn name(&self) -> &Ident {
        // parse() and bare() both guarantee at least one part
        &self.parts[self.parts.len() - 1]
    }

    /// Qualifiers preceding the relation name (schema, or project + dataset).
    pub fn qualifiers(&self) -> &[Ident] {
        &self.parts[..self.parts.len() - 1]
    }

    pub fn dotted(&self) -> String {
        self.parts
            .iter()
            .map(Ident::as_str)
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

impl TryFrom<String> for TableRef {
    type Error = IdentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TableRef> for String {
    fn from(value: TableRef) -> Self {
        value.dotted()
    }
}
