//! Error taxonomy for metadata compilation
//!
//! This module provides:
//! - Stable error codes with categories for rejection reports
//! - `CompileError`, the per-entity failure surfaced by ingestion and generators
//! - `SpecViolation`, the detailed reason an entity spec was refused
//! - `RejectionReport`, the end-of-run list of every rejected entity
//!
//! A rejected entity never produces a partial artifact; the rest of the run
//! carries on and the report is surfaced once generation finishes.

use crate::model::EntityKind;
use crate::sql::IdentError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// ERROR CODES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(i32)]
pub enum ErrorCode {
    /// Missing required field or wrong field count for the declared kind
    InvalidSpec = 1001,
    /// Kind is not one of hub, link, satellite
    UnknownKind = 1002,
    /// A key value contains the configured join delimiter
    AmbiguousKeyDelimiter = 1003,
}

impl ErrorCode {
    pub fn code(&self) -> i32 {
        *self as i32
    }

    /// Category used to group rejections in reports
    pub fn category(&self) -> &'static str {
        match self {
            ErrorCode::InvalidSpec => "spec_error",
            ErrorCode::UnknownKind => "kind_error",
            ErrorCode::AmbiguousKeyDelimiter => "hash_error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}({})", self, self.code())
    }
}

// =============================================================================
// SPEC VIOLATIONS
// =============================================================================

/// Why an entity spec was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SpecViolation {
    #[error("required field '{0}' is missing")]
    MissingField(&'static str),

    #[error("{kind} requires at least {min} business key field(s), got {actual}")]
    KeyCount {
        kind: EntityKind,
        min: usize,
        actual: usize,
    },

    #[error("satellite requires at least one descriptive field")]
    DescriptiveFieldsRequired,

    #[error("{0} does not take descriptive fields")]
    DescriptiveFieldsNotAllowed(EntityKind),

    #[error("invalid {field}: {source}")]
    InvalidIdentifier {
        field: &'static str,
        #[source]
        source: IdentError,
    },

    #[error("field '{0}' is declared more than once")]
    DuplicateField(String),

    #[error("field '{0}' clashes with a generated vault column")]
    ReservedColumn(String),

    #[error("entity name already declared on row {first_row}")]
    DuplicateEntity { first_row: usize },

    #[error("artifact name '{name}' is already produced by entity '{owner}'")]
    ArtifactNameTaken { name: String, owner: String },

    #[error("{actual} spec routed to the {expected} generator")]
    KindMismatch {
        expected: EntityKind,
        actual: EntityKind,
    },
}

// =============================================================================
// COMPILE ERROR
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    #[error("invalid spec for entity '{entity}': {violation}")]
    InvalidSpec {
        entity: String,
        violation: SpecViolation,
    },

    #[error("unknown kind '{kind}' for entity '{entity}'")]
    UnknownKind { entity: String, kind: String },

    #[error("key value {value:?} contains the key delimiter {separator:?}")]
    AmbiguousKeyDelimiter { separator: String, value: String },
}

impl CompileError {
    pub fn invalid_spec(entity: impl Into<String>, violation: SpecViolation) -> Self {
        CompileError::InvalidSpec {
            entity: entity.into(),
            violation,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            CompileError::InvalidSpec { .. } => ErrorCode::InvalidSpec,
            CompileError::UnknownKind { .. } => ErrorCode::UnknownKind,
            CompileError::AmbiguousKeyDelimiter { .. } => ErrorCode::AmbiguousKeyDelimiter,
        }
    }

    /// Entity the error belongs to, when it is tied to one.
    pub fn entity(&self) -> Option<&str> {
        match self {
            CompileError::InvalidSpec { entity, .. } | CompileError::UnknownKind { entity, .. } => {
                Some(entity)
            }
            CompileError::AmbiguousKeyDelimiter { .. } => None,
        }
    }
}

// =============================================================================
// REJECTION REPORT
// =============================================================================

/// One rejected entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    /// 1-based metadata row, when the rejection happened at ingestion
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    pub entity: String,
    pub code: ErrorCode,
    pub message: String,
}

impl Rejection {
    pub fn new(row: Option<usize>, entity: impl Into<String>, error: &CompileError) -> Self {
        Self {
            row,
            entity: entity.into(),
            code: error.code(),
            message: error.to_string(),
        }
    }
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.row {
            Some(row) => write!(
                f,
                "row {row} [{}] {}: {}",
                self.code.category(),
                self.entity,
                self.message
            ),
            None => write!(
                f,
                "[{}] {}: {}",
                self.code.category(),
                self.entity,
                self.message
            ),
        }
    }
}

/// All entities rejected during a run, in the order they were rejected.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionReport {
    pub rejections: Vec<Rejection>,
}

impl RejectionReport {
    pub fn push(&mut self, rejection: Rejection) {
        self.rejections.push(rejection);
    }

    pub fn extend(&mut self, rejections: impl IntoIterator<Item = Rejection>) {
        self.rejections.extend(rejections);
    }

    pub fn is_empty(&self) -> bool {
        self.rejections.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rejections.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rejection> {
        self.rejections.iter()
    }

    pub fn count_by_code(&self, code: ErrorCode) -> usize {
        self.rejections.iter().filter(|r| r.code == code).count()
    }
}

impl fmt::Display for RejectionReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} entit(ies) rejected:", self.rejections.len())?;
        for rejection in &self.rejections {
            writeln!(f, "  - {rejection}")?;
        }
        Ok(())
    }
}
