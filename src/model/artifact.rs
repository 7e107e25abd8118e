//! Compiled output units.

use super::spec::EntityKind;
use crate::sql::Ident;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactKind {
    /// A relation materialized from a SELECT.
    Table,
    /// A statement executed for its side effects (the SCD2 merge).
    Operation,
}

/// Which artifact of an entity is being named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactRole {
    /// The single artifact of a Hub or Link.
    Primary,
    /// The full-snapshot extract of a Satellite.
    SatelliteBase,
    /// The SCD2 merge of a Satellite.
    SatelliteMerge,
}

impl ArtifactRole {
    pub fn suffix(self) -> Option<&'static str> {
        match self {
            ArtifactRole::Primary => None,
            ArtifactRole::SatelliteBase => Some("base"),
            ArtifactRole::SatelliteMerge => Some("merge"),
        }
    }
}

/// Build metadata rendered ahead of the SQL body (a Dataform `config {}`
/// block, or a comment header for plain SQL).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub schema: String,
    /// Table artifacts only: load incrementally instead of rebuilding.
    #[serde(default)]
    pub incremental: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub description: String,
    /// Partition expression, already rendered for the dialect.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_by: Option<String>,
    #[serde(default)]
    pub cluster_by: Vec<String>,
    /// Column name to description, in projection order.
    #[serde(default)]
    pub columns: IndexMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub target_name: Ident,
    pub kind: ArtifactKind,
    pub entity: Ident,
    pub entity_kind: EntityKind,
    pub role: ArtifactRole,
    pub header: ArtifactHeader,
    /// Target-dialect SQL text.
    pub body: String,
}

impl GeneratedArtifact {
    /// `table`, `incremental` or `operations`, as Dataform spells the type.
    pub fn sqlx_type(&self) -> &'static str {
        match (self.kind, self.header.incremental) {
            (ArtifactKind::Operation, _) => "operations",
            (ArtifactKind::Table, true) => "incremental",
            (ArtifactKind::Table, false) => "table",
        }
    }
}
