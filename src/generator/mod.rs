//! Hub, Link and Satellite generators.
//!
//! Each generator turns one validated [`EntitySpec`] into its artifacts.
//! Generation is all-or-nothing per entity: any error discards every
//! artifact of that entity.

pub mod dispatcher;
pub mod hub;
pub mod link;
pub mod satellite;
pub mod scd2;

pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use hub::HubGenerator;
pub use link::LinkGenerator;
pub use satellite::SatelliteGenerator;

use crate::config::{GenerationConfig, LoadPrecision, Materialization};
use crate::error::{CompileError, SpecViolation};
use crate::hashing::HashProvider;
use crate::model::{
    ArtifactHeader, ArtifactKind, ArtifactRole, EntityKind, EntitySpec, GeneratedArtifact,
};
use crate::naming::NamingScheme;
use crate::sql::{Dialect, Expr, Ident, IdentError, TableRef};
use indexmap::IndexMap;

/// BigQuery accepts at most four clustering columns.
const MAX_CLUSTER_COLUMNS: usize = 4;

pub trait Generator: Send + Sync {
    fn kind(&self) -> EntityKind;

    fn generate(
        &self,
        spec: &EntitySpec,
        ctx: &GeneratorContext,
    ) -> Result<Vec<GeneratedArtifact>, CompileError>;
}

/// Everything a generator needs besides the spec itself.
#[derive(Debug)]
pub struct GeneratorContext {
    pub config: GenerationConfig,
    pub dialect: Box<dyn Dialect>,
    pub hasher: HashProvider,
    pub naming: NamingScheme,
}

impl GeneratorContext {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            dialect: config.dialect.dialect(),
            hasher: HashProvider::new(config.key_encoding.clone()),
            naming: NamingScheme,
            config,
        }
    }

    /// Processing-time capture for the load column.
    pub fn load_expr(&self) -> Expr {
        match self.config.load_precision {
            LoadPrecision::Timestamp => Expr::CurrentTimestamp,
            LoadPrecision::Date => Expr::CurrentDate,
        }
    }

    /// Constant record source literal for `spec`.
    pub fn record_source(&self, spec: &EntitySpec) -> Expr {
        match &self.config.record_source {
            Some(tag) => Expr::string(tag.as_str()),
            None => Expr::string(spec.source_table().dotted()),
        }
    }

    /// Persisted vault table for `name` inside the configured schema.
    pub fn vault_table(&self, name: &Ident) -> TableRef {
        TableRef::qualified(self.config.schema_name.clone(), name.clone())
    }

    pub fn artifact_name(
        &self,
        spec: &EntitySpec,
        role: ArtifactRole,
    ) -> Result<Ident, CompileError> {
        self.naming
            .artifact_name(spec, role)
            .map_err(derived_name(spec))
    }

    /// Rejects specs whose declared fields collide with a vault column or a
    /// generated name.
    pub fn check_reserved(
        &self,
        spec: &EntitySpec,
        generated: &[&Ident],
    ) -> Result<(), CompileError> {
        let reserved = self.config.columns.all();
        let declared = spec
            .business_key()
            .iter()
            .chain(spec.descriptive_fields().iter());
        for field in declared {
            let clash = reserved
                .iter()
                .chain(generated.iter())
                .any(|r| r.eq_ignore_case(field));
            if clash {
                return Err(spec.reject(SpecViolation::ReservedColumn(field.to_string())));
            }
        }
        Ok(())
    }

    /// Header shared by every artifact of `spec`; callers fill in the
    /// role-specific parts.
    pub fn header(
        &self,
        spec: &EntitySpec,
        kind: ArtifactKind,
        cluster_by: &[Ident],
        description: String,
        columns: IndexMap<String, String>,
    ) -> ArtifactHeader {
        let is_table = kind == ArtifactKind::Table;
        let load = &self.config.columns.load_dts;
        let partition_by = (is_table && self.config.partition_by_load).then(|| {
            match self.config.load_precision {
                LoadPrecision::Timestamp => format!("DATE({load})"),
                LoadPrecision::Date => load.to_string(),
            }
        });
        let cluster_by = if is_table && self.config.cluster_by_business_key {
            cluster_by
                .iter()
                .take(MAX_CLUSTER_COLUMNS)
                .map(Ident::to_string)
                .collect()
        } else {
            Vec::new()
        };

        ArtifactHeader {
            schema: self.config.schema_name.to_string(),
            incremental: is_table && self.config.materialization == Materialization::Incremental,
            tags: vec![spec.kind().to_string(), "datavault".to_string()],
            description,
            partition_by,
            cluster_by,
            columns,
        }
    }
}

/// Maps a failure to derive a generated identifier onto the entity.
pub(crate) fn derived_name(spec: &EntitySpec) -> impl Fn(IdentError) -> CompileError + '_ {
    move |source| {
        spec.reject(SpecViolation::InvalidIdentifier {
            field: "generated name",
            source,
        })
    }
}

/// Verifies a spec was routed to the generator of its kind.
pub(crate) fn expect_kind(spec: &EntitySpec, expected: EntityKind) -> Result<(), CompileError> {
    if spec.kind() == expected {
        Ok(())
    } else {
        Err(spec.reject(SpecViolation::KindMismatch {
            expected,
            actual: spec.kind(),
        }))
    }
}

/// Comma-separated field list for descriptions.
pub(crate) fn field_list(fields: &[Ident]) -> String {
    fields
        .iter()
        .map(Ident::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}
