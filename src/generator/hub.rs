use super::{Generator, GeneratorContext, derived_name, expect_kind, field_list};
use crate::error::CompileError;
use crate::model::{ArtifactKind, ArtifactRole, EntityKind, EntitySpec, GeneratedArtifact};
use crate::sql::{Expr, FromClause, Query, Select, SelectItem};
use indexmap::IndexMap;
use tracing::debug;

/// Emits one Table artifact holding the distinct business keys of the
/// source with their hash key.
#[derive(Debug, Clone, Copy, Default)]
pub struct HubGenerator;

impl Generator for HubGenerator {
    fn kind(&self) -> EntityKind {
        EntityKind::Hub
    }

    fn generate(
        &self,
        spec: &EntitySpec,
        ctx: &GeneratorContext,
    ) -> Result<Vec<GeneratedArtifact>, CompileError> {
        expect_kind(spec, EntityKind::Hub)?;

        let naming = &ctx.naming;
        let columns = &ctx.config.columns;
        let hash_key = naming.hash_key_name(spec).map_err(derived_name(spec))?;
        let business_keys = naming
            .business_key_names(spec)
            .map_err(derived_name(spec))?;

        let mut generated = vec![&hash_key];
        generated.extend(business_keys.iter());
        ctx.check_reserved(spec, &generated)?;

        let keys = spec.business_key().as_slice();
        let mut select = Select::new(FromClause::table(spec.source_table().clone(), None))
            .distinct()
            .item(SelectItem::aliased(
                ctx.hasher.digest_expr(keys, None),
                hash_key.clone(),
            ));
        for (field, alias) in keys.iter().zip(&business_keys) {
            select = select.item(SelectItem::aliased(Expr::column(field), alias.clone()));
        }
        select = select
            .item(SelectItem::aliased(ctx.load_expr(), columns.load_dts.clone()))
            .item(SelectItem::aliased(
                ctx.record_source(spec),
                columns.record_source.clone(),
            ));

        let mut docs = IndexMap::new();
        docs.insert(
            hash_key.to_string(),
            format!("Hash key over {}", field_list(keys)),
        );
        for (field, alias) in keys.iter().zip(&business_keys) {
            docs.insert(alias.to_string(), format!("Business key {field}"));
        }
        docs.insert(columns.load_dts.to_string(), "Load time".to_string());
        docs.insert(columns.record_source.to_string(), "Source system".to_string());

        let header = ctx.header(
            spec,
            ArtifactKind::Table,
            &business_keys,
            format!(
                "Hub {} keyed on {}, loaded from {}",
                spec.name(),
                field_list(keys),
                spec.source_table()
            ),
            docs,
        );

        let target_name = ctx.artifact_name(spec, ArtifactRole::Primary)?;
        debug!(entity = %spec.name(), artifact = %target_name, "generated hub");

        Ok(vec![GeneratedArtifact {
            target_name,
            kind: ArtifactKind::Table,
            entity: spec.name().clone(),
            entity_kind: EntityKind::Hub,
            role: ArtifactRole::Primary,
            header,
            body: Query::Select(select).to_sql(ctx.dialect.as_ref()),
        }])
    }
}
