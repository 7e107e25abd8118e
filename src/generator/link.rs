use super::{Generator, GeneratorContext, derived_name, expect_kind, field_list};
use crate::error::CompileError;
use crate::model::{ArtifactKind, ArtifactRole, EntityKind, EntitySpec, GeneratedArtifact};
use crate::sql::{Expr, FromClause, Ident, Query, Select, SelectItem};
use indexmap::IndexMap;
use tracing::debug;

/// Emits one Table artifact relating two or more hubs.
///
/// The link hash key is computed over the business key fields in declared
/// order. Reordering the metadata changes every link hash, so the generator
/// never sorts them. Each key field also gets the hash key of the hub keyed
/// by that field alone, which is what joins the link back to its hubs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkGenerator;

impl Generator for LinkGenerator {
    fn kind(&self) -> EntityKind {
        EntityKind::Link
    }

    fn generate(
        &self,
        spec: &EntitySpec,
        ctx: &GeneratorContext,
    ) -> Result<Vec<GeneratedArtifact>, CompileError> {
        expect_kind(spec, EntityKind::Link)?;

        let naming = &ctx.naming;
        let columns = &ctx.config.columns;
        let keys = spec.business_key().as_slice();

        let hash_key = naming.hash_key_name(spec).map_err(derived_name(spec))?;
        let hub_keys = keys
            .iter()
            .map(|field| naming.hub_hash_key_name(field))
            .collect::<Result<Vec<Ident>, _>>()
            .map_err(derived_name(spec))?;
        let business_keys = naming
            .business_key_names(spec)
            .map_err(derived_name(spec))?;

        let mut generated = vec![&hash_key];
        generated.extend(hub_keys.iter());
        generated.extend(business_keys.iter());
        ctx.check_reserved(spec, &generated)?;

        let mut select = Select::new(FromClause::table(spec.source_table().clone(), None))
            .distinct()
            .item(SelectItem::aliased(
                ctx.hasher.digest_expr(keys, None),
                hash_key.clone(),
            ));
        for (field, hub_key) in keys.iter().zip(&hub_keys) {
            select = select.item(SelectItem::aliased(
                ctx.hasher.digest_expr([field], None),
                hub_key.clone(),
            ));
        }
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
            format!("Link hash key over {} (in this order)", field_list(keys)),
        );
        for (field, hub_key) in keys.iter().zip(&hub_keys) {
            docs.insert(hub_key.to_string(), format!("Hash key of the hub keyed on {field}"));
        }
        for (field, alias) in keys.iter().zip(&business_keys) {
            docs.insert(alias.to_string(), format!("Business key {field}"));
        }
        docs.insert(columns.load_dts.to_string(), "Load time".to_string());
        docs.insert(columns.record_source.to_string(), "Source system".to_string());

        let header = ctx.header(
            spec,
            ArtifactKind::Table,
            &hub_keys,
            format!(
                "Link {} between {}, loaded from {}",
                spec.name(),
                field_list(keys),
                spec.source_table()
            ),
            docs,
        );

        let target_name = ctx.artifact_name(spec, ArtifactRole::Primary)?;
        debug!(entity = %spec.name(), artifact = %target_name, keys = keys.len(), "generated link");

        Ok(vec![GeneratedArtifact {
            target_name,
            kind: ArtifactKind::Table,
            entity: spec.name().clone(),
            entity_kind: EntityKind::Link,
            role: ArtifactRole::Primary,
            header,
            body: Query::Select(select).to_sql(ctx.dialect.as_ref()),
        }])
    }
}
