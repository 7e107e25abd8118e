//! Satellite generation: a full-snapshot base extract and an SCD2 merge.
//!
//! The merge is a single `MERGE` statement so that closing the current
//! version and inserting its replacement commit together. Its source is the
//! staged snapshot twice over:
//!
//! - every staged row keyed by its hash key, which matches the current
//!   target row (closing it when the hash diff changed) or inserts a first
//!   version when nothing matches;
//! - a copy of every *changed* row with a NULL merge key, which can never
//!   match and therefore inserts the new current version.
//!
//! The staged snapshot holds one row per hash key. When the source delivers
//! several versions of a key, the one with the smallest hash diff wins.
//!
//! Rows whose hash diff equals the current version produce no write at all.
//! Concurrent executions against the same target must be serialized by the
//! caller; the statement itself takes no locks.

use super::{Generator, GeneratorContext, derived_name, expect_kind, field_list};
use crate::error::CompileError;
use crate::model::{ArtifactKind, ArtifactRole, EntityKind, EntitySpec, GeneratedArtifact};
use crate::sql::{
    Assignment, Cte, Expr, FromClause, Ident, Merge, MergeClause, Query, Relation, Select,
    SelectItem,
};
use indexmap::IndexMap;
use tracing::debug;

const MERGE_KEY: &str = "merge_key";
const STAGED: &str = "staged";
const TARGET: &str = "target";
const SOURCE: &str = "source";
const CURRENT_VERSION: &str = "current_version";

#[derive(Debug, Clone, Copy, Default)]
pub struct SatelliteGenerator;

/// Names resolved once per satellite.
struct SatelliteNames {
    hash_key: Ident,
    business_keys: Vec<Ident>,
    merge_key: Ident,
}

impl Generator for SatelliteGenerator {
    fn kind(&self) -> EntityKind {
        EntityKind::Satellite
    }

    fn generate(
        &self,
        spec: &EntitySpec,
        ctx: &GeneratorContext,
    ) -> Result<Vec<GeneratedArtifact>, CompileError> {
        expect_kind(spec, EntityKind::Satellite)?;

        let names = SatelliteNames {
            hash_key: ctx.naming.hash_key_name(spec).map_err(derived_name(spec))?,
            business_keys: ctx
                .naming
                .business_key_names(spec)
                .map_err(derived_name(spec))?,
            merge_key: Ident::trusted(MERGE_KEY),
        };

        let mut generated = vec![&names.hash_key, &names.merge_key];
        generated.extend(names.business_keys.iter());
        ctx.check_reserved(spec, &generated)?;

        let mut artifacts = vec![base_artifact(spec, ctx, &names)?];
        if ctx.config.emit_scd2 {
            artifacts.push(merge_artifact(spec, ctx, &names)?);
        }

        debug!(
            entity = %spec.name(),
            count = artifacts.len(),
            scd2 = ctx.config.emit_scd2,
            "generated satellite"
        );
        Ok(artifacts)
    }
}

/// Projection shared by the base artifact and the merge's staged snapshot.
fn snapshot_items(spec: &EntitySpec, ctx: &GeneratorContext, names: &SatelliteNames) -> Vec<SelectItem> {
    let columns = &ctx.config.columns;
    let keys = spec.business_key().as_slice();
    let fields = spec.descriptive_fields().as_slice();

    let mut items = vec![SelectItem::aliased(
        ctx.hasher.digest_expr(keys, None),
        names.hash_key.clone(),
    )];
    for (field, alias) in keys.iter().zip(&names.business_keys) {
        items.push(SelectItem::aliased(Expr::column(field), alias.clone()));
    }
    items.extend(fields.iter().map(|f| SelectItem::expr(Expr::column(f))));
    items.push(SelectItem::aliased(
        ctx.hasher.digest_expr(fields, None),
        columns.hash_diff.clone(),
    ));
    items.push(SelectItem::aliased(ctx.load_expr(), columns.load_dts.clone()));
    items.push(SelectItem::aliased(
        ctx.record_source(spec),
        columns.record_source.clone(),
    ));
    items
}

fn base_artifact(
    spec: &EntitySpec,
    ctx: &GeneratorContext,
    names: &SatelliteNames,
) -> Result<GeneratedArtifact, CompileError> {
    let columns = &ctx.config.columns;
    let keys = spec.business_key().as_slice();
    let fields = spec.descriptive_fields().as_slice();

    let select = Select::new(FromClause::table(spec.source_table().clone(), None))
        .items(snapshot_items(spec, ctx, names));

    let mut docs = IndexMap::new();
    docs.insert(
        names.hash_key.to_string(),
        format!("Hash key over {}", field_list(keys)),
    );
    for (field, alias) in keys.iter().zip(&names.business_keys) {
        docs.insert(alias.to_string(), format!("Business key {field}"));
    }
    for field in fields {
        docs.insert(field.to_string(), "Descriptive attribute".to_string());
    }
    docs.insert(
        columns.hash_diff.to_string(),
        format!("Hash diff over {}", field_list(fields)),
    );
    docs.insert(columns.load_dts.to_string(), "Load time".to_string());
    docs.insert(columns.record_source.to_string(), "Source system".to_string());

    let mut header = ctx.header(
        spec,
        ArtifactKind::Table,
        &names.business_keys,
        format!(
            "Snapshot of {} for satellite {}, loaded from {}",
            field_list(fields),
            spec.name(),
            spec.source_table()
        ),
        docs,
    );
    header.tags.push("base".to_string());

    Ok(GeneratedArtifact {
        target_name: ctx.artifact_name(spec, ArtifactRole::SatelliteBase)?,
        kind: ArtifactKind::Table,
        entity: spec.name().clone(),
        entity_kind: EntityKind::Satellite,
        role: ArtifactRole::SatelliteBase,
        header,
        body: Query::Select(select).to_sql(ctx.dialect.as_ref()),
    })
}

fn merge_artifact(
    spec: &EntitySpec,
    ctx: &GeneratorContext,
    names: &SatelliteNames,
) -> Result<GeneratedArtifact, CompileError> {
    let columns = &ctx.config.columns;
    let fields = spec.descriptive_fields().as_slice();
    let target_table = ctx.vault_table(spec.name());

    let staged = Ident::trusted(STAGED);
    let target = Ident::trusted(TARGET);
    let source = Ident::trusted(SOURCE);
    let current = Ident::trusted(CURRENT_VERSION);

    // One row per key: with two versions of a new key in the snapshot both
    // would reach the insert branch.
    let staged_select = Select::new(FromClause::table(spec.source_table().clone(), None))
        .first_per(
            vec![ctx.hasher.digest_expr(spec.business_key(), None)],
            vec![ctx.hasher.digest_expr(fields, None)],
        )
        .items(snapshot_items(spec, ctx, names));

    // Keyed copy: closes a changed current row, or inserts a first version.
    let keyed = Select::new(FromClause::cte(staged.clone()))
        .item(SelectItem::aliased(
            Expr::qualified(Some(&staged), &names.hash_key),
            names.merge_key.clone(),
        ))
        .item(SelectItem::Wildcard(Some(staged.clone())));

    // Unkeyed copy of changed rows: never matches, so it inserts the new version.
    let changed = Select::new(FromClause::cte(staged.clone()).inner_join(
        Relation::Table(target_table.clone()),
        current.clone(),
        Expr::and(vec![
            Expr::qualified(Some(&current), &names.hash_key)
                .equals(Expr::qualified(Some(&staged), &names.hash_key)),
            Expr::qualified(Some(&current), &columns.is_current).equals(Expr::Bool(true)),
        ]),
    ))
    .item(SelectItem::aliased(Expr::Null, names.merge_key.clone()))
    .item(SelectItem::Wildcard(Some(staged.clone())))
    .filter(
        ctx.hasher
            .digest_expr(fields, Some(&current))
            .not_equals(Expr::qualified(Some(&staged), &columns.hash_diff)),
    );

    let source_query = Query::with(
        vec![Cte {
            name: staged.clone(),
            query: Query::Select(staged_select),
        }],
        Query::UnionAll(vec![keyed, changed]),
    );

    let from_source = |column: &Ident| Expr::qualified(Some(&source), column);

    let mut insert = vec![Assignment::new(
        names.hash_key.clone(),
        from_source(&names.hash_key),
    )];
    for alias in &names.business_keys {
        insert.push(Assignment::new(alias.clone(), from_source(alias)));
    }
    for field in fields {
        insert.push(Assignment::new(field.clone(), from_source(field)));
    }
    for column in [&columns.hash_diff, &columns.load_dts, &columns.record_source] {
        insert.push(Assignment::new(column.clone(), from_source(column)));
    }
    insert.push(Assignment::new(columns.is_current.clone(), Expr::Bool(true)));
    insert.push(Assignment::new(
        columns.effective_start_date.clone(),
        from_source(&columns.load_dts),
    ));
    insert.push(Assignment::new(columns.effective_end_date.clone(), Expr::Null));

    let merge = Merge {
        target: target_table.clone(),
        target_alias: target.clone(),
        source: source_query,
        source_alias: source.clone(),
        on: Expr::and(vec![
            Expr::qualified(Some(&target), &names.hash_key)
                .equals(from_source(&names.merge_key)),
            Expr::qualified(Some(&target), &columns.is_current).equals(Expr::Bool(true)),
        ]),
        clauses: vec![
            MergeClause::MatchedUpdate {
                condition: Some(
                    ctx.hasher
                        .digest_expr(fields, Some(&target))
                        .not_equals(from_source(&columns.hash_diff)),
                ),
                assignments: vec![
                    Assignment::new(columns.is_current.clone(), Expr::Bool(false)),
                    Assignment::new(
                        columns.effective_end_date.clone(),
                        from_source(&columns.load_dts),
                    ),
                ],
            },
            MergeClause::NotMatchedInsert { values: insert },
        ],
    };

    let mut header = ctx.header(
        spec,
        ArtifactKind::Operation,
        &[],
        format!(
            "SCD2 merge of {} into {}; run at most one merge per target at a time",
            spec.source_table(),
            target_table
        ),
        IndexMap::new(),
    );
    header.tags.push("scd2".to_string());

    Ok(GeneratedArtifact {
        target_name: ctx.artifact_name(spec, ArtifactRole::SatelliteMerge)?,
        kind: ArtifactKind::Operation,
        entity: spec.name().clone(),
        entity_kind: EntityKind::Satellite,
        role: ArtifactRole::SatelliteMerge,
        header,
        body: merge.to_sql(ctx.dialect.as_ref()),
    })
}
