//! End-to-end compile run: ingest metadata, guard, generate, persist.

use crate::config::CompilerConfig;
use crate::error::{RejectionReport, SpecViolation};
use crate::generator::Dispatcher;
use crate::guards::output_overlap::claim_artifact_names;
use crate::guards::{CompileContext, GuardKernel, GuardResults, input_hash};
use crate::metadata::{MetadataSource, ingest, open_source};
use crate::model::GeneratedArtifact;
use crate::receipt::{CompileReceipt, RECEIPT_FILE};
use crate::sink::{ArtifactSink, FileSink, MemorySink, SinkReport};
use anyhow::{Context, Result, bail};
use tracing::{info, info_span, warn};

#[derive(Debug)]
pub struct CompileSummary {
    /// Every artifact persisted, in entity order.
    pub artifacts: Vec<GeneratedArtifact>,
    pub rejections: RejectionReport,
    pub guards: GuardResults,
    pub receipt: CompileReceipt,
    pub sink: SinkReport,
}

impl CompileSummary {
    pub fn artifact_names(&self) -> Vec<&str> {
        self.artifacts.iter().map(|a| a.target_name.as_str()).collect()
    }

    /// Nothing was rejected.
    pub fn is_clean(&self) -> bool {
        self.rejections.is_empty()
    }
}

/// Compiles every row of `source` into `sink`.
///
/// Invalid entities, including later claimants of an artifact name, are
/// rejected individually and reported in the summary; the rest are still
/// generated. A failing guard aborts before anything is persisted.
pub fn compile(
    config: &CompilerConfig,
    source: &dyn MetadataSource,
    sink: &mut dyn ArtifactSink,
) -> Result<CompileSummary> {
    let span = info_span!("compile", source = %source.describe());
    let _enter = span.enter();

    let rows = source
        .rows()
        .with_context(|| format!("failed to read metadata from {}", source.describe()))?;
    let mut ingested = ingest(&rows, config.list_separator);
    info!(
        rows = rows.len(),
        accepted = ingested.specs.len(),
        rejected = ingested.rejections.len(),
        "metadata ingested"
    );

    let guards = GuardKernel::default_suite()
        .evaluate(&CompileContext::new(&ingested.specs, &config.generation));
    for warning in guards.warnings() {
        warn!(guard = %warning.guard_name, remediation = %warning.remediation, "{}", warning.diagnostic);
    }
    if !guards.all_passed() {
        bail!("{}", guards.remediation_summary());
    }

    // Later claimants of an artifact name are rejected one by one.
    let claims = claim_artifact_names(&ingested.specs, &config.generation);
    for overlap in claims.overlaps.iter().rev() {
        let error = ingested.specs[overlap.index].reject(SpecViolation::ArtifactNameTaken {
            name: overlap.name.to_string(),
            owner: overlap.owner.to_string(),
        });
        ingested.reject(overlap.index, &error);
    }

    let dispatcher = Dispatcher::new(config.generation.clone());
    let outcome = if config.parallel {
        dispatcher.dispatch_parallel(&ingested.specs)
    } else {
        dispatcher.dispatch(&ingested.specs)
    };

    let mut rejections = RejectionReport::default();
    rejections.extend(ingested.rejections.iter().cloned());
    rejections.extend(outcome.rejections.into_iter().map(|mut rejection| {
        rejection.row = rejection.row.or_else(|| ingested.row_of(&rejection.entity));
        rejection
    }));

    for artifact in &outcome.artifacts {
        sink.persist(artifact)?;
    }
    let sink_report = sink.finish()?;

    let receipt = CompileReceipt::new(
        input_hash(&ingested.specs)?,
        config.generation.fingerprint()?,
        &outcome.artifacts,
    );

    info!(
        artifacts = outcome.artifacts.len(),
        rejected = rejections.len(),
        receipt = %receipt.receipt_id,
        "compile finished"
    );

    Ok(CompileSummary {
        artifacts: outcome.artifacts,
        rejections,
        guards,
        receipt,
        sink: sink_report,
    })
}

/// Runs [`compile`] from the configured metadata file into the output
/// directory, or into memory for a dry run.
pub fn run(config: &CompilerConfig) -> Result<CompileSummary> {
    config.ensure_metadata_path()?;
    let source = open_source(&config.metadata_path)?;

    if config.dry_run {
        let mut sink = MemorySink::new();
        return compile(config, source.as_ref(), &mut sink);
    }

    let mut sink = FileSink::new(&config.output_dir, config.output_format)?
        .with_prune_stale(config.prune_stale);
    let summary = compile(config, source.as_ref(), &mut sink)?;

    if config.write_receipt {
        let path = config.output_dir.join(RECEIPT_FILE);
        summary.receipt.save(&path)?;
        info!(path = ?path, "receipt written");
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::metadata::{ListCell, MetadataRow};

    fn row(name: &str, kind: &str, keys: &str, fields: &str) -> MetadataRow {
        MetadataRow {
            table_name: name.into(),
            table_type: kind.into(),
            business_key: ListCell::Joined(keys.into()),
            descriptive_fields: ListCell::Joined(fields.into()),
            source_table: "stg.src".into(),
        }
    }

    #[test]
    fn rejections_do_not_stop_the_run() {
        let rows = vec![
            row("customer", "hub", "customer_id", ""),
            row("broken", "link", "customer_id", ""),
            row("load_hub", "hub", "load_dts", ""),
            row("customer_details", "satellite", "customer_id", "email"),
        ];
        let config = CompilerConfig::new("unused.csv", "out");
        let mut sink = MemorySink::new();
        let summary = compile(&config, &rows, &mut sink).unwrap();

        assert_eq!(
            summary.artifact_names(),
            ["customer", "customer_details_base", "customer_details_merge"]
        );
        assert_eq!(sink.artifacts.len(), 3);
        assert_eq!(summary.rejections.count_by_code(ErrorCode::InvalidSpec), 2);
        let rows: Vec<Option<usize>> = summary.rejections.iter().map(|r| r.row).collect();
        assert_eq!(rows, [Some(2), Some(3)]);
        assert!(summary.receipt.verify());
    }

    #[test]
    fn overlapping_artifact_names_reject_the_later_entity() {
        let rows = vec![
            row("customer", "satellite", "customer_id", "email"),
            row("customer_base", "hub", "customer_id", ""),
            row("broken", "link", "customer_id", ""),
            row("product", "hub", "product_id", ""),
        ];
        let config = CompilerConfig::new("unused.csv", "out");
        let mut sink = MemorySink::new();
        let summary = compile(&config, &rows, &mut sink).unwrap();

        assert_eq!(
            summary.artifact_names(),
            ["customer_base", "customer_merge", "product"]
        );
        let rejected: Vec<(Option<usize>, &str)> = summary
            .rejections
            .iter()
            .map(|r| (r.row, r.entity.as_str()))
            .collect();
        assert_eq!(rejected, [(Some(2), "customer_base"), (Some(3), "broken")]);
        assert!(summary.rejections.rejections[0].message.contains("already produced by entity 'customer'"));
        assert!(!summary.guards.warnings().is_empty());
    }

    #[test]
    fn failing_guard_aborts_before_persisting() {
        let rows = vec![row("customer", "hub", "customer_id", "")];
        let mut config = CompilerConfig::new("unused.csv", "out");
        config.generation.key_encoding = crate::hashing::KeyEncoding::Delimited {
            separator: String::new(),
        };
        let mut sink = MemorySink::new();
        let err = compile(&config, &rows, &mut sink).unwrap_err();
        assert!(err.to_string().contains("Key Delimiter"));
        assert!(sink.artifacts.is_empty());
    }
}
