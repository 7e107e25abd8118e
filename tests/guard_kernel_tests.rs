//! Guard kernel over realistic spec sets.

use vault_sqlx::config::{CompilerConfig, GenerationConfig};
use vault_sqlx::guards::{CompileContext, Guard, GuardKernel, GuardResult, Verdict};
use vault_sqlx::guards::{determinism, key_delimiter, output_overlap};
use vault_sqlx::metadata::{ListCell, MetadataRow};
use vault_sqlx::model::EntitySpec;
use vault_sqlx::sink::MemorySink;
use vault_sqlx::{ErrorCode, KeyEncoding, compile};

fn specs() -> Vec<EntitySpec> {
    vec![
        EntitySpec::parse("customer", "hub", &["customer_id"], &[], "stg.customer").unwrap(),
        EntitySpec::parse(
            "order_customer",
            "link",
            &["customer_id", "order_id"],
            &[],
            "stg.orders",
        )
        .unwrap(),
        EntitySpec::parse(
            "customer_details",
            "satellite",
            &["customer_id"],
            &["email"],
            "stg.customer",
        )
        .unwrap(),
    ]
}

#[test]
fn default_suite_passes_a_clean_model() {
    let config = GenerationConfig::default();
    let specs = specs();
    let results = GuardKernel::default_suite().evaluate(&CompileContext::new(&specs, &config));

    assert!(results.all_passed());
    assert_eq!(results.warning_count(), 0);
    let determinism = results
        .results
        .iter()
        .find(|r| r.guard_name == determinism::GUARD_NAME)
        .unwrap();
    assert!(
        determinism
            .metadata
            .get("input_hash")
            .is_some_and(|h| h.len() == 64)
    );
}

#[test]
fn printable_delimiter_only_warns() {
    let config = GenerationConfig {
        key_encoding: KeyEncoding::Delimited {
            separator: "||".into(),
        },
        ..GenerationConfig::default()
    };
    let specs = specs();
    let results = GuardKernel::default_suite().evaluate(&CompileContext::new(&specs, &config));
    assert!(results.all_passed());
    let warnings = results.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].guard_name, key_delimiter::GUARD_NAME);
}

#[test]
fn overlapping_artifact_names_only_warn() {
    let mut specs = specs();
    specs.push(EntitySpec::parse("customer_details_base", "hub", &["id"], &[], "stg.x").unwrap());
    let config = GenerationConfig::default();
    let results = GuardKernel::default_suite().evaluate(&CompileContext::new(&specs, &config));

    assert!(results.all_passed());
    let warnings = results.warnings();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].guard_name, output_overlap::GUARD_NAME);
    assert!(warnings[0].diagnostic.contains("customer_details_base"));
}

struct AlwaysFail;

impl Guard for AlwaysFail {
    fn name(&self) -> &str {
        "Always Fail"
    }

    fn description(&self) -> &str {
        "fails every run"
    }

    fn check(&self, _ctx: &CompileContext<'_>) -> GuardResult {
        GuardResult::fail(self.name(), "nope", "remove the guard")
    }
}

#[test]
fn custom_kernels_compose() {
    let kernel = GuardKernel::new(vec![Box::new(AlwaysFail)]);
    let config = GenerationConfig::default();
    let results = kernel.evaluate(&CompileContext::new(&[], &config));
    assert_eq!(results.results[0].verdict, Verdict::Fail);
}

fn metadata_row(name: &str, kind: &str, fields: &str) -> MetadataRow {
    MetadataRow {
        table_name: name.into(),
        table_type: kind.into(),
        business_key: ListCell::Joined("customer_id".into()),
        descriptive_fields: ListCell::Joined(fields.into()),
        source_table: "stg.customer".into(),
    }
}

#[test]
fn guard_failure_stops_compile_before_sink() {
    let rows = vec![metadata_row("customer", "hub", "")];
    let mut config = CompilerConfig::new("metadata.csv", "out");
    config.generation.key_encoding = KeyEncoding::Delimited {
        separator: String::new(),
    };
    let mut sink = MemorySink::new();
    let err = compile(&config, &rows, &mut sink).unwrap_err();
    assert!(err.to_string().contains("1 guard(s) failed"));
    assert!(sink.artifacts.is_empty());
}

#[test]
fn artifact_name_collision_rejects_only_the_later_entity() {
    let rows = vec![
        metadata_row("customer", "satellite", "email"),
        metadata_row("customer_merge", "hub", ""),
        metadata_row("customer_hub", "hub", ""),
    ];
    let config = CompilerConfig::new("metadata.csv", "out");
    let mut sink = MemorySink::new();
    let summary = compile(&config, &rows, &mut sink).unwrap();

    let written: Vec<&str> = sink.artifacts.iter().map(|a| a.target_name.as_str()).collect();
    assert_eq!(written, ["customer_base", "customer_merge", "customer_hub"]);
    assert_eq!(summary.rejections.len(), 1);
    let rejection = summary.rejections.iter().next().unwrap();
    assert_eq!(rejection.row, Some(2));
    assert_eq!(rejection.entity, "customer_merge");
    assert_eq!(rejection.code, ErrorCode::InvalidSpec);
    // the merge artifact belongs to the satellite, not the rejected hub
    assert!(sink.artifacts[1].body.starts_with("MERGE INTO"));
}
