//! Satellite row state machine, exercised through the in-memory merge model.

use assert_matches::assert_matches;
use chrono::{DateTime, Duration, TimeZone, Utc};
use vault_sqlx::HashProvider;
use vault_sqlx::generator::scd2::{MergeSummary, RowState, SatelliteTable, Scd2Error, SourceRow};
use vault_sqlx::{CompileError, KeyEncoding};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 6, 0, 0).unwrap()
}

fn src(key: &str, email: &str, status: Option<&str>) -> SourceRow {
    SourceRow {
        business_key: vec![Some(key.to_string())],
        attributes: vec![Some(email.to_string()), status.map(str::to_string)],
    }
}

fn hk(hasher: &HashProvider, key: &str) -> String {
    hasher.digest(&[Some(key)]).unwrap()
}

#[test]
fn first_load_inserts_one_current_row() {
    let hasher = HashProvider::default();
    let mut table = SatelliteTable::new(1, 2);
    assert_eq!(table.row_state(&hk(&hasher, "C-1")), RowState::Absent);

    let summary = table
        .merge(&[src("C-1", "a@x.io", Some("active"))], &hasher, t0())
        .unwrap();

    assert_eq!(
        summary,
        MergeSummary {
            inserted: 1,
            closed: 0,
            unchanged: 0
        }
    );
    let current = table.current_row(&hk(&hasher, "C-1")).unwrap();
    assert!(current.is_current);
    assert_eq!(current.effective_start_date, t0());
    assert_eq!(current.effective_end_date, None);
    assert_eq!(current.load_dts, t0());
}

#[test]
fn identical_attributes_write_nothing() {
    let hasher = HashProvider::default();
    let mut table = SatelliteTable::new(1, 2);
    table
        .merge(&[src("C-1", "a@x.io", Some("active"))], &hasher, t0())
        .unwrap();
    let before = table.rows().to_vec();

    let summary = table
        .merge(
            &[src("C-1", "a@x.io", Some("active"))],
            &hasher,
            t0() + Duration::days(1),
        )
        .unwrap();

    assert_eq!(summary.writes(), 0);
    assert_eq!(summary.unchanged, 1);
    assert_eq!(table.rows(), before.as_slice());
}

#[test]
fn changed_attribute_supersedes_current_row() {
    let hasher = HashProvider::default();
    let mut table = SatelliteTable::new(1, 2);
    let t1 = t0() + Duration::hours(12);
    table
        .merge(&[src("C-1", "a@x.io", Some("active"))], &hasher, t0())
        .unwrap();
    table
        .merge(&[src("C-1", "a@x.io", None)], &hasher, t1)
        .unwrap();

    let history = table.history(&hk(&hasher, "C-1"));
    assert_eq!(history.len(), 2);
    assert!(!history[0].is_current);
    assert_eq!(history[0].effective_end_date, Some(t1));
    assert_eq!(history[1].attributes[1], None);
    assert_eq!(history[1].effective_start_date, t1);
    assert_eq!(table.row_state(&hk(&hasher, "C-1")), RowState::Current);
    table.assert_single_current().unwrap();
}

#[test]
fn keys_missing_from_snapshot_are_untouched() {
    let hasher = HashProvider::default();
    let mut table = SatelliteTable::new(1, 2);
    table
        .merge(
            &[src("C-1", "a@x.io", None), src("C-2", "b@x.io", None)],
            &hasher,
            t0(),
        )
        .unwrap();
    table
        .merge(&[src("C-1", "new@x.io", None)], &hasher, t0() + Duration::days(1))
        .unwrap();

    let c2 = table.current_row(&hk(&hasher, "C-2")).unwrap();
    assert_eq!(c2.effective_end_date, None);
    assert_eq!(table.history(&hk(&hasher, "C-2")).len(), 1);
}

#[test]
fn duplicate_snapshot_rows_stage_one_row_per_key() {
    let hasher = HashProvider::default();
    let mut table = SatelliteTable::new(1, 2);
    let summary = table
        .merge(
            &[src("C-1", "a@x.io", None), src("C-1", "a@x.io", None)],
            &hasher,
            t0(),
        )
        .unwrap();
    assert_eq!(summary.inserted, 1);

    // two versions of a new key: one current row, never two
    let summary = table
        .merge(
            &[
                src("C-2", "b@x.io", Some("active")),
                src("C-2", "b@x.io", Some("pending")),
            ],
            &hasher,
            t0(),
        )
        .unwrap();
    assert_eq!(summary.inserted, 1);
    assert_eq!(table.history(&hk(&hasher, "C-2")).len(), 1);
    table.assert_single_current().unwrap();

    // two versions of a known key: at most one close and one insert
    let summary = table
        .merge(
            &[src("C-1", "a@x.io", None), src("C-1", "z@x.io", None)],
            &hasher,
            t0() + Duration::days(1),
        )
        .unwrap();
    assert!(summary.inserted <= 1 && summary.closed == summary.inserted);
    table.assert_single_current().unwrap();
}

#[test]
fn separator_inside_key_is_an_error_not_a_mis_hash() {
    let hasher = HashProvider::new(KeyEncoding::Delimited {
        separator: "|".to_string(),
    });
    let mut table = SatelliteTable::new(1, 2);
    let result = table.merge(&[src("C|1", "a@x.io", None)], &hasher, t0());
    assert_matches!(
        result,
        Err(Scd2Error::Hash(CompileError::AmbiguousKeyDelimiter { .. }))
    );
    assert!(table.rows().is_empty());
}

#[test]
fn arity_mismatch_is_rejected() {
    let hasher = HashProvider::default();
    let mut table = SatelliteTable::new(2, 2);
    let result = table.merge(&[src("C-1", "a@x.io", None)], &hasher, t0());
    assert_matches!(
        result,
        Err(Scd2Error::Arity {
            what: "business key",
            expected: 2,
            actual: 1
        })
    );
}
