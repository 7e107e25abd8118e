//! In-memory model of the satellite SCD2 merge.
//!
//! [`SatelliteTable::merge`] applies a snapshot with exactly the semantics of
//! the generated `MERGE` statement, including its one-row-per-key staging,
//! which makes the row state machine testable without a warehouse:
//!
//! ```text
//! absent  --first load-------------------------> current
//! current --attributes changed--> superseded  +  new current
//! current --attributes unchanged-------------> current (no write)
//! ```

use crate::error::CompileError;
use crate::hashing::HashProvider;
use crate::model::EntitySpec;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Scd2Error {
    #[error(transparent)]
    Hash(#[from] CompileError),

    #[error("snapshot row has {actual} {what} values, expected {expected}")]
    Arity {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("hash key {hash_key} has {count} current rows")]
    MultipleCurrent { hash_key: String, count: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Absent,
    Current,
    Superseded,
}

/// One row of a source snapshot: business key values then descriptive
/// attribute values, each in declared order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRow {
    pub business_key: Vec<Option<String>>,
    pub attributes: Vec<Option<String>>,
}

impl SourceRow {
    pub fn new<K, A>(business_key: K, attributes: A) -> Self
    where
        K: IntoIterator,
        K::Item: Into<Option<String>>,
        A: IntoIterator,
        A::Item: Into<Option<String>>,
    {
        Self {
            business_key: business_key.into_iter().map(Into::into).collect(),
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SatelliteRow {
    pub hash_key: String,
    pub business_key: Vec<Option<String>>,
    pub attributes: Vec<Option<String>>,
    pub hash_diff: String,
    pub load_dts: DateTime<Utc>,
    pub is_current: bool,
    pub effective_start_date: DateTime<Utc>,
    pub effective_end_date: Option<DateTime<Utc>>,
}

impl SatelliteRow {
    pub fn state(&self) -> RowState {
        if self.is_current {
            RowState::Current
        } else {
            RowState::Superseded
        }
    }
}

/// Writes performed by one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub inserted: usize,
    pub closed: usize,
    pub unchanged: usize,
}

impl MergeSummary {
    pub fn writes(&self) -> usize {
        self.inserted + self.closed
    }
}

/// Persisted satellite rows.
#[derive(Debug, Clone, Default)]
pub struct SatelliteTable {
    key_arity: usize,
    attribute_arity: usize,
    rows: Vec<SatelliteRow>,
}

enum Effect {
    Insert(SatelliteRow),
    Close(usize),
}

fn as_refs(values: &[Option<String>]) -> Vec<Option<&str>> {
    values.iter().map(Option::as_deref).collect()
}

impl SatelliteTable {
    pub fn new(key_arity: usize, attribute_arity: usize) -> Self {
        Self {
            key_arity,
            attribute_arity,
            rows: Vec::new(),
        }
    }

    pub fn for_spec(spec: &EntitySpec) -> Self {
        Self::new(spec.business_key().len(), spec.descriptive_fields().len())
    }

    pub fn rows(&self) -> &[SatelliteRow] {
        &self.rows
    }

    /// Applies `snapshot` at time `now`.
    ///
    /// The whole snapshot is validated before any row is touched, so a
    /// failed merge leaves the table unchanged.
    pub fn merge(
        &mut self,
        snapshot: &[SourceRow],
        hasher: &HashProvider,
        now: DateTime<Utc>,
    ) -> Result<MergeSummary, Scd2Error> {
        // One staged row per key: the smallest hash diff wins
        let mut staged: Vec<(String, String, &SourceRow)> = Vec::new();
        let mut positions: HashMap<String, usize> = HashMap::new();
        for row in snapshot {
            self.check_arity(row)?;
            let hash_key = hasher.digest(&as_refs(&row.business_key))?;
            let hash_diff = hasher.digest(&as_refs(&row.attributes))?;
            match positions.get(&hash_key) {
                Some(&index) => {
                    if hash_diff < staged[index].1 {
                        staged[index] = (hash_key, hash_diff, row);
                    }
                }
                None => {
                    positions.insert(hash_key.clone(), staged.len());
                    staged.push((hash_key, hash_diff, row));
                }
            }
        }

        let mut summary = MergeSummary::default();
        let mut effects = Vec::new();
        for (hash_key, hash_diff, row) in staged {
            let insert = |effects: &mut Vec<Effect>| {
                effects.push(Effect::Insert(SatelliteRow {
                    hash_key: hash_key.clone(),
                    business_key: row.business_key.clone(),
                    attributes: row.attributes.clone(),
                    hash_diff: hash_diff.clone(),
                    load_dts: now,
                    is_current: true,
                    effective_start_date: now,
                    effective_end_date: None,
                }));
            };

            match self.current_index(&hash_key) {
                None => {
                    insert(&mut effects);
                    summary.inserted += 1;
                }
                Some(index) => {
                    let current = &self.rows[index];
                    let current_diff = hasher.digest(&as_refs(&current.attributes))?;
                    if current_diff == hash_diff {
                        summary.unchanged += 1;
                    } else {
                        effects.push(Effect::Close(index));
                        insert(&mut effects);
                        summary.closed += 1;
                        summary.inserted += 1;
                    }
                }
            }
        }

        for effect in effects {
            match effect {
                Effect::Close(index) => {
                    let row = &mut self.rows[index];
                    row.is_current = false;
                    row.effective_end_date = Some(now);
                }
                Effect::Insert(row) => self.rows.push(row),
            }
        }
        Ok(summary)
    }

    /// State of the business key identified by `hash_key`: `Current` when it
    /// has a current version, `Absent` when it was never loaded.
    pub fn row_state(&self, hash_key: &str) -> RowState {
        if self.current_index(hash_key).is_some() {
            RowState::Current
        } else if self.rows.iter().any(|r| r.hash_key == hash_key) {
            RowState::Superseded
        } else {
            RowState::Absent
        }
    }

    pub fn current_row(&self, hash_key: &str) -> Option<&SatelliteRow> {
        self.current_index(hash_key).map(|i| &self.rows[i])
    }

    /// Every version of a key, oldest first.
    pub fn history(&self, hash_key: &str) -> Vec<&SatelliteRow> {
        self.rows.iter().filter(|r| r.hash_key == hash_key).collect()
    }

    /// Checks that no key has more than one current row.
    pub fn assert_single_current(&self) -> Result<(), Scd2Error> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for row in self.rows.iter().filter(|r| r.is_current) {
            *counts.entry(row.hash_key.as_str()).or_default() += 1;
        }
        match counts.into_iter().find(|(_, count)| *count > 1) {
            Some((hash_key, count)) => Err(Scd2Error::MultipleCurrent {
                hash_key: hash_key.to_string(),
                count,
            }),
            None => Ok(()),
        }
    }

    fn current_index(&self, hash_key: &str) -> Option<usize> {
        self.rows
            .iter()
            .position(|r| r.is_current && r.hash_key == hash_key)
    }

    fn check_arity(&self, row: &SourceRow) -> Result<(), Scd2Error> {
        if row.business_key.len() != self.key_arity {
            return Err(Scd2Error::Arity {
                what: "business key",
                expected: self.key_arity,
                actual: row.business_key.len(),
            });
        }
        if row.attributes.len() != self.attribute_arity {
            return Err(Scd2Error::Arity {
                what: "attribute",
                expected: self.attribute_arity,
                actual: row.attributes.len(),
            });
        }
        Ok(())
    }
}
