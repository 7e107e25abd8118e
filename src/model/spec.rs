//! Validated entity specifications.
//!
//! An [`EntitySpec`] can only be obtained through [`EntitySpec::new`] (or
//! [`EntitySpec::parse`] for raw strings), so generators receive specs whose
//! per-kind invariants already hold.

use crate::error::{CompileError, SpecViolation};
use crate::sql::{Ident, IdentError, TableRef};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum EntityKind {
    Hub,
    Link,
    #[serde(alias = "sat")]
    #[strum(to_string = "satellite", serialize = "sat")]
    Satellite,
}

impl EntityKind {
    /// Minimum number of business key fields for this kind.
    pub fn min_business_keys(self) -> usize {
        match self {
            EntityKind::Link => 2,
            EntityKind::Hub | EntityKind::Satellite => 1,
        }
    }

    pub fn takes_descriptive_fields(self) -> bool {
        matches!(self, EntityKind::Satellite)
    }
}

/// An ordered list of field names. Order is significant: it fixes digest
/// input order, and is never re-sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FieldList(Vec<Ident>);

impl FieldList {
    pub fn new(fields: Vec<Ident>) -> Self {
        Self(fields)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Ident> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Ident] {
        &self.0
    }

    pub fn contains(&self, field: &Ident) -> bool {
        self.0.iter().any(|f| f.eq_ignore_case(field))
    }
}

impl<'a> IntoIterator for &'a FieldList {
    type Item = &'a Ident;
    type IntoIter = std::slice::Iter<'a, Ident>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

/// One validated row of entity metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EntitySpec {
    name: Ident,
    kind: EntityKind,
    business_key: FieldList,
    descriptive_fields: FieldList,
    source_table: TableRef,
}

impl EntitySpec {
    pub fn new(
        name: Ident,
        kind: EntityKind,
        business_key: Vec<Ident>,
        descriptive_fields: Vec<Ident>,
        source_table: TableRef,
    ) -> Result<Self, CompileError> {
        let reject = |violation| CompileError::invalid_spec(name.as_str(), violation);

        let min = kind.min_business_keys();
        if business_key.len() < min {
            return Err(reject(SpecViolation::KeyCount {
                kind,
                min,
                actual: business_key.len(),
            }));
        }

        match (kind.takes_descriptive_fields(), descriptive_fields.is_empty()) {
            (true, true) => return Err(reject(SpecViolation::DescriptiveFieldsRequired)),
            (false, false) => return Err(reject(SpecViolation::DescriptiveFieldsNotAllowed(kind))),
            _ => {}
        }

        let mut seen: Vec<&Ident> = Vec::with_capacity(business_key.len() + descriptive_fields.len());
        for field in business_key.iter().chain(descriptive_fields.iter()) {
            if seen.iter().any(|s| s.eq_ignore_case(field)) {
                return Err(reject(SpecViolation::DuplicateField(field.to_string())));
            }
            seen.push(field);
        }

        Ok(Self {
            name,
            kind,
            business_key: FieldList::new(business_key),
            descriptive_fields: FieldList::new(descriptive_fields),
            source_table,
        })
    }

    /// Builds a spec from raw strings, validating identifiers and kind.
    pub fn parse(
        name: &str,
        kind: &str,
        business_key: &[&str],
        descriptive_fields: &[&str],
        source_table: &str,
    ) -> Result<Self, CompileError> {
        let entity = name.trim();
        let invalid = |field: &'static str| {
            move |source: IdentError| {
                CompileError::invalid_spec(entity, SpecViolation::InvalidIdentifier { field, source })
            }
        };

        if entity.is_empty() {
            return Err(CompileError::invalid_spec(
                entity,
                SpecViolation::MissingField("name"),
            ));
        }
        let name = Ident::new(entity).map_err(invalid("name"))?;

        let kind = kind.trim();
        if kind.is_empty() {
            return Err(CompileError::invalid_spec(
                entity,
                SpecViolation::MissingField("kind"),
            ));
        }
        let kind: EntityKind = kind.parse().map_err(|_| CompileError::UnknownKind {
            entity: entity.to_string(),
            kind: kind.to_string(),
        })?;

        let source_table = source_table.trim();
        if source_table.is_empty() {
            return Err(CompileError::invalid_spec(
                entity,
                SpecViolation::MissingField("source_table"),
            ));
        }
        let source_table = TableRef::parse(source_table).map_err(invalid("source_table"))?;

        let business_key = business_key
            .iter()
            .map(|f| Ident::new(f.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid("business_key"))?;
        let descriptive_fields = descriptive_fields
            .iter()
            .map(|f| Ident::new(f.trim()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(invalid("descriptive_fields"))?;

        Self::new(name, kind, business_key, descriptive_fields, source_table)
    }

    pub fn name(&self) -> &Ident {
        &self.name
    }

    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    pub fn business_key(&self) -> &FieldList {
        &self.business_key
    }

    pub fn descriptive_fields(&self) -> &FieldList {
        &self.descriptive_fields
    }

    pub fn source_table(&self) -> &TableRef {
        &self.source_table
    }

    /// Builds an `InvalidSpec` error for this entity.
    pub fn reject(&self, violation: SpecViolation) -> CompileError {
        CompileError::invalid_spec(self.name.as_str(), violation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn kind_parses_case_insensitively() {
        assert_eq!("HUB".parse::<EntityKind>().unwrap(), EntityKind::Hub);
        assert_eq!("Sat".parse::<EntityKind>().unwrap(), EntityKind::Satellite);
        assert_eq!(EntityKind::Satellite.to_string(), "satellite");
        assert!("bridge".parse::<EntityKind>().is_err());
    }

    #[test]
    fn link_needs_two_keys() {
        let err = EntitySpec::parse("order_customer", "link", &["customer_id"], &[], "stg.orders")
            .unwrap_err();
        assert_matches!(
            err,
            CompileError::InvalidSpec {
                violation: SpecViolation::KeyCount { min: 2, actual: 1, .. },
                ..
            }
        );
    }

    #[test]
    fn satellite_needs_descriptive_fields() {
        let err = EntitySpec::parse("customer_details", "satellite", &["customer_id"], &[], "stg.customer")
            .unwrap_err();
        assert_matches!(
            err,
            CompileError::InvalidSpec {
                violation: SpecViolation::DescriptiveFieldsRequired,
                ..
            }
        );
    }

    #[test]
    fn hub_rejects_descriptive_fields() {
        let err = EntitySpec::parse("customer", "hub", &["customer_id"], &["email"], "stg.customer")
            .unwrap_err();
        assert_matches!(
            err,
            CompileError::InvalidSpec {
                violation: SpecViolation::DescriptiveFieldsNotAllowed(EntityKind::Hub),
                ..
            }
        );
    }

    #[test]
    fn duplicate_fields_are_rejected_across_lists() {
        let err = EntitySpec::parse(
            "customer_details",
            "satellite",
            &["customer_id"],
            &["email", "CUSTOMER_ID"],
            "stg.customer",
        )
        .unwrap_err();
        assert_matches!(
            err,
            CompileError::InvalidSpec {
                violation: SpecViolation::DuplicateField(_),
                ..
            }
        );
    }

    #[test]
    fn unknown_and_missing_kind() {
        assert_matches!(
            EntitySpec::parse("x", "bridge", &["a"], &[], "s"),
            Err(CompileError::UnknownKind { .. })
        );
        assert_matches!(
            EntitySpec::parse("x", " ", &["a"], &[], "s"),
            Err(CompileError::InvalidSpec {
                violation: SpecViolation::MissingField("kind"),
                ..
            })
        );
    }

    #[test]
    fn field_order_is_preserved() {
        let spec = EntitySpec::parse(
            "order_customer",
            "link",
            &["order_id", "customer_id"],
            &[],
            "stg.orders",
        )
        .unwrap();
        let keys: Vec<&str> = spec.business_key().iter().map(Ident::as_str).collect();
        assert_eq!(keys, ["order_id", "customer_id"]);
    }
}
