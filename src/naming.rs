//! Canonical names derived from an entity's declared keys.
//!
//! Every name is a pure function of the [`EntitySpec`]: the same spec always
//! yields the same hash key column, business key aliases and artifact names.

use crate::model::{ArtifactRole, EntitySpec};
use crate::sql::{Ident, IdentError};

pub const HASH_KEY_SUFFIX: &str = "hk";
pub const BUSINESS_KEY_SUFFIX: &str = "bk";

#[derive(Debug, Clone, Copy, Default)]
pub struct NamingScheme;

impl NamingScheme {
    /// Business key fields joined with `_`, in declared order.
    ///
    /// Degenerates to the sole field name for single-key entities.
    pub fn composite_key_label(&self, spec: &EntitySpec) -> Result<Ident, IdentError> {
        Ident::joined(spec.business_key())
    }

    /// `<composite_key_label>_hk`
    pub fn hash_key_name(&self, spec: &EntitySpec) -> Result<Ident, IdentError> {
        self.composite_key_label(spec)?.with_suffix(HASH_KEY_SUFFIX)
    }

    /// `<field>_bk`
    pub fn business_key_name(&self, field: &Ident) -> Result<Ident, IdentError> {
        field.with_suffix(BUSINESS_KEY_SUFFIX)
    }

    pub fn business_key_names(&self, spec: &EntitySpec) -> Result<Vec<Ident>, IdentError> {
        spec.business_key()
            .iter()
            .map(|field| self.business_key_name(field))
            .collect()
    }

    /// Hash key of the hub keyed by `field` alone: `<field>_hk`.
    ///
    /// Links project one of these per key field so they join to the hubs.
    pub fn hub_hash_key_name(&self, field: &Ident) -> Result<Ident, IdentError> {
        field.with_suffix(HASH_KEY_SUFFIX)
    }

    /// `<entity>`, `<entity>_base` or `<entity>_merge`.
    pub fn artifact_name(&self, spec: &EntitySpec, role: ArtifactRole) -> Result<Ident, IdentError> {
        match role.suffix() {
            None => Ok(spec.name().clone()),
            Some(suffix) => spec.name().with_suffix(suffix),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_key_names() {
        let spec = EntitySpec::parse("customer", "hub", &["customer_id"], &[], "stg.customer").unwrap();
        let naming = NamingScheme;
        assert_eq!(naming.composite_key_label(&spec).unwrap().as_str(), "customer_id");
        assert_eq!(naming.hash_key_name(&spec).unwrap().as_str(), "customer_id_hk");
        assert_eq!(
            naming.business_key_names(&spec).unwrap(),
            vec![Ident::new("customer_id_bk").unwrap()]
        );
        assert_eq!(
            naming.artifact_name(&spec, ArtifactRole::Primary).unwrap().as_str(),
            "customer"
        );
    }

    #[test]
    fn composite_key_names_follow_declared_order() {
        let spec = EntitySpec::parse(
            "order_customer",
            "link",
            &["order_id", "customer_id"],
            &[],
            "stg.orders",
        )
        .unwrap();
        let naming = NamingScheme;
        assert_eq!(
            naming.hash_key_name(&spec).unwrap().as_str(),
            "order_id_customer_id_hk"
        );
    }

    #[test]
    fn satellite_artifact_names() {
        let spec = EntitySpec::parse(
            "customer_details",
            "satellite",
            &["customer_id"],
            &["email"],
            "stg.customer",
        )
        .unwrap();
        let naming = NamingScheme;
        assert_eq!(
            naming.artifact_name(&spec, ArtifactRole::SatelliteBase).unwrap().as_str(),
            "customer_details_base"
        );
        assert_eq!(
            naming.artifact_name(&spec, ArtifactRole::SatelliteMerge).unwrap().as_str(),
            "customer_details_merge"
        );
    }
}
