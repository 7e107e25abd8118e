//! Artifact names claimed by more than one entity, e.g. a Hub named
//! `customer_base` next to a Satellite named `customer`. Names are compared
//! case-insensitively since warehouses fold identifier case.
//!
//! The first entity to claim a name keeps it; every later claimant is
//! rejected on its own and the rest of the run carries on. The guard only
//! reports the overlaps ahead of generation.

use crate::config::GenerationConfig;
use crate::guards::{CompileContext, Guard, GuardResult};
use crate::model::{ArtifactRole, EntityKind, EntitySpec};
use crate::naming::NamingScheme;
use crate::sql::Ident;
use std::collections::HashMap;

pub const GUARD_NAME: &str = "Output Overlap";

/// A spec whose artifact name was already claimed by an earlier spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactOverlap {
    /// Position of the later spec in the input slice.
    pub index: usize,
    pub name: Ident,
    pub owner: Ident,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactClaims {
    /// Names kept by their first claimant.
    pub claimed: usize,
    /// In spec order, at most one per spec.
    pub overlaps: Vec<ArtifactOverlap>,
}

fn roles(kind: EntityKind, config: &GenerationConfig) -> &'static [ArtifactRole] {
    match kind {
        EntityKind::Hub | EntityKind::Link => &[ArtifactRole::Primary],
        EntityKind::Satellite if config.emit_scd2 => {
            &[ArtifactRole::SatelliteBase, ArtifactRole::SatelliteMerge]
        }
        EntityKind::Satellite => &[ArtifactRole::SatelliteBase],
    }
}

/// Assigns artifact names in spec order. A spec that loses any of its names
/// claims none of them.
pub fn claim_artifact_names(specs: &[EntitySpec], config: &GenerationConfig) -> ArtifactClaims {
    let naming = NamingScheme;
    let mut owners: HashMap<String, &Ident> = HashMap::new();
    let mut claims = ArtifactClaims::default();

    for (index, spec) in specs.iter().enumerate() {
        // Over-long names are rejected per entity by the generators.
        let names: Vec<Ident> = roles(spec.kind(), config)
            .iter()
            .filter_map(|&role| naming.artifact_name(spec, role).ok())
            .collect();

        let taken = names
            .iter()
            .find_map(|name| owners.get(&name.as_str().to_ascii_lowercase()).map(|owner| (name, *owner)));
        if let Some((name, owner)) = taken {
            claims.overlaps.push(ArtifactOverlap {
                index,
                name: name.clone(),
                owner: owner.clone(),
            });
            continue;
        }

        claims.claimed += names.len();
        for name in names {
            owners.insert(name.as_str().to_ascii_lowercase(), spec.name());
        }
    }
    claims
}

pub struct OutputOverlapGuard;

impl Guard for OutputOverlapGuard {
    fn name(&self) -> &str {
        GUARD_NAME
    }

    fn description(&self) -> &str {
        "Reports artifact names claimed by more than one entity"
    }

    fn check(&self, ctx: &CompileContext<'_>) -> GuardResult {
        let claims = claim_artifact_names(ctx.specs, ctx.config);

        if !claims.overlaps.is_empty() {
            let duplicates: Vec<String> = claims
                .overlaps
                .iter()
                .map(|o| format!("{} ({} and {})", o.name, o.owner, ctx.specs[o.index].name()))
                .collect();
            return GuardResult::warn(
                self.name(),
                format!("Duplicate artifact names detected: {}", duplicates.join(", ")),
                "The later entity is rejected; rename it so every artifact name is unique",
            )
            .with_metadata(vec![("rejected", claims.overlaps.len().to_string())]);
        }

        GuardResult::pass(
            self.name(),
            format!("No output conflicts: {} unique artifact names", claims.claimed),
        )
    }
}
