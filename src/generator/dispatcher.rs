use super::{Generator, GeneratorContext, HubGenerator, LinkGenerator, SatelliteGenerator};
use crate::config::GenerationConfig;
use crate::error::{CompileError, Rejection};
use crate::model::{EntityKind, EntitySpec, GeneratedArtifact};
use rayon::prelude::*;
use tracing::{debug, warn};

/// Artifacts of every accepted entity plus the rejected ones, both in input
/// order.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    pub artifacts: Vec<GeneratedArtifact>,
    pub rejections: Vec<Rejection>,
}

/// Routes each spec to the generator registered for its kind.
pub struct Dispatcher {
    ctx: GeneratorContext,
    generators: Vec<Box<dyn Generator>>,
}

impl Dispatcher {
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            ctx: GeneratorContext::new(config),
            generators: vec![
                Box::new(HubGenerator),
                Box::new(LinkGenerator),
                Box::new(SatelliteGenerator),
            ],
        }
    }

    pub fn context(&self) -> &GeneratorContext {
        &self.ctx
    }

    fn generator_for(&self, kind: EntityKind) -> Option<&dyn Generator> {
        self.generators
            .iter()
            .find(|g| g.kind() == kind)
            .map(|g| g.as_ref())
    }

    /// Generates every artifact of one entity, or none of them.
    pub fn generate(&self, spec: &EntitySpec) -> Result<Vec<GeneratedArtifact>, CompileError> {
        let generator =
            self.generator_for(spec.kind())
                .ok_or_else(|| CompileError::UnknownKind {
                    entity: spec.name().to_string(),
                    kind: spec.kind().to_string(),
                })?;
        generator.generate(spec, &self.ctx)
    }

    pub fn dispatch(&self, specs: &[EntitySpec]) -> DispatchOutcome {
        let results: Vec<_> = specs.iter().map(|spec| self.generate(spec)).collect();
        collect(specs, results)
    }

    /// Same output as [`dispatch`](Self::dispatch), generated on the rayon
    /// pool. Entities share no mutable state, so only collection order needs
    /// care, and `collect` on an indexed parallel iterator keeps it.
    pub fn dispatch_parallel(&self, specs: &[EntitySpec]) -> DispatchOutcome {
        let results: Vec<_> = specs.par_iter().map(|spec| self.generate(spec)).collect();
        collect(specs, results)
    }
}

fn collect(
    specs: &[EntitySpec],
    results: Vec<Result<Vec<GeneratedArtifact>, CompileError>>,
) -> DispatchOutcome {
    let mut outcome = DispatchOutcome::default();
    for (spec, result) in specs.iter().zip(results) {
        match result {
            Ok(artifacts) => {
                debug!(entity = %spec.name(), kind = %spec.kind(), count = artifacts.len(), "entity generated");
                outcome.artifacts.extend(artifacts);
            }
            Err(error) => {
                warn!(entity = %spec.name(), kind = %spec.kind(), error = %error, "entity rejected");
                outcome
                    .rejections
                    .push(Rejection::new(None, spec.name().as_str(), &error));
            }
        }
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    fn specs() -> Vec<EntitySpec> {
        vec![
            EntitySpec::parse("customer", "hub", &["customer_id"], &[], "stg.customer").unwrap(),
            EntitySpec::parse("load_dts_hub", "hub", &["load_dts"], &[], "stg.x").unwrap(),
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
                &["email", "status"],
                "stg.customer",
            )
            .unwrap(),
        ]
    }

    #[test]
    fn dispatch_routes_by_kind_and_keeps_order() {
        let dispatcher = Dispatcher::new(GenerationConfig::default());
        let outcome = dispatcher.dispatch(&specs());

        let names: Vec<&str> = outcome
            .artifacts
            .iter()
            .map(|a| a.target_name.as_str())
            .collect();
        assert_eq!(
            names,
            [
                "customer",
                "order_customer",
                "customer_details_base",
                "customer_details_merge"
            ]
        );
        assert_eq!(outcome.rejections.len(), 1);
        assert_eq!(outcome.rejections[0].entity, "load_dts_hub");
    }

    #[test]
    fn parallel_dispatch_matches_sequential() {
        let dispatcher = Dispatcher::new(GenerationConfig::default());
        let specs = specs();
        let sequential = dispatcher.dispatch(&specs);
        let parallel = dispatcher.dispatch_parallel(&specs);
        assert_eq!(sequential.artifacts, parallel.artifacts);
        assert_eq!(sequential.rejections, parallel.rejections);
    }
}
