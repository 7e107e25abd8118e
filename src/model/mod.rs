//! Entity metadata and generated artifacts.

pub mod artifact;
pub mod spec;

pub use artifact::{ArtifactHeader, ArtifactKind, ArtifactRole, GeneratedArtifact};
pub use spec::{EntityKind, EntitySpec, FieldList};
