//! Artifact persistence.

mod file;
mod render;

pub use file::{FileSink, MANIFEST_FILE};
pub use render::render;

use crate::model::GeneratedArtifact;
use anyhow::Result;
use std::path::PathBuf;

/// What a sink did over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkReport {
    pub written: Vec<PathBuf>,
    /// Files from an earlier run that this run no longer produces.
    pub stale: Vec<PathBuf>,
    pub pruned: Vec<PathBuf>,
}

pub trait ArtifactSink {
    fn persist(&mut self, artifact: &GeneratedArtifact) -> Result<()>;

    /// Called once after every artifact was persisted.
    fn finish(&mut self) -> Result<SinkReport> {
        Ok(SinkReport::default())
    }
}

/// Keeps artifacts in memory, in persist order.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub artifacts: Vec<GeneratedArtifact>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactSink for MemorySink {
    fn persist(&mut self, artifact: &GeneratedArtifact) -> Result<()> {
        self.artifacts.push(artifact.clone());
        Ok(())
    }
}
