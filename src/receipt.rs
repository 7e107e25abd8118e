//! Provenance record for a compile run.

use crate::hashing::hex_sha256;
use crate::model::{ArtifactKind, GeneratedArtifact};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;

pub const RECEIPT_FILE: &str = "compile_receipt.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactDigest {
    pub name: String,
    pub kind: ArtifactKind,
    pub body_hash: String,
}

impl From<&GeneratedArtifact> for ArtifactDigest {
    fn from(artifact: &GeneratedArtifact) -> Self {
        Self {
            name: artifact.target_name.to_string(),
            kind: artifact.kind,
            body_hash: hex_sha256(artifact.body.as_bytes()),
        }
    }
}

/// Ties generated SQL to the metadata and configuration it came from. Two
/// runs over the same inputs produce the same `receipt_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileReceipt {
    pub receipt_id: String,
    pub input_hash: String,
    pub config_hash: String,
    pub artifacts: Vec<ArtifactDigest>,
    pub tool_version: String,
    pub generated_at: DateTime<Utc>,
}

impl CompileReceipt {
    pub fn new(input_hash: String, config_hash: String, artifacts: &[GeneratedArtifact]) -> Self {
        let artifacts: Vec<ArtifactDigest> = artifacts.iter().map(ArtifactDigest::from).collect();
        let receipt_id = Self::generate_receipt_id(&input_hash, &config_hash, &artifacts);
        Self {
            receipt_id,
            input_hash,
            config_hash,
            artifacts,
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now(),
        }
    }

    fn generate_receipt_id(input_hash: &str, config_hash: &str, artifacts: &[ArtifactDigest]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(input_hash.as_bytes());
        hasher.update(b"\n");
        hasher.update(config_hash.as_bytes());
        for artifact in artifacts {
            hasher.update(b"\n");
            hasher.update(artifact.name.as_bytes());
            hasher.update(b"=");
            hasher.update(artifact.body_hash.as_bytes());
        }
        format!("{:x}", hasher.finalize())
    }

    /// True when `receipt_id` matches the recorded hashes.
    pub fn verify(&self) -> bool {
        self.receipt_id
            == Self::generate_receipt_id(&self.input_hash, &self.config_hash, &self.artifacts)
    }

    /// True when `artifacts` hash to exactly what this receipt recorded.
    pub fn matches(&self, artifacts: &[GeneratedArtifact]) -> bool {
        self.artifacts.len() == artifacts.len()
            && self
                .artifacts
                .iter()
                .zip(artifacts)
                .all(|(recorded, artifact)| *recorded == ArtifactDigest::from(artifact))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).with_context(|| format!("failed to write receipt {:?}", path))?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("failed to read receipt {:?}", path))?;
        let receipt: CompileReceipt = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse receipt {:?}", path))?;
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::generator::{Generator, GeneratorContext, HubGenerator};
    use crate::model::EntitySpec;
    use tempfile::TempDir;

    fn artifacts() -> Vec<GeneratedArtifact> {
        let ctx = GeneratorContext::new(GenerationConfig::default());
        let spec = EntitySpec::parse("customer", "hub", &["customer_id"], &[], "stg.customer").unwrap();
        HubGenerator.generate(&spec, &ctx).unwrap()
    }

    #[test]
    fn receipt_id_is_deterministic() {
        let a = CompileReceipt::new("in".into(), "cfg".into(), &artifacts());
        let b = CompileReceipt::new("in".into(), "cfg".into(), &artifacts());
        assert_eq!(a.receipt_id, b.receipt_id);
        assert!(a.verify());
        assert!(a.matches(&artifacts()));

        let c = CompileReceipt::new("in".into(), "other".into(), &artifacts());
        assert_ne!(a.receipt_id, c.receipt_id);
    }

    #[test]
    fn tampering_fails_verification() {
        let mut receipt = CompileReceipt::new("in".into(), "cfg".into(), &artifacts());
        receipt.artifacts[0].body_hash = "0".repeat(64);
        assert!(!receipt.verify());
    }

    #[test]
    fn save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(RECEIPT_FILE);
        let receipt = CompileReceipt::new("in".into(), "cfg".into(), &artifacts());
        receipt.save(&path).unwrap();
        let loaded = CompileReceipt::load(&path).unwrap();
        assert_eq!(loaded.receipt_id, receipt.receipt_id);
        assert!(loaded.verify());
    }
}
