use super::{ArtifactSink, SinkReport, render};
use crate::config::OutputFormat;
use crate::model::GeneratedArtifact;
use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Manifest of files written by the previous run, kept in the output
/// directory so stale files can be told apart from hand-written ones.
pub const MANIFEST_FILE: &str = ".vault-sqlx-manifest.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct Manifest {
    files: BTreeSet<PathBuf>,
}

/// Writes each artifact to `<output_dir>/<target>.<ext>` atomically.
#[derive(Debug)]
pub struct FileSink {
    output_dir: PathBuf,
    format: OutputFormat,
    prune_stale: bool,
    previous: BTreeSet<PathBuf>,
    written: Vec<PathBuf>,
}

impl FileSink {
    pub fn new(output_dir: impl Into<PathBuf>, format: OutputFormat) -> Result<Self> {
        let output_dir = output_dir.into();
        let manifest_path = output_dir.join(MANIFEST_FILE);
        let previous = if manifest_path.exists() {
            let content = fs::read_to_string(&manifest_path)
                .with_context(|| format!("failed to read {:?}", manifest_path))?;
            let manifest: Manifest = serde_json::from_str(&content)
                .with_context(|| format!("failed to parse {:?}", manifest_path))?;
            manifest.files
        } else {
            BTreeSet::new()
        };

        Ok(Self {
            output_dir,
            format,
            prune_stale: false,
            previous,
            written: Vec::new(),
        })
    }

    /// Delete stale files in [`finish`](ArtifactSink::finish).
    pub fn with_prune_stale(mut self, prune: bool) -> Self {
        self.prune_stale = prune;
        self
    }

    pub fn path_for(&self, artifact: &GeneratedArtifact) -> PathBuf {
        self.output_dir.join(format!(
            "{}.{}",
            artifact.target_name,
            self.format.extension()
        ))
    }

    /// Files recorded by the previous run that this run did not write.
    pub fn stale_files(&self) -> Result<Vec<PathBuf>> {
        let mut stale = Vec::new();
        if !self.output_dir.exists() {
            return Ok(stale);
        }
        let extension = self.format.extension();
        for entry in walkdir::WalkDir::new(&self.output_dir)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            let Some(name) = path.file_name() else {
                continue;
            };
            let relative = PathBuf::from(name);
            let is_generated_kind = path.extension().and_then(|s| s.to_str()) == Some(extension);
            if path.is_file()
                && is_generated_kind
                && self.previous.contains(&relative)
                && !self.written.iter().any(|w| w.file_name() == Some(name))
            {
                stale.push(path.to_path_buf());
            }
        }
        stale.sort();
        Ok(stale)
    }

    fn atomic_write(&self, path: &Path, content: &str) -> Result<()> {
        fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("failed to create output directory {:?}", self.output_dir))?;

        if path.exists() && fs::metadata(path)?.permissions().readonly() {
            return Err(anyhow!("file is read-only: {:?}", path));
        }

        let mut temp_file = NamedTempFile::new_in(&self.output_dir)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.flush()?;
        temp_file
            .persist(path)
            .map_err(|e| anyhow!("failed to persist {:?}: {}", path, e.error))?;
        Ok(())
    }

    /// Records this run's files plus stale files still on disk, so they keep
    /// being reported until pruned.
    fn save_manifest(&self, kept_stale: &[PathBuf]) -> Result<()> {
        let manifest = Manifest {
            files: self
                .written
                .iter()
                .chain(kept_stale)
                .filter_map(|p| p.file_name().map(PathBuf::from))
                .collect(),
        };
        let content = serde_json::to_string_pretty(&manifest)?;
        self.atomic_write(&self.output_dir.join(MANIFEST_FILE), &content)
    }
}

impl ArtifactSink for FileSink {
    fn persist(&mut self, artifact: &GeneratedArtifact) -> Result<()> {
        let path = self.path_for(artifact);
        let content = render(artifact, self.format);
        self.atomic_write(&path, &content)
            .with_context(|| format!("failed to write artifact {}", artifact.target_name))?;
        debug!(artifact = %artifact.target_name, path = ?path, "artifact written");
        self.written.push(path);
        Ok(())
    }

    fn finish(&mut self) -> Result<SinkReport> {
        let stale = self.stale_files()?;
        let mut pruned = Vec::new();
        if self.prune_stale {
            for path in &stale {
                match fs::remove_file(path) {
                    Ok(()) => pruned.push(path.clone()),
                    Err(e) => warn!("failed to remove stale file {:?}: {}", path, e),
                }
            }
        } else if !stale.is_empty() {
            warn!(count = stale.len(), "stale generated files left in place");
        }
        let kept_stale: Vec<PathBuf> = stale
            .iter()
            .filter(|path| !pruned.contains(*path))
            .cloned()
            .collect();
        self.save_manifest(&kept_stale)?;
        info!(written = self.written.len(), pruned = pruned.len(), "artifacts persisted");

        Ok(SinkReport {
            written: self.written.clone(),
            stale,
            pruned,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GenerationConfig;
    use crate::generator::{Generator, GeneratorContext, HubGenerator};
    use crate::model::EntitySpec;
    use tempfile::TempDir;

    fn hub(name: &str) -> GeneratedArtifact {
        let ctx = GeneratorContext::new(GenerationConfig::default());
        let spec = EntitySpec::parse(name, "hub", &["id"], &[], "stg.src").unwrap();
        HubGenerator.generate(&spec, &ctx).unwrap().remove(0)
    }

    #[test]
    fn writes_one_file_per_artifact() {
        let dir = TempDir::new().unwrap();
        let mut sink = FileSink::new(dir.path(), OutputFormat::Sqlx).unwrap();
        sink.persist(&hub("customer")).unwrap();
        let report = sink.finish().unwrap();

        let path = dir.path().join("customer.sqlx");
        assert_eq!(report.written, vec![path.clone()]);
        assert!(fs::read_to_string(&path).unwrap().starts_with("config {"));
        assert!(dir.path().join(MANIFEST_FILE).exists());
    }

    #[test]
    fn reports_and_prunes_stale_files() {
        let dir = TempDir::new().unwrap();
        let mut first = FileSink::new(dir.path(), OutputFormat::Sql).unwrap();
        first.persist(&hub("customer")).unwrap();
        first.persist(&hub("product")).unwrap();
        first.finish().unwrap();

        fs::write(dir.path().join("handwritten.sql"), "SELECT 1").unwrap();

        let mut second = FileSink::new(dir.path(), OutputFormat::Sql).unwrap();
        second.persist(&hub("customer")).unwrap();
        let report = second.finish().unwrap();
        assert_eq!(report.stale, vec![dir.path().join("product.sql")]);
        assert!(report.pruned.is_empty());
        assert!(dir.path().join("product.sql").exists());

        let mut third = FileSink::new(dir.path(), OutputFormat::Sql)
            .unwrap()
            .with_prune_stale(true);
        third.persist(&hub("customer")).unwrap();
        let report = third.finish().unwrap();
        assert_eq!(report.pruned, vec![dir.path().join("product.sql")]);
        assert!(!dir.path().join("product.sql").exists());

        assert!(dir.path().join("handwritten.sql").exists());
    }

    #[test]
    fn prune_removes_files_from_previous_run() {
        let dir = TempDir::new().unwrap();
        let mut first = FileSink::new(dir.path(), OutputFormat::Sql).unwrap();
        first.persist(&hub("customer")).unwrap();
        first.persist(&hub("product")).unwrap();
        first.finish().unwrap();

        let mut second = FileSink::new(dir.path(), OutputFormat::Sql)
            .unwrap()
            .with_prune_stale(true);
        second.persist(&hub("customer")).unwrap();
        let report = second.finish().unwrap();
        assert_eq!(report.pruned, vec![dir.path().join("product.sql")]);
        assert!(!dir.path().join("product.sql").exists());
    }
}
