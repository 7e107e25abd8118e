//! Guard kernel: checks that run over the whole validated spec set before
//! anything is generated.
//!
//! - **Key delimiter**: warns when the key separator may occur in data, fails
//!   when it is empty
//! - **Output overlap**: warns when two entities claim the same artifact
//!   name; the later one is rejected by the compiler
//! - **Determinism**: records the hash of the canonical inputs
//!
//! Any `Fail` verdict aborts the run before a file is written.

pub mod determinism;
pub mod key_delimiter;
pub mod output_overlap;

use crate::config::GenerationConfig;
use crate::model::EntitySpec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub use determinism::{DeterminismGuard, input_hash};
pub use key_delimiter::KeyDelimiterGuard;
pub use output_overlap::OutputOverlapGuard;

// =============================================================================
// Core Guard Trait
// =============================================================================

pub trait Guard: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn check(&self, ctx: &CompileContext<'_>) -> GuardResult;
}

/// What the guards see: the specs that survived ingestion and the
/// generation settings they will be compiled with.
#[derive(Debug, Clone, Copy)]
pub struct CompileContext<'a> {
    pub specs: &'a [EntitySpec],
    pub config: &'a GenerationConfig,
}

impl<'a> CompileContext<'a> {
    pub fn new(specs: &'a [EntitySpec], config: &'a GenerationConfig) -> Self {
        Self { specs, config }
    }
}

// =============================================================================
// Guard Result Types
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardResult {
    pub guard_name: String,
    pub verdict: Verdict,
    pub diagnostic: String,
    /// Empty on `Pass`.
    pub remediation: String,
    /// Hashes, counts and similar evidence.
    pub metadata: HashMap<String, String>,
}

impl GuardResult {
    pub fn pass(guard_name: impl Into<String>, diagnostic: impl Into<String>) -> Self {
        Self::with_verdict(Verdict::Pass, guard_name, diagnostic, String::new())
    }

    pub fn warn(
        guard_name: impl Into<String>,
        diagnostic: impl Into<String>,
        remediation: impl Into<String>,
    ) -> Self {
        Self::with_verdict(Verdict::Warn, guard_name, diagnostic, remediation)
    }

    pub fn fail(
        guard_name: impl Into<String>,
        diagnostic: impl Into<String>,
        remediation: impl Into<String>,
    ) -> Self {
        Self::with_verdict(Verdict::Fail, guard_name, diagnostic, remediation)
    }

    fn with_verdict(
        verdict: Verdict,
        guard_name: impl Into<String>,
        diagnostic: impl Into<String>,
        remediation: impl Into<String>,
    ) -> Self {
        Self {
            guard_name: guard_name.into(),
            verdict,
            diagnostic: diagnostic.into(),
            remediation: remediation.into(),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Vec<(&str, String)>) -> Self {
        self.metadata
            .extend(metadata.into_iter().map(|(k, v)| (k.to_string(), v)));
        self
    }

    pub fn is_pass(&self) -> bool {
        matches!(self.verdict, Verdict::Pass)
    }

    pub fn is_warn(&self) -> bool {
        matches!(self.verdict, Verdict::Warn)
    }

    pub fn is_fail(&self) -> bool {
        matches!(self.verdict, Verdict::Fail)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Pass,
    /// Generation proceeds; the finding is reported.
    Warn,
    Fail,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Pass => "pass",
            Verdict::Warn => "warn",
            Verdict::Fail => "fail",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Guard Kernel (Orchestrator)
// =============================================================================

pub struct GuardKernel {
    guards: Vec<Box<dyn Guard>>,
}

impl GuardKernel {
    pub fn new(guards: Vec<Box<dyn Guard>>) -> Self {
        Self { guards }
    }

    pub fn default_suite() -> Self {
        Self {
            guards: vec![
                Box::new(KeyDelimiterGuard),
                Box::new(OutputOverlapGuard),
                Box::new(DeterminismGuard),
            ],
        }
    }

    pub fn evaluate(&self, ctx: &CompileContext<'_>) -> GuardResults {
        let results = self.guards.iter().map(|g| g.check(ctx)).collect();
        GuardResults { results }
    }

    pub fn guard_count(&self) -> usize {
        self.guards.len()
    }
}

// =============================================================================
// Guard Results Collection
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardResults {
    pub results: Vec<GuardResult>,
}

impl GuardResults {
    /// No guard failed. Warnings do not count against this.
    pub fn all_passed(&self) -> bool {
        !self.results.iter().any(|r| r.is_fail())
    }

    pub fn failures(&self) -> Vec<&GuardResult> {
        self.results.iter().filter(|r| r.is_fail()).collect()
    }

    pub fn warnings(&self) -> Vec<&GuardResult> {
        self.results.iter().filter(|r| r.is_warn()).collect()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().len()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().len()
    }

    pub fn remediation_summary(&self) -> String {
        let failures = self.failures();
        if failures.is_empty() {
            return "All guards passed.".to_string();
        }

        let mut summary = format!("{} guard(s) failed:\n", failures.len());
        for (i, failure) in failures.iter().enumerate() {
            summary.push_str(&format!(
                "{}. {} - {}\n   Remediation: {}\n",
                i + 1,
                failure.guard_name,
                failure.diagnostic,
                failure.remediation
            ));
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_do_not_fail_the_run() {
        let results = GuardResults {
            results: vec![
                GuardResult::pass("a", "ok"),
                GuardResult::warn("b", "careful", "change it"),
            ],
        };
        assert!(results.all_passed());
        assert_eq!(results.warning_count(), 1);
        assert_eq!(results.failure_count(), 0);
        assert_eq!(results.remediation_summary(), "All guards passed.");
    }

    #[test]
    fn failures_are_summarized() {
        let results = GuardResults {
            results: vec![GuardResult::fail("b", "broken", "fix it")],
        };
        assert!(!results.all_passed());
        let summary = results.remediation_summary();
        assert!(summary.starts_with("1 guard(s) failed:\n1. b - broken\n"));
        assert!(summary.contains("Remediation: fix it"));
    }

    #[test]
    fn default_suite_runs_every_guard() {
        let config = GenerationConfig::default();
        let kernel = GuardKernel::default_suite();
        assert_eq!(kernel.guard_count(), 3);
        let results = kernel.evaluate(&CompileContext::new(&[], &config));
        assert_eq!(results.results.len(), 3);
        assert!(results.all_passed());
    }
}
