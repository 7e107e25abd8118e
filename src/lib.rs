//! Compiles declarative Data Vault entity metadata into SQL build artifacts:
//! Hub and Link extracts, and Satellites with an SCD Type 2 merge.
//!
//! ```rust,ignore
//! use vault_sqlx::{CompilerConfig, run};
//!
//! let config = CompilerConfig::new("metadata.csv", "definitions");
//! let summary = run(&config)?;
//! for rejection in summary.rejections.iter() {
//!     eprintln!("{rejection}");
//! }
//! ```

pub mod compiler;
pub mod config;
pub mod error;
pub mod generator;
pub mod guards;
pub mod hashing;
pub mod logging;
pub mod metadata;
pub mod model;
pub mod naming;
pub mod receipt;
pub mod sink;
pub mod sql;

pub use compiler::{CompileSummary, compile, run};
pub use config::{CliArgs, CompilerConfig, GenerationConfig, OutputFormat};
pub use error::{CompileError, ErrorCode, Rejection, RejectionReport, SpecViolation};
pub use hashing::{HashProvider, KeyEncoding};
pub use logging::{LoggingConfig, init_logging};
pub use model::{EntityKind, EntitySpec, GeneratedArtifact};
