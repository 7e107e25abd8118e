use crate::hashing::{KeyEncoding, hex_sha256};
use crate::sql::{DialectKind, Ident};
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_SCHEMA: &str = "raw_vault";
const DEFAULT_OUTPUT_DIR: &str = "definitions";
const DEFAULT_LIST_SEPARATOR: char = '|';

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Dataform SQLX files with a `config {}` block.
    #[default]
    Sqlx,
    /// Plain SQL files with a comment header.
    Sql,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Sqlx => "sqlx",
            OutputFormat::Sql => "sql",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

/// Type of the load column captured at processing time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadPrecision {
    #[default]
    Timestamp,
    Date,
}

/// How Table artifacts are materialized.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Materialization {
    #[default]
    Table,
    Incremental,
}

/// Names of the columns the vault adds next to the declared fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultColumns {
    pub load_dts: Ident,
    pub record_source: Ident,
    pub hash_diff: Ident,
    pub is_current: Ident,
    pub effective_start_date: Ident,
    pub effective_end_date: Ident,
}

impl Default for VaultColumns {
    fn default() -> Self {
        Self {
            load_dts: Ident::trusted("load_dts"),
            record_source: Ident::trusted("record_source"),
            hash_diff: Ident::trusted("hash_diff"),
            is_current: Ident::trusted("is_current"),
            effective_start_date: Ident::trusted("effective_start_date"),
            effective_end_date: Ident::trusted("effective_end_date"),
        }
    }
}

impl VaultColumns {
    pub fn all(&self) -> [&Ident; 6] {
        [
            &self.load_dts,
            &self.record_source,
            &self.hash_diff,
            &self.is_current,
            &self.effective_start_date,
            &self.effective_end_date,
        ]
    }
}

/// Options that shape generated SQL. Every knob that used to be baked into
/// a template lives here and is passed explicitly to the generators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub schema_name: Ident,
    pub key_encoding: KeyEncoding,
    pub emit_scd2: bool,
    pub dialect: DialectKind,
    pub load_precision: LoadPrecision,
    pub materialization: Materialization,
    pub partition_by_load: bool,
    pub cluster_by_business_key: bool,
    /// Constant record source tag; defaults to the source table reference.
    pub record_source: Option<String>,
    pub columns: VaultColumns,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            schema_name: Ident::trusted(DEFAULT_SCHEMA),
            key_encoding: KeyEncoding::default(),
            emit_scd2: true,
            dialect: DialectKind::default(),
            load_precision: LoadPrecision::default(),
            materialization: Materialization::default(),
            partition_by_load: true,
            cluster_by_business_key: true,
            record_source: None,
            columns: VaultColumns::default(),
        }
    }
}

impl GenerationConfig {
    /// SHA-256 of the canonical JSON form; recorded in compile receipts.
    pub fn fingerprint(&self) -> Result<String> {
        let canonical = serde_json::to_vec(self).context("failed to serialize generation config")?;
        Ok(hex_sha256(&canonical))
    }

    pub fn validate(&self) -> Result<()> {
        if let KeyEncoding::Delimited { separator } = &self.key_encoding {
            anyhow::ensure!(
                !separator.is_empty(),
                "key delimiter cannot be empty; undelimited key concatenation collides across key boundaries"
            );
        }
        if let Some(source) = &self.record_source {
            anyhow::ensure!(!source.trim().is_empty(), "record source override cannot be blank");
        }

        let columns = self.columns.all();
        for (i, a) in columns.iter().enumerate() {
            for b in &columns[i + 1..] {
                anyhow::ensure!(
                    !a.eq_ignore_case(b),
                    "vault column name '{a}' is configured more than once"
                );
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct CompilerConfig {
    pub metadata_path: PathBuf,
    pub output_dir: PathBuf,
    pub generation: GenerationConfig,
    pub output_format: OutputFormat,
    /// Separator between list items inside one metadata cell.
    pub list_separator: char,
    pub parallel: bool,
    pub dry_run: bool,
    pub write_receipt: bool,
    pub prune_stale: bool,
    pub strict: bool,
}

impl CompilerConfig {
    pub fn new(metadata_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            metadata_path: metadata_path.into(),
            output_dir: output_dir.into(),
            generation: GenerationConfig::default(),
            output_format: OutputFormat::default(),
            list_separator: DEFAULT_LIST_SEPARATOR,
            parallel: false,
            dry_run: false,
            write_receipt: true,
            prune_stale: false,
            strict: false,
        }
    }

    pub fn from_args(args: CliArgs) -> Result<Self> {
        let CliArgs {
            config,
            metadata: cli_metadata,
            output_dir: cli_output_dir,
            schema: cli_schema,
            dialect: cli_dialect,
            key_delimiter: cli_key_delimiter,
            length_prefixed: cli_length_prefixed,
            no_scd2: cli_no_scd2,
            format: cli_format,
            list_separator: cli_list_separator,
            parallel: cli_parallel,
            dry_run: cli_dry_run,
            no_receipt: cli_no_receipt,
            prune_stale: cli_prune_stale,
            strict: cli_strict,
        } = args;

        let file_config = if let Some(path) = config.as_ref() {
            load_config_file(path)?
        } else {
            PartialConfig::default()
        };

        let PartialConfig {
            metadata: file_metadata,
            output_dir: file_output_dir,
            format: file_format,
            list_separator: file_list_separator,
            parallel: file_parallel,
            dry_run: file_dry_run,
            write_receipt: file_write_receipt,
            prune_stale: file_prune_stale,
            strict: file_strict,
            generation: file_generation,
        } = file_config;
        let file_generation = file_generation.unwrap_or_default();

        let metadata_path = cli_metadata
            .or(file_metadata)
            .context("no metadata file given (use --metadata or set `metadata` in the config file)")?;
        let output_dir = cli_output_dir
            .or(file_output_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

        let defaults = GenerationConfig::default();

        let schema_name = match cli_schema.or(file_generation.schema_name) {
            Some(name) => Ident::new(name.trim())
                .with_context(|| format!("invalid schema name {name:?}"))?,
            None => defaults.schema_name,
        };

        let key_encoding = if cli_length_prefixed {
            KeyEncoding::LengthPrefixed
        } else if let Some(raw) = cli_key_delimiter {
            KeyEncoding::Delimited {
                separator: unescape_separator(&raw)?,
            }
        } else {
            file_generation.key_encoding.unwrap_or(defaults.key_encoding)
        };

        let emit_scd2 = if cli_no_scd2 {
            false
        } else {
            file_generation.emit_scd2.unwrap_or(defaults.emit_scd2)
        };

        let generation = GenerationConfig {
            schema_name,
            key_encoding,
            emit_scd2,
            dialect: cli_dialect
                .or(file_generation.dialect)
                .unwrap_or(defaults.dialect),
            load_precision: file_generation
                .load_precision
                .unwrap_or(defaults.load_precision),
            materialization: file_generation
                .materialization
                .unwrap_or(defaults.materialization),
            partition_by_load: file_generation
                .partition_by_load
                .unwrap_or(defaults.partition_by_load),
            cluster_by_business_key: file_generation
                .cluster_by_business_key
                .unwrap_or(defaults.cluster_by_business_key),
            record_source: file_generation.record_source.or(defaults.record_source),
            columns: file_generation.columns.unwrap_or(defaults.columns),
        };

        let config = Self {
            metadata_path,
            output_dir,
            generation,
            output_format: cli_format.or(file_format).unwrap_or_default(),
            list_separator: cli_list_separator
                .or(file_list_separator)
                .unwrap_or(DEFAULT_LIST_SEPARATOR),
            parallel: cli_parallel || file_parallel.unwrap_or(false),
            dry_run: cli_dry_run || file_dry_run.unwrap_or(false),
            write_receipt: !cli_no_receipt && file_write_receipt.unwrap_or(true),
            prune_stale: cli_prune_stale || file_prune_stale.unwrap_or(false),
            strict: cli_strict || file_strict.unwrap_or(false),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.generation.validate()?;
        anyhow::ensure!(
            !(self.list_separator.is_alphanumeric() || self.list_separator == '_'),
            "list separator {:?} would split identifiers",
            self.list_separator
        );
        anyhow::ensure!(
            !self.list_separator.is_whitespace(),
            "list separator cannot be whitespace"
        );
        Ok(())
    }

    pub fn ensure_metadata_path(&self) -> Result<()> {
        anyhow::ensure!(
            self.metadata_path.exists(),
            "metadata file {:?} does not exist",
            self.metadata_path
        );
        anyhow::ensure!(
            self.metadata_path.is_file(),
            "metadata path {:?} is not a file",
            self.metadata_path
        );
        Ok(())
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "vault-sqlx",
    about = "Compile Data Vault entity metadata into hub, link and satellite SQL",
    version
)]
pub struct CliArgs {
    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (YAML, JSON or TOML)"
    )]
    pub config: Option<PathBuf>,

    #[arg(
        long,
        env = "VAULT_SQLX_METADATA",
        value_name = "FILE",
        help = "Entity metadata (CSV, JSON, YAML or TOML)"
    )]
    pub metadata: Option<PathBuf>,

    #[arg(
        long,
        env = "VAULT_SQLX_OUTPUT_DIR",
        value_name = "DIR",
        help = "Directory receiving generated files"
    )]
    pub output_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "VAULT_SQLX_SCHEMA",
        value_name = "NAME",
        help = "Target schema (dataset) for generated tables"
    )]
    pub schema: Option<String>,

    #[arg(
        long,
        env = "VAULT_SQLX_DIALECT",
        value_enum,
        value_name = "DIALECT",
        help = "Target SQL dialect"
    )]
    pub dialect: Option<DialectKind>,

    #[arg(
        long,
        env = "VAULT_SQLX_KEY_DELIMITER",
        value_name = "SEP",
        conflicts_with = "length_prefixed",
        help = "Delimiter between key parts; accepts \\t, \\xHH and \\\\ escapes"
    )]
    pub key_delimiter: Option<String>,

    #[arg(
        long,
        env = "VAULT_SQLX_LENGTH_PREFIXED",
        help = "Length-prefix each key part instead of joining with a delimiter"
    )]
    pub length_prefixed: bool,

    #[arg(
        long,
        env = "VAULT_SQLX_NO_SCD2",
        help = "Emit only the base artifact for satellites"
    )]
    pub no_scd2: bool,

    #[arg(
        long,
        env = "VAULT_SQLX_FORMAT",
        value_enum,
        value_name = "FORMAT",
        help = "Output file format"
    )]
    pub format: Option<OutputFormat>,

    #[arg(
        long,
        env = "VAULT_SQLX_LIST_SEPARATOR",
        value_name = "CHAR",
        help = "Separator between list items in a metadata cell"
    )]
    pub list_separator: Option<char>,

    #[arg(
        long,
        env = "VAULT_SQLX_PARALLEL",
        help = "Generate entities in parallel"
    )]
    pub parallel: bool,

    #[arg(long, help = "Compile and report without writing files")]
    pub dry_run: bool,

    #[arg(long, help = "Skip writing compile_receipt.json")]
    pub no_receipt: bool,

    #[arg(
        long,
        env = "VAULT_SQLX_PRUNE_STALE",
        help = "Delete generated files no longer produced by the metadata"
    )]
    pub prune_stale: bool,

    #[arg(
        long,
        env = "VAULT_SQLX_STRICT",
        help = "Exit with an error when any entity is rejected"
    )]
    pub strict: bool,
}

#[derive(Debug, Default, Deserialize)]
struct PartialGenerationConfig {
    schema_name: Option<String>,
    key_encoding: Option<KeyEncoding>,
    emit_scd2: Option<bool>,
    dialect: Option<DialectKind>,
    load_precision: Option<LoadPrecision>,
    materialization: Option<Materialization>,
    partition_by_load: Option<bool>,
    cluster_by_business_key: Option<bool>,
    record_source: Option<String>,
    columns: Option<VaultColumns>,
}

#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    metadata: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    format: Option<OutputFormat>,
    list_separator: Option<char>,
    parallel: Option<bool>,
    dry_run: Option<bool>,
    write_receipt: Option<bool>,
    prune_stale: Option<bool>,
    strict: Option<bool>,
    generation: Option<PartialGenerationConfig>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        "toml" => toml::from_str(&contents)
            .with_context(|| format!("failed to parse TOML config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}

/// Expands `\t`, `\xHH` and `\\` so control characters can be passed on a
/// command line.
fn unescape_separator(raw: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('x') => {
                let hex: String = chars.by_ref().take(2).collect();
                let code = u8::from_str_radix(&hex, 16)
                    .with_context(|| format!("invalid \\x escape in key delimiter {raw:?}"))?;
                out.push(char::from(code));
            }
            Some(other) => anyhow::bail!("unsupported escape \\{other} in key delimiter {raw:?}"),
            None => anyhow::bail!("dangling backslash in key delimiter {raw:?}"),
        }
    }
    anyhow::ensure!(!out.is_empty(), "key delimiter cannot be empty");
    Ok(out)
}
