use clap::Parser;
use std::process::ExitCode;
use vault_sqlx::{CliArgs, CompilerConfig, LoggingConfig, init_logging, run, sink::render};

fn main() -> anyhow::Result<ExitCode> {
    let logging_config = LoggingConfig::from_env();
    let _guard = init_logging(logging_config)?;

    let cli = CliArgs::parse();
    let config = CompilerConfig::from_args(cli)?;

    let summary = run(&config)?;

    if config.dry_run {
        for artifact in &summary.artifacts {
            println!("{}", render(artifact, config.output_format));
        }
    }

    eprintln!(
        "{} artifact(s) generated, {} entit(ies) rejected, receipt {}",
        summary.artifacts.len(),
        summary.rejections.len(),
        summary.receipt.receipt_id
    );
    if !summary.is_clean() {
        eprint!("{}", summary.rejections);
    }
    for path in &summary.sink.stale {
        eprintln!("stale: {}", path.display());
    }

    if config.strict && !summary.is_clean() {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
