use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::runtime::Runtime;

use rust_backup::cli::Args;
use rust_backup::cloud::S3Connector;
use rust_backup::config::BackupConfig;
use rust_backup::constants::ERROR_FAILED_TO_READ_SOURCE_ROOT;
use rust_backup::jobs::{discover_source_dirs, execute_run, object_key_for, JobOptions};
use rust_backup::logging::LogSinks;
use rust_backup::security::safe_error_message;
use rust_backup::{sink_fatal, sink_info, sink_warn};

fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.verbose)?;

    let config = load_config(&args)?;
    let sinks = Arc::new(LogSinks::open(&config.log_dir)?.with_secrets(config.secrets()));

    if let Err(err) = config.validate() {
        sink_fatal!(sinks, "Invalid configuration: {:#}", err);
        return Err(err);
    }

    let root = config
        .source_root
        .clone()
        .ok_or_else(|| anyhow!("No source root configured"))?;
    let sources = match discover_source_dirs(&root) {
        Ok(sources) => sources,
        Err(err) => {
            sink_fatal!(
                sinks,
                "{}. daemon_path: {}, error: {:#}",
                ERROR_FAILED_TO_READ_SOURCE_ROOT,
                root.display(),
                err
            );
            return Err(err);
        }
    };

    if args.dry_run {
        print_plan(&sources, &config);
        return Ok(());
    }

    info!("Starting backup of {} directories under {}", sources.len(), root.display());

    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
    let report = runtime.block_on(execute_run(
        sources,
        Arc::new(S3Connector::new(config.storage.clone())),
        JobOptions::from_config(&config),
        Arc::clone(&sinks),
    ));

    if let Some(path) = &config.summary_file {
        write_summary(&report, path, &sinks);
    }

    sinks.flush();
    Ok(())
}

/// Initialize the console logger
fn initialize_logging(verbose: bool) -> Result<()> {
    let log_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    TermLogger::init(
        log_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize logger")?;
    Ok(())
}

/// Load configuration from file and environment, then apply CLI overrides
fn load_config(args: &Args) -> Result<BackupConfig> {
    // Parser errors can quote the file, so only a scrubbed message leaves here
    let mut config = BackupConfig::load(args.config.as_deref())
        .map_err(|err| anyhow!(safe_error_message("Failed to load configuration", &format!("{:#}", err))))?;
    args.apply_to(&mut config);
    Ok(config)
}

fn print_plan(sources: &[PathBuf], config: &BackupConfig) {
    info!("Dry run: {} jobs would be started", sources.len());
    for source in sources {
        match object_key_for(source) {
            Ok(key) => info!(
                "  {} -> {}/{}/{} ({})",
                source.display(),
                config.storage.endpoint.trim_end_matches('/'),
                config.storage.bucket,
                key,
                config.acl()
            ),
            Err(err) => info!("  {} -> skipped: {}", source.display(), err),
        }
    }
}

fn write_summary(report: &rust_backup::models::RunReport, path: &Path, sinks: &LogSinks) {
    match report.write_json(path) {
        Ok(()) => sink_info!(sinks, "Run report written to {}", path.display()),
        Err(err) => sink_warn!(sinks, "Failed to write run report to {}: {:#}", path.display(), err),
    }
}
