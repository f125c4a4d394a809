//! Reconcile CLI entrypoint.
//!
//! This is the main entrypoint for the reconcile command-line tool.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use bulk_reconcile::cli::{Cli, Commands, OutputFormat, OutputFormatter, RunArgs};
use bulk_reconcile::config::{ConfigParser, ConfigValidator, RunConfig, resolve_config_path};
use bulk_reconcile::error::Result;
use bulk_reconcile::filter::compare_groups;
use bulk_reconcile::runner::{RunPlan, export_outcomes, open_directory};

use clap::Parser;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code for errors that abort a run before it completes.
const FATAL_EXIT_CODE: u8 = 2;

/// Main entrypoint.
fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    init_logging(cli.verbose);

    // Run async runtime
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create async runtime: {e}");
            return ExitCode::from(FATAL_EXIT_CODE);
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(FATAL_EXIT_CODE)
        }
    }
}

/// Initializes the logging system.
fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Main async entry point.
async fn run(cli: Cli) -> Result<ExitCode> {
    let formatter = OutputFormatter::new(cli.output);

    match cli.command {
        Commands::Init { path, force } => cmd_init(&path, force).map(|()| ExitCode::SUCCESS),
        Commands::Validate { warnings } => {
            cmd_validate(cli.config.as_ref(), warnings, &formatter).map(|()| ExitCode::SUCCESS)
        }
        Commands::Plan { run } => cmd_plan(cli.config.as_ref(), &run, &formatter)
            .await
            .map(|()| ExitCode::SUCCESS),
        Commands::Apply { run, yes, csv } => {
            cmd_apply(cli.config.as_ref(), &run, yes, csv, cli.output, &formatter).await
        }
        Commands::Compare { left, right } => {
            cmd_compare(cli.config.as_ref(), &left, &right, &formatter)
                .await
                .map(|()| ExitCode::SUCCESS)
        }
    }
}

/// Write a template configuration.
fn cmd_init(path: &Path, force: bool) -> Result<()> {
    info!("Initializing reconcile configuration in: {}", path.display());

    let config_path = path.join("reconcile.yaml");
    let env_path = path.join(".env.example");

    if !force && config_path.exists() {
        eprintln!("Configuration file already exists: {}", config_path.display());
        eprintln!("Use --force to overwrite.");
        return Ok(());
    }

    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }

    std::fs::write(&config_path, include_str!("../templates/reconcile.yaml"))?;
    eprintln!("Created: {}", config_path.display());

    std::fs::write(&env_path, include_str!("../templates/env.example"))?;
    eprintln!("Created: {}", env_path.display());

    eprintln!("\nNext steps:");
    eprintln!("  1. Edit reconcile.yaml with your scope, filters and target");
    eprintln!("  2. Run 'reconcile validate' to check your configuration");
    eprintln!("  3. Run 'reconcile plan' to see what would change");
    eprintln!("  4. Run 'reconcile apply' to reconcile");

    Ok(())
}

/// Validate configuration.
fn cmd_validate(
    config_path: Option<&PathBuf>,
    show_warnings: bool,
    formatter: &OutputFormatter,
) -> Result<()> {
    let config_file = resolve_config_path(config_path.map(PathBuf::as_path))?;
    info!("Validating configuration: {}", config_file.display());

    let parser = ConfigParser::new().with_base_path(config_dir(&config_file));
    parser.load_dotenv()?;
    let config = parser.load_with_env(&config_file)?;

    let result = ConfigValidator::new().validate(&config)?;
    println!("{}", formatter.format_validation(&result, show_warnings));

    eprintln!("Configuration summary:");
    eprintln!("  Directory: {:?}", config.directory.backend);
    eprintln!("  Scope: {}", config.scope);
    eprintln!("  Filters: {}", config.to_predicates().len());
    eprintln!("  Action: {}", config.target.action);

    Ok(())
}

/// Show what a run would change.
async fn cmd_plan(
    config_path: Option<&PathBuf>,
    args: &RunArgs,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, base) = load_config(config_path, Some(args))?;
    let directory = open_directory(&config, &base).await?;
    let run = RunPlan::prepare(&config, directory.as_ref(), args.force).await?;

    println!("{}", formatter.format_plan(run.scope(), &run.changes()));
    Ok(())
}

/// Reconcile every matching entity.
async fn cmd_apply(
    config_path: Option<&PathBuf>,
    args: &RunArgs,
    auto_approve: bool,
    csv: Option<PathBuf>,
    format: OutputFormat,
    formatter: &OutputFormatter,
) -> Result<ExitCode> {
    let (config, base) = load_config(config_path, Some(args))?;
    let directory = open_directory(&config, &base).await?;
    let run = RunPlan::prepare(&config, directory.as_ref(), args.force).await?;

    if !auto_approve {
        let changes = run.changes();
        let pending = changes.iter().filter(|c| c.is_actionable()).count();

        if pending == 0 {
            eprintln!("No entity needs changes.");
        } else {
            if matches!(format, OutputFormat::Text) {
                eprintln!("{}", formatter.format_plan(run.scope(), &changes));
            }

            eprint!("Apply '{}' to {pending} entities? [y/N]: ", config.target.action);
            std::io::stderr().flush()?;

            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;

            if !input.trim().eq_ignore_ascii_case("y") {
                eprintln!("Apply cancelled.");
                return Ok(ExitCode::SUCCESS);
            }
        }
    }

    let report = run.apply(directory.as_ref()).await;

    for failure in report.failures() {
        warn!("{}: {}", failure.entity_id, failure.outcome);
    }
    println!("{}", formatter.format_report(&report));

    if let Some(csv_path) = csv.or_else(|| config.output.csv.clone()) {
        if export_outcomes(&report, &csv_path) {
            eprintln!("Wrote outcomes to {}", csv_path.display());
        }
    }

    Ok(ExitCode::from(report.exit_code()))
}

/// Compare the members of two groups.
async fn cmd_compare(
    config_path: Option<&PathBuf>,
    left: &str,
    right: &str,
    formatter: &OutputFormatter,
) -> Result<()> {
    let (config, base) = load_config(config_path, None)?;
    let directory = open_directory(&config, &base).await?;

    let comparison = compare_groups(directory.as_ref(), left, right).await?;
    println!("{}", formatter.format_comparison(&comparison));

    Ok(())
}

fn config_dir(config_file: &Path) -> PathBuf {
    config_file
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Loads, overrides and validates the configuration.
///
/// Returns the configuration and the directory it was loaded from.
fn load_config(
    config_path: Option<&PathBuf>,
    args: Option<&RunArgs>,
) -> Result<(RunConfig, PathBuf)> {
    let config_file = resolve_config_path(config_path.map(PathBuf::as_path))?;
    debug!("Loading configuration from: {}", config_file.display());

    let base = config_dir(&config_file);
    let parser = ConfigParser::new().with_base_path(&base);
    parser.load_dotenv()?;

    let mut config = parser.load_with_env(&config_file)?;
    if let Some(args) = args {
        args.apply_to(&mut config);
    }

    let result = ConfigValidator::new().validate(&config)?;
    for warning in &result.warnings {
        warn!("{warning}");
    }

    Ok((config, base))
}
