//! pg-oracle-migrate CLI - PostgreSQL to Oracle script generation and data
//! migration.

use clap::{Parser, Subcommand};
use pg_oracle_migrate::{
    generate_scripts, Config, MigrateError, MigrationOutcome, MigrationReport, MigrationService,
    ScriptRequest,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "pg-oracle-migrate")]
#[command(about = "PostgreSQL to Oracle schema translation and data migration")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate Oracle DDL and DCL from the source schema
    GenerateScripts {
        /// Oracle schema for generated objects [default: source schema]
        #[arg(long)]
        target_schema: Option<String>,

        /// Edit role name [default: derived from the schema]
        #[arg(long)]
        edit_role: Option<String>,

        /// View role name [default: derived from the schema]
        #[arg(long)]
        view_role: Option<String>,

        /// User granted the edit role (repeatable)
        #[arg(long = "edit-user")]
        edit_users: Vec<String>,

        /// User granted the view role (repeatable)
        #[arg(long = "view-user")]
        view_users: Vec<String>,

        /// Write the script to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Copy all source tables into the Oracle destination
    Migrate {
        /// Override source schema
        #[arg(long)]
        source_schema: Option<String>,

        /// Override destination schema
        #[arg(long)]
        target_schema: Option<String>,

        /// Override number of workers
        #[arg(long)]
        workers: Option<usize>,

        /// Override rows per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::GenerateScripts {
            target_schema,
            edit_role,
            view_role,
            edit_users,
            view_users,
            output,
        } => {
            let scripts = config.scripts;
            let request = ScriptRequest {
                source: config.source,
                target_schema: target_schema.or(scripts.target_schema),
                edit_role: edit_role.or(scripts.edit_role),
                view_role: view_role.or(scripts.view_role),
                edit_users: or_config(edit_users, scripts.edit_role_users),
                view_users: or_config(view_users, scripts.view_role_users),
            };

            let result = generate_scripts(&request).await?;
            for warning in &result.warnings {
                warn!("{}", warning);
            }

            if let Some(path) = &output {
                std::fs::write(path, &result.script)?;
                info!(
                    "Wrote script for {} tables to {:?}",
                    result.table_count, path
                );
            }

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else if output.is_none() {
                print!("{}", result.script);
            } else {
                println!("Script generated!");
                println!("  Tables: {}", result.table_count);
                println!("  Warnings: {}", result.warnings.len());
            }
        }

        Commands::Migrate {
            source_schema,
            target_schema,
            workers,
            batch_size,
        } => {
            // Apply overrides
            if let Some(schema) = source_schema {
                config.source.schema = schema;
            }
            if let Some(w) = workers {
                config.migration.workers = w;
            }
            if let Some(b) = batch_size {
                config.migration.batch_size = b;
            }
            let mut destination = config.require_target()?.clone();
            if let Some(schema) = target_schema {
                destination.schema = schema;
            }
            config.validate()?;

            let service = MigrationService::new(config.migration.clone());
            let handle = service.start(config.source.clone(), destination);
            info!("Migration {} started", handle.run_id());

            let outcome = handle.wait().await?;
            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            }

            match outcome {
                MigrationOutcome::Skipped { reason } => {
                    if !cli.output_json {
                        println!("Migration skipped: {}", reason);
                    }
                }
                MigrationOutcome::Completed(report) => {
                    if !cli.output_json {
                        print_report(&report);
                    }
                    let failed = report.failed_tables();
                    if !failed.is_empty() {
                        return Err(MigrateError::transfer(
                            failed.join(", "),
                            format!("{} of {} tables failed", failed.len(), report.tables.len()),
                        ));
                    }
                }
            }
        }
    }

    Ok(())
}

/// CLI values win when given; otherwise fall back to the config file.
fn or_config(cli: Vec<String>, config: Vec<String>) -> Vec<String> {
    if cli.is_empty() {
        config
    } else {
        cli
    }
}

fn print_report(report: &MigrationReport) {
    println!("\nMigration completed!");
    println!("  Run ID: {}", report.run_id);
    println!("  Duration: {:.2}s", report.duration_seconds);
    println!(
        "  Tables: {}/{}",
        report.table_counts.succeeded,
        report.tables.len()
    );
    println!("  Rows: {}", report.rows_transferred);
    println!("  Throughput: {} rows/sec", report.rows_per_second);

    let failed = report.failed_tables();
    if !failed.is_empty() {
        println!("  Failed tables: {:?}", failed);
    }

    let step_failures = report
        .foreign_keys_disabled
        .iter()
        .chain(&report.sequences)
        .chain(&report.foreign_keys_enabled)
        .filter(|o| o.is_failure())
        .count();
    if step_failures > 0 {
        println!(
            "  Constraint/sequence failures: {} (see log)",
            step_failures
        );
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    // Logs go to stderr so a generated script on stdout stays clean.
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
