// src/main.rs

mod demo_schema;

use clap::{Parser, Subcommand};
use fluentorm::config::Config;
use fluentorm::runner::Runner;
use fluentorm::{diff, emit, snapshot, Error};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "fluentorm")]
#[command(author, version, about = "Schema-first PostgreSQL code generation and migration toolchain", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge schema fragments, diff against the prior snapshot, and emit migrations
    Generate {
        /// Directory of schema fragment files
        #[arg(long, default_value = "./schemas")]
        schemas_dir: PathBuf,
        /// Snapshot file path
        #[arg(long, default_value = ".fluent_snapshot.json")]
        snapshot: PathBuf,
        /// Directory to write migration files into
        #[arg(long, default_value = "./migrations")]
        migrations_dir: PathBuf,
        /// Print the change set without writing any files
        #[arg(long)]
        dry_run: bool,
    },
    /// Apply all pending migrations
    Up {
        #[arg(long, default_value = "./migrations")]
        migrations_dir: PathBuf,
    },
    /// List applied and pending migrations
    Status {
        #[arg(long, default_value = "./migrations")]
        migrations_dir: PathBuf,
        /// Emit machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Roll back the most recently applied migration
    Down {
        #[arg(long, default_value = "./migrations")]
        migrations_dir: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match run(cli.command) {
        Ok(()) => ExitCode::from(0),
        Err(err) => {
            error!("{err}");
            ExitCode::from(exit_code_for(&err))
        }
    }
}

fn exit_code_for(err: &Error) -> u8 {
    match err {
        Error::MigrationTampered { .. } | Error::MigrationMissing(_) => 3,
        Error::MigrationFailed { .. } => 2,
        _ => 1,
    }
}

fn run(command: Commands) -> fluentorm::Result<()> {
    match command {
        Commands::Generate {
            schemas_dir,
            snapshot: snapshot_path,
            migrations_dir,
            dry_run,
        } => generate(&schemas_dir, &snapshot_path, &migrations_dir, dry_run),
        Commands::Up { migrations_dir } => up(&migrations_dir),
        Commands::Status { migrations_dir, json } => status(&migrations_dir, json),
        Commands::Down { migrations_dir } => down(&migrations_dir),
    }
}

fn generate(
    schemas_dir: &std::path::Path,
    snapshot_path: &std::path::Path,
    migrations_dir: &std::path::Path,
    dry_run: bool,
) -> fluentorm::Result<()> {
    if schemas_dir.exists() {
        info!(
            "fragment discovery from {} is an external collaborator; using the compiled-in demo fragment set",
            schemas_dir.display()
        );
    }

    let fragments = demo_schema::fragments();
    let current = fluentorm::schema::merge(&fragments)?;
    let prior = snapshot::load(snapshot_path)?;

    let changes = diff::diff(&prior, &current)?;
    if changes.is_empty() {
        info!("schema is already up to date with the snapshot, nothing to emit");
        return Ok(());
    }

    let next_timestamp = emit::next_timestamp_seed(migrations_dir)?;
    let emitted = emit::emit(&changes, next_timestamp);

    if dry_run {
        for migration in &emitted {
            println!("{} ({})", migration.base_name(), migration.kind);
        }
        return Ok(());
    }

    let written = emit::write_all(migrations_dir, &emitted)?;
    for path in &written {
        println!("wrote {}", path.display());
    }

    snapshot::save(snapshot_path, &current)?;
    Ok(())
}

fn up(migrations_dir: &std::path::Path) -> fluentorm::Result<()> {
    let config = Config::from_env()?;
    let mut runner = Runner::connect(&config, migrations_dir)?;
    let applied = runner.up()?;
    if applied.is_empty() {
        println!("already up to date");
    } else {
        for name in applied {
            println!("applied {name}");
        }
    }
    Ok(())
}

fn status(migrations_dir: &std::path::Path, json: bool) -> fluentorm::Result<()> {
    let config = Config::from_env()?;
    let mut runner = Runner::connect(&config, migrations_dir)?;
    let report = runner.status()?;

    if json {
        let body = serde_json::json!({
            "applied": report.applied,
            "pending": report.pending,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        println!("applied:");
        for name in &report.applied {
            println!("  {name}");
        }
        println!("pending:");
        for name in &report.pending {
            println!("  {name}");
        }
    }
    Ok(())
}

fn down(migrations_dir: &std::path::Path) -> fluentorm::Result<()> {
    let config = Config::from_env()?;
    let mut runner = Runner::connect(&config, migrations_dir)?;
    let rolled_back = runner.down()?;
    println!("rolled back {rolled_back}");
    Ok(())
}
