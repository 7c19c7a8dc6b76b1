//! Ichor Runner Binary
//!
//! Run with: `ichor-run [OPTIONS] <COMMAND>`

use std::io;
use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use ichor_run::{emit, run_program, PROGRAMS};
use ichor_runtime::RuntimeConfig;

#[derive(Parser)]
#[command(name = "ichor-run")]
#[command(about = "Run sample programs on the Ichor runtime")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Runtime configuration file (TOML)
    #[arg(short = 'c', long, global = true, env = "ICHOR_CONFIG")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available programs
    List,
    /// Run a program
    Run {
        /// Program name
        program: String,

        /// Program input (defaults to the program's own)
        #[arg(short, long, allow_negative_numbers = true)]
        input: Option<i64>,

        /// Print runtime statistics for the run
        #[arg(long)]
        stats: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Write the report to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the effective runtime configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("ICHOR_LOG").unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::List => {
            for program in PROGRAMS {
                println!("{:<8} {}", program.name, program.description);
            }
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Run {
            program,
            input,
            stats,
            json,
            output,
        } => {
            let report = run_program(config, &program, input, stats)?;
            emit(&report.format(json)?, output.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<RuntimeConfig> {
    match &cli.config {
        Some(path) => {
            debug!("Loading configuration: {}", path.display());
            RuntimeConfig::load(path)
                .with_context(|| format!("Failed to load config file: {}", path.display()))
        }
        None => Ok(RuntimeConfig::default()),
    }
}
