//! `ethnet`: inspect the services of an Ethereum test enclave

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "ethnet")]
#[command(about = "Inspect the services of an Ethereum test enclave")]
#[command(version)]
struct Cli {
    /// Log debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Map a recorded service listing to a network
    Inspect {
        /// Service listing (JSON or YAML map of name to service)
        #[arg(short, long)]
        services: PathBuf,

        /// Package configuration used to launch the enclave
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Enclave id (defaults to the configured enclave name)
        #[arg(short, long)]
        enclave: Option<String>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },

    /// Show how service names are classified
    Classify {
        /// Service names
        #[arg(required = true)]
        names: Vec<String>,

        /// Port names to consider, comma separated
        #[arg(short, long, value_delimiter = ',')]
        ports: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    smol::block_on(async {
        match cli.command {
            Commands::Inspect {
                services,
                config,
                enclave,
                format,
            } => commands::inspect::run(&services, config.as_deref(), enclave, format).await,
            Commands::Classify { names, ports } => commands::classify::run(&names, &ports),
        }
    })
}
