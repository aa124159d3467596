mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "densify", about = "Rebuild dense X-ray frame stacks from sparsified files")]
#[command(version)]
struct Cli {
    /// Show information for each conversion
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Show debug information
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert sparse files into dense HDF5 frame stacks
    Convert(commands::convert::ConvertArgs),
    /// Export every frame of sparse files as CBF images
    Export(commands::export::ExportArgs),
    /// Show sparse file metadata
    Info(commands::info::InfoArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Convert(args) => commands::convert::run(args),
        Commands::Export(args) => commands::export::run(args),
        Commands::Info(args) => commands::info::run(args),
    }
}
