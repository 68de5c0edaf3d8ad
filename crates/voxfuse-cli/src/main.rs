mod commands;
mod progress;
mod summary;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "voxfuse", about = "Super-resolution fusion of anisotropic 3D volumes")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Worker threads (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resample, register and mean-fuse the input views
    Preprocess(commands::preprocess::PreprocessArgs),
    /// Deconvolve the preprocessed views into the final volume
    Recon(commands::recon::ReconArgs),
    /// Print the default configuration as TOML
    Config(commands::config::ConfigArgs),
    /// Show volume geometry and header fields
    Info(commands::info::InfoArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to configure the worker thread pool")?;
    }

    match &cli.command {
        Commands::Preprocess(args) => commands::preprocess::run(args),
        Commands::Recon(args) => commands::recon::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Info(args) => commands::info::run(args),
    }
}
