use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use voxfuse_core::pipeline::config::{PreprocessConfig, RegistrationConfig};
use voxfuse_core::pipeline::run_preprocess_reported;
use voxfuse_core::register::command::default_command_args;

use super::load_toml;
use crate::progress::BarReporter;
use crate::summary::{print_preprocess_result, print_preprocess_summary};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum RegistrationArg {
    /// Views are already co-registered
    Identity,
    /// Built-in translation search by phase correlation
    Phase,
    /// External rigid-registration program
    Command,
}

#[derive(Args)]
pub struct PreprocessArgs {
    /// Input volumes (.nii / .nii.gz), reference first
    pub files: Vec<PathBuf>,

    /// High-resolution grid size (x y z)
    #[arg(short, long, num_args = 1.., allow_negative_numbers = true)]
    pub size: Option<Vec<i64>>,

    /// Only resample the inputs onto the canonical grid
    #[arg(short, long)]
    pub resample_only: bool,

    /// Directory the input files are relative to
    #[arg(short = 'p', long)]
    pub input_dir: Option<PathBuf>,

    /// Working directory for intermediate files
    #[arg(short, long)]
    pub working_dir: Option<PathBuf>,

    /// Output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Registration method
    #[arg(long, value_enum)]
    pub registration: Option<RegistrationArg>,

    /// Minimum correlation peak accepted by phase registration
    #[arg(long)]
    pub min_peak: Option<f64>,

    /// Program run by command registration
    #[arg(long)]
    pub register_program: Option<PathBuf>,

    /// Argument template for command registration
    /// ({fixed}, {moving}, {output}, {transform} are substituted)
    #[arg(long, num_args = 1.., allow_hyphen_values = true)]
    pub register_args: Option<Vec<String>>,

    /// Preprocess config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &PreprocessArgs) -> Result<()> {
    let config = build_config(args)?;
    print_preprocess_summary(&config);

    let reporter = Arc::new(BarReporter::new());
    let output = run_preprocess_reported(&config, reporter).context("Preprocessing failed")?;

    print_preprocess_result(&output);
    Ok(())
}

fn build_config(args: &PreprocessArgs) -> Result<PreprocessConfig> {
    let mut config: PreprocessConfig = match &args.config {
        Some(path) => load_toml(path)?,
        None => PreprocessConfig::default(),
    };

    if !args.files.is_empty() {
        config.inputs = args.files.clone();
    }
    if args.size.is_some() {
        config.size = args.size.clone();
    }
    if args.resample_only {
        config.resample_only = true;
    }
    if let Some(dir) = &args.input_dir {
        config.input_dir = Some(dir.clone());
    }
    if let Some(dir) = &args.working_dir {
        config.working_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }

    if let Some(method) = args.registration {
        config.registration = match method {
            RegistrationArg::Identity => RegistrationConfig::Identity,
            RegistrationArg::Phase => RegistrationConfig::default(),
            RegistrationArg::Command => {
                let program = args
                    .register_program
                    .clone()
                    .context("--registration command needs --register-program")?;
                RegistrationConfig::Command {
                    program,
                    args: default_command_args(),
                }
            }
        };
    }
    match &mut config.registration {
        RegistrationConfig::PhaseCorrelation { min_peak } => {
            if let Some(peak) = args.min_peak {
                *min_peak = peak;
            }
        }
        RegistrationConfig::Command { program, args: template } => {
            if let Some(p) = &args.register_program {
                *program = p.clone();
            }
            if let Some(a) = &args.register_args {
                *template = a.clone();
            }
        }
        RegistrationConfig::Identity => {}
    }

    Ok(config)
}
