use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use voxfuse_core::pipeline::config::{GgrParams, ReconConfig, Regularization};
use voxfuse_core::pipeline::run_reconstruction_reported;

use super::load_toml;
use crate::progress::BarReporter;
use crate::summary::{print_recon_result, print_recon_summary};

#[derive(Args)]
pub struct ReconArgs {
    /// Gradient-guided regularization (default)
    #[arg(long, conflicts_with = "tik")]
    pub ggr: bool,

    /// Tikhonov regularization
    #[arg(long)]
    pub tik: bool,

    /// Regularization weight (lambda)
    #[arg(short = 'w', long)]
    pub reg_weight: Option<f32>,

    /// Keep negative values instead of clipping them to 0
    #[arg(long)]
    pub keep_negative_values: bool,

    /// Percentile of gradient magnitude used as the GGR edge threshold (0-1)
    #[arg(long)]
    pub tau_percentile: Option<f32>,

    /// Largest GGR stencil order (1 or 2)
    #[arg(long)]
    pub scale: Option<i32>,

    /// GGR decay base
    #[arg(long)]
    pub alpha: Option<f32>,

    /// Also save a PNG of the orthogonal mid-slices
    #[arg(long)]
    pub preview: bool,

    /// Working directory written by `preprocess`
    #[arg(short = 'd', long)]
    pub working_dir: Option<PathBuf>,

    /// Output directory (holds the mean-fusion volume)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Recon config file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn run(args: &ReconArgs) -> Result<()> {
    let config = build_config(args)?;
    print_recon_summary(&config);

    let reporter = Arc::new(BarReporter::new());
    let output = run_reconstruction_reported(&config, reporter).context("Reconstruction failed")?;

    print_recon_result(&output);
    Ok(())
}

fn build_config(args: &ReconArgs) -> Result<ReconConfig> {
    let mut config: ReconConfig = match &args.config {
        Some(path) => load_toml(path)?,
        None => ReconConfig::default(),
    };

    if args.tik {
        config.regularization = Regularization::Tikhonov;
    } else if args.ggr && !matches!(config.regularization, Regularization::Ggr(_)) {
        config.regularization = Regularization::Ggr(GgrParams::default());
    }
    if let Regularization::Ggr(params) = &mut config.regularization {
        if let Some(tau) = args.tau_percentile {
            params.tau_percentile = tau;
        }
        if let Some(scale) = args.scale {
            params.scale = scale;
        }
        if let Some(alpha) = args.alpha {
            params.alpha = alpha;
        }
    }

    if let Some(weight) = args.reg_weight {
        config.reg_weight = weight;
    }
    if args.keep_negative_values {
        config.keep_negative_values = true;
    }
    if args.preview {
        config.preview = true;
    }
    if let Some(dir) = &args.working_dir {
        config.working_dir = dir.clone();
    }
    if let Some(dir) = &args.output_dir {
        config.output_dir = dir.clone();
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct ReconCli {
        #[command(flatten)]
        args: ReconArgs,
    }

    #[test]
    fn test_short_flags_set_weight_and_working_dir() {
        let cli = ReconCli::try_parse_from(["recon", "--tik", "-w", "0.5", "-d", "work", "-o", "out"]).unwrap();
        let config = build_config(&cli.args).unwrap();
        assert_eq!(config.regularization, Regularization::Tikhonov);
        assert_eq!(config.reg_weight, 0.5);
        assert_eq!(config.working_dir, PathBuf::from("work"));
        assert_eq!(config.output_dir, PathBuf::from("out"));
    }
}
