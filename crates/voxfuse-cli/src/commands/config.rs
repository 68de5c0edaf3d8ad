use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;
use voxfuse_core::pipeline::config::{PreprocessConfig, ReconConfig};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ConfigStage {
    Preprocess,
    Recon,
}

#[derive(Args)]
pub struct ConfigArgs {
    /// Which stage's configuration to print
    #[arg(value_enum, default_value = "recon")]
    pub stage: ConfigStage,

    /// Write config to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Print or save a full default config as TOML.
pub fn run(args: &ConfigArgs) -> Result<()> {
    let toml_str = match args.stage {
        ConfigStage::Preprocess => to_toml(&PreprocessConfig {
            inputs: vec![PathBuf::from("reference.nii.gz"), PathBuf::from("view1.nii.gz")],
            ..Default::default()
        })?,
        ConfigStage::Recon => to_toml(&ReconConfig::default())?,
    };

    if let Some(ref path) = args.output {
        std::fs::write(path, &toml_str)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        println!("Default config saved to {}", path.display());
    } else {
        print!("{}", toml_str);
    }

    Ok(())
}

fn to_toml<T: Serialize>(config: &T) -> Result<String> {
    Ok(toml::to_string_pretty(config)?)
}
