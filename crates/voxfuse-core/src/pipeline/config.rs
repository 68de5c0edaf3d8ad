use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_DECAY_ALPHA, DEFAULT_GRADIENT_SCALE, DEFAULT_MIN_CORRELATION_PEAK,
    DEFAULT_REG_WEIGHT, DEFAULT_TAU_PERCENTILE,
};
use crate::error::{FusionError, Result};
use crate::gradient::MAX_STENCIL_ORDER;

/// Settings of the first stage: harmonize, register, filter, mean-fuse.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PreprocessConfig {
    /// Input volumes, reference first.
    #[serde(default)]
    pub inputs: Vec<PathBuf>,
    /// Directory the inputs are relative to.
    pub input_dir: Option<PathBuf>,
    #[serde(default = "default_dir")]
    pub working_dir: PathBuf,
    #[serde(default = "default_dir")]
    pub output_dir: PathBuf,
    /// Explicit high-resolution size (x, y, z).
    pub size: Option<Vec<i64>>,
    /// Stop after writing the resampled volumes.
    #[serde(default)]
    pub resample_only: bool,
    #[serde(default)]
    pub registration: RegistrationConfig,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            inputs: Vec::new(),
            input_dir: None,
            working_dir: default_dir(),
            output_dir: default_dir(),
            size: None,
            resample_only: false,
            registration: RegistrationConfig::default(),
        }
    }
}

impl PreprocessConfig {
    /// Input paths with `input_dir` applied.
    pub fn input_paths(&self) -> Vec<PathBuf> {
        match &self.input_dir {
            Some(dir) => self.inputs.iter().map(|p| dir.join(p)).collect(),
            None => self.inputs.clone(),
        }
    }
}

/// How secondary views are aligned to the reference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RegistrationConfig {
    /// Inputs are already co-registered.
    Identity,
    PhaseCorrelation {
        #[serde(default = "default_min_peak")]
        min_peak: f64,
    },
    /// External rigid-registration program.
    Command {
        program: PathBuf,
        #[serde(default = "crate::register::command::default_command_args")]
        args: Vec<String>,
    },
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self::PhaseCorrelation {
            min_peak: DEFAULT_MIN_CORRELATION_PEAK,
        }
    }
}

/// Settings of the second stage: deconvolve from the working directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconConfig {
    #[serde(default = "default_dir")]
    pub working_dir: PathBuf,
    #[serde(default = "default_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub regularization: Regularization,
    #[serde(default = "default_reg_weight")]
    pub reg_weight: f32,
    #[serde(default)]
    pub keep_negative_values: bool,
    /// Also write a PNG of the orthogonal mid-slices.
    #[serde(default)]
    pub preview: bool,
}

impl Default for ReconConfig {
    fn default() -> Self {
        Self {
            working_dir: default_dir(),
            output_dir: default_dir(),
            regularization: Regularization::default(),
            reg_weight: DEFAULT_REG_WEIGHT,
            keep_negative_values: false,
            preview: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum Regularization {
    /// Gradient-guided regularization.
    Ggr(GgrParams),
    Tikhonov,
}

impl Default for Regularization {
    fn default() -> Self {
        Self::Ggr(GgrParams::default())
    }
}

impl Regularization {
    /// Short tag used in output file names.
    pub fn tag(&self) -> &'static str {
        match self {
            Self::Ggr(_) => "ggr",
            Self::Tikhonov => "tik",
        }
    }
}

impl std::fmt::Display for Regularization {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ggr(_) => write!(f, "GGR"),
            Self::Tikhonov => write!(f, "Tikhonov"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GgrParams {
    /// Percentile of |g| taken as the edge threshold, in [0, 1].
    pub tau_percentile: f32,
    /// Largest stencil order P.
    pub scale: i32,
    /// Decay base; a triple is weighted alpha^(|l|+|p|+|q|).
    pub alpha: f32,
}

impl Default for GgrParams {
    fn default() -> Self {
        Self {
            tau_percentile: DEFAULT_TAU_PERCENTILE,
            scale: DEFAULT_GRADIENT_SCALE,
            alpha: DEFAULT_DECAY_ALPHA,
        }
    }
}

impl GgrParams {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.tau_percentile) {
            return Err(FusionError::Input(format!(
                "tau percentile must be in [0, 1], got {}",
                self.tau_percentile
            )));
        }
        if !(1..=MAX_STENCIL_ORDER).contains(&self.scale) {
            return Err(FusionError::Input(format!(
                "gradient scale must be in 1..={MAX_STENCIL_ORDER}, got {}",
                self.scale
            )));
        }
        if !(self.alpha.is_finite() && self.alpha > 0.0) {
            return Err(FusionError::Input(format!(
                "decay alpha must be positive, got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

fn default_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_reg_weight() -> f32 {
    DEFAULT_REG_WEIGHT
}

fn default_min_peak() -> f64 {
    DEFAULT_MIN_CORRELATION_PEAK
}
