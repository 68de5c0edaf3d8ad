use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FusionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Missing preprocessing state: {path} ({reason})")]
    MissingState { path: PathBuf, reason: String },

    #[error("Ambiguous output: expected one mean-fusion file, found {}", candidates.len())]
    AmbiguousOutput { candidates: Vec<PathBuf> },

    #[error("Registration of view {view} failed: {reason}")]
    Registration { view: usize, reason: String },

    #[error("Grid mismatch: {0}")]
    GridMismatch(String),

    #[error("Invalid volume file: {0}")]
    InvalidVolume(String),

    #[error("Invalid artifact {path}: {reason}")]
    InvalidArtifact { path: PathBuf, reason: String },

    #[error("Image format error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Empty view sequence")]
    EmptySequence,
}

pub type Result<T> = std::result::Result<T, FusionError>;
