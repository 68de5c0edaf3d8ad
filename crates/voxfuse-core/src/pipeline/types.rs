use std::path::PathBuf;

use crate::volume::Geometry;

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Reading,
    Reorienting,
    Resampling,
    Registration,
    FilterSynthesis,
    Fusion,
    Deconvolution,
    Writing,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reading => write!(f, "Reading volumes"),
            Self::Reorienting => write!(f, "Reorienting"),
            Self::Resampling => write!(f, "Resampling to canonical grid"),
            Self::Registration => write!(f, "Registering views"),
            Self::FilterSynthesis => write!(f, "Synthesizing filters"),
            Self::Fusion => write!(f, "Mean fusion"),
            Self::Deconvolution => write!(f, "Deconvolving"),
            Self::Writing => write!(f, "Writing output"),
        }
    }
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work items in this stage (views, operator triples), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// `items_done` work items within the current stage have completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// No-op progress reporter.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}

/// What the preprocess stage produced.
#[derive(Clone, Debug)]
pub struct PreprocessOutput {
    pub canonical: Geometry,
    /// Files written to the output directory (resampled volumes, or the mean).
    pub outputs: Vec<PathBuf>,
    /// Mean-fusion volume; `None` when only resampling was requested.
    pub mean_file: Option<PathBuf>,
    pub views: usize,
}

/// What the recon stage produced.
#[derive(Clone, Debug)]
pub struct ReconOutput {
    pub reconstruction: PathBuf,
    pub preview: Option<PathBuf>,
    pub geometry: Geometry,
    pub views: usize,
}
