pub mod config;
mod preprocess;
mod reconstruct;
mod types;

pub use preprocess::{build_registrar, run_preprocess, run_preprocess_reported, run_preprocess_with};
pub use reconstruct::{
    find_mean_file, reconstruction_file_name, run_reconstruction, run_reconstruction_reported,
};
pub use types::{NoOpReporter, PipelineStage, PreprocessOutput, ProgressReporter, ReconOutput};
