use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::info;

use crate::consts::{GEOMETRY_FILE, MANIFEST_FILE, MEAN_FILE_STEM};
use crate::error::{FusionError, Result};
use crate::filter::synthesize_filter_bank;
use crate::fusion::mean_fuse;
use crate::io::{
    filter_file_name, read_volume, registered_file_name, resampled_file_name, split_name,
    write_filter, write_geometry, write_volume, Manifest,
};
use crate::register::{
    register_views, CommandRegistrar, IdentityRegistrar, PhaseCorrelationRegistrar,
    ViewRegistrar,
};
use crate::resample::{harmonize, reorient_canonical, validate_explicit_size};
use crate::volume::Volume;

use super::config::{PreprocessConfig, RegistrationConfig};
use super::types::{NoOpReporter, PipelineStage, PreprocessOutput, ProgressReporter};

/// Build the registrar selected by `config`; external tools work in `scratch_dir`.
pub fn build_registrar(config: &RegistrationConfig, scratch_dir: &Path) -> Box<dyn ViewRegistrar> {
    match config {
        RegistrationConfig::Identity => Box::new(IdentityRegistrar),
        RegistrationConfig::PhaseCorrelation { min_peak } => Box::new(PhaseCorrelationRegistrar {
            min_peak: *min_peak,
        }),
        RegistrationConfig::Command { program, args } => {
            Box::new(CommandRegistrar::new(program, args.clone(), scratch_dir))
        }
    }
}

/// Run the preprocess stage with the registrar chosen by the config.
pub fn run_preprocess(config: &PreprocessConfig) -> Result<PreprocessOutput> {
    run_preprocess_reported(config, Arc::new(NoOpReporter))
}

pub fn run_preprocess_reported(
    config: &PreprocessConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<PreprocessOutput> {
    let registrar = build_registrar(&config.registration, &config.working_dir);
    run_preprocess_with(config, registrar.as_ref(), reporter)
}

/// Harmonize, register, synthesize filters and mean-fuse.
///
/// Argument checks run before any file is read or written.
pub fn run_preprocess_with(
    config: &PreprocessConfig,
    registrar: &dyn ViewRegistrar,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<PreprocessOutput> {
    let inputs = config.input_paths();
    if inputs.is_empty() {
        return Err(FusionError::Input("no input volumes given".into()));
    }
    let explicit = config
        .size
        .as_deref()
        .map(|size| validate_explicit_size(size, inputs.len()))
        .transpose()?;
    if let Some(missing) = inputs.iter().find(|p| !p.is_file()) {
        return Err(FusionError::Input(format!(
            "input volume {} does not exist",
            missing.display()
        )));
    }
    let names: Vec<(String, String)> = inputs.iter().map(|p| split_name(p)).collect();

    // Read
    reporter.begin_stage(PipelineStage::Reading, Some(inputs.len()));
    let mut natives = Vec::with_capacity(inputs.len());
    for (i, path) in inputs.iter().enumerate() {
        let volume = read_volume(path)?;
        info!(
            view = i,
            path = %path.display(),
            size = ?volume.size(),
            spacing = ?volume.spacing(),
            "Read volume"
        );
        natives.push(volume);
        reporter.advance(i + 1);
    }
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Reorienting, None);
    let natives: Vec<Volume> = natives.par_iter().map(reorient_canonical).collect();
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Resampling, Some(natives.len()));
    let harmonized = harmonize(&natives, explicit)?;
    drop(natives);
    reporter.finish_stage();
    let canonical = harmonized.canonical().clone();

    if config.resample_only {
        fs::create_dir_all(&config.output_dir)?;
        reporter.begin_stage(PipelineStage::Writing, Some(names.len()));
        let volumes = std::iter::once(&harmonized.reference).chain(&harmonized.secondaries);
        let mut outputs = Vec::with_capacity(names.len());
        for (i, ((name, ext), volume)) in names.iter().zip(volumes).enumerate() {
            let path = config.output_dir.join(resampled_file_name(name, ext));
            write_volume(&path, volume)?;
            outputs.push(path);
            reporter.advance(i + 1);
        }
        reporter.finish_stage();
        info!(views = names.len(), "Resample-only run complete");
        return Ok(PreprocessOutput {
            canonical,
            outputs,
            mean_file: None,
            views: names.len(),
        });
    }

    fs::create_dir_all(&config.working_dir)?;
    fs::create_dir_all(&config.output_dir)?;
    let work = |file: String| config.working_dir.join(file);

    let (reference_name, reference_ext) = &names[0];
    write_volume(
        &work(resampled_file_name(reference_name, reference_ext)),
        &harmonized.reference,
    )?;
    for ((name, ext), volume) in names[1..].iter().zip(&harmonized.secondaries) {
        write_volume(&work(resampled_file_name(name, ext)), volume)?;
    }
    write_geometry(&work(GEOMETRY_FILE.into()), &canonical)?;
    Manifest::for_views(&names).write(&work(MANIFEST_FILE.into()))?;

    reporter.begin_stage(PipelineStage::Registration, Some(harmonized.secondaries.len()));
    let registrations = register_views(
        registrar,
        &harmonized.reference,
        &harmonized.secondaries,
        |done| reporter.advance(done),
    )?;
    reporter.finish_stage();
    let registered: Vec<Volume> = registrations.into_iter().map(|r| r.volume).collect();
    for ((name, ext), volume) in names[1..].iter().zip(&registered) {
        write_volume(&work(registered_file_name(name, ext)), volume)?;
    }

    reporter.begin_stage(PipelineStage::FilterSynthesis, Some(names.len()));
    let filters = synthesize_filter_bank(&harmonized.views, &canonical);
    for (i, ((name, _), filter)) in names.iter().zip(filters.iter()).enumerate() {
        write_filter(&work(filter_file_name(name)), filter)?;
        reporter.advance(i + 1);
    }
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Fusion, None);
    let mean = mean_fuse(&harmonized.reference, &registered)?;
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Writing, None);
    let mean_file: PathBuf = config
        .output_dir
        .join(format!("{MEAN_FILE_STEM}{reference_ext}"));
    write_volume(&mean_file, &mean)?;
    reporter.finish_stage();

    info!(
        views = names.len(),
        size = ?canonical.size,
        mean = %mean_file.display(),
        "Preprocessing complete"
    );
    Ok(PreprocessOutput {
        canonical,
        outputs: vec![mean_file.clone()],
        mean_file: Some(mean_file),
        views: names.len(),
    })
}
