use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::consts::{GEOMETRY_FILE, MANIFEST_FILE, MEAN_FILE_STEM};
use crate::deconv::{finish_spectrum, DataTerms, Deconvolver};
use crate::error::{FusionError, Result};
use crate::fft::fft3d;
use crate::filter::ViewFilter;
use crate::gradient::operator_triples;
use crate::io::{read_filter, read_geometry, read_volume, save_slice_preview, split_name, write_volume, Manifest};

use super::config::{ReconConfig, Regularization};
use super::types::{NoOpReporter, PipelineStage, ProgressReporter, ReconOutput};

fn missing(path: &Path, reason: &str) -> FusionError {
    FusionError::MissingState {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Locate the single `img_mean.*` file in `dir`.
pub fn find_mean_file(dir: &Path) -> Result<PathBuf> {
    let prefix = format!("{MEAN_FILE_STEM}.");
    let mut candidates: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .is_some_and(|n| n.to_string_lossy().starts_with(&prefix))
            })
            .collect(),
        Err(_) => Vec::new(),
    };
    candidates.sort();
    match candidates.len() {
        0 => Err(missing(
            &dir.join(format!("{MEAN_FILE_STEM}.*")),
            "mean-fusion volume not found; run preprocess first",
        )),
        1 => Ok(candidates.remove(0)),
        _ => Err(FusionError::AmbiguousOutput { candidates }),
    }
}

/// `recon_<tag>-w<weight><ext>`; whole weights keep one decimal (`w1.0`).
pub fn reconstruction_file_name(regularization: &Regularization, reg_weight: f32, ext: &str) -> String {
    let weight = if reg_weight.fract() == 0.0 {
        format!("{reg_weight:.1}")
    } else {
        format!("{reg_weight}")
    };
    format!("recon_{}-w{}{}", regularization.tag(), weight, ext)
}

/// Files the recon stage needs, all known to exist.
struct ReconState {
    manifest: Manifest,
    geometry_file: PathBuf,
    mean_file: PathBuf,
}

fn check_state(config: &ReconConfig) -> Result<ReconState> {
    let dir = &config.working_dir;
    if !dir.is_dir() {
        return Err(missing(dir, "working directory does not exist"));
    }
    let geometry_file = dir.join(GEOMETRY_FILE);
    if !geometry_file.is_file() {
        return Err(missing(&geometry_file, "geometry record not found"));
    }
    let manifest_file = dir.join(MANIFEST_FILE);
    if !manifest_file.is_file() {
        return Err(missing(&manifest_file, "manifest not found"));
    }
    let manifest = Manifest::read(&manifest_file)?;
    for (volume, filter) in manifest.paths(dir) {
        if !volume.is_file() {
            return Err(missing(&volume, "listed volume not found"));
        }
        if !filter.is_file() {
            return Err(missing(&filter, "listed filter not found"));
        }
    }
    let mean_file = find_mean_file(&config.output_dir)?;
    Ok(ReconState {
        manifest,
        geometry_file,
        mean_file,
    })
}

pub fn run_reconstruction(config: &ReconConfig) -> Result<ReconOutput> {
    run_reconstruction_reported(config, Arc::new(NoOpReporter))
}

/// Deconvolve the preprocessed views into the final volume.
///
/// Every required file is checked for before any computation starts.
pub fn run_reconstruction_reported(
    config: &ReconConfig,
    reporter: Arc<dyn ProgressReporter>,
) -> Result<ReconOutput> {
    let state = check_state(config)?;
    let deconvolver = Deconvolver::new(
        config.regularization.clone(),
        config.reg_weight,
        config.keep_negative_values,
    );
    if let Regularization::Ggr(params) = &config.regularization {
        params.validate()?;
    }

    let canonical = read_geometry(&state.geometry_file)?;
    let mean = read_volume(&state.mean_file)?;
    canonical.ensure_same_grid(&mean.geometry, "mean-fusion volume")?;

    reporter.begin_stage(PipelineStage::Reading, Some(state.manifest.len()));
    let mut data = DataTerms::zeros(canonical.shape());
    for (i, (volume_path, filter_path)) in state.manifest.paths(&config.working_dir).iter().enumerate() {
        let volume = read_volume(volume_path)?;
        canonical.ensure_same_grid(&volume.geometry, &volume_path.display().to_string())?;
        let filter = read_filter(filter_path)?;
        if let ViewFilter::Spectrum(f) = &filter {
            if f.dim() != canonical.shape() {
                return Err(FusionError::GridMismatch(format!(
                    "{}: filter shape {:?}, grid shape {:?}",
                    filter_path.display(),
                    f.dim(),
                    canonical.shape()
                )));
            }
        }
        data.add_view(&fft3d(&volume.data), &filter)?;
        debug!(view = i, path = %volume_path.display(), pass_through = filter.is_pass_through(), "Accumulated view");
        reporter.advance(i + 1);
    }
    reporter.finish_stage();

    let steps = match &config.regularization {
        Regularization::Ggr(params) => operator_triples(params.scale).len(),
        Regularization::Tikhonov => 1,
    };
    reporter.begin_stage(PipelineStage::Deconvolution, Some(steps));
    let x = deconvolver.solve_with_progress(&data, Some(&mean.data), |done| reporter.advance(done))?;
    let result = mean.with_data(finish_spectrum(x, config.keep_negative_values))?;
    drop(data);
    reporter.finish_stage();

    reporter.begin_stage(PipelineStage::Writing, None);
    fs::create_dir_all(&config.output_dir)?;
    let (_, ext) = split_name(&state.mean_file);
    let reconstruction = config.output_dir.join(reconstruction_file_name(
        &config.regularization,
        config.reg_weight,
        &ext,
    ));
    write_volume(&reconstruction, &result)?;
    let preview = if config.preview {
        let png = reconstruction.with_file_name(reconstruction_file_name(
            &config.regularization,
            config.reg_weight,
            ".png",
        ));
        save_slice_preview(&result, &png)?;
        Some(png)
    } else {
        None
    };
    reporter.finish_stage();

    info!(
        method = %config.regularization,
        weight = config.reg_weight,
        output = %reconstruction.display(),
        "Reconstruction complete"
    );
    Ok(ReconOutput {
        reconstruction,
        preview,
        geometry: canonical,
        views: state.manifest.len(),
    })
}
