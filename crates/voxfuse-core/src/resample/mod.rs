pub mod bspline;
pub mod grid;
pub mod reorient;

use ndarray::{Array3, Zip};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::consts::PARALLEL_VOXEL_THRESHOLD;
use crate::error::{FusionError, Result};
use crate::volume::{Geometry, Volume};

pub use bspline::BSplineInterpolator;
pub use grid::{
    canonical_geometry, force_even, reference_view_geometry, secondary_view_geometry,
    validate_explicit_size, ViewGeometry,
};
pub use reorient::reorient_canonical;

/// All views on the canonical grid, before registration.
#[derive(Clone, Debug)]
pub struct HarmonizedViews {
    /// Reference view resampled; its geometry is the canonical grid.
    pub reference: Volume,
    /// Secondary views resampled onto the reference's grid, in input order.
    pub secondaries: Vec<Volume>,
    /// Acquisition geometry per view, reference first.
    pub views: Vec<ViewGeometry>,
}

impl HarmonizedViews {
    pub fn canonical(&self) -> &Geometry {
        &self.reference.geometry
    }
}

/// Resample `input` onto `target` with cubic B-spline interpolation.
/// Points falling outside the input's field of view are set to 0.
pub fn resample_onto(input: &Volume, target: &Geometry) -> Result<Volume> {
    let interpolator = BSplineInterpolator::new(&input.data);
    let mapper = input.geometry.index_mapper()?;
    let mut out = Array3::<f32>::zeros(target.shape());

    let sample = |(k, j, i): (usize, usize, usize), v: &mut f32| {
        let p = target.index_to_physical([i as f64, j as f64, k as f64]);
        let c = mapper.to_index(p);
        if interpolator.is_inside(c) {
            *v = interpolator.evaluate(c) as f32;
        }
    };

    if target.voxel_count() >= PARALLEL_VOXEL_THRESHOLD {
        Zip::indexed(&mut out).par_for_each(sample);
    } else {
        Zip::indexed(&mut out).for_each(sample);
    }

    Volume::new(out, target.clone())
}

/// Resample a secondary view using `template` (the canonical grid) for size,
/// spacing, origin and direction.
pub fn resample_like(input: &Volume, template: &Geometry) -> Result<Volume> {
    resample_onto(input, template)
}

/// Compute the canonical grid from the reference view and resample it.
pub fn resample_reference(reference: &Volume, explicit: Option<[usize; 3]>) -> Result<Volume> {
    let canonical = canonical_geometry(&reference.geometry, explicit)?;
    info!(
        size = ?canonical.size,
        spacing = canonical.spacing[0],
        "Canonical grid"
    );
    resample_onto(reference, &canonical)
}

/// Bring every view onto one canonical isotropic grid.
///
/// `views[0]` is the reference. All inputs are expected to be reoriented
/// already (see [`reorient_canonical`]).
pub fn harmonize(views: &[Volume], explicit: Option<[usize; 3]>) -> Result<HarmonizedViews> {
    let (reference_native, rest) = views.split_first().ok_or(FusionError::EmptySequence)?;

    let reference = resample_reference(reference_native, explicit)?;
    let canonical = reference.geometry.clone();

    let secondaries = rest
        .par_iter()
        .enumerate()
        .map(|(i, view)| {
            debug!(view = i + 1, size = ?view.size(), "Resampling secondary view");
            resample_like(view, &canonical)
        })
        .collect::<Result<Vec<_>>>()?;

    let mut geometries = Vec::with_capacity(views.len());
    geometries.push(reference_view_geometry(&reference_native.geometry));
    geometries.extend(
        rest.iter()
            .map(|view| secondary_view_geometry(&view.geometry, &canonical)),
    );

    for (i, view) in secondaries.iter().enumerate() {
        canonical.ensure_same_grid(&view.geometry, &format!("resampled view {}", i + 1))?;
    }

    Ok(HarmonizedViews {
        reference,
        secondaries,
        views: geometries,
    })
}
