use serde::{Deserialize, Serialize};

use crate::error::{FusionError, Result};
use crate::volume::Geometry;

/// Acquisition geometry of one view, retained for filter synthesis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewGeometry {
    /// Spacing of the view before resampling, (x, y, z).
    pub native_spacing: [f64; 3],
    /// Sample count of the view before resampling, (x, y, z).
    pub native_size: [usize; 3],
    /// Native samples represented on the canonical grid; always even.
    pub mapped_size: [usize; 3],
}

/// Drop the last sample of an odd count.
pub fn force_even(n: usize) -> usize {
    n - n % 2
}

/// Check a caller-supplied high-resolution size against the view count.
///
/// The list must have one entry per input view, every entry must be
/// positive, and (the grid being 3D) there must be exactly three entries.
/// Returns the size with every axis forced even.
pub fn validate_explicit_size(size: &[i64], view_count: usize) -> Result<[usize; 3]> {
    if size.len() != view_count {
        return Err(FusionError::Input(format!(
            "size list has {} entries but {} views were given",
            size.len(),
            view_count
        )));
    }
    if let Some(bad) = size.iter().find(|&&s| s <= 0) {
        return Err(FusionError::Input(format!(
            "size entries must be positive integers, got {bad}"
        )));
    }
    if size.len() != 3 {
        return Err(FusionError::Input(format!(
            "size must have 3 entries (x y z), got {}",
            size.len()
        )));
    }
    let even = [
        force_even(size[0] as usize),
        force_even(size[1] as usize),
        force_even(size[2] as usize),
    ];
    if even.contains(&0) {
        return Err(FusionError::Input(format!(
            "size {size:?} leaves an empty axis once forced even"
        )));
    }
    Ok(even)
}

/// Isotropic canonical grid for a reference view.
///
/// Spacing is the reference's finest spacing on all axes. Size is either
/// `explicit` (already validated and even) or the reference extent over the
/// new spacing, rounded and forced even. Origin and direction are the
/// reference's.
pub fn canonical_geometry(reference: &Geometry, explicit: Option<[usize; 3]>) -> Result<Geometry> {
    let iso = reference.min_spacing();
    if !(iso.is_finite() && iso > 0.0) {
        return Err(FusionError::Input(format!(
            "reference spacing {:?} is not positive",
            reference.spacing
        )));
    }

    let size = match explicit {
        Some(size) => size.map(force_even),
        None => {
            let extent = reference.extent();
            extent.map(|e| force_even((e / iso).round() as usize))
        }
    };
    if size.contains(&0) {
        return Err(FusionError::Input(format!(
            "canonical grid size {size:?} has an empty axis"
        )));
    }

    Ok(Geometry::new(
        size,
        [iso; 3],
        reference.origin,
        reference.direction,
    ))
}

/// View geometry of the reference: its native size forced even.
pub fn reference_view_geometry(reference: &Geometry) -> ViewGeometry {
    ViewGeometry {
        native_spacing: reference.spacing,
        native_size: reference.size,
        mapped_size: reference.size.map(force_even),
    }
}

/// View geometry of a secondary view on the canonical grid.
///
/// Per axis: `min(native, round(canonical spacing / native spacing * canonical
/// size))`, forced even. Rounding is half-to-even.
pub fn secondary_view_geometry(native: &Geometry, canonical: &Geometry) -> ViewGeometry {
    let mut mapped = [0usize; 3];
    for axis in 0..3 {
        let ratio = canonical.spacing[axis] / native.spacing[axis];
        let represented = (ratio * canonical.size[axis] as f64).round_ties_even();
        let represented = if represented.is_finite() && represented > 0.0 {
            represented as usize
        } else {
            0
        };
        mapped[axis] = force_even(native.size[axis].min(represented));
    }
    ViewGeometry {
        native_spacing: native.spacing,
        native_size: native.size,
        mapped_size: mapped,
    }
}
