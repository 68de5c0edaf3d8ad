use ndarray::Axis;
use tracing::debug;

use crate::volume::{Geometry, Volume};

/// Permute and flip grid axes so that grid axis `i` runs along physical axis
/// `i` in the positive direction (an identity-like direction matrix).
///
/// Every voxel keeps its physical position. Volumes whose axes cannot be
/// matched one-to-one to physical axes (strongly oblique) are returned
/// unchanged.
pub fn reorient_canonical(volume: &Volume) -> Volume {
    let geo = &volume.geometry;
    let Some((perm, flip)) = axis_permutation(&geo.direction) else {
        debug!("oblique direction matrix, keeping original axis order");
        return volume.clone();
    };
    if perm == [0, 1, 2] && flip == [false; 3] {
        return volume.clone();
    }

    // New grid axis i is old grid axis perm[i], optionally flipped.
    let mut size = [0usize; 3];
    let mut spacing = [0.0f64; 3];
    let mut direction = [0.0f64; 9];
    let mut corner = [0.0f64; 3];
    for i in 0..3 {
        let j = perm[i];
        size[i] = geo.size[j];
        spacing[i] = geo.spacing[j];
        let sign = if flip[i] { -1.0 } else { 1.0 };
        for row in 0..3 {
            direction[row * 3 + i] = sign * geo.direction[row * 3 + j];
        }
        corner[j] = if flip[i] {
            (geo.size[j].saturating_sub(1)) as f64
        } else {
            0.0
        };
    }
    let origin = geo.index_to_physical(corner);

    // Array axis a holds grid axis 2 - a.
    let mut view = volume
        .data
        .view()
        .permuted_axes([2 - perm[2], 2 - perm[1], 2 - perm[0]]);
    for (i, &flipped) in flip.iter().enumerate() {
        if flipped {
            view.invert_axis(Axis(2 - i));
        }
    }
    let data = view.as_standard_layout().into_owned();

    debug!(?perm, ?flip, "reoriented volume");
    Volume {
        data,
        geometry: Geometry::new(size, spacing, origin, direction),
    }
}

/// For each physical axis, the grid axis most aligned with it and whether it
/// points backwards. `None` if two grid axes share a dominant physical axis.
fn axis_permutation(direction: &[f64; 9]) -> Option<([usize; 3], [bool; 3])> {
    let mut perm = [usize::MAX; 3];
    let mut flip = [false; 3];
    for grid_axis in 0..3 {
        let (phys, value) = (0..3)
            .map(|row| (row, direction[row * 3 + grid_axis]))
            .max_by(|a, b| a.1.abs().total_cmp(&b.1.abs()))?;
        if perm[phys] != usize::MAX {
            return None;
        }
        perm[phys] = grid_axis;
        flip[phys] = value < 0.0;
    }
    Some((perm, flip))
}
