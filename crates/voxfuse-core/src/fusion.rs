use ndarray::{Array3, Zip};
use tracing::info;

use crate::consts::PARALLEL_VOXEL_THRESHOLD;
use crate::error::Result;
use crate::volume::Volume;

/// Fuse registered views by averaging over per-voxel occupancy.
///
/// The reference always contributes (occupancy starts at 1); each other view
/// contributes its value everywhere and counts toward occupancy only where
/// it is nonzero. Voxels with zero occupancy are 0.
pub fn mean_fuse(reference: &Volume, registered: &[Volume]) -> Result<Volume> {
    let mut sum = reference.data.clone();
    let mut occupancy = Array3::<f32>::ones(sum.dim());

    for (i, view) in registered.iter().enumerate() {
        reference
            .geometry
            .ensure_same_grid(&view.geometry, &format!("registered view {}", i + 1))?;
        sum += &view.data;
        Zip::from(&mut occupancy).and(&view.data).for_each(|l, &v| {
            if v != 0.0 {
                *l += 1.0;
            }
        });
    }

    let divide = |s: &mut f32, &l: &f32| {
        *s = if l != 0.0 { *s / l } else { 0.0 };
    };
    if sum.len() >= PARALLEL_VOXEL_THRESHOLD {
        Zip::from(&mut sum).and(&occupancy).par_for_each(divide);
    } else {
        Zip::from(&mut sum).and(&occupancy).for_each(divide);
    }

    info!(views = registered.len() + 1, "Mean fusion complete");
    reference.with_data(sum)
}
