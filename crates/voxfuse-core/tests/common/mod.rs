#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ndarray::Array3;
use voxfuse_core::io::write_volume;
use voxfuse_core::volume::{Geometry, Volume, IDENTITY_DIRECTION};

/// Build a volume on `geometry` by evaluating `f` at every voxel's physical
/// position.
pub fn sample_physical<F>(geometry: &Geometry, f: F) -> Volume
where
    F: Fn([f64; 3]) -> f32,
{
    let data = Array3::from_shape_fn(geometry.shape(), |(k, j, i)| {
        f(geometry.index_to_physical([i as f64, j as f64, k as f64]))
    });
    Volume::new(data, geometry.clone()).expect("shape matches geometry")
}

/// Build a volume from a function of the (x, y, z) voxel index.
pub fn from_index_fn<F>(size: [usize; 3], spacing: [f64; 3], f: F) -> Volume
where
    F: Fn(usize, usize, usize) -> f32,
{
    let geometry = Geometry::axis_aligned(size, spacing);
    let data = Array3::from_shape_fn(geometry.shape(), |(k, j, i)| f(i, j, k));
    Volume::new(data, geometry).expect("shape matches geometry")
}

/// Constant volume.
pub fn constant_volume(size: [usize; 3], spacing: [f64; 3], value: f32) -> Volume {
    from_index_fn(size, spacing, |_, _, _| value)
}

/// Smooth Gaussian blob in physical space.
pub fn blob(center: [f64; 3], sigma: f64) -> impl Fn([f64; 3]) -> f32 {
    move |p| {
        let d2: f64 = (0..3).map(|a| (p[a] - center[a]).powi(2)).sum();
        (10.0 * (-d2 / (2.0 * sigma * sigma)).exp()) as f32
    }
}

/// Identity-oriented geometry at the origin.
pub fn grid(size: [usize; 3], spacing: [f64; 3]) -> Geometry {
    Geometry::new(size, spacing, [0.0; 3], IDENTITY_DIRECTION)
}

/// Write `volume` as `dir/name` and return the path.
pub fn write_test_volume(dir: &Path, name: &str, volume: &Volume) -> PathBuf {
    let path = dir.join(name);
    write_volume(&path, volume).expect("write test volume");
    path
}

/// Two views of the same blob: the reference is thick along z, the second
/// view is thick along y. Both cover a 16 mm cube.
pub fn two_view_scene() -> (Volume, Volume) {
    let f = blob([7.5, 7.5, 7.5], 3.0);
    let reference = sample_physical(&grid([16, 16, 8], [1.0, 1.0, 2.0]), &f);
    let view = sample_physical(&grid([16, 8, 16], [1.0, 2.0, 1.0]), &f);
    (reference, view)
}
