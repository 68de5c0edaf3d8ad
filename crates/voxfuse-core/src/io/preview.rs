use std::path::Path;

use image::{GrayImage, ImageFormat, Luma};
use ndarray::{s, Array2, ArrayView2};

use crate::error::Result;
use crate::volume::Volume;

/// Orthogonal mid-slices (axial, coronal, sagittal) side by side as an 8-bit
/// PNG, scaled to the volume's min..max range.
pub fn save_slice_preview(volume: &Volume, path: &Path) -> Result<()> {
    let data = &volume.data;
    let (nz, ny, nx) = data.dim();
    let slices: [ArrayView2<f32>; 3] = [
        data.slice(s![nz / 2, .., ..]),
        data.slice(s![.., ny / 2, ..]),
        data.slice(s![.., .., nx / 2]),
    ];

    let (lo, hi) = data
        .iter()
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    let range = if hi > lo { hi - lo } else { 1.0 };

    let height = slices.iter().map(|s| s.nrows()).max().unwrap_or(0);
    let width: usize = slices.iter().map(|s| s.ncols()).sum();
    let mut canvas = Array2::<u8>::zeros((height, width));
    let mut left = 0;
    for slice in &slices {
        let (h, w) = slice.dim();
        // Rows are flipped so the slowest axis points up.
        for row in 0..h {
            for col in 0..w {
                let v = ((slice[[h - 1 - row, col]] - lo) / range).clamp(0.0, 1.0);
                canvas[[row, left + col]] = (v * 255.0) as u8;
            }
        }
        left += w;
    }

    let mut img = GrayImage::new(width as u32, height as u32);
    for ((row, col), &v) in canvas.indexed_iter() {
        img.put_pixel(col as u32, row as u32, Luma([v]));
    }
    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
