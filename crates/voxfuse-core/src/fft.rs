use std::sync::Arc;

use ndarray::{Array3, ArrayViewMut1, Axis, Zip};
use num_complex::Complex32;
use rustfft::{Fft, FftDirection, FftPlanner};

use crate::consts::PARALLEL_VOXEL_THRESHOLD;
use crate::volume::Spectrum;

// ---------------------------------------------------------------------------
// 3D transforms (separable, one pass of 1D FFTs per array axis)
// ---------------------------------------------------------------------------

/// Forward 3D FFT of a real volume.
pub fn fft3d(data: &Array3<f32>) -> Spectrum {
    let mut spectrum = data.mapv(|v| Complex32::new(v, 0.0));
    fft3d_inplace(&mut spectrum);
    spectrum
}

/// In-place forward 3D FFT (unnormalized).
pub fn fft3d_inplace(data: &mut Spectrum) {
    transform_axes(data, FftDirection::Forward);
}

/// In-place inverse 3D FFT, normalized by the voxel count.
pub fn ifft3d_inplace(data: &mut Spectrum) {
    transform_axes(data, FftDirection::Inverse);
    let n = data.len();
    if n == 0 {
        return;
    }
    let scale = 1.0 / n as f32;
    if n >= PARALLEL_VOXEL_THRESHOLD {
        data.par_mapv_inplace(|v| v * scale);
    } else {
        data.mapv_inplace(|v| v * scale);
    }
}

/// Inverse 3D FFT keeping the real part.
pub fn ifft3d_real(spectrum: &Spectrum) -> Array3<f32> {
    ifft3d_real_owned(spectrum.clone())
}

/// Inverse 3D FFT keeping the real part, reusing the spectrum's buffer.
pub fn ifft3d_real_owned(mut spectrum: Spectrum) -> Array3<f32> {
    ifft3d_inplace(&mut spectrum);
    spectrum.mapv(|v| v.re)
}

fn transform_axes(data: &mut Spectrum, direction: FftDirection) {
    let mut planner = FftPlanner::<f32>::new();
    for axis in 0..3 {
        let len = data.len_of(Axis(axis));
        if len <= 1 {
            continue;
        }
        let fft = planner.plan_fft(len, direction);
        transform_lanes(data, Axis(axis), &fft);
    }
}

fn transform_lanes(data: &mut Spectrum, axis: Axis, fft: &Arc<dyn Fft<f32>>) {
    if data.len() >= PARALLEL_VOXEL_THRESHOLD {
        Zip::from(data.lanes_mut(axis)).par_for_each(|lane| transform_lane(lane, fft));
    } else {
        Zip::from(data.lanes_mut(axis)).for_each(|lane| transform_lane(lane, fft));
    }
}

fn transform_lane(mut lane: ArrayViewMut1<Complex32>, fft: &Arc<dyn Fft<f32>>) {
    if let Some(slice) = lane.as_slice_mut() {
        fft.process(slice);
        return;
    }
    let mut buf: Vec<Complex32> = lane.iter().copied().collect();
    fft.process(&mut buf);
    for (dst, src) in lane.iter_mut().zip(buf) {
        *dst = src;
    }
}

// ---------------------------------------------------------------------------
// 1D helpers for separable kernels
// ---------------------------------------------------------------------------

/// Forward FFT of a real 1D signal zero-padded to `len`.
pub fn fft1d_padded(signal: &[f32], len: usize) -> Vec<Complex32> {
    let mut buf = vec![Complex32::new(0.0, 0.0); len];
    for (dst, &src) in buf.iter_mut().zip(signal) {
        *dst = Complex32::new(src, 0.0);
    }
    if len > 1 {
        let mut planner = FftPlanner::<f32>::new();
        planner.plan_fft_forward(len).process(&mut buf);
    }
    buf
}
