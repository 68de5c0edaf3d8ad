use ndarray::Array3;
use num_complex::Complex32;
use rayon::prelude::*;
use tracing::debug;

use crate::consts::FWHM_TO_SIGMA;
use crate::fft::fft1d_padded;
use crate::resample::ViewGeometry;
use crate::volume::{Geometry, Spectrum};

/// Frequency-domain degradation model of one view.
#[derive(Clone, Debug)]
pub enum ViewFilter {
    /// The scalar 1: the view is as fine as the canonical grid.
    PassThrough,
    /// Blur/band-limit response, same shape as the canonical spectrum.
    Spectrum(Spectrum),
}

impl ViewFilter {
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Self::PassThrough)
    }
}

/// Per-view filters, indexed like the views (reference first).
#[derive(Clone, Debug, Default)]
pub struct FilterBank {
    filters: Vec<ViewFilter>,
}

impl FilterBank {
    pub fn new(filters: Vec<ViewFilter>) -> Self {
        Self { filters }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn get(&self, view: usize) -> Option<&ViewFilter> {
        self.filters.get(view)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ViewFilter> {
        self.filters.iter()
    }
}

// ---------------------------------------------------------------------------
// Synthesis
// ---------------------------------------------------------------------------

/// Native-to-canonical spacing ratio per (x, y, z) axis.
pub fn blur_factors(view: &ViewGeometry, canonical: &Geometry) -> [f64; 3] {
    [
        view.native_spacing[0] / canonical.spacing[0],
        view.native_spacing[1] / canonical.spacing[1],
        view.native_spacing[2] / canonical.spacing[2],
    ]
}

/// The axis with the largest factor above 1; the first one wins ties.
/// Only this axis shapes the filter, blurred axes are not combined.
pub fn dominant_axis(factors: &[f64; 3]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (axis, &factor) in factors.iter().enumerate() {
        if factor > 1.0 && best.map_or(true, |(_, max)| max < factor) {
            best = Some((axis, factor));
        }
    }
    best.map(|(axis, _)| axis)
}

/// Gaussian window of `len` samples centered at `(len - 1) / 2`, normalized
/// to sum 1.
pub fn gaussian_window(len: usize, sigma: f64) -> Vec<f64> {
    let center = (len as f64 - 1.0) / 2.0;
    let mut window: Vec<f64> = (0..len)
        .map(|n| {
            let x = (n as f64 - center) / sigma;
            (-0.5 * x * x).exp()
        })
        .collect();
    let sum: f64 = window.iter().sum();
    if sum > 0.0 {
        for v in &mut window {
            *v /= sum;
        }
    }
    window
}

/// 1D response along one axis: `|FFT(shifted Gaussian)|` times the
/// rectangular pass-band of `mapped` native samples.
pub fn axis_response(len: usize, factor: f64, mapped: usize) -> Vec<f32> {
    let sigma = factor / FWHM_TO_SIGMA;
    let window = gaussian_window(len, sigma);

    // Cyclic shift by floor(-len / 2) puts the window center at index 0.
    let shift = (len as i64).div_euclid(2) + (len as i64).rem_euclid(2);
    let shifted: Vec<f32> = (0..len)
        .map(|i| window[((i as i64 + shift).rem_euclid(len as i64)) as usize] as f32)
        .collect();
    let magnitude = fft1d_padded(&shifted, len);

    let mapped = mapped.min(len);
    let half = mapped / 2;
    magnitude
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let pass = i < half || i >= len - half;
            if pass {
                v.norm()
            } else {
                0.0
            }
        })
        .collect()
}

/// Build the filter of one view on the canonical grid.
pub fn synthesize_filter(view: &ViewGeometry, canonical: &Geometry) -> ViewFilter {
    let factors = blur_factors(view, canonical);
    let Some(axis) = dominant_axis(&factors) else {
        return ViewFilter::PassThrough;
    };

    let len = canonical.size[axis];
    let response = axis_response(len, factors[axis], view.mapped_size[axis]);
    debug!(
        axis,
        factor = factors[axis],
        mapped = view.mapped_size[axis],
        "Synthesized view filter"
    );

    // Equal real and imaginary parts, broadcast along the other axes.
    let spectrum = Array3::from_shape_fn(canonical.shape(), |(k, j, i)| {
        let r = response[[i, j, k][axis]];
        Complex32::new(r, r)
    });
    ViewFilter::Spectrum(spectrum)
}

/// Build the filter bank for all views (reference first).
pub fn synthesize_filter_bank(views: &[ViewGeometry], canonical: &Geometry) -> FilterBank {
    let filters = views
        .par_iter()
        .map(|view| synthesize_filter(view, canonical))
        .collect();
    FilterBank::new(filters)
}
