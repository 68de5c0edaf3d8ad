//! Regularized Fourier-domain deconvolution.
//!
//! Both solvers share the data terms `WY = sum conj(f_v) Y_v` and
//! `WW = sum |f_v|^2` and differ only in the penalty added to the
//! denominator (and, for GGR, to the numerator).

pub mod ggr;
pub mod tikhonov;

use ndarray::{Array3, Zip};
use num_complex::Complex32;
use tracing::info;

use crate::consts::{PARALLEL_VOXEL_THRESHOLD, SPECTRAL_ZERO_SOLUTION};
use crate::error::{FusionError, Result};
use crate::fft::ifft3d_real_owned;
use crate::filter::{FilterBank, ViewFilter};
use crate::pipeline::config::Regularization;
use crate::volume::{Spectrum, Volume};

pub use ggr::{edge_threshold, edge_weight, ggr_regularizer, ggr_regularizer_with_progress, GgrTerms};
pub use tikhonov::tikhonov_penalty;

// ---------------------------------------------------------------------------
// Data terms
// ---------------------------------------------------------------------------

/// Accumulated data fidelity terms over all views.
#[derive(Clone, Debug)]
pub struct DataTerms {
    /// sum over views of conj(f_v) * Y_v
    pub wy: Spectrum,
    /// sum over views of |f_v|^2 (real by construction)
    pub ww: Array3<f32>,
    views: usize,
}

impl DataTerms {
    pub fn zeros(shape: (usize, usize, usize)) -> Self {
        Self {
            wy: Array3::zeros(shape),
            ww: Array3::zeros(shape),
            views: 0,
        }
    }

    /// Accumulate from matching lists of observed spectra and filters.
    pub fn from_views(observed: &[Spectrum], filters: &FilterBank) -> Result<Self> {
        if observed.len() != filters.len() {
            return Err(FusionError::Input(format!(
                "{} observed views but {} filters",
                observed.len(),
                filters.len()
            )));
        }
        let first = observed.first().ok_or(FusionError::EmptySequence)?;
        let mut terms = Self::zeros(first.dim());
        for (spectrum, filter) in observed.iter().zip(filters.iter()) {
            terms.add_view(spectrum, filter)?;
        }
        Ok(terms)
    }

    /// Add one view's contribution.
    pub fn add_view(&mut self, observed: &Spectrum, filter: &ViewFilter) -> Result<()> {
        if observed.dim() != self.wy.dim() {
            return Err(FusionError::GridMismatch(format!(
                "observed spectrum {:?} vs accumulator {:?}",
                observed.dim(),
                self.wy.dim()
            )));
        }
        match filter {
            ViewFilter::PassThrough => {
                self.wy += observed;
                self.ww.mapv_inplace(|v| v + 1.0);
            }
            ViewFilter::Spectrum(f) => {
                if f.dim() != self.wy.dim() {
                    return Err(FusionError::GridMismatch(format!(
                        "filter {:?} vs accumulator {:?}",
                        f.dim(),
                        self.wy.dim()
                    )));
                }
                let accumulate = |wy: &mut Complex32, ww: &mut f32, &y: &Complex32, &h: &Complex32| {
                    *wy += h.conj() * y;
                    *ww += h.norm_sqr();
                };
                let zip = Zip::from(&mut self.wy).and(&mut self.ww).and(observed).and(f);
                if observed.len() >= PARALLEL_VOXEL_THRESHOLD {
                    zip.par_for_each(accumulate);
                } else {
                    zip.for_each(accumulate);
                }
            }
        }
        self.views += 1;
        Ok(())
    }

    pub fn view_count(&self) -> usize {
        self.views
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        self.wy.dim()
    }
}

// ---------------------------------------------------------------------------
// Elementwise solve
// ---------------------------------------------------------------------------

/// `numerator / denominator` with a zero denominator mapped to
/// `SPECTRAL_ZERO_SOLUTION`.
#[inline]
pub fn spectral_ratio(numerator: Complex32, denominator: f32) -> Complex32 {
    if denominator == 0.0 {
        Complex32::new(SPECTRAL_ZERO_SOLUTION, 0.0)
    } else {
        numerator / denominator
    }
}

/// X = (WY + lambda * extra) / (WW + lambda * penalty).
pub fn solve_spectrum(
    data: &DataTerms,
    extra_numerator: Option<&Spectrum>,
    penalty: &Array3<f32>,
    lambda: f32,
) -> Spectrum {
    let mut x = data.wy.clone();
    if let Some(extra) = extra_numerator {
        Zip::from(&mut x).and(extra).for_each(|x, &e| *x += e * lambda);
    }
    let solve = |x: &mut Complex32, &ww: &f32, &p: &f32| {
        *x = spectral_ratio(*x, ww + lambda * p);
    };
    let zip = Zip::from(&mut x).and(&data.ww).and(penalty);
    if data.wy.len() >= PARALLEL_VOXEL_THRESHOLD {
        zip.par_for_each(solve);
    } else {
        zip.for_each(solve);
    }
    x
}

/// Inverse transform of the solution, optionally clipping negatives to 0.
pub fn finish_spectrum(x: Spectrum, keep_negative_values: bool) -> Array3<f32> {
    let mut volume = ifft3d_real_owned(x);
    if !keep_negative_values {
        volume.mapv_inplace(|v| v.max(0.0));
    }
    volume
}

// ---------------------------------------------------------------------------
// Deconvolver
// ---------------------------------------------------------------------------

/// One reconstruction run's solver settings.
#[derive(Clone, Debug)]
pub struct Deconvolver {
    pub regularization: Regularization,
    pub reg_weight: f32,
    pub keep_negative_values: bool,
}

impl Deconvolver {
    pub fn new(regularization: Regularization, reg_weight: f32, keep_negative_values: bool) -> Self {
        Self {
            regularization,
            reg_weight,
            keep_negative_values,
        }
    }

    /// Solve in the frequency domain. GGR needs the mean-fusion volume.
    pub fn solve_with_progress<F>(
        &self,
        data: &DataTerms,
        mean: Option<&Array3<f32>>,
        on_progress: F,
    ) -> Result<Spectrum>
    where
        F: Fn(usize) + Sync,
    {
        if !(self.reg_weight.is_finite() && self.reg_weight >= 0.0) {
            return Err(FusionError::Input(format!(
                "regularization weight must be finite and non-negative, got {}",
                self.reg_weight
            )));
        }
        info!(
            method = %self.regularization,
            weight = self.reg_weight,
            views = data.view_count(),
            "Deconvolving"
        );
        match &self.regularization {
            Regularization::Ggr(params) => {
                let mean = mean.ok_or_else(|| {
                    FusionError::Input("GGR regularization requires the mean-fusion volume".into())
                })?;
                if mean.dim() != data.shape() {
                    return Err(FusionError::GridMismatch(format!(
                        "mean volume {:?} vs data terms {:?}",
                        mean.dim(),
                        data.shape()
                    )));
                }
                let terms = ggr_regularizer_with_progress(mean, params, on_progress)?;
                Ok(solve_spectrum(data, Some(&terms.dg), &terms.dd, self.reg_weight))
            }
            Regularization::Tikhonov => {
                let penalty = tikhonov_penalty(data.shape())?;
                on_progress(1);
                Ok(solve_spectrum(data, None, &penalty, self.reg_weight))
            }
        }
    }

    pub fn solve(&self, data: &DataTerms, mean: Option<&Array3<f32>>) -> Result<Spectrum> {
        self.solve_with_progress(data, mean, |_| {})
    }

    /// Solve and return the reconstruction on `template`'s grid.
    pub fn reconstruct(
        &self,
        data: &DataTerms,
        mean: Option<&Volume>,
        template: &Volume,
    ) -> Result<Volume> {
        let x = self.solve(data, mean.map(|m| &m.data))?;
        template.with_data(finish_spectrum(x, self.keep_negative_values))
    }
}
