use ndarray::{Array3, Zip};
use num_complex::Complex32;
use tracing::debug;

use crate::consts::{EDGE_WEIGHT_AT_ZERO, PARALLEL_VOXEL_THRESHOLD};
use crate::error::Result;
use crate::fft::{fft3d, fft3d_inplace, ifft3d_real_owned};
use crate::gradient::GradientOperatorBank;
use crate::pipeline::config::GgrParams;
use crate::volume::Spectrum;

/// Gradient-guided regularization terms.
pub struct GgrTerms {
    /// sum over triples of a * conj(D) * FFT(w(g))
    pub dg: Spectrum,
    /// sum over triples of a * |D|^2
    pub dd: Array3<f32>,
    /// Number of operator triples accumulated.
    pub triples: usize,
}

/// Value at the `percentile` position of ascending |g|.
pub fn edge_threshold(gradient: &Array3<f32>, percentile: f32) -> f32 {
    let mut magnitudes: Vec<f32> = gradient.iter().map(|v| v.abs()).collect();
    if magnitudes.is_empty() {
        return 0.0;
    }
    let n = magnitudes.len();
    let idx = ((n as f64 * percentile as f64) as usize).min(n - 1);
    let (_, nth, _) = magnitudes.select_nth_unstable_by(idx, |a, b| a.total_cmp(b));
    *nth
}

/// Edge-preserving weighting g / (1 + (tau / g)^4).
///
/// Evaluated as g^5 / (g^4 + tau^4); where that denominator is zero
/// (g == 0 and tau == 0) the result is `EDGE_WEIGHT_AT_ZERO`.
#[inline]
pub fn edge_weight(g: f32, tau: f32) -> f32 {
    let g = g as f64;
    let t = tau as f64;
    let g4 = (g * g) * (g * g);
    let denom = g4 + (t * t) * (t * t);
    if denom == 0.0 {
        EDGE_WEIGHT_AT_ZERO
    } else {
        (g * g4 / denom) as f32
    }
}

/// Accumulate DG and DD from the mean-fusion volume.
pub fn ggr_regularizer(mean: &Array3<f32>, params: &GgrParams) -> Result<GgrTerms> {
    ggr_regularizer_with_progress(mean, params, |_| {})
}

/// Like [`ggr_regularizer`], calling `on_progress` with the number of
/// triples done after each one.
pub fn ggr_regularizer_with_progress<F>(
    mean: &Array3<f32>,
    params: &GgrParams,
    on_progress: F,
) -> Result<GgrTerms>
where
    F: Fn(usize) + Sync,
{
    params.validate()?;
    let shape = mean.dim();
    let bank = GradientOperatorBank::new(shape, params.scale)?;
    let mean_fft = fft3d(mean);
    let parallel = mean.len() >= PARALLEL_VOXEL_THRESHOLD;

    let mut dg = Spectrum::zeros(shape);
    let mut dd = Array3::<f32>::zeros(shape);
    let triples = bank.triples();

    for (done, triple) in triples.iter().enumerate() {
        let weight = params.alpha.powi(triple.decay_exponent());
        let d = bank.compound(*triple);

        // g = real(IFFT(D * FFT(mean)))
        let mut g = ifft3d_real_owned(&d * &mean_fft);

        let tau = edge_threshold(&g, params.tau_percentile);
        if parallel {
            g.par_mapv_inplace(|v| edge_weight(v, tau));
        } else {
            g.mapv_inplace(|v| edge_weight(v, tau));
        }

        let mut weighted = g.mapv(|v| Complex32::new(v, 0.0));
        fft3d_inplace(&mut weighted);

        let accumulate = |dg: &mut Complex32, dd: &mut f32, &d: &Complex32, &gw: &Complex32| {
            *dg += d.conj() * gw * weight;
            *dd += d.norm_sqr() * weight;
        };
        let zip = Zip::from(&mut dg).and(&mut dd).and(&d).and(&weighted);
        if parallel {
            zip.par_for_each(accumulate);
        } else {
            zip.for_each(accumulate);
        }

        debug!(
            l = triple.l,
            p = triple.p,
            q = triple.q,
            tau,
            weight,
            "Accumulated gradient operator"
        );
        on_progress(done + 1);
    }

    Ok(GgrTerms {
        dg,
        dd,
        triples: triples.len(),
    })
}
