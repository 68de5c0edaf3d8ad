//! Cubic B-spline interpolation on a regular 3D grid.
//!
//! Samples are first converted to B-spline coefficients with the recursive
//! prefilter of Unser et al. (mirror boundary), so the interpolant passes
//! exactly through the original samples. Evaluation sums 4x4x4 coefficients
//! weighted by the cubic B-spline basis.

use ndarray::{Array3, ArrayViewMut1, Axis, Zip};

use crate::consts::PARALLEL_VOXEL_THRESHOLD;

/// Pole of the cubic B-spline prefilter, sqrt(3) - 2.
const POLE: f64 = -0.267_949_192_431_122_7;

/// Truncation tolerance of the causal initialization sum.
const INIT_TOLERANCE: f64 = 1e-10;

/// Cubic B-spline basis function.
///
/// - (2/3) - |x|^2 + (1/2)|x|^3    for |x| < 1
/// - (1/6)(2 - |x|)^3              for 1 <= |x| < 2
/// - 0                             otherwise
pub fn cubic_bspline(x: f64) -> f64 {
    let ax = x.abs();
    if ax < 1.0 {
        2.0 / 3.0 - ax * ax + 0.5 * ax * ax * ax
    } else if ax < 2.0 {
        let t = 2.0 - ax;
        t * t * t / 6.0
    } else {
        0.0
    }
}

/// Interpolator holding the prefiltered coefficients of one volume.
pub struct BSplineInterpolator {
    coefficients: Array3<f64>,
}

impl BSplineInterpolator {
    /// Prefilter `samples` (shape (nz, ny, nx)) into spline coefficients.
    pub fn new(samples: &Array3<f32>) -> Self {
        let mut coefficients = samples.mapv(|v| v as f64);
        let parallel = coefficients.len() >= PARALLEL_VOXEL_THRESHOLD;
        for axis in 0..3 {
            if parallel {
                Zip::from(coefficients.lanes_mut(Axis(axis))).par_for_each(prefilter_lane);
            } else {
                Zip::from(coefficients.lanes_mut(Axis(axis))).for_each(prefilter_lane);
            }
        }
        Self { coefficients }
    }

    /// True when a continuous (x, y, z) index lies within half a voxel of the
    /// sample buffer.
    pub fn is_inside(&self, index: [f64; 3]) -> bool {
        let (nz, ny, nx) = self.coefficients.dim();
        let dims = [nx, ny, nz];
        index
            .iter()
            .zip(dims)
            .all(|(&c, n)| c >= -0.5 && c < n as f64 - 0.5)
    }

    /// Evaluate the spline at a continuous (x, y, z) index.
    pub fn evaluate(&self, index: [f64; 3]) -> f64 {
        let (nz, ny, nx) = self.coefficients.dim();
        let (ix, wx) = support(index[0], nx);
        let (iy, wy) = support(index[1], ny);
        let (iz, wz) = support(index[2], nz);

        let mut sum = 0.0;
        for (a, &z_idx) in iz.iter().enumerate() {
            let mut plane = 0.0;
            for (b, &y_idx) in iy.iter().enumerate() {
                let mut row = 0.0;
                for (c, &x_idx) in ix.iter().enumerate() {
                    row += wx[c] * self.coefficients[[z_idx, y_idx, x_idx]];
                }
                plane += wy[b] * row;
            }
            sum += wz[a] * plane;
        }
        sum
    }
}

/// Mirrored sample indices and basis weights of the 4-tap support at `x`.
fn support(x: f64, n: usize) -> ([usize; 4], [f64; 4]) {
    let start = x.floor() as i64 - 1;
    let mut indices = [0usize; 4];
    let mut weights = [0.0f64; 4];
    for k in 0..4 {
        let i = start + k as i64;
        indices[k] = mirror(i, n);
        weights[k] = cubic_bspline(x - i as f64);
    }
    (indices, weights)
}

/// Whole-sample mirror boundary: ... 2 1 | 0 1 2 ... n-1 | n-2 ...
fn mirror(i: i64, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let period = 2 * (n as i64 - 1);
    let mut m = i.rem_euclid(period);
    if m >= n as i64 {
        m = period - m;
    }
    m as usize
}

fn prefilter_lane(mut lane: ArrayViewMut1<f64>) {
    let n = lane.len();
    if n < 2 {
        return;
    }
    let mut c: Vec<f64> = lane.iter().copied().collect();
    let z = POLE;
    let gain = (1.0 - z) * (1.0 - 1.0 / z);
    for v in c.iter_mut() {
        *v *= gain;
    }

    c[0] = initial_causal(&c, z);
    for k in 1..n {
        c[k] += z * c[k - 1];
    }
    c[n - 1] = (z / (z * z - 1.0)) * (z * c[n - 2] + c[n - 1]);
    for k in (0..n - 1).rev() {
        c[k] = z * (c[k + 1] - c[k]);
    }

    for (dst, src) in lane.iter_mut().zip(c) {
        *dst = src;
    }
}

fn initial_causal(c: &[f64], z: f64) -> f64 {
    let n = c.len();
    let horizon = (INIT_TOLERANCE.ln() / z.abs().ln()).ceil() as usize;
    if horizon < n {
        let mut zn = z;
        let mut sum = c[0];
        for &v in &c[1..horizon] {
            sum += zn * v;
            zn *= z;
        }
        sum
    } else {
        let iz = 1.0 / z;
        let mut zn = z;
        let mut z2n = z.powi(n as i32 - 1);
        let mut sum = c[0] + z2n * c[n - 1];
        z2n *= z2n * iz;
        for &v in &c[1..n - 1] {
            sum += (zn + z2n) * v;
            zn *= z;
            z2n *= iz;
        }
        sum / (1.0 - zn * zn)
    }
}
