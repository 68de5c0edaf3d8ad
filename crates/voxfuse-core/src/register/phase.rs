use ndarray::{Array3, Zip};
use num_complex::Complex32;

use crate::consts::{DEFAULT_MIN_CORRELATION_PEAK, PARALLEL_VOXEL_THRESHOLD};
use crate::fft::{fft3d, ifft3d_real_owned};
use crate::volume::{mat3_mul_vec, Volume};

use super::{Registration, RegistrationFailure, TransformArtifact, ViewRegistrar};

/// Translation-only rigid alignment by 3D phase correlation.
///
/// Hann-windowed normalized cross-power spectrum, integer peak search,
/// per-axis parabola refinement, then a trilinear shift of the moving view.
pub struct PhaseCorrelationRegistrar {
    /// Correlation peaks below this are reported as non-convergence.
    pub min_peak: f64,
}

impl Default for PhaseCorrelationRegistrar {
    fn default() -> Self {
        Self {
            min_peak: DEFAULT_MIN_CORRELATION_PEAK,
        }
    }
}

impl ViewRegistrar for PhaseCorrelationRegistrar {
    fn name(&self) -> &str {
        "phase-correlation"
    }

    fn register(
        &self,
        fixed: &Volume,
        moving: &Volume,
    ) -> Result<Registration, RegistrationFailure> {
        let (offset, peak) = compute_offset(&fixed.data, &moving.data)?;
        if !(peak.is_finite() && peak >= self.min_peak) {
            return Err(RegistrationFailure::new(format!(
                "correlation peak {peak:.4} below minimum {:.4}",
                self.min_peak
            )));
        }

        let geo = &moving.geometry;
        let physical = mat3_mul_vec(
            &geo.direction,
            [
                offset[0] * geo.spacing[0],
                offset[1] * geo.spacing[1],
                offset[2] * geo.spacing[2],
            ],
        );
        let data = shift_volume(&moving.data, offset);
        let volume = moving
            .with_data(data)
            .map_err(|e| RegistrationFailure::new(e.to_string()))?;

        Ok(Registration {
            volume,
            transform: TransformArtifact::Translation {
                voxels: offset,
                physical,
                peak,
            },
        })
    }
}

/// Offset (x, y, z) in voxels that aligns `target` onto `reference`, and the
/// normalized correlation peak.
pub fn compute_offset(
    reference: &Array3<f32>,
    target: &Array3<f32>,
) -> Result<([f64; 3], f64), RegistrationFailure> {
    if reference.dim() != target.dim() {
        return Err(RegistrationFailure::new(format!(
            "array size mismatch: {:?} vs {:?}",
            reference.dim(),
            target.dim()
        )));
    }
    if energy(reference) == 0.0 || energy(target) == 0.0 {
        return Err(RegistrationFailure::new("volume has no signal"));
    }

    let ref_fft = fft3d(&apply_hann(reference));
    let tgt_fft = fft3d(&apply_hann(target));
    let correlation = ifft3d_real_owned(normalized_cross_power(&ref_fft, &tgt_fft));

    let (peak_idx, peak_val) = find_peak(&correlation);
    let dims = correlation.dim();
    let dims = [dims.0, dims.1, dims.2];
    let refine = refine_peak_parabola(&correlation, peak_idx);

    // Array axes are (z, y, x); the offset is reported as (x, y, z).
    let mut offset = [0.0f64; 3];
    for axis in 0..3 {
        let n = dims[axis];
        let p = peak_idx[axis];
        let signed = if p > n / 2 {
            p as f64 - n as f64
        } else {
            p as f64
        };
        offset[2 - axis] = signed + refine[axis];
    }
    Ok((offset, peak_val as f64))
}

fn energy(data: &Array3<f32>) -> f64 {
    data.iter().map(|&v| (v as f64) * (v as f64)).sum()
}

fn hann(n: usize) -> Vec<f32> {
    (0..n)
        .map(|i| (0.5 * (1.0 - (std::f64::consts::TAU * i as f64 / n as f64).cos())) as f32)
        .collect()
}

fn apply_hann(data: &Array3<f32>) -> Array3<f32> {
    let (nz, ny, nx) = data.dim();
    let (wz, wy, wx) = (hann(nz), hann(ny), hann(nx));
    let mut result = data.clone();
    Zip::indexed(&mut result).for_each(|(k, j, i), v| *v *= wz[k] * wy[j] * wx[i]);
    result
}

fn normalized_cross_power(ref_fft: &Array3<Complex32>, tgt_fft: &Array3<Complex32>) -> Array3<Complex32> {
    Zip::from(ref_fft).and(tgt_fft).map_collect(|&a, &b| {
        let cross = a * b.conj();
        let mag = cross.norm();
        if mag > 1e-12 {
            cross / mag
        } else {
            Complex32::new(0.0, 0.0)
        }
    })
}

fn find_peak(data: &Array3<f32>) -> ([usize; 3], f32) {
    let mut best = [0usize; 3];
    let mut best_val = f32::NEG_INFINITY;
    for ((k, j, i), &v) in data.indexed_iter() {
        if v > best_val {
            best_val = v;
            best = [k, j, i];
        }
    }
    (best, best_val)
}

/// Fractional offsets per array axis from a 3-point parabola through the
/// peak and its periodic neighbours, clamped to +/- 0.5.
fn refine_peak_parabola(correlation: &Array3<f32>, peak: [usize; 3]) -> [f64; 3] {
    let (nz, ny, nx) = correlation.dim();
    let dims = [nz, ny, nx];
    let mut delta = [0.0f64; 3];
    for axis in 0..3 {
        let n = dims[axis];
        if n < 3 {
            continue;
        }
        let mut prev = peak;
        let mut next = peak;
        prev[axis] = (peak[axis] + n - 1) % n;
        next[axis] = (peak[axis] + 1) % n;
        let y_prev = correlation[prev] as f64;
        let y_curr = correlation[peak] as f64;
        let y_next = correlation[next] as f64;
        let curvature = y_prev - 2.0 * y_curr + y_next;
        if curvature.abs() > 1e-12 {
            delta[axis] = ((y_prev - y_next) / (2.0 * curvature)).clamp(-0.5, 0.5);
        }
    }
    delta
}

/// Shift a volume by `offset` (x, y, z) voxels with trilinear interpolation;
/// samples taken from outside the volume are 0.
pub fn shift_volume(data: &Array3<f32>, offset: [f64; 3]) -> Array3<f32> {
    let mut result = Array3::<f32>::zeros(data.dim());
    let sample = |(k, j, i): (usize, usize, usize), v: &mut f32| {
        *v = trilinear_sample(
            data,
            k as f64 - offset[2],
            j as f64 - offset[1],
            i as f64 - offset[0],
        );
    };
    if data.len() >= PARALLEL_VOXEL_THRESHOLD {
        Zip::indexed(&mut result).par_for_each(sample);
    } else {
        Zip::indexed(&mut result).for_each(sample);
    }
    result
}

pub fn trilinear_sample(data: &Array3<f32>, z: f64, y: f64, x: f64) -> f32 {
    let (nz, ny, nx) = data.dim();
    let (z0, y0, x0) = (z.floor() as i64, y.floor() as i64, x.floor() as i64);
    let (fz, fy, fx) = (
        (z - z0 as f64) as f32,
        (y - y0 as f64) as f32,
        (x - x0 as f64) as f32,
    );

    let sample = |k: i64, j: i64, i: i64| -> f32 {
        if k >= 0 && k < nz as i64 && j >= 0 && j < ny as i64 && i >= 0 && i < nx as i64 {
            data[[k as usize, j as usize, i as usize]]
        } else {
            0.0
        }
    };

    let mut acc = 0.0f32;
    for (dk, wz) in [(0, 1.0 - fz), (1, fz)] {
        for (dj, wy) in [(0, 1.0 - fy), (1, fy)] {
            for (di, wx) in [(0, 1.0 - fx), (1, fx)] {
                let w = wz * wy * wx;
                if w != 0.0 {
                    acc += w * sample(z0 + dk, y0 + dj, x0 + di);
                }
            }
        }
    }
    acc
}
