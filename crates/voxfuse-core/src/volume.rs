use ndarray::Array3;
use num_complex::Complex32;
use serde::{Deserialize, Serialize};

use crate::consts::GRID_TOLERANCE;
use crate::error::{FusionError, Result};

/// Complex volume in the frequency domain, same layout as `Volume::data`.
pub type Spectrum = Array3<Complex32>;

/// Row-major 3x3 identity.
pub const IDENTITY_DIRECTION: [f64; 9] = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];

/// Physical placement of a voxel grid.
///
/// Vectors are ordered (x, y, z). `direction` is row-major; its column `j`
/// is the physical direction of grid axis `j`, so
/// `p = origin + direction * diag(spacing) * index`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub size: [usize; 3],
    pub spacing: [f64; 3],
    pub origin: [f64; 3],
    pub direction: [f64; 9],
}

impl Geometry {
    pub fn new(size: [usize; 3], spacing: [f64; 3], origin: [f64; 3], direction: [f64; 9]) -> Self {
        Self {
            size,
            spacing,
            origin,
            direction,
        }
    }

    /// Axis-aligned grid at the origin.
    pub fn axis_aligned(size: [usize; 3], spacing: [f64; 3]) -> Self {
        Self::new(size, spacing, [0.0; 3], IDENTITY_DIRECTION)
    }

    /// Array shape `(nz, ny, nx)` of the sample buffer.
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.size[2], self.size[1], self.size[0])
    }

    pub fn voxel_count(&self) -> usize {
        self.size.iter().product()
    }

    /// Physical length covered by the samples along each axis.
    pub fn extent(&self) -> [f64; 3] {
        [
            self.spacing[0] * self.size[0] as f64,
            self.spacing[1] * self.size[1] as f64,
            self.spacing[2] * self.size[2] as f64,
        ]
    }

    pub fn min_spacing(&self) -> f64 {
        self.spacing.iter().copied().fold(f64::INFINITY, f64::min)
    }

    /// Map a continuous (x, y, z) index to physical coordinates.
    pub fn index_to_physical(&self, index: [f64; 3]) -> [f64; 3] {
        let scaled = [
            index[0] * self.spacing[0],
            index[1] * self.spacing[1],
            index[2] * self.spacing[2],
        ];
        let rotated = mat3_mul_vec(&self.direction, scaled);
        [
            self.origin[0] + rotated[0],
            self.origin[1] + rotated[1],
            self.origin[2] + rotated[2],
        ]
    }

    /// Precompute the physical-to-index mapping of this grid.
    pub fn index_mapper(&self) -> Result<IndexMapper> {
        let mut m = self.direction;
        for row in 0..3 {
            for col in 0..3 {
                m[row * 3 + col] *= self.spacing[col];
            }
        }
        let inverse = mat3_inverse(&m).ok_or_else(|| {
            FusionError::InvalidVolume(format!(
                "singular grid: spacing {:?}, direction {:?}",
                self.spacing, self.direction
            ))
        })?;
        Ok(IndexMapper {
            origin: self.origin,
            inverse,
        })
    }

    /// True when size matches exactly and spacing, origin, direction agree
    /// within `GRID_TOLERANCE`.
    pub fn same_grid(&self, other: &Geometry) -> bool {
        let close = |a: &[f64], b: &[f64]| {
            a.iter()
                .zip(b)
                .all(|(x, y)| (x - y).abs() <= GRID_TOLERANCE)
        };
        self.size == other.size
            && close(&self.spacing, &other.spacing)
            && close(&self.origin, &other.origin)
            && close(&self.direction, &other.direction)
    }

    pub fn ensure_same_grid(&self, other: &Geometry, what: &str) -> Result<()> {
        if self.same_grid(other) {
            Ok(())
        } else {
            Err(FusionError::GridMismatch(format!(
                "{what}: size {:?} spacing {:?} vs size {:?} spacing {:?}",
                other.size, other.spacing, self.size, self.spacing
            )))
        }
    }
}

/// Physical point to continuous (x, y, z) index for one grid.
#[derive(Clone, Debug)]
pub struct IndexMapper {
    origin: [f64; 3],
    inverse: [f64; 9],
}

impl IndexMapper {
    pub fn to_index(&self, point: [f64; 3]) -> [f64; 3] {
        let rel = [
            point[0] - self.origin[0],
            point[1] - self.origin[1],
            point[2] - self.origin[2],
        ];
        mat3_mul_vec(&self.inverse, rel)
    }
}

/// A scalar volume with its physical geometry.
#[derive(Clone, Debug)]
pub struct Volume {
    /// Samples, shape = (nz, ny, nx), x fastest.
    pub data: Array3<f32>,
    pub geometry: Geometry,
}

impl Volume {
    pub fn new(data: Array3<f32>, geometry: Geometry) -> Result<Self> {
        if data.dim() != geometry.shape() {
            return Err(FusionError::InvalidVolume(format!(
                "sample buffer {:?} does not match grid size {:?}",
                data.dim(),
                geometry.size
            )));
        }
        Ok(Self { data, geometry })
    }

    pub fn zeros(geometry: Geometry) -> Self {
        Self {
            data: Array3::zeros(geometry.shape()),
            geometry,
        }
    }

    /// New volume on this volume's grid.
    pub fn with_data(&self, data: Array3<f32>) -> Result<Self> {
        Self::new(data, self.geometry.clone())
    }

    pub fn size(&self) -> [usize; 3] {
        self.geometry.size
    }

    pub fn spacing(&self) -> [f64; 3] {
        self.geometry.spacing
    }
}

pub(crate) fn mat3_mul_vec(m: &[f64; 9], v: [f64; 3]) -> [f64; 3] {
    [
        m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
        m[3] * v[0] + m[4] * v[1] + m[5] * v[2],
        m[6] * v[0] + m[7] * v[1] + m[8] * v[2],
    ]
}

pub(crate) fn mat3_inverse(m: &[f64; 9]) -> Option<[f64; 9]> {
    let det = m[0] * (m[4] * m[8] - m[5] * m[7]) - m[1] * (m[3] * m[8] - m[5] * m[6])
        + m[2] * (m[3] * m[7] - m[4] * m[6]);
    if det.abs() < 1e-12 {
        return None;
    }
    let inv_det = 1.0 / det;
    Some([
        (m[4] * m[8] - m[5] * m[7]) * inv_det,
        (m[2] * m[7] - m[1] * m[8]) * inv_det,
        (m[1] * m[5] - m[2] * m[4]) * inv_det,
        (m[5] * m[6] - m[3] * m[8]) * inv_det,
        (m[0] * m[8] - m[2] * m[6]) * inv_det,
        (m[2] * m[3] - m[0] * m[5]) * inv_det,
        (m[3] * m[7] - m[4] * m[6]) * inv_det,
        (m[1] * m[6] - m[0] * m[7]) * inv_det,
        (m[0] * m[4] - m[1] * m[3]) * inv_det,
    ])
}
