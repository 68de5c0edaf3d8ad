use ndarray::Array3;
use num_complex::Complex32;

use crate::error::{FusionError, Result};
use crate::fft::fft1d_padded;
use crate::volume::Spectrum;

/// Largest stencil order with a defined finite-difference stencil.
pub const MAX_STENCIL_ORDER: i32 = 2;

/// Finite-difference stencil for a signed order index, `None` for identity.
///
/// `-2 -> [-1, 0, 1]`, `-1 -> [-1, 1]`, `1 -> [1, -1]`, `2 -> [1, 0, -1]`.
pub fn stencil(order: i32) -> Option<&'static [f32]> {
    match order {
        -2 => Some(&[-1.0, 0.0, 1.0]),
        -1 => Some(&[-1.0, 1.0]),
        1 => Some(&[1.0, -1.0]),
        2 => Some(&[1.0, 0.0, -1.0]),
        _ => None,
    }
}

/// Stencil orders along array axes 0, 1 and 2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct OrderTriple {
    pub l: i32,
    pub p: i32,
    pub q: i32,
}

impl OrderTriple {
    pub fn new(l: i32, p: i32, q: i32) -> Self {
        Self { l, p, q }
    }

    /// Exponent of the decay weight, |l| + |p| + |q|.
    pub fn decay_exponent(&self) -> i32 {
        self.l.abs() + self.p.abs() + self.q.abs()
    }

    pub fn is_zero(&self) -> bool {
        self.l == 0 && self.p == 0 && self.q == 0
    }
}

/// All triples in `[-scale, scale]^3` except the zero triple and those whose
/// index sum is negative.
pub fn operator_triples(scale: i32) -> Vec<OrderTriple> {
    let mut triples = Vec::new();
    for l in -scale..=scale {
        for p in -scale..=scale {
            for q in -scale..=scale {
                let t = OrderTriple::new(l, p, q);
                if t.is_zero() || l + p + q < 0 {
                    continue;
                }
                triples.push(t);
            }
        }
    }
    triples
}

/// Frequency responses of the directional stencils on one grid.
///
/// A stencil padded along a single axis transforms to a constant along the
/// other two, so each axis keeps only its 1D spectra; compound operators are
/// formed on demand as outer products.
pub struct GradientOperatorBank {
    shape: (usize, usize, usize),
    scale: i32,
    /// `axes[a][order + scale]` is the 1D response along array axis `a`.
    axes: [Vec<Vec<Complex32>>; 3],
}

impl GradientOperatorBank {
    /// Build the bank for a grid of array shape `(nz, ny, nx)`.
    pub fn new(shape: (usize, usize, usize), scale: i32) -> Result<Self> {
        if !(1..=MAX_STENCIL_ORDER).contains(&scale) {
            return Err(FusionError::Input(format!(
                "gradient scale must be in 1..={MAX_STENCIL_ORDER}, got {scale}"
            )));
        }
        let lens = [shape.0, shape.1, shape.2];
        let axes = lens.map(|len| {
            (-scale..=scale)
                .map(|order| match stencil(order) {
                    Some(taps) => fft1d_padded(taps, len),
                    None => vec![Complex32::new(1.0, 0.0); len],
                })
                .collect()
        });
        Ok(Self { shape, scale, axes })
    }

    pub fn scale(&self) -> i32 {
        self.scale
    }

    /// 1D response of `order` along array axis `axis`.
    pub fn axis_response(&self, axis: usize, order: i32) -> &[Complex32] {
        &self.axes[axis][(order + self.scale) as usize]
    }

    /// The triples this bank enumerates.
    pub fn triples(&self) -> Vec<OrderTriple> {
        operator_triples(self.scale)
    }

    /// Compound 3D operator: product of the three per-axis responses.
    pub fn compound(&self, triple: OrderTriple) -> Spectrum {
        let a = self.axis_response(0, triple.l);
        let b = self.axis_response(1, triple.p);
        let c = self.axis_response(2, triple.q);
        Array3::from_shape_fn(self.shape, |(k, j, i)| a[k] * b[j] * c[i])
    }

    /// Sum over axes of |D_axis|^2 for the `[-1, 1]` forward difference.
    pub fn first_order_energy(&self) -> Array3<f32> {
        let a = self.axis_response(0, -1);
        let b = self.axis_response(1, -1);
        let c = self.axis_response(2, -1);
        Array3::from_shape_fn(self.shape, |(k, j, i)| {
            a[k].norm_sqr() + b[j].norm_sqr() + c[i].norm_sqr()
        })
    }
}
