use ndarray::Array3;

use crate::error::Result;
use crate::gradient::GradientOperatorBank;

/// Smoothness penalty `sum_axis |D_axis|^2` of the `[-1, 1]` forward
/// difference along each array axis.
pub fn tikhonov_penalty(shape: (usize, usize, usize)) -> Result<Array3<f32>> {
    let bank = GradientOperatorBank::new(shape, 1)?;
    Ok(bank.first_order_energy())
}
