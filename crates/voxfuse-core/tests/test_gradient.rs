mod common;

use approx::assert_abs_diff_eq;
use ndarray::Array3;
use voxfuse_core::fft::{fft3d, ifft3d_real_owned};
use voxfuse_core::gradient::{operator_triples, stencil, GradientOperatorBank, OrderTriple};

#[test]
fn stencils_follow_signed_order() {
    assert_eq!(stencil(-2), Some(&[-1.0f32, 0.0, 1.0][..]));
    assert_eq!(stencil(-1), Some(&[-1.0f32, 1.0][..]));
    assert_eq!(stencil(0), None);
    assert_eq!(stencil(1), Some(&[1.0f32, -1.0][..]));
    assert_eq!(stencil(2), Some(&[1.0f32, 0.0, -1.0][..]));
}

#[test]
fn seventy_one_triples_at_scale_two() {
    let triples = operator_triples(2);
    assert_eq!(triples.len(), 71);
    assert!(triples.iter().all(|t| !t.is_zero()));
    assert!(triples.iter().all(|t| t.l + t.p + t.q >= 0));
    assert!(triples.contains(&OrderTriple::new(-2, 1, 1)));
    assert!(!triples.contains(&OrderTriple::new(-2, 1, 0)));
}

#[test]
fn sixteen_triples_at_scale_one() {
    assert_eq!(operator_triples(1).len(), 16);
}

#[test]
fn decay_exponent_sums_absolute_orders() {
    assert_eq!(OrderTriple::new(-2, 1, 0).decay_exponent(), 3);
    assert_eq!(OrderTriple::new(2, 2, 2).decay_exponent(), 6);
}

#[test]
fn bank_rejects_unsupported_scale() {
    assert!(GradientOperatorBank::new((4, 4, 4), 0).is_err());
    assert!(GradientOperatorBank::new((4, 4, 4), 3).is_err());
}

#[test]
fn compound_operator_is_circular_difference() {
    let bank = GradientOperatorBank::new((4, 6, 8), 2).unwrap();
    let volume = Array3::from_shape_fn((4, 6, 8), |(k, j, i)| (i * i + 3 * j + 5 * k) as f32);

    // q = 1 -> [1, -1] along array axis 2: out[x] = v[x] - v[x - 1]
    let d = bank.compound(OrderTriple::new(0, 0, 1));
    let out = ifft3d_real_owned(&d * &fft3d(&volume));
    for ((k, j, i), &v) in out.indexed_iter() {
        let prev = (i + 7) % 8;
        let expected = volume[[k, j, i]] - volume[[k, j, prev]];
        assert_abs_diff_eq!(v, expected, epsilon = 1e-2);
    }

    // l = 2 -> [1, 0, -1] along array axis 0: out[z] = v[z] - v[z - 2]
    let d = bank.compound(OrderTriple::new(2, 0, 0));
    let out = ifft3d_real_owned(&d * &fft3d(&volume));
    for ((k, j, i), &v) in out.indexed_iter() {
        let prev = (k + 2) % 4;
        let expected = volume[[k, j, i]] - volume[[prev, j, i]];
        assert_abs_diff_eq!(v, expected, epsilon = 1e-2);
    }
}

#[test]
fn difference_operators_vanish_at_dc() {
    let bank = GradientOperatorBank::new((4, 4, 4), 2).unwrap();
    for triple in bank.triples() {
        let d = bank.compound(triple);
        assert!(d[[0, 0, 0]].norm() < 1e-6, "{triple:?}");
    }
}

#[test]
fn first_order_energy_peaks_at_nyquist() {
    let bank = GradientOperatorBank::new((8, 8, 8), 1).unwrap();
    let energy = bank.first_order_energy();
    assert_abs_diff_eq!(energy[[0, 0, 0]], 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(energy[[4, 0, 0]], 4.0, epsilon = 1e-5);
    assert_abs_diff_eq!(energy[[4, 4, 4]], 12.0, epsilon = 1e-4);
}
