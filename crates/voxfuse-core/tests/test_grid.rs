mod common;

use voxfuse_core::error::FusionError;
use voxfuse_core::resample::{
    canonical_geometry, force_even, harmonize, reference_view_geometry,
    secondary_view_geometry, validate_explicit_size,
};

use common::{grid, two_view_scene};

// ---------------------------------------------------------------------------
// Parity and explicit sizes
// ---------------------------------------------------------------------------

#[test]
fn test_force_even_drops_odd_sample() {
    assert_eq!(force_even(0), 0);
    assert_eq!(force_even(7), 6);
    assert_eq!(force_even(8), 8);
}

#[test]
fn test_explicit_size_is_forced_even() {
    let size = validate_explicit_size(&[65, 64, 33], 3).unwrap();
    assert_eq!(size, [64, 64, 32]);
}

#[test]
fn test_explicit_size_length_must_match_view_count() {
    let err = validate_explicit_size(&[64, 64, 64], 2).unwrap_err();
    assert!(matches!(err, FusionError::Input(_)), "got {err:?}");
}

#[test]
fn test_explicit_size_rejects_non_positive_entries() {
    for size in [[64, 0, 64], [64, -2, 64]] {
        let err = validate_explicit_size(&size, 3).unwrap_err();
        assert!(matches!(err, FusionError::Input(_)), "got {err:?}");
    }
}

#[test]
fn test_explicit_size_must_be_three_dimensional() {
    let err = validate_explicit_size(&[64, 64], 2).unwrap_err();
    assert!(matches!(err, FusionError::Input(_)), "got {err:?}");
}

#[test]
fn test_explicit_size_of_one_leaves_empty_axis() {
    let err = validate_explicit_size(&[1, 64, 64], 3).unwrap_err();
    assert!(matches!(err, FusionError::Input(_)), "got {err:?}");
}

// ---------------------------------------------------------------------------
// Canonical grid
// ---------------------------------------------------------------------------

#[test]
fn test_canonical_grid_is_isotropic_at_finest_spacing() {
    let reference = grid([10, 10, 5], [1.0, 1.0, 3.0]);
    let canonical = canonical_geometry(&reference, None).unwrap();
    assert_eq!(canonical.spacing, [1.0; 3]);
    // Extent 15 along z rounds to 15, forced even to 14.
    assert_eq!(canonical.size, [10, 10, 14]);
    assert_eq!(canonical.origin, reference.origin);
    assert_eq!(canonical.direction, reference.direction);
}

#[test]
fn test_canonical_grid_uses_explicit_size() {
    let reference = grid([10, 10, 5], [1.0, 1.0, 3.0]);
    let canonical = canonical_geometry(&reference, Some([20, 20, 30])).unwrap();
    assert_eq!(canonical.size, [20, 20, 30]);
    assert_eq!(canonical.spacing, [1.0; 3]);
}

#[test]
fn test_canonical_size_is_rounded() {
    // 7 * 0.7 / 0.5 = 9.8 -> 10
    let reference = grid([7, 8, 8], [0.7, 0.5, 0.5]);
    let canonical = canonical_geometry(&reference, None).unwrap();
    assert_eq!(canonical.size[0], 10);
}

// ---------------------------------------------------------------------------
// Mapped sizes
// ---------------------------------------------------------------------------

#[test]
fn test_reference_mapped_size_is_native_forced_even() {
    let view = reference_view_geometry(&grid([11, 10, 5], [1.0, 1.0, 3.0]));
    assert_eq!(view.mapped_size, [10, 10, 4]);
    assert_eq!(view.native_size, [11, 10, 5]);
}

#[test]
fn test_secondary_mapped_size_is_bounded_by_native() {
    let canonical = grid([10, 10, 14], [1.0; 3]);
    let native = grid([10, 10, 5], [1.0, 1.0, 3.0]);
    let view = secondary_view_geometry(&native, &canonical);
    // z: 14 / 3 = 4.67 -> 5, min(5, 5) = 5 -> 4
    assert_eq!(view.mapped_size, [10, 10, 4]);
}

#[test]
fn test_secondary_mapped_size_rounds_half_to_even() {
    let canonical = grid([10, 14, 10], [1.0; 3]);
    // x: 10 / 4 = 2.5 -> 2; y: 14 / 4 = 3.5 -> 4
    let native = grid([3, 8, 10], [4.0, 4.0, 1.0]);
    let view = secondary_view_geometry(&native, &canonical);
    assert_eq!(view.mapped_size, [2, 4, 10]);
}

#[test]
fn test_mapped_sizes_are_even() {
    let canonical = grid([32, 32, 32], [0.5; 3]);
    for (size, spacing) in [
        ([13, 17, 9], [1.3, 0.9, 1.7]),
        ([7, 31, 15], [2.1, 0.5, 1.1]),
    ] {
        let view = secondary_view_geometry(&grid(size, spacing), &canonical);
        assert!(view.mapped_size.iter().all(|n| n % 2 == 0), "{view:?}");
    }
}

// ---------------------------------------------------------------------------
// Harmonization
// ---------------------------------------------------------------------------

#[test]
fn test_harmonized_views_share_the_canonical_grid() {
    let (reference, view) = two_view_scene();
    let harmonized = harmonize(&[reference, view], None).unwrap();

    let canonical = harmonized.canonical();
    assert_eq!(canonical.size, [16, 16, 16]);
    assert_eq!(canonical.spacing, [1.0; 3]);
    for secondary in &harmonized.secondaries {
        assert!(canonical.same_grid(&secondary.geometry));
        assert_eq!(secondary.data.dim(), canonical.shape());
    }
    assert_eq!(harmonized.views.len(), 2);
    assert_eq!(harmonized.views[0].mapped_size, [16, 16, 8]);
    assert_eq!(harmonized.views[1].mapped_size, [16, 8, 16]);
}

#[test]
fn test_harmonize_without_views_fails() {
    let err = harmonize(&[], None).unwrap_err();
    assert!(matches!(err, FusionError::EmptySequence), "got {err:?}");
}
