mod common;

use approx::assert_abs_diff_eq;
use voxfuse_core::error::FusionError;
use voxfuse_core::register::phase::{compute_offset, shift_volume, trilinear_sample};
use voxfuse_core::register::{
    register_views, IdentityRegistrar, PhaseCorrelationRegistrar, Registration,
    RegistrationFailure, TransformArtifact, ViewRegistrar,
};
use voxfuse_core::volume::Volume;

use common::{blob, constant_volume, grid, sample_physical};

const CENTER: [f64; 3] = [15.0, 16.0, 14.0];

fn blob_volume(shift: [f64; 3]) -> Volume {
    let center = [CENTER[0] + shift[0], CENTER[1] + shift[1], CENTER[2] + shift[2]];
    sample_physical(&grid([32, 32, 32], [1.0; 3]), blob(center, 2.0))
}

fn max_abs_diff(a: &Volume, b: &Volume) -> f32 {
    a.data
        .iter()
        .zip(b.data.iter())
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}

// ---------------------------------------------------------------------------
// Phase correlation
// ---------------------------------------------------------------------------

#[test]
fn test_offset_of_identical_volumes_is_zero() {
    let v = blob_volume([0.0; 3]);
    let (offset, peak) = compute_offset(&v.data, &v.data).unwrap();
    for o in offset {
        assert_abs_diff_eq!(o, 0.0, epsilon = 1e-3);
    }
    assert!(peak > 0.5, "peak {peak}");
}

#[test]
fn test_offset_undoes_a_known_shift() {
    let shift = [2.0, -3.0, 1.0];
    let reference = blob_volume([0.0; 3]);
    let moving = blob_volume(shift);

    let (offset, _) = compute_offset(&reference.data, &moving.data).unwrap();
    for axis in 0..3 {
        assert_abs_diff_eq!(offset[axis], -shift[axis], epsilon = 0.35);
    }

    let aligned = shift_volume(&moving.data, offset);
    let aligned = reference.with_data(aligned).unwrap();
    assert!(max_abs_diff(&aligned, &reference) < 1.0);
}

#[test]
fn test_registrar_reports_translation() {
    let reference = blob_volume([0.0; 3]);
    let moving = blob_volume([0.0, 2.0, 0.0]);
    let registration = PhaseCorrelationRegistrar::default()
        .register(&reference, &moving)
        .unwrap();

    match registration.transform {
        TransformArtifact::Translation { voxels, physical, peak } => {
            assert_abs_diff_eq!(voxels[1], -2.0, epsilon = 0.35);
            assert_abs_diff_eq!(physical[1], voxels[1], epsilon = 1e-12);
            assert!(peak > 0.02);
        }
        other => panic!("unexpected transform {other:?}"),
    }
    assert!(registration.volume.geometry.same_grid(&reference.geometry));
    assert!(max_abs_diff(&registration.volume, &reference) < 1.0);
}

#[test]
fn test_empty_volume_does_not_register() {
    let reference = blob_volume([0.0; 3]);
    let empty = constant_volume([32, 32, 32], [1.0; 3], 0.0);
    assert!(compute_offset(&reference.data, &empty.data).is_err());
    assert!(PhaseCorrelationRegistrar::default()
        .register(&reference, &empty)
        .is_err());
}

#[test]
fn test_unreachable_peak_threshold_fails() {
    let reference = blob_volume([0.0; 3]);
    let registrar = PhaseCorrelationRegistrar { min_peak: 2.0 };
    let err = registrar.register(&reference, &reference).unwrap_err();
    assert!(err.reason.contains("below minimum"), "{err}");
}

#[test]
fn test_trilinear_sample_interpolates_and_zero_fills() {
    let v = blob_volume([0.0; 3]);
    let (z, y, x) = (14.0, 16.0, 15.0);
    assert_eq!(trilinear_sample(&v.data, z, y, x), v.data[[14, 16, 15]]);
    let mid = trilinear_sample(&v.data, z, y, x + 0.5);
    let expected = 0.5 * (v.data[[14, 16, 15]] + v.data[[14, 16, 16]]);
    assert_abs_diff_eq!(mid, expected, epsilon = 1e-5);
    assert_eq!(trilinear_sample(&v.data, -2.0, 0.0, 0.0), 0.0);
    assert_eq!(trilinear_sample(&v.data, 0.0, 40.0, 0.0), 0.0);
}

// ---------------------------------------------------------------------------
// Registration driver
// ---------------------------------------------------------------------------

struct FailingRegistrar;

impl ViewRegistrar for FailingRegistrar {
    fn name(&self) -> &str {
        "failing"
    }

    fn register(&self, _: &Volume, _: &Volume) -> Result<Registration, RegistrationFailure> {
        Err(RegistrationFailure::new("did not converge"))
    }
}

/// Returns the moving view on a coarser grid.
struct OffGridRegistrar;

impl ViewRegistrar for OffGridRegistrar {
    fn name(&self) -> &str {
        "off-grid"
    }

    fn register(&self, _: &Volume, _: &Volume) -> Result<Registration, RegistrationFailure> {
        Ok(Registration {
            volume: constant_volume([4, 4, 4], [2.0; 3], 1.0),
            transform: TransformArtifact::Identity,
        })
    }
}

#[test]
fn test_identity_registration_keeps_views() {
    let reference = blob_volume([0.0; 3]);
    let views = vec![blob_volume([1.0, 0.0, 0.0]), blob_volume([0.0, 1.0, 0.0])];
    let done = std::cell::Cell::new(0);
    let registered = register_views(&IdentityRegistrar, &reference, &views, |n| done.set(n)).unwrap();
    assert_eq!(registered.len(), 2);
    assert_eq!(done.get(), 2);
    assert_eq!(registered[1].volume.data, views[1].data);
    assert_eq!(registered[0].transform, TransformArtifact::Identity);
}

#[test]
fn test_failure_names_the_view() {
    let reference = blob_volume([0.0; 3]);
    let views = vec![blob_volume([1.0, 0.0, 0.0])];
    let err = register_views(&FailingRegistrar, &reference, &views, |_| {}).unwrap_err();
    match err {
        FusionError::Registration { view, reason } => {
            assert_eq!(view, 1);
            assert_eq!(reason, "did not converge");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn test_result_off_the_canonical_grid_is_a_failure() {
    let reference = blob_volume([0.0; 3]);
    let views = vec![reference.clone(), reference.clone()];
    let err = register_views(&OffGridRegistrar, &reference, &views, |_| {}).unwrap_err();
    assert!(matches!(err, FusionError::Registration { view: 1, .. }), "got {err:?}");
}

#[test]
fn test_views_must_share_the_grid_before_registration() {
    let reference = blob_volume([0.0; 3]);
    let views = vec![constant_volume([16, 16, 16], [2.0; 3], 1.0)];
    let err = register_views(&IdentityRegistrar, &reference, &views, |_| {}).unwrap_err();
    assert!(matches!(err, FusionError::GridMismatch(_)), "got {err:?}");
}

// ---------------------------------------------------------------------------
// External command
// ---------------------------------------------------------------------------

#[cfg(unix)]
mod command {
    use std::path::Path;

    use tempfile::tempdir;
    use voxfuse_core::register::command::{default_command_args, CommandRegistrar};
    use voxfuse_core::register::{TransformArtifact, ViewRegistrar};

    use super::blob_volume;

    fn registrar(program: &str, args: &[&str], dir: &Path) -> CommandRegistrar {
        CommandRegistrar::new(program, args.iter().map(|s| s.to_string()).collect(), dir)
    }

    #[test]
    fn test_default_arguments_use_every_placeholder() {
        let args = default_command_args().join(" ");
        for placeholder in ["{fixed}", "{moving}", "{output}", "{transform}"] {
            assert!(args.contains(placeholder), "{args}");
        }
    }

    #[test]
    fn test_missing_program_fails() {
        let dir = tempdir().unwrap();
        let v = blob_volume([0.0; 3]);
        let r = registrar("/nonexistent/voxfuse-rigid", &[], dir.path());
        let err = r.register(&v, &v).unwrap_err();
        assert!(err.reason.contains("failed to start"), "{err}");
    }

    #[test]
    fn test_non_zero_exit_fails() {
        let dir = tempdir().unwrap();
        let v = blob_volume([0.0; 3]);
        let err = registrar("false", &[], dir.path()).register(&v, &v).unwrap_err();
        assert!(err.reason.contains("exited"), "{err}");
    }

    #[test]
    fn test_missing_output_fails() {
        let dir = tempdir().unwrap();
        let v = blob_volume([0.0; 3]);
        let err = registrar("true", &[], dir.path()).register(&v, &v).unwrap_err();
        assert!(err.reason.contains("no output"), "{err}");
    }

    #[test]
    fn test_output_is_read_back() {
        let dir = tempdir().unwrap();
        let fixed = blob_volume([0.0; 3]);
        let moving = blob_volume([1.0, 0.0, 0.0]);
        let r = registrar("cp", &["{moving}", "{output}"], dir.path()).with_extension(".nii");
        let registration = r.register(&fixed, &moving).unwrap();
        assert_eq!(registration.volume.data, moving.data);
        assert!(matches!(registration.transform, TransformArtifact::External { .. }));
        assert!(dir.path().join("rigid_fixed_0.nii").is_file());
    }
}
