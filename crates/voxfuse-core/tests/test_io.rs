mod common;

use std::fs;
use std::path::Path;

use approx::assert_abs_diff_eq;
use byteorder::{ByteOrder, LittleEndian};
use ndarray::Array3;
use num_complex::Complex32;
use tempfile::tempdir;
use voxfuse_core::error::FusionError;
use voxfuse_core::filter::ViewFilter;
use voxfuse_core::io::{
    datatype_name, header_geometry, read_filter, read_geometry, read_header, read_volume,
    save_slice_preview, split_name, write_filter, write_geometry, write_volume, Manifest,
    ManifestEntry,
};
use voxfuse_core::volume::{Geometry, Volume};

use common::from_index_fn;

fn rotated_volume() -> Volume {
    // Grid x runs along physical y, grid y along physical -x.
    let geometry = Geometry::new(
        [5, 4, 3],
        [0.5, 1.0, 2.0],
        [10.0, -20.0, 30.0],
        [0.0, -1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0],
    );
    let data = Array3::from_shape_fn(geometry.shape(), |(k, j, i)| (i + 10 * j + 100 * k) as f32 - 50.0);
    Volume::new(data, geometry).unwrap()
}

fn assert_geometry_close(a: &Geometry, b: &Geometry) {
    assert_eq!(a.size, b.size);
    for (x, y) in a.spacing.iter().zip(&b.spacing) {
        assert_abs_diff_eq!(*x, *y, epsilon = 1e-5);
    }
    for (x, y) in a.origin.iter().zip(&b.origin) {
        assert_abs_diff_eq!(*x, *y, epsilon = 1e-4);
    }
    for (x, y) in a.direction.iter().zip(&b.direction) {
        assert_abs_diff_eq!(*x, *y, epsilon = 1e-5);
    }
}

// ---------------------------------------------------------------------------
// NIfTI
// ---------------------------------------------------------------------------

#[test]
fn test_nifti_round_trip_plain_and_gzipped() {
    let dir = tempdir().unwrap();
    let volume = rotated_volume();
    for name in ["vol.nii", "vol.nii.gz"] {
        let path = dir.path().join(name);
        write_volume(&path, &volume).unwrap();
        let back = read_volume(&path).unwrap();
        assert_geometry_close(&back.geometry, &volume.geometry);
        assert_eq!(back.data, volume.data, "{name}");
    }
}

#[test]
fn test_nifti_header_stores_ras_affine() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("vol.nii.gz");
    let volume = rotated_volume();
    write_volume(&path, &volume).unwrap();

    let header = read_header(&path).unwrap();
    assert_eq!(&header.dim[..4], &[3, 5, 4, 3]);
    assert_eq!(datatype_name(&header), "float32");
    assert_eq!(header.sform_code, 1);
    assert_eq!(header.qform_code, 0);
    assert_abs_diff_eq!(header.srow_x[3], -10.0, epsilon = 1e-6);
    assert_abs_diff_eq!(header.srow_y[3], 20.0, epsilon = 1e-6);
    assert_abs_diff_eq!(header.srow_z[3], 30.0, epsilon = 1e-6);
    assert_geometry_close(&header_geometry(&header), &volume.geometry);
}

fn int16_header(size: [i16; 3], slope: f32, inter: f32) -> Vec<u8> {
    let mut bytes = vec![0u8; 352];
    LittleEndian::write_i32(&mut bytes[0..4], 348);
    let dim = [3, size[0], size[1], size[2], 1, 1, 1, 1];
    for (i, d) in dim.iter().enumerate() {
        LittleEndian::write_i16(&mut bytes[40 + 2 * i..42 + 2 * i], *d);
    }
    LittleEndian::write_i16(&mut bytes[70..72], 4);
    LittleEndian::write_i16(&mut bytes[72..74], 16);
    for (i, p) in [1.0f32, 2.0, 3.0, 4.0].iter().enumerate() {
        LittleEndian::write_f32(&mut bytes[76 + 4 * i..80 + 4 * i], *p);
    }
    LittleEndian::write_f32(&mut bytes[108..112], 352.0);
    LittleEndian::write_f32(&mut bytes[112..116], slope);
    LittleEndian::write_f32(&mut bytes[116..120], inter);
    bytes[344..348].copy_from_slice(b"n+1\0");
    bytes
}

fn append_int16(bytes: &mut Vec<u8>, values: &[i16]) {
    for &v in values {
        let mut buf = [0u8; 2];
        LittleEndian::write_i16(&mut buf, v);
        bytes.extend_from_slice(&buf);
    }
}

fn handcrafted_int16(path: &Path, size: [i16; 3], values: &[i16], slope: f32, inter: f32) {
    let mut bytes = int16_header(size, slope, inter);
    append_int16(&mut bytes, values);
    fs::write(path, bytes).unwrap();
}

#[test]
fn test_qform_only_header_gives_rotated_geometry() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("qform.nii");
    let expected = rotated_volume().geometry;

    let mut bytes = int16_header([5, 4, 3], 1.0, 0.0);
    for (i, p) in [1.0f32, 0.5, 1.0, 2.0].iter().enumerate() {
        LittleEndian::write_f32(&mut bytes[76 + 4 * i..80 + 4 * i], *p);
    }
    LittleEndian::write_i16(&mut bytes[252..254], 1);
    // Quarter turn about z in RAS, offset (-10, 20, 30).
    let quatern = [0.0f32, 0.0, -std::f32::consts::FRAC_1_SQRT_2, -10.0, 20.0, 30.0];
    for (i, q) in quatern.iter().enumerate() {
        LittleEndian::write_f32(&mut bytes[256 + 4 * i..260 + 4 * i], *q);
    }
    append_int16(&mut bytes, &[0; 60]);
    fs::write(&path, bytes).unwrap();

    let back = read_volume(&path).unwrap();
    assert_geometry_close(&back.geometry, &expected);
}

#[test]
fn test_int16_samples_are_scaled() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("scaled.nii");
    handcrafted_int16(&path, [2, 2, 1], &[0, 1, -2, 300], 0.5, 10.0);

    let volume = read_volume(&path).unwrap();
    assert_eq!(volume.size(), [2, 2, 1]);
    assert_eq!(volume.spacing(), [2.0, 3.0, 4.0]);
    let values: Vec<f32> = volume.data.iter().copied().collect();
    assert_eq!(values, vec![10.0, 10.5, 9.0, 160.0]);

    // No xform codes: pixdim only, flipped to LPS.
    assert_eq!(volume.geometry.direction[0], -1.0);
    assert_eq!(volume.geometry.direction[4], -1.0);
    assert_eq!(volume.geometry.direction[8], 1.0);
}

#[test]
fn test_zero_slope_leaves_samples_unscaled() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("raw.nii");
    handcrafted_int16(&path, [2, 1, 1], &[7, -7], 0.0, 5.0);
    let values: Vec<f32> = read_volume(&path).unwrap().data.iter().copied().collect();
    assert_eq!(values, vec![7.0, -7.0]);
}

#[test]
fn test_unsupported_extension_is_rejected() {
    let dir = tempdir().unwrap();
    let volume = rotated_volume();
    let err = write_volume(&dir.path().join("vol.mha"), &volume).unwrap_err();
    assert!(matches!(err, FusionError::InvalidVolume(_)), "got {err:?}");
    let err = read_volume(&dir.path().join("vol.nrrd")).unwrap_err();
    assert!(matches!(err, FusionError::InvalidVolume(_)), "got {err:?}");
}

#[test]
fn test_truncated_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("short.nii");
    handcrafted_int16(&path, [4, 4, 4], &[1, 2, 3], 1.0, 0.0);
    let err = read_volume(&path).unwrap_err();
    assert!(matches!(err, FusionError::InvalidVolume(_)), "got {err:?}");

    fs::write(&path, b"not a volume").unwrap();
    let err = read_volume(&path).unwrap_err();
    assert!(matches!(err, FusionError::InvalidVolume(_)), "got {err:?}");
}

#[test]
fn test_bitpix_disagreeing_with_datatype_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bitpix.nii");
    let mut bytes = int16_header([2, 2, 1], 1.0, 0.0);
    LittleEndian::write_i16(&mut bytes[72..74], 8);
    append_int16(&mut bytes, &[1, 2, 3, 4]);
    fs::write(&path, bytes).unwrap();

    let err = read_volume(&path).unwrap_err();
    assert!(matches!(err, FusionError::InvalidVolume(_)), "got {err:?}");
    let err = read_header(&path).unwrap_err();
    assert!(matches!(err, FusionError::InvalidVolume(_)), "got {err:?}");
}

#[test]
fn test_split_name_at_first_dot() {
    assert_eq!(
        split_name(Path::new("/data/view1.nii.gz")),
        ("view1".to_string(), ".nii.gz".to_string())
    );
    assert_eq!(split_name(Path::new("ref.nii")), ("ref".to_string(), ".nii".to_string()));
    assert_eq!(split_name(Path::new("plain")), ("plain".to_string(), String::new()));
}

// ---------------------------------------------------------------------------
// Working-directory artifacts
// ---------------------------------------------------------------------------

#[test]
fn test_geometry_record_round_trip() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("geometry.bin");
    let geometry = rotated_volume().geometry;
    write_geometry(&path, &geometry).unwrap();
    assert_eq!(read_geometry(&path).unwrap(), geometry);
}

#[test]
fn test_corrupt_geometry_record_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("geometry.bin");
    write_geometry(&path, &rotated_volume().geometry).unwrap();

    let mut bytes = fs::read(&path).unwrap();
    bytes[0] = b'X';
    fs::write(&path, &bytes).unwrap();
    assert!(matches!(read_geometry(&path), Err(FusionError::InvalidArtifact { .. })));

    fs::write(&path, &bytes[..20]).unwrap();
    assert!(matches!(read_geometry(&path), Err(FusionError::InvalidArtifact { .. })));
}

#[test]
fn test_manifest_lists_reference_then_registered_views() {
    let views = vec![
        ("ref".to_string(), ".nii.gz".to_string()),
        ("side".to_string(), ".nii".to_string()),
    ];
    let manifest = Manifest::for_views(&views);
    assert_eq!(
        manifest.entries,
        vec![
            ManifestEntry {
                volume: "ref_x.nii.gz".into(),
                filter: "h_ref.flt".into(),
            },
            ManifestEntry {
                volume: "reg_side_x.nii".into(),
                filter: "h_side.flt".into(),
            },
        ]
    );

    let dir = tempdir().unwrap();
    let path = dir.path().join("data_fn.txt");
    manifest.write(&path).unwrap();
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "ref_x.nii.gz,h_ref.flt\nreg_side_x.nii,h_side.flt\n"
    );
    assert_eq!(Manifest::read(&path).unwrap(), manifest);

    let paths = manifest.paths(dir.path());
    assert_eq!(paths[1].0, dir.path().join("reg_side_x.nii"));
    assert_eq!(paths[1].1, dir.path().join("h_side.flt"));
}

#[test]
fn test_malformed_manifest_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data_fn.txt");
    fs::write(&path, "\n\n").unwrap();
    assert!(matches!(Manifest::read(&path), Err(FusionError::InvalidArtifact { .. })));
    fs::write(&path, "only_a_volume.nii\n").unwrap();
    assert!(matches!(Manifest::read(&path), Err(FusionError::InvalidArtifact { .. })));
}

#[test]
fn test_filter_files_round_trip() {
    let dir = tempdir().unwrap();

    let path = dir.path().join("h_ref.flt");
    write_filter(&path, &ViewFilter::PassThrough).unwrap();
    assert!(read_filter(&path).unwrap().is_pass_through());

    let spectrum = Array3::from_shape_fn((2, 3, 4), |(k, j, i)| {
        let v = (i + j * 4 + k * 12) as f32 / 24.0;
        Complex32::new(v, v)
    });
    let path = dir.path().join("h_view.flt");
    write_filter(&path, &ViewFilter::Spectrum(spectrum.clone())).unwrap();
    match read_filter(&path).unwrap() {
        ViewFilter::Spectrum(back) => assert_eq!(back, spectrum),
        ViewFilter::PassThrough => panic!("expected a spectrum filter"),
    }

    fs::write(&path, b"VXGEOM01garbage-garbage").unwrap();
    assert!(matches!(read_filter(&path), Err(FusionError::InvalidArtifact { .. })));
}

// ---------------------------------------------------------------------------
// Preview
// ---------------------------------------------------------------------------

#[test]
fn test_preview_places_three_slices_side_by_side() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("preview.png");
    let volume = from_index_fn([8, 6, 4], [1.0; 3], |i, j, k| (i + j + k) as f32);
    save_slice_preview(&volume, &path).unwrap();

    let img = image::open(&path).unwrap().to_luma8();
    // axial 6x8, coronal 4x8, sagittal 4x6
    assert_eq!(img.height(), 6);
    assert_eq!(img.width(), 22);
}
