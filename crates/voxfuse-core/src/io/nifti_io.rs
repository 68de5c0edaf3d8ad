//! NIfTI-1 single-file volumes (`.nii`, `.nii.gz`) through the `nifti` crate.
//!
//! NIfTI stores a RAS affine; [`Geometry`] is LPS, so the first two rows of
//! the affine are negated on the way in and on the way out.

use std::fmt::Display;
use std::path::Path;

use ndarray::Array3;
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use nifti_ndarray::ShapeBuilder;
use tracing::debug;

use crate::error::{FusionError, Result};
use crate::volume::{Geometry, Volume};

pub use nifti::NiftiHeader;

const XFORM_SCANNER_ANAT: i16 = 1;
const UNITS_MM: u8 = 2;
const DESCRIP_LEN: usize = 80;

fn invalid(path: &Path, err: impl Display) -> FusionError {
    FusionError::InvalidVolume(format!("{}: {err}", path.display()))
}

/// True for `.nii` and `.nii.gz` paths.
pub fn is_nifti_path(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    name.ends_with(".nii") || name.ends_with(".nii.gz")
}

fn ensure_nifti_path(path: &Path) -> Result<()> {
    if is_nifti_path(path) {
        Ok(())
    } else {
        Err(invalid(path, "only .nii and .nii.gz volumes are supported"))
    }
}

/// Name and bit width of the scalar datatypes that can be read.
fn scalar_datatype(code: i16) -> Option<(&'static str, i16)> {
    match code {
        2 => Some(("uint8", 8)),
        4 => Some(("int16", 16)),
        8 => Some(("int32", 32)),
        16 => Some(("float32", 32)),
        64 => Some(("float64", 64)),
        256 => Some(("int8", 8)),
        512 => Some(("uint16", 16)),
        768 => Some(("uint32", 32)),
        _ => None,
    }
}

pub fn datatype_name(header: &NiftiHeader) -> &'static str {
    scalar_datatype(header.datatype).map_or("unsupported", |(name, _)| name)
}

/// Grid size (x, y, z); missing spatial dimensions count as 1.
fn header_size(header: &NiftiHeader) -> [usize; 3] {
    let rank = header.dim[0].min(7) as usize;
    let mut size = [1usize; 3];
    for (axis, s) in size.iter_mut().enumerate() {
        if axis < rank {
            *s = header.dim[axis + 1].max(1) as usize;
        }
    }
    size
}

fn check_header(header: &NiftiHeader) -> std::result::Result<(), String> {
    let rank = header.dim[0];
    if !(1..=7).contains(&rank) {
        return Err(format!("invalid rank {rank}"));
    }
    if header.dim[1..=rank as usize].contains(&0) {
        return Err(format!("invalid dimensions {:?}", header.dim));
    }
    match scalar_datatype(header.datatype) {
        None => Err(format!("unsupported datatype code {}", header.datatype)),
        Some((name, bits)) if bits != header.bitpix => Err(format!(
            "bitpix {} does not match datatype {name}",
            header.bitpix
        )),
        Some(_) => Ok(()),
    }
}

fn pixdim_spacing(header: &NiftiHeader, axis: usize) -> f64 {
    let d = header.pixdim[axis + 1].abs() as f64;
    if d > 0.0 && d.is_finite() {
        d
    } else {
        1.0
    }
}

fn qform_affine(header: &NiftiHeader) -> [[f64; 4]; 3] {
    let [b, c, d] = [header.quatern_b, header.quatern_c, header.quatern_d].map(|v| v as f64);
    let a = (1.0 - (b * b + c * c + d * d)).max(0.0).sqrt();
    let rotation = [
        [a * a + b * b - c * c - d * d, 2.0 * (b * c - a * d), 2.0 * (b * d + a * c)],
        [2.0 * (b * c + a * d), a * a + c * c - b * b - d * d, 2.0 * (c * d - a * b)],
        [2.0 * (b * d - a * c), 2.0 * (c * d + a * b), a * a + d * d - c * c - b * b],
    ];
    let qfac = if header.pixdim[0] < 0.0 { -1.0 } else { 1.0 };
    let scale = [
        pixdim_spacing(header, 0),
        pixdim_spacing(header, 1),
        pixdim_spacing(header, 2) * qfac,
    ];
    let offset = [header.quatern_x, header.quatern_y, header.quatern_z];
    let mut affine = [[0.0f64; 4]; 3];
    for row in 0..3 {
        for col in 0..3 {
            affine[row][col] = rotation[row][col] * scale[col];
        }
        affine[row][3] = offset[row] as f64;
    }
    affine
}

/// Physical geometry in LPS, from sform, then qform, then pixdim.
pub fn header_geometry(header: &NiftiHeader) -> Geometry {
    let affine = if header.sform_code > 0 {
        [header.srow_x, header.srow_y, header.srow_z].map(|row| row.map(|v| v as f64))
    } else if header.qform_code > 0 {
        qform_affine(header)
    } else {
        let mut a = [[0.0f64; 4]; 3];
        for (axis, row) in a.iter_mut().enumerate() {
            row[axis] = pixdim_spacing(header, axis);
        }
        a
    };

    let mut spacing = [0.0f64; 3];
    let mut direction = [0.0f64; 9];
    for col in 0..3 {
        let norm = (0..3).map(|r| affine[r][col].powi(2)).sum::<f64>().sqrt();
        let norm = if norm > 0.0 { norm } else { 1.0 };
        spacing[col] = norm;
        for row in 0..3 {
            direction[row * 3 + col] = affine[row][col] / norm;
        }
    }
    let mut origin = [affine[0][3], affine[1][3], affine[2][3]];

    // RAS -> LPS
    for row in 0..2 {
        origin[row] = -origin[row];
        for col in 0..3 {
            direction[row * 3 + col] = -direction[row * 3 + col];
        }
    }

    Geometry::new(header_size(header), spacing, origin, direction)
}

/// Read only the header of a volume file.
pub fn read_header(path: &Path) -> Result<NiftiHeader> {
    ensure_nifti_path(path)?;
    let header = NiftiHeader::from_file(path).map_err(|e| invalid(path, e))?;
    check_header(&header).map_err(|e| invalid(path, e))?;
    Ok(header)
}

/// Read a scalar volume. Only the first 3D volume of a 4D+ file is used.
pub fn read_volume(path: &Path) -> Result<Volume> {
    ensure_nifti_path(path)?;
    let object = ReaderOptions::new().read_file(path).map_err(|e| invalid(path, e))?;
    let header = object.header().clone();
    check_header(&header).map_err(|e| invalid(path, e))?;

    let geometry = header_geometry(&header);
    let count = geometry.voxel_count();
    // Samples come back scaled by scl_slope/scl_inter, indexed (x, y, z, ...).
    let samples = object
        .into_volume()
        .into_ndarray::<f32>()
        .map_err(|e| invalid(path, e))?;
    if samples.len() > count {
        debug!(frames = samples.len() / count, "Reading first volume of a multi-volume file");
    }
    let samples: Vec<f32> = samples.reversed_axes().iter().take(count).copied().collect();
    if samples.len() != count {
        return Err(invalid(
            path,
            format!("expected {count} samples, got {}", samples.len()),
        ));
    }

    let shape = geometry.shape();
    let data = Array3::from_shape_vec(shape, samples).map_err(|e| invalid(path, e))?;
    Volume::new(data, geometry)
}

/// Header carrying the RAS sform of `geometry`; the writer fills in the
/// dimensions and datatype.
fn reference_header(geometry: &Geometry) -> NiftiHeader {
    let mut affine = [[0.0f32; 4]; 3];
    for (row, out) in affine.iter_mut().enumerate() {
        // LPS -> RAS
        let sign = if row < 2 { -1.0 } else { 1.0 };
        for col in 0..3 {
            out[col] = (sign * geometry.direction[row * 3 + col] * geometry.spacing[col]) as f32;
        }
        out[3] = (sign * geometry.origin[row]) as f32;
    }
    let [sx, sy, sz] = geometry.spacing.map(|s| s as f32);

    let mut descrip = b"voxfuse".to_vec();
    descrip.resize(DESCRIP_LEN, 0);

    NiftiHeader {
        pixdim: [1.0, sx, sy, sz, 1.0, 1.0, 1.0, 1.0],
        scl_slope: 1.0,
        scl_inter: 0.0,
        xyzt_units: UNITS_MM,
        descrip,
        qform_code: 0,
        sform_code: XFORM_SCANNER_ANAT,
        srow_x: affine[0],
        srow_y: affine[1],
        srow_z: affine[2],
        ..NiftiHeader::default()
    }
}

/// Write `volume` as float32 NIfTI-1, gzipped for `.nii.gz`.
pub fn write_volume(path: &Path, volume: &Volume) -> Result<()> {
    ensure_nifti_path(path)?;
    let geometry = &volume.geometry;
    for (axis, &n) in geometry.size.iter().enumerate() {
        if n > i16::MAX as usize {
            return Err(invalid(
                path,
                format!("axis {axis} has {n} samples, more than NIfTI-1 can store"),
            ));
        }
    }

    // Row-major (z, y, x) is column-major (x, y, z).
    let [nx, ny, nz] = geometry.size;
    let samples: Vec<f32> = volume.data.iter().copied().collect();
    let array = nifti_ndarray::Array3::from_shape_vec((nx, ny, nz).f(), samples)
        .map_err(|e| invalid(path, e))?;

    let header = reference_header(geometry);
    WriterOptions::new(path)
        .reference_header(&header)
        .write_nifti(&array)
        .map_err(|e| invalid(path, e))?;
    debug!(path = %path.display(), size = ?volume.size(), "Wrote volume");
    Ok(())
}
