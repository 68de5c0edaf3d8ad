//! Working-directory state shared by the preprocess and recon stages.

use std::fs::{self, File};
use std::io::{BufWriter, Cursor, Write};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use memmap2::Mmap;
use ndarray::Array3;
use num_complex::Complex32;

use crate::consts::{FILTER_EXTENSION, FILTER_PREFIX, REGISTERED_PREFIX, RESAMPLED_SUFFIX};
use crate::error::{FusionError, Result};
use crate::filter::ViewFilter;
use crate::volume::Geometry;

const GEOMETRY_MAGIC: &[u8; 8] = b"VXGEOM01";
const GEOMETRY_RECORD_SIZE: usize = 8 + 3 * 4 + 3 * 8 + 3 * 8 + 9 * 8;
const FILTER_MAGIC: &[u8; 8] = b"VXFILT01";
const FILTER_HEADER_SIZE: usize = 8 + 1 + 3 * 4;
const FILTER_KIND_PASS_THROUGH: u8 = 0;
const FILTER_KIND_SPECTRUM: u8 = 1;

fn invalid(path: &Path, reason: impl Into<String>) -> FusionError {
    FusionError::InvalidArtifact {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Geometry record
// ---------------------------------------------------------------------------

/// Write the canonical grid (size, origin, spacing, direction).
pub fn write_geometry(path: &Path, geometry: &Geometry) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(GEOMETRY_MAGIC)?;
    for &n in &geometry.size {
        let n = u32::try_from(n).map_err(|_| invalid(path, format!("grid size {n} too large")))?;
        w.write_u32::<LittleEndian>(n)?;
    }
    for &v in geometry
        .origin
        .iter()
        .chain(&geometry.spacing)
        .chain(&geometry.direction)
    {
        w.write_f64::<LittleEndian>(v)?;
    }
    w.flush()?;
    Ok(())
}

pub fn read_geometry(path: &Path) -> Result<Geometry> {
    let bytes = fs::read(path)?;
    if bytes.len() != GEOMETRY_RECORD_SIZE {
        return Err(invalid(
            path,
            format!("expected {GEOMETRY_RECORD_SIZE} bytes, got {}", bytes.len()),
        ));
    }
    if &bytes[..8] != GEOMETRY_MAGIC {
        return Err(invalid(path, "missing geometry magic"));
    }
    let mut cursor = Cursor::new(&bytes[8..]);
    let mut size = [0usize; 3];
    for s in size.iter_mut() {
        *s = cursor.read_u32::<LittleEndian>()? as usize;
    }
    let mut read3 = || -> std::io::Result<[f64; 3]> {
        Ok([
            cursor.read_f64::<LittleEndian>()?,
            cursor.read_f64::<LittleEndian>()?,
            cursor.read_f64::<LittleEndian>()?,
        ])
    };
    let origin = read3()?;
    let spacing = read3()?;
    let mut direction = [0.0f64; 9];
    for d in direction.iter_mut() {
        *d = cursor.read_f64::<LittleEndian>()?;
    }
    Ok(Geometry::new(size, spacing, origin, direction))
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// One line of the manifest: a volume on the canonical grid and its filter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    pub volume: String,
    pub filter: String,
}

/// Ordered `(volume file, filter file)` pairs, reference first.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    /// Manifest for views given as `(base name, extension)`.
    ///
    /// The reference is listed by its resampled file, the others by their
    /// registered file.
    pub fn for_views(views: &[(String, String)]) -> Self {
        let entries = views
            .iter()
            .enumerate()
            .map(|(i, (name, ext))| {
                let resampled = resampled_file_name(name, ext);
                ManifestEntry {
                    volume: if i == 0 {
                        resampled
                    } else {
                        registered_file_name(name, ext)
                    },
                    filter: filter_file_name(name),
                }
            })
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        for entry in &self.entries {
            writeln!(w, "{},{}", entry.volume, entry.filter)?;
        }
        w.flush()?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut entries = Vec::new();
        for (n, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (volume, filter) = line
                .split_once(',')
                .ok_or_else(|| invalid(path, format!("line {}: expected volume,filter", n + 1)))?;
            entries.push(ManifestEntry {
                volume: volume.trim().to_string(),
                filter: filter.trim().to_string(),
            });
        }
        if entries.is_empty() {
            return Err(invalid(path, "manifest lists no views"));
        }
        Ok(Self { entries })
    }

    /// Absolute paths of every listed file, relative to `dir`.
    pub fn paths(&self, dir: &Path) -> Vec<(PathBuf, PathBuf)> {
        self.entries
            .iter()
            .map(|e| (dir.join(&e.volume), dir.join(&e.filter)))
            .collect()
    }
}

/// `<name>_x<ext>`
pub fn resampled_file_name(name: &str, ext: &str) -> String {
    format!("{name}{RESAMPLED_SUFFIX}{ext}")
}

/// `reg_<name>_x<ext>`
pub fn registered_file_name(name: &str, ext: &str) -> String {
    format!("{REGISTERED_PREFIX}{}", resampled_file_name(name, ext))
}

/// `h_<name>.flt`
pub fn filter_file_name(name: &str) -> String {
    format!("{FILTER_PREFIX}{name}.{FILTER_EXTENSION}")
}

// ---------------------------------------------------------------------------
// Filter files
// ---------------------------------------------------------------------------

pub fn write_filter(path: &Path, filter: &ViewFilter) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(FILTER_MAGIC)?;
    match filter {
        ViewFilter::PassThrough => {
            w.write_u8(FILTER_KIND_PASS_THROUGH)?;
            for _ in 0..3 {
                w.write_u32::<LittleEndian>(0)?;
            }
        }
        ViewFilter::Spectrum(spectrum) => {
            w.write_u8(FILTER_KIND_SPECTRUM)?;
            let (d0, d1, d2) = spectrum.dim();
            for d in [d0, d1, d2] {
                let d = u32::try_from(d).map_err(|_| invalid(path, "filter too large"))?;
                w.write_u32::<LittleEndian>(d)?;
            }
            for c in spectrum.iter() {
                w.write_f32::<LittleEndian>(c.re)?;
                w.write_f32::<LittleEndian>(c.im)?;
            }
        }
    }
    w.flush()?;
    Ok(())
}

pub fn read_filter(path: &Path) -> Result<ViewFilter> {
    let file = File::open(path)?;
    let mmap = unsafe { Mmap::map(&file)? };
    if mmap.len() < FILTER_HEADER_SIZE {
        return Err(invalid(path, "file too small for filter header"));
    }
    if &mmap[..8] != FILTER_MAGIC {
        return Err(invalid(path, "missing filter magic"));
    }

    let mut cursor = Cursor::new(&mmap[8..FILTER_HEADER_SIZE]);
    let kind = cursor.read_u8()?;
    let shape = (
        cursor.read_u32::<LittleEndian>()? as usize,
        cursor.read_u32::<LittleEndian>()? as usize,
        cursor.read_u32::<LittleEndian>()? as usize,
    );

    match kind {
        FILTER_KIND_PASS_THROUGH => Ok(ViewFilter::PassThrough),
        FILTER_KIND_SPECTRUM => {
            let count = shape.0 * shape.1 * shape.2;
            let payload = &mmap[FILTER_HEADER_SIZE..];
            if payload.len() != count * 8 {
                return Err(invalid(
                    path,
                    format!("expected {} payload bytes, got {}", count * 8, payload.len()),
                ));
            }
            let values: Vec<Complex32> = payload
                .chunks_exact(8)
                .map(|c| {
                    Complex32::new(
                        f32::from_le_bytes([c[0], c[1], c[2], c[3]]),
                        f32::from_le_bytes([c[4], c[5], c[6], c[7]]),
                    )
                })
                .collect();
            let spectrum = Array3::from_shape_vec(shape, values)
                .map_err(|e| invalid(path, e.to_string()))?;
            Ok(ViewFilter::Spectrum(spectrum))
        }
        other => Err(invalid(path, format!("unknown filter kind {other}"))),
    }
}
