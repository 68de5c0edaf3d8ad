pub mod artifacts;
pub mod nifti_io;
pub mod preview;

use std::path::Path;

pub use artifacts::{
    filter_file_name, read_filter, read_geometry, registered_file_name, resampled_file_name, write_filter,
    write_geometry, Manifest, ManifestEntry,
};
pub use nifti_io::{datatype_name, header_geometry, read_header, read_volume, write_volume, NiftiHeader};
pub use preview::save_slice_preview;

/// Split a file name at its first dot: `a.nii.gz` -> (`a`, `.nii.gz`).
pub fn split_name(path: &Path) -> (String, String) {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    match name.find('.') {
        Some(dot) => (name[..dot].to_string(), name[dot..].to_string()),
        None => (name, String::new()),
    }
}
