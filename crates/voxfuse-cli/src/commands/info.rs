use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use voxfuse_core::io::{datatype_name, header_geometry, read_header};

#[derive(Args)]
pub struct InfoArgs {
    /// Input volume (.nii / .nii.gz)
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let header = read_header(&args.file)?;
    let geometry = header_geometry(&header);

    println!("File:        {}", args.file.display());
    println!(
        "Size:        {} x {} x {}",
        geometry.size[0], geometry.size[1], geometry.size[2]
    );
    println!(
        "Spacing:     {:.4} x {:.4} x {:.4}",
        geometry.spacing[0], geometry.spacing[1], geometry.spacing[2]
    );
    println!(
        "Origin:      ({:.3}, {:.3}, {:.3})",
        geometry.origin[0], geometry.origin[1], geometry.origin[2]
    );
    let d = &geometry.direction;
    println!("Direction:   [{:.4} {:.4} {:.4}]", d[0], d[1], d[2]);
    println!("             [{:.4} {:.4} {:.4}]", d[3], d[4], d[5]);
    println!("             [{:.4} {:.4} {:.4}]", d[6], d[7], d[8]);
    println!("Data type:   {}", datatype_name(&header));
    println!("Byte order:  {:?}", header.endianness);
    println!("qform/sform: {}/{}", header.qform_code, header.sform_code);
    let description = String::from_utf8_lossy(&header.descrip);
    let description = description.trim_end_matches('\0').trim();
    if !description.is_empty() {
        println!("Description: {}", description);
    }

    let voxels = geometry.voxel_count();
    let bytes_per_voxel = header.bitpix.max(0) as usize / 8;
    let total_mb = (voxels * bytes_per_voxel) as f64 / (1024.0 * 1024.0);
    println!("Data size:   {:.1} MB", total_mb);

    Ok(())
}
