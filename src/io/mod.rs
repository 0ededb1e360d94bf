mod error;
mod export;
mod geometry;
mod ply;
mod xyz;

pub use error::LoadError;
pub use export::{export, write_map_json, write_voxel_ply, ExportedVoxel, MapExport};
pub use geometry::Geometry;
pub use ply::{read_ply, write_ply};
pub use xyz::read_labeled_point_cloud;

use std::path::Path;

/// Reads a scan choosing the reader by file extension: `.ply` files go through the
/// PLY reader, anything else is parsed as whitespace separated text.
pub fn read_point_cloud<P>(filepath: P) -> Result<Geometry, LoadError>
where
    P: AsRef<Path>,
{
    match filepath
        .as_ref()
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("ply") => read_ply(filepath),
        _ => read_labeled_point_cloud(filepath),
    }
}
