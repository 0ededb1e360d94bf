use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use itertools::Itertools;
use ndarray::Array2;
use serde_derive::{Deserialize, Serialize};

use super::{write_ply, Geometry};
use crate::color::Rgb;
use crate::error::Sem3dError;
use crate::voxel::VoxelIndex;

/// Color written for occupied voxels that have no class color.
const UNCOLORED: Rgb = Rgb::new(200, 200, 200);

/// One voxel of an exported map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportedVoxel {
    pub key: [i32; 3],
    pub center: [f32; 3],
    pub logodds: f32,
    /// Occupancy probability.
    pub occupancy: f64,
    pub semantics: Option<Vec<f32>>,
    pub color: Option<Rgb>,
}

/// Serializable snapshot of a voxel map, voxels sorted by key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapExport {
    pub resolution: f32,
    /// Length of the longest class distribution in the map, zero when no voxel has one.
    pub num_classes: usize,
    pub voxels: Vec<ExportedVoxel>,
}

/// Takes a snapshot of every voxel of `map`.
pub fn export<I: VoxelIndex>(map: &I) -> MapExport {
    let voxels: Vec<ExportedVoxel> = map
        .leaves()
        .sorted_by_key(|(key, _)| **key)
        .map(|(key, state)| {
            let center = map.center_of(key);
            ExportedVoxel {
                key: key.to_array(),
                center: [center.x, center.y, center.z],
                logodds: state.occupancy_logodds,
                occupancy: state.occupancy(),
                semantics: state.semantics.as_ref().map(|s| s.as_slice().to_vec()),
                color: state.color,
            }
        })
        .collect();

    let num_classes = voxels
        .iter()
        .filter_map(|voxel| voxel.semantics.as_ref().map(Vec::len))
        .max()
        .unwrap_or(0);

    MapExport {
        resolution: map.resolution(),
        num_classes,
        voxels,
    }
}

/// Writes the map snapshot as pretty printed JSON.
pub fn write_map_json<P: AsRef<Path>>(filepath: P, map: &MapExport) -> Result<(), Sem3dError> {
    let writer = BufWriter::new(File::create(filepath)?);
    serde_json::to_writer_pretty(writer, map)?;
    Ok(())
}

/// Writes the centers of the voxels whose occupancy probability is above
/// `occupancy_threshold` as a colored PLY point cloud.
///
/// # Returns
///
/// The number of written voxels.
pub fn write_voxel_ply<P, I>(
    filepath: P,
    map: &I,
    occupancy_threshold: f64,
) -> Result<usize, Sem3dError>
where
    P: AsRef<Path>,
    I: VoxelIndex,
{
    let occupied = map
        .leaves()
        .filter(|(_, state)| state.is_occupied(occupancy_threshold))
        .sorted_by_key(|(key, _)| **key)
        .collect::<Vec<_>>();

    let mut points = Array2::<f32>::zeros((occupied.len(), 3));
    let mut colors = Array2::<u8>::zeros((occupied.len(), 3));
    for (i, (key, state)) in occupied.iter().enumerate() {
        let center = map.center_of(key);
        let color = state.color.unwrap_or(UNCOLORED);
        for axis in 0..3 {
            points[[i, axis]] = center[axis];
        }
        let color = color.to_array();
        for channel in 0..3 {
            colors[[i, channel]] = color[channel];
        }
    }

    write_ply(
        filepath,
        &Geometry {
            points,
            colors: Some(colors),
            extra: None,
        },
    )?;
    Ok(occupied.len())
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;
    use rstest::rstest;

    use super::*;
    use crate::io::read_ply;
    use crate::semantics::SemanticDistribution;
    use crate::unit_test::empty_map;
    use crate::voxel::{VoxelKey, VoxelMap};

    fn populated(mut map: VoxelMap) -> VoxelMap {
        let voxel = map.create_or_update(VoxelKey::new(1, 0, -1), 2.0);
        voxel.semantics = Some(SemanticDistribution::new(vec![0.25, 0.75]).unwrap());
        voxel.color = Some(Rgb::new(0, 255, 0));
        map.create_or_update(VoxelKey::new(0, 0, 0), -1.0);
        map
    }

    #[rstest]
    fn test_export_is_sorted_and_complete(empty_map: VoxelMap) {
        let map = populated(empty_map);
        let exported = export(&map);

        assert_eq!(exported.num_classes, 2);
        assert_eq!(exported.resolution, 0.1);
        assert_eq!(exported.voxels.len(), 2);
        assert_eq!(exported.voxels[0].key, [0, 0, 0]);
        assert_eq!(exported.voxels[0].semantics, None);
        assert_eq!(exported.voxels[1].key, [1, 0, -1]);
        assert_abs_diff_eq!(exported.voxels[1].center[0], 0.15, epsilon = 1e-6);
        assert_abs_diff_eq!(exported.voxels[1].center[2], -0.05, epsilon = 1e-6);
        assert_eq!(exported.voxels[1].color, Some(Rgb::new(0, 255, 0)));
    }

    #[rstest]
    fn test_json_file_reads_back(empty_map: VoxelMap) {
        let exported = export(&populated(empty_map));
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.json");

        write_map_json(&path, &exported).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let read: MapExport = serde_json::from_str(&text).unwrap();
        assert_eq!(read, exported);
    }

    #[rstest]
    fn test_ply_has_occupied_voxels_only(empty_map: VoxelMap) {
        let map = populated(empty_map);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voxels.ply");

        assert_eq!(write_voxel_ply(&path, &map, 0.5).unwrap(), 1);

        let geometry = read_ply(&path).unwrap();
        assert_eq!(geometry.len_vertices(), 1);
        assert_eq!(
            geometry.colors.unwrap().row(0).to_vec(),
            vec![0u8, 255, 0]
        );
    }

    #[rstest]
    fn test_empty_map_exports_no_classes(empty_map: VoxelMap) {
        let exported = export(&empty_map);
        assert!(exported.voxels.is_empty());
        assert_eq!(exported.num_classes, 0);
    }
}
