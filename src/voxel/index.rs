use nalgebra::Vector3;

use super::{VoxelKey, VoxelState};
use crate::error::Sem3dError;
use crate::pointcloud::PointCloud;
use crate::transform::Transform;

/// Operations the fusion needs from a spatial index. Voxel states are owned by
/// the index and only reached through keys.
pub trait VoxelIndex {
    /// Edge length of a voxel.
    fn resolution(&self) -> f32;

    /// Key of the voxel containing `point`, `None` when the point cannot be addressed.
    fn key_of(&self, point: &Vector3<f32>) -> Option<VoxelKey>;

    /// Center of the voxel `key`.
    fn center_of(&self, key: &VoxelKey) -> Vector3<f32>;

    /// Inserts a sensor reading: every end point marks its voxel occupied and the
    /// voxels traversed from the sensor origin to it are marked free.
    ///
    /// # Arguments
    ///
    /// * `cloud` - Points in the sensor frame.
    /// * `origin` - Sensor to world transform; its translation is the ray origin.
    fn insert_point_cloud(
        &mut self,
        cloud: &PointCloud,
        origin: &Transform,
    ) -> Result<(), Sem3dError>;

    fn lookup(&self, key: &VoxelKey) -> Option<&VoxelState>;

    fn lookup_mut(&mut self, key: &VoxelKey) -> Option<&mut VoxelState>;

    /// Creates the voxel with the given log-odds, or adds `occupancy_logodds` to an
    /// existing one.
    fn create_or_update(&mut self, key: VoxelKey, occupancy_logodds: f32) -> &mut VoxelState;

    /// All stored voxels, in no particular order.
    fn leaves(&self) -> impl Iterator<Item = (&VoxelKey, &VoxelState)>;

    fn leaves_mut(&mut self) -> impl Iterator<Item = (&VoxelKey, &mut VoxelState)>;

    /// Consumes the index yielding its voxels.
    fn into_leaves(self) -> impl Iterator<Item = (VoxelKey, VoxelState)>
    where
        Self: Sized;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
