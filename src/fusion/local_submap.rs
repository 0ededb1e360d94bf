use rayon::prelude::*;

use crate::error::Sem3dError;
use crate::pointcloud::PointCloud;
use crate::semantics::SemanticDistribution;
use crate::transform::Transform;
use crate::voxel::{OccupancyParams, VoxelIndex, VoxelMap};

/// Builds the local map of one scan: occupancy from the sensor model and, for every
/// voxel hit by a point, the mean of the labels of the points that landed in it.
#[derive(Debug, Clone)]
pub struct LocalSubmapBuilder {
    num_classes: usize,
    resolution: f32,
    occupancy: OccupancyParams,
}

impl LocalSubmapBuilder {
    /// # Arguments
    ///
    /// * `num_classes` - Length of every label passed to the builder.
    /// * `resolution` - Voxel size of the produced maps, must match the global map.
    /// * `occupancy` - Sensor model.
    pub fn new(
        num_classes: usize,
        resolution: f32,
        occupancy: OccupancyParams,
    ) -> Result<Self, Sem3dError> {
        if num_classes == 0 {
            return Err(Sem3dError::invalid_parameter(
                "At least one semantic class is required",
            ));
        }
        // Fails early on a bad resolution or sensor model.
        VoxelMap::new(resolution, occupancy.clone())?;

        Ok(Self {
            num_classes,
            resolution,
            occupancy,
        })
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Builds a fresh local map from one scan.
    ///
    /// # Arguments
    ///
    /// * `cloud` - Points in the sensor frame.
    /// * `label` - Class distribution applied to every point of the scan.
    /// * `origin` - Sensor pose.
    pub fn build(
        &self,
        cloud: &PointCloud,
        label: &SemanticDistribution,
        origin: &Transform,
    ) -> Result<VoxelMap, Sem3dError> {
        let mut local = VoxelMap::new(self.resolution, self.occupancy.clone())?;
        self.accumulate(&mut local, cloud, label, origin)?;
        Ok(local)
    }

    /// Builds the local maps of several scans concurrently. Each scan gets its own map,
    /// results keep the input order.
    pub fn build_many(
        &self,
        scans: &[(&PointCloud, &SemanticDistribution, &Transform)],
    ) -> Vec<Result<VoxelMap, Sem3dError>> {
        scans
            .par_iter()
            .map(|(cloud, label, origin)| self.build(cloud, label, origin))
            .collect()
    }

    /// Inserts a scan into `local` and averages `label` into the semantics of the
    /// voxel of each point.
    ///
    /// Every point weights the same, also across calls: the number of points already
    /// averaged into a voxel is kept in [`crate::voxel::VoxelState::num_points`]. Semantics set
    /// without a count weight as one point.
    pub fn accumulate<I: VoxelIndex>(
        &self,
        local: &mut I,
        cloud: &PointCloud,
        label: &SemanticDistribution,
        origin: &Transform,
    ) -> Result<(), Sem3dError> {
        if label.num_classes() != self.num_classes {
            return Err(Sem3dError::invalid_parameter(format!(
                "Label has {} classes, expected {}",
                label.num_classes(),
                self.num_classes
            )));
        }

        local.insert_point_cloud(cloud, origin)?;

        let world = origin * cloud;
        for (i, point) in world.iter_points().enumerate() {
            let key = local.key_of(&point).ok_or_else(|| {
                Sem3dError::malformed_scan(
                    "point cloud",
                    format!("point {i} at {point:?} cannot be addressed"),
                )
            })?;

            // Points beyond the sensor range leave no end point voxel.
            let Some(state) = local.lookup_mut(&key) else {
                continue;
            };

            match state.semantics.as_mut() {
                Some(mean) => {
                    if mean.num_classes() != label.num_classes() {
                        return Err(Sem3dError::invalid_parameter(format!(
                            "Voxel {key} has {} classes, label has {}",
                            mean.num_classes(),
                            label.num_classes()
                        )));
                    }
                    let count = state.num_points.max(1);
                    mean.accumulate_mean(label, count);
                    state.num_points = count + 1;
                }
                None => {
                    state.semantics = Some(label.clone());
                    state.num_points = 1;
                }
            }
        }

        Ok(())
    }
}
