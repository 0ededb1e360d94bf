use std::collections::{HashMap, HashSet};

use nalgebra::Vector3;
use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use super::{logodds, ray_keys, VoxelIndex, VoxelKey, VoxelState};
use crate::error::Sem3dError;
use crate::pointcloud::PointCloud;
use crate::transform::Transform;

/// Keys span 16 bits per axis, as in octree maps: about ±1638m at 5cm voxels.
/// Points beyond are not addressable.
const MAX_KEY_COORD: f32 = (1 << 15) as f32;

/// Sensor model used when inserting point clouds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OccupancyParams {
    /// Probability that a voxel holding an end point is occupied.
    pub prob_hit: f64,
    /// Probability that a voxel traversed by a ray is occupied.
    pub prob_miss: f64,
    /// Lower probability bound reached by sensor updates.
    pub clamp_min: f64,
    /// Upper probability bound reached by sensor updates.
    pub clamp_max: f64,
    /// Rays longer than this are truncated and their end point is not marked occupied.
    pub max_range: Option<f32>,
}

impl Default for OccupancyParams {
    fn default() -> Self {
        OccupancyParams {
            prob_hit: 0.7,
            prob_miss: 0.4,
            clamp_min: 0.1192,
            clamp_max: 0.971,
            max_range: None,
        }
    }
}

impl OccupancyParams {
    pub fn validate(&self) -> Result<(), Sem3dError> {
        if !(self.prob_hit > 0.5 && self.prob_hit < 1.0) {
            return Err(Sem3dError::invalid_parameter(format!(
                "prob_hit must be in (0.5, 1), got {}",
                self.prob_hit
            )));
        }
        if !(self.prob_miss > 0.0 && self.prob_miss < 0.5) {
            return Err(Sem3dError::invalid_parameter(format!(
                "prob_miss must be in (0, 0.5), got {}",
                self.prob_miss
            )));
        }
        if !(self.clamp_min > 0.0 && self.clamp_min < self.clamp_max && self.clamp_max < 1.0) {
            return Err(Sem3dError::invalid_parameter(format!(
                "Clamping bounds must satisfy 0 < min < max < 1, got [{}, {}]",
                self.clamp_min, self.clamp_max
            )));
        }
        if let Some(max_range) = self.max_range {
            if max_range.is_nan() || max_range <= 0.0 {
                return Err(Sem3dError::invalid_parameter(format!(
                    "max_range must be positive, got {max_range}"
                )));
            }
        }
        Ok(())
    }

    pub fn hit_logodds(&self) -> f32 {
        logodds(self.prob_hit)
    }

    pub fn miss_logodds(&self) -> f32 {
        logodds(self.prob_miss)
    }
}

/// Hash addressed sparse voxel map.
#[derive(Debug, Clone)]
pub struct VoxelMap {
    resolution: f32,
    params: OccupancyParams,
    clamp_logodds: (f32, f32),
    voxels: HashMap<VoxelKey, VoxelState>,
}

impl VoxelMap {
    /// Creates an empty map.
    ///
    /// # Arguments
    ///
    /// * `resolution` - Voxel edge length, positive.
    /// * `params` - Sensor model for point cloud insertion.
    pub fn new(resolution: f32, params: OccupancyParams) -> Result<Self, Sem3dError> {
        if !(resolution.is_finite() && resolution > 0.0) {
            return Err(Sem3dError::invalid_parameter(format!(
                "Resolution must be positive, got {resolution}"
            )));
        }
        params.validate()?;

        Ok(Self {
            resolution,
            clamp_logodds: (logodds(params.clamp_min), logodds(params.clamp_max)),
            params,
            voxels: HashMap::new(),
        })
    }

    pub fn params(&self) -> &OccupancyParams {
        &self.params
    }

    /// Applies one sensor update to a voxel, creating it as unknown when needed.
    fn integrate_measurement(&mut self, key: VoxelKey, update: f32) {
        let (min, max) = self.clamp_logodds;
        let state = self
            .voxels
            .entry(key)
            .or_insert_with(|| VoxelState::with_logodds(0.0));
        state.occupancy_logodds = (state.occupancy_logodds + update).clamp(min, max);
    }
}

impl VoxelIndex for VoxelMap {
    fn resolution(&self) -> f32 {
        self.resolution
    }

    fn key_of(&self, point: &Vector3<f32>) -> Option<VoxelKey> {
        let scaled = point / self.resolution;
        if scaled
            .iter()
            .any(|v| !v.is_finite() || v.abs() >= MAX_KEY_COORD)
        {
            return None;
        }

        Some(VoxelKey::new(
            scaled[0].floor() as i32,
            scaled[1].floor() as i32,
            scaled[2].floor() as i32,
        ))
    }

    fn center_of(&self, key: &VoxelKey) -> Vector3<f32> {
        Vector3::new(
            (key.x as f32 + 0.5) * self.resolution,
            (key.y as f32 + 0.5) * self.resolution,
            (key.z as f32 + 0.5) * self.resolution,
        )
    }

    fn insert_point_cloud(
        &mut self,
        cloud: &PointCloud,
        origin: &Transform,
    ) -> Result<(), Sem3dError> {
        let sensor_origin = origin.translation();
        if self.key_of(&sensor_origin).is_none() {
            return Err(Sem3dError::malformed_scan(
                "point cloud",
                format!("sensor origin {sensor_origin:?} cannot be addressed"),
            ));
        }

        let mut free = HashSet::new();
        let mut occupied = HashSet::new();
        let world = origin * cloud;
        for (i, point) in world.iter_points().enumerate() {
            let ray = point - sensor_origin;
            let (end, reached) = match self.params.max_range {
                Some(max_range) if ray.norm() > max_range => {
                    (sensor_origin + ray.normalize() * max_range, false)
                }
                _ => (point, true),
            };

            let keys = ray_keys(&sensor_origin, &end, |p| self.key_of(p), self.resolution)
                .ok_or_else(|| {
                    Sem3dError::malformed_scan(
                        "point cloud",
                        format!("point {i} at {point:?} cannot be addressed"),
                    )
                })?;
            free.extend(keys);

            if reached {
                if let Some(key) = self.key_of(&end) {
                    occupied.insert(key);
                }
            }
        }

        // A voxel holding an end point is never cleared by another ray of the same scan.
        free.retain(|key| !occupied.contains(key));

        let (miss, hit) = (self.params.miss_logodds(), self.params.hit_logodds());
        debug!(
            points = cloud.len(),
            free = free.len(),
            occupied = occupied.len(),
            "inserting point cloud"
        );
        for key in free {
            self.integrate_measurement(key, miss);
        }
        for key in occupied {
            self.integrate_measurement(key, hit);
        }

        Ok(())
    }

    fn lookup(&self, key: &VoxelKey) -> Option<&VoxelState> {
        self.voxels.get(key)
    }

    fn lookup_mut(&mut self, key: &VoxelKey) -> Option<&mut VoxelState> {
        self.voxels.get_mut(key)
    }

    /// Sets or accumulates log-odds without clamping, clamping belongs to the sensor model.
    fn create_or_update(&mut self, key: VoxelKey, occupancy_logodds: f32) -> &mut VoxelState {
        let state = self
            .voxels
            .entry(key)
            .and_modify(|state| state.occupancy_logodds += occupancy_logodds)
            .or_insert_with(|| VoxelState::with_logodds(occupancy_logodds));
        state
    }

    fn leaves(&self) -> impl Iterator<Item = (&VoxelKey, &VoxelState)> {
        self.voxels.iter()
    }

    fn leaves_mut(&mut self) -> impl Iterator<Item = (&VoxelKey, &mut VoxelState)> {
        self.voxels.iter_mut()
    }

    fn into_leaves(self) -> impl Iterator<Item = (VoxelKey, VoxelState)> {
        self.voxels.into_iter()
    }

    fn len(&self) -> usize {
        self.voxels.len()
    }
}
