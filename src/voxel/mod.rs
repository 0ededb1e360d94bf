//! Sparse voxel storage for occupancy and semantics.
//!
//! Occupancy is kept as log-odds, `l = ln(p / (1 - p))`, so that
//! independent observations combine by addition.

mod index;
mod map;
mod raycast;

pub use index::VoxelIndex;
pub use map::{OccupancyParams, VoxelMap};
pub use raycast::ray_keys;

use serde_derive::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::semantics::SemanticDistribution;

/// Integer address of a voxel, `floor(coordinate / resolution)` per axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VoxelKey {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelKey {
    pub fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [i32; 3] {
        [self.x, self.y, self.z]
    }
}

impl std::ops::Index<usize> for VoxelKey {
    type Output = i32;

    fn index(&self, axis: usize) -> &i32 {
        match axis {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("VoxelKey axis out of range: {axis}"),
        }
    }
}

impl std::ops::IndexMut<usize> for VoxelKey {
    fn index_mut(&mut self, axis: usize) -> &mut i32 {
        match axis {
            0 => &mut self.x,
            1 => &mut self.y,
            2 => &mut self.z,
            _ => panic!("VoxelKey axis out of range: {axis}"),
        }
    }
}

impl std::fmt::Display for VoxelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Converts a probability into log-odds.
pub fn logodds(probability: f64) -> f32 {
    (probability / (1.0 - probability)).ln() as f32
}

/// Converts log-odds back into a probability with the logistic function.
///
/// Each sign takes the branch whose exponential cannot overflow, so that very negative
/// log-odds still give a positive probability.
pub fn probability(logodds: f32) -> f64 {
    let logodds = logodds as f64;
    if logodds >= 0.0 {
        1.0 / (1.0 + (-logodds).exp())
    } else {
        let odds = logodds.exp();
        odds / (1.0 + odds)
    }
}

/// What a map knows about one voxel.
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelState {
    /// Occupancy as log-odds. Finite, zero means unknown (p = 0.5).
    pub occupancy_logodds: f32,
    /// Class distribution, absent until a labeled point lands in the voxel.
    pub semantics: Option<SemanticDistribution>,
    /// Number of labeled points averaged into `semantics` while building a local map.
    pub num_points: u32,
    /// Display color, only set by the colorizer.
    pub color: Option<Rgb>,
}

impl VoxelState {
    pub fn with_logodds(occupancy_logodds: f32) -> Self {
        Self {
            occupancy_logodds,
            semantics: None,
            num_points: 0,
            color: None,
        }
    }

    /// Occupancy probability.
    pub fn occupancy(&self) -> f64 {
        probability(self.occupancy_logodds)
    }

    pub fn is_occupied(&self, threshold: f64) -> bool {
        self.occupancy() > threshold
    }
}
