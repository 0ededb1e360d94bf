use rstest::fixture;

use crate::{
    fusion::LocalSubmapBuilder,
    voxel::{OccupancyParams, VoxelMap},
};

/// Map with 10cm voxels and the default sensor model.
pub fn new_map() -> VoxelMap {
    VoxelMap::new(0.1, OccupancyParams::default()).unwrap()
}

#[fixture]
pub fn empty_map() -> VoxelMap {
    new_map()
}

#[fixture]
pub fn sample_map() -> VoxelMap {
    new_map()
}

/// Builder for five classes matching [`new_map`].
#[fixture]
pub fn sample_builder() -> LocalSubmapBuilder {
    LocalSubmapBuilder::new(5, 0.1, OccupancyParams::default()).unwrap()
}
