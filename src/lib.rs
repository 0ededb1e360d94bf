//! Fusion of labeled point-cloud scans into a semantic occupancy voxel map.
//!
//! Every scan is inserted into its own local map, where the points falling in the same
//! voxel average their class labels. The local maps are then folded one by one into a
//! global map: occupancy combines in log-odds and class distributions multiply.
//!
//! ```no_run
//! use sem3d::config::FusionConfig;
//! use sem3d::io::{export, write_map_json};
//! use sem3d::pipeline::{Scan, SemanticMapper};
//! use sem3d::transform::Transform;
//!
//! let mut mapper = SemanticMapper::new(FusionConfig::default(), 2).unwrap();
//! for (class, path) in ["chair.xyz", "table.xyz"].iter().enumerate() {
//!     let scan = Scan::load(path, Transform::eye()).unwrap();
//!     mapper.integrate(&scan, class).unwrap();
//! }
//! mapper.colorize().unwrap();
//! write_map_json("map.json", &export(mapper.global())).unwrap();
//! ```

pub mod color;
pub mod config;
pub mod error;
pub mod fusion;
pub mod io;
pub mod pipeline;
pub mod pointcloud;
pub mod semantics;
pub mod transform;
pub mod voxel;

#[cfg(test)]
mod unit_test;
