//! Semantic occupancy fusion: per-scan local submaps, their merge into a global map,
//! and the final colorization of the fused classes.

mod colorizer;
mod engine;
mod local_submap;

pub use colorizer::{ColorRule, Colorizer, DEFAULT_COLOR_THRESHOLD};
pub use engine::{
    fuse_occupancy, fuse_occupancy_probability, FusionEngine, FusionSummary,
    IncompatibleEvidencePolicy,
};
pub use local_submap::LocalSubmapBuilder;
