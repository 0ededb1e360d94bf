mod maps;
pub(crate) use maps::{empty_map, new_map, sample_builder, sample_map};
mod point_clouds;
pub(crate) use point_clouds::{line_of_points, write_scan_file};
