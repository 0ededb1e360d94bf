use std::{io::Write, path::Path};

use ndarray::{array, Array2};
use rstest::fixture;

use crate::pointcloud::PointCloud;

/// Three points along the z axis, each in its own 10cm voxel away from the borders.
#[fixture]
pub fn line_of_points() -> PointCloud {
    PointCloud::from_points(array![
        [0.05, 0.05, 0.15],
        [0.05, 0.05, 0.35],
        [0.05, 0.05, 0.55]
    ])
}

/// Writes `points` as a whitespace separated scan file.
pub fn write_scan_file(path: &Path, points: &Array2<f32>) {
    let mut file = std::fs::File::create(path).unwrap();
    writeln!(file, "# x y z").unwrap();
    for row in points.rows() {
        writeln!(file, "{} {} {}", row[0], row[1], row[2]).unwrap();
    }
}
