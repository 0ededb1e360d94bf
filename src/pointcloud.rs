use nalgebra::Vector3;
use ndarray::prelude::*;
use ndarray::Array2;

use super::io::Geometry;

/// A scan: 3D points plus the auxiliary per-point columns found in its file.
#[derive(Debug, Clone)]
pub struct PointCloud {
    /// Shape is (Nx3).
    pub points: Array2<f32>,
    /// Per-point auxiliary values, e.g. per-point labels. Shape is (NxK).
    /// Fusion only uses the scan-level label, these are carried for inspection.
    pub extra: Option<Array2<f32>>,
}

impl PointCloud {
    pub fn from_geometry(geometry: Geometry) -> Self {
        Self {
            points: geometry.points,
            extra: geometry.extra,
        }
    }

    pub fn from_points(points: Array2<f32>) -> Self {
        Self {
            points,
            extra: None,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn iter_points(&self) -> impl Iterator<Item = Vector3<f32>> + '_ {
        self.points
            .axis_iter(Axis(0))
            .map(|point| Vector3::new(point[0], point[1], point[2]))
    }
}

use crate::transform::Transform;

impl std::ops::Mul<&PointCloud> for &Transform {
    type Output = PointCloud;
    fn mul(self, rhs: &PointCloud) -> PointCloud {
        PointCloud {
            points: self * &rhs.points,
            extra: rhs.extra.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::PointCloud;
    use crate::io::Geometry;
    use crate::transform::Transform;

    #[test]
    fn test_point_cloud_from_geometry() {
        let pcl = PointCloud::from_geometry(Geometry {
            points: array![[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]],
            colors: None,
            extra: Some(array![[1.0], [0.0]]),
        });
        assert_eq!(pcl.len(), 2);
        assert_eq!(pcl.iter_points().nth(1).unwrap()[2], 5.0);
        assert!(pcl.extra.is_some());
    }

    #[test]
    fn test_transform_keeps_extra() {
        let pcl = PointCloud {
            points: array![[0.0, 0.0, 1.0]],
            extra: Some(array![[7.0]]),
        };
        let moved = &Transform::from_pose6d(0.0, 2.0, 0.0, 0.0, 0.0, 0.0) * &pcl;
        assert_eq!(moved.points, array![[0.0, 2.0, 1.0]]);
        assert_eq!(moved.extra, pcl.extra);
    }
}
