use nalgebra::{Isometry3, Translation3, UnitQuaternion, Vector3};
use ndarray::Axis;
use ndarray::{self, Array2};

use std::ops;

/// Rigid body transform, used as the sensor to world pose of a scan.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform(Isometry3<f32>);

impl Default for Transform {
    fn default() -> Self {
        Self::eye()
    }
}

impl Transform {
    pub fn eye() -> Self {
        Self(Isometry3::<f32>::identity())
    }

    /// Creates a transform from a position and roll, pitch and yaw angles in radians.
    /// The rotation is applied as yaw, then pitch, then roll (extrinsic X-Y-Z).
    pub fn from_pose6d(x: f32, y: f32, z: f32, roll: f32, pitch: f32, yaw: f32) -> Self {
        Self(Isometry3::<f32>::from_parts(
            Translation3::new(x, y, z),
            UnitQuaternion::from_euler_angles(roll, pitch, yaw),
        ))
    }

    /// Parses `x,y,z,roll,pitch,yaw`.
    pub fn parse_pose6d(text: &str) -> Result<Self, String> {
        let values = text
            .split(',')
            .map(|v| v.trim().parse::<f32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| format!("Invalid pose `{text}`: {err}"))?;

        if let [x, y, z, roll, pitch, yaw] = values[..] {
            Ok(Self::from_pose6d(x, y, z, roll, pitch, yaw))
        } else {
            Err(format!(
                "A pose needs 6 values x,y,z,roll,pitch,yaw, got `{text}`"
            ))
        }
    }

    /// The origin of the transformed frame, i.e. the sensor position for a scan pose.
    pub fn translation(&self) -> Vector3<f32> {
        self.0.translation.vector
    }

    pub fn transform_point(&self, point: &Vector3<f32>) -> Vector3<f32> {
        self.0.transform_point(&(*point).into()).coords
    }

    pub fn transform(&self, mut rhs: Array2<f32>) -> Array2<f32> {
        for mut point in rhs.axis_iter_mut(Axis(0)) {
            let v = self.transform_point(&Vector3::new(point[0], point[1], point[2]));
            point[0] = v[0];
            point[1] = v[1];
            point[2] = v[2];
        }

        rhs
    }
}

impl std::str::FromStr for Transform {
    type Err = String;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse_pose6d(text)
    }
}

impl ops::Mul<&ndarray::Array2<f32>> for &Transform {
    type Output = ndarray::Array2<f32>;

    fn mul(self, rhs: &ndarray::Array2<f32>) -> Self::Output {
        self.transform(rhs.clone())
    }
}
