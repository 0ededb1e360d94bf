//! Voxel traversal of a ray, see
//! Amanatides, J., & Woo, A. (1987). A fast voxel traversal algorithm for ray tracing.
//! In Eurographics.

use nalgebra::Vector3;

use super::VoxelKey;

/// Keys of the voxels a ray crosses from `origin` up to, but excluding, the voxel of
/// `end`. The origin voxel is included unless it is also the end voxel.
///
/// # Arguments
///
/// * `origin` - Ray start, in world coordinates.
/// * `end` - Ray end, in world coordinates.
/// * `key_of` - Maps a point to its voxel key.
/// * `resolution` - Voxel edge length used by `key_of`.
///
/// # Returns
///
/// `None` when either end point cannot be addressed.
pub fn ray_keys<F>(
    origin: &Vector3<f32>,
    end: &Vector3<f32>,
    key_of: F,
    resolution: f32,
) -> Option<Vec<VoxelKey>>
where
    F: Fn(&Vector3<f32>) -> Option<VoxelKey>,
{
    let key_origin = key_of(origin)?;
    let key_end = key_of(end)?;
    if key_origin == key_end {
        return Some(Vec::new());
    }

    let origin = origin.cast::<f64>();
    let direction = end.cast::<f64>() - origin;
    let length = direction.norm();
    let direction = direction / length;
    let resolution = resolution as f64;

    let mut step = [0i32; 3];
    let mut t_max = [f64::INFINITY; 3];
    let mut t_delta = [f64::INFINITY; 3];
    for axis in 0..3 {
        if direction[axis] > 0.0 {
            step[axis] = 1;
        } else if direction[axis] < 0.0 {
            step[axis] = -1;
        }

        if step[axis] != 0 {
            let border = (key_origin[axis] as f64 + if step[axis] > 0 { 1.0 } else { 0.0 })
                * resolution;
            t_max[axis] = (border - origin[axis]) / direction[axis];
            t_delta[axis] = resolution / direction[axis].abs();
        }
    }

    // A 6-connected walk between two keys takes exactly their Manhattan distance in steps.
    let max_steps = (0..3)
        .map(|axis| (key_end[axis] as i64 - key_origin[axis] as i64).unsigned_abs())
        .sum::<u64>();

    let mut keys = Vec::new();
    let mut current = key_origin;
    keys.push(current);
    for _ in 0..max_steps {
        let axis = if t_max[0] < t_max[1] {
            if t_max[0] < t_max[2] {
                0
            } else {
                2
            }
        } else if t_max[1] < t_max[2] {
            1
        } else {
            2
        };

        let entered_at = t_max[axis];
        current[axis] += step[axis];
        t_max[axis] += t_delta[axis];

        // Rounding may walk the ray past its end without hitting the end voxel.
        if current == key_end || entered_at > length {
            break;
        }

        keys.push(current);
    }

    Some(keys)
}
