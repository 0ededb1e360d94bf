use ndarray::prelude::*;

/// Generic representation of the per-vertex attributes found in point cloud files.
pub struct Geometry {
    /// The 3D points. Shape is (Nx3).
    pub points: Array2<f32>,
    /// The RGB colors. Shape is (Nx3).
    pub colors: Option<Array2<u8>>,
    /// Auxiliary per-point columns found after `x y z`, e.g. per-point labels.
    /// Shape is (NxK).
    pub extra: Option<Array2<f32>>,
}

impl Geometry {
    pub fn len_vertices(&self) -> usize {
        self.points.nrows()
    }

    /// Number of auxiliary columns per point, zero when there are none.
    pub fn extra_columns(&self) -> usize {
        self.extra.as_ref().map(|extra| extra.ncols()).unwrap_or(0)
    }
}
