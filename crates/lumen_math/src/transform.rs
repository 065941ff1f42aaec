// Transform utilities for Mat4
//
// Extends glam::Mat4 with the object-to-world helpers the scene store needs.
// glam already provides transform_point3(), transform_vector3() and inverse().

use glam::{Mat3, Mat4};

/// Extension trait for Mat4 to provide additional transform utilities
pub trait Mat4Ext {
    /// Matrix that maps object-space normals to world space
    /// (inverse transpose of the upper 3x3).
    fn normal_matrix(&self) -> Mat3;

    /// True when every entry is finite and the linear part is invertible.
    /// Small uniform scales are fine; only singular matrices are rejected.
    fn is_valid_transform(&self) -> bool;
}

impl Mat4Ext for Mat4 {
    fn normal_matrix(&self) -> Mat3 {
        Mat3::from_mat4(*self).inverse().transpose()
    }

    fn is_valid_transform(&self) -> bool {
        if !self.is_finite() {
            return false;
        }
        let det = Mat3::from_mat4(*self).determinant();
        det != 0.0 && det.is_finite() && self.normal_matrix().is_finite()
    }
}
