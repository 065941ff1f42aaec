//! Math primitives shared by every lumen crate.
//!
//! Re-exports glam and adds the ray-tracing specific pieces on top of it:
//! rays, intervals, bounding boxes, shading frames, sampling warps and
//! piecewise-constant distributions.

// Re-export glam for convenience
pub use glam::*;

mod aabb;
mod color;
mod distribution;
mod frame;
mod interval;
mod ray;
pub mod sampling;
mod transform;

pub use aabb::Aabb;
pub use color::{Color, ColorExt};
pub use distribution::Distribution1D;
pub use frame::Frame;
pub use interval::Interval;
pub use ray::Ray;
pub use transform::Mat4Ext;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a.cross(b), Vec3::new(-3.0, 6.0, -3.0));
    }
}
