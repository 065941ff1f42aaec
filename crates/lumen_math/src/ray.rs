use crate::{Interval, Vec3};

/// Relative offset used when spawning secondary rays off a surface.
pub const RAY_EPSILON: f32 = 1e-4;

/// A ray in 3D space with an origin, a direction and a parametric extent.
///
/// Rays are used for raytracing - they represent the segment
/// `origin + t * direction` for `t` in `[t_min, t_max]`. Accelerators only
/// report hits inside that range, so shadow rays are expressed by a finite
/// `t_max` and camera rays by `f32::INFINITY`.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
    pub t_min: f32,
    pub t_max: f32,
}

impl Ray {
    /// Create an unbounded ray starting at `t = 0`.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction,
            t_min: 0.0,
            t_max: f32::INFINITY,
        }
    }

    /// Create a ray restricted to `[t_min, t_max]`.
    pub fn with_bounds(origin: Vec3, direction: Vec3, t_min: f32, t_max: f32) -> Self {
        Self {
            origin,
            direction,
            t_min,
            t_max,
        }
    }

    /// Spawn a ray leaving a surface point.
    ///
    /// The origin is pushed off the surface along the geometric normal, on the
    /// side the new direction points to, so the ray cannot re-hit the surface
    /// it starts on.
    pub fn spawn(point: Vec3, geometric_normal: Vec3, direction: Vec3) -> Self {
        Self::new(offset_origin(point, geometric_normal, direction), direction)
    }

    /// Spawn a shadow ray from a surface point towards a point `distance`
    /// away along the unit vector `direction`.
    ///
    /// The far end is shortened by the same relative epsilon so the target
    /// surface (e.g. an area light) does not occlude itself.
    pub fn spawn_to(point: Vec3, geometric_normal: Vec3, direction: Vec3, distance: f32) -> Self {
        let origin = offset_origin(point, geometric_normal, direction);
        let t_max = if distance.is_finite() {
            distance * (1.0 - RAY_EPSILON) - RAY_EPSILON
        } else {
            f32::INFINITY
        };
        Self::with_bounds(origin, direction, 0.0, t_max)
    }

    /// The parametric range as an interval.
    #[inline]
    pub fn interval(&self) -> Interval {
        Interval::new(self.t_min, self.t_max)
    }

    /// Get the point along the ray at parameter t.
    ///
    /// Returns: origin + t * direction
    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

fn offset_origin(point: Vec3, geometric_normal: Vec3, direction: Vec3) -> Vec3 {
    let scale = RAY_EPSILON * point.abs().max_element().max(1.0);
    if direction.dot(geometric_normal) >= 0.0 {
        point + geometric_normal * scale
    } else {
        point - geometric_normal * scale
    }
}
