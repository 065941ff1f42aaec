use crate::Vec3;

/// Orthonormal basis around a surface normal.
///
/// BSDFs are evaluated in this local frame where the normal is +Z, so
/// `cos_theta` is just the z component of a local direction.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Frame {
    pub s: Vec3,
    pub t: Vec3,
    pub n: Vec3,
}

impl Frame {
    /// Build a frame from a unit normal (Duff et al. branchless basis).
    pub fn from_normal(n: Vec3) -> Self {
        let sign = 1.0f32.copysign(n.z);
        let a = -1.0 / (sign + n.z);
        let b = n.x * n.y * a;
        let s = Vec3::new(1.0 + sign * n.x * n.x * a, sign * b, -sign * n.x);
        let t = Vec3::new(b, sign + n.y * n.y * a, -n.y);
        Self { s, t, n }
    }

    #[inline]
    pub fn to_local(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.s), v.dot(self.t), v.dot(self.n))
    }

    #[inline]
    pub fn to_world(&self, v: Vec3) -> Vec3 {
        self.s * v.x + self.t * v.y + self.n * v.z
    }

    /// Same frame mirrored to the other side of the surface.
    #[inline]
    pub fn flipped(&self) -> Self {
        Self {
            s: self.s,
            t: -self.t,
            n: -self.n,
        }
    }
}
