//! Sampling warps and multiple importance sampling weights.
//!
//! Directions produced here live in a local shading frame where the
//! normal is +Z; callers map them to world space through [`crate::Frame`].

use std::f32::consts::{FRAC_1_PI, FRAC_PI_2, FRAC_PI_4, PI, TAU};

use rand::{Rng, RngCore};

use crate::{Vec2, Vec3};

/// Uniform float in [0, 1).
#[inline]
pub fn gen_f32(rng: &mut dyn RngCore) -> f32 {
    rng.gen::<f32>()
}

/// Two uniform floats in [0, 1).
#[inline]
pub fn gen_vec2(rng: &mut dyn RngCore) -> Vec2 {
    Vec2::new(gen_f32(rng), gen_f32(rng))
}

/// Map the unit square to the unit disk preserving relative areas.
pub fn concentric_sample_disk(u: Vec2) -> Vec2 {
    let offset = u * 2.0 - Vec2::ONE;
    if offset.x == 0.0 && offset.y == 0.0 {
        return Vec2::ZERO;
    }
    let (r, theta) = if offset.x.abs() > offset.y.abs() {
        (offset.x, FRAC_PI_4 * (offset.y / offset.x))
    } else {
        (offset.y, FRAC_PI_2 - FRAC_PI_4 * (offset.x / offset.y))
    };
    Vec2::new(theta.cos(), theta.sin()) * r
}

/// Cosine-weighted direction on the +Z hemisphere.
pub fn cosine_sample_hemisphere(u: Vec2) -> Vec3 {
    let d = concentric_sample_disk(u);
    let z = (1.0 - d.length_squared()).max(0.0).sqrt();
    Vec3::new(d.x, d.y, z)
}

#[inline]
pub fn cosine_hemisphere_pdf(cos_theta: f32) -> f32 {
    cos_theta.max(0.0) * FRAC_1_PI
}

/// Uniform direction on the unit sphere.
pub fn uniform_sample_sphere(u: Vec2) -> Vec3 {
    let z = 1.0 - 2.0 * u.x;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = TAU * u.y;
    Vec3::new(r * phi.cos(), r * phi.sin(), z)
}

#[inline]
pub fn uniform_sphere_pdf() -> f32 {
    1.0 / (4.0 * PI)
}

/// Uniform barycentric coordinates `(b1, b2)` on a triangle; the weight of
/// the first vertex is `1 - b1 - b2`.
pub fn uniform_sample_triangle(u: Vec2) -> Vec2 {
    let su0 = u.x.sqrt();
    Vec2::new(1.0 - su0, u.y * su0)
}

/// Power heuristic (beta = 2) for one sample from each of two strategies.
#[inline]
pub fn power_heuristic(f_pdf: f32, g_pdf: f32) -> f32 {
    let f = f_pdf * f_pdf;
    let g = g_pdf * g_pdf;
    if f == 0.0 && g == 0.0 {
        return 0.0;
    }
    if f.is_infinite() {
        return 1.0;
    }
    f / (f + g)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_cosine_hemisphere_stays_above_plane() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(7);
        let mut mean_cos = 0.0;
        let n = 20_000;
        for _ in 0..n {
            let d = cosine_sample_hemisphere(gen_vec2(&mut rng));
            assert!(d.z >= 0.0);
            assert!((d.length() - 1.0).abs() < 1e-4);
            mean_cos += d.z;
        }
        // E[cos] under a cosine density is 2/3.
        mean_cos /= n as f32;
        assert!((mean_cos - 2.0 / 3.0).abs() < 0.01, "mean cos = {mean_cos}");
    }

    #[test]
    fn test_uniform_sphere_is_unit_and_centered() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(11);
        let mut sum = Vec3::ZERO;
        let n = 20_000;
        for _ in 0..n {
            let d = uniform_sample_sphere(gen_vec2(&mut rng));
            assert!((d.length() - 1.0).abs() < 1e-4);
            sum += d;
        }
        assert!((sum / n as f32).length() < 0.03);
    }

    #[test]
    fn test_uniform_triangle_barycentrics_inside() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);
        for _ in 0..1000 {
            let b = uniform_sample_triangle(gen_vec2(&mut rng));
            assert!(b.x >= 0.0 && b.y >= 0.0 && b.x + b.y <= 1.0 + 1e-6);
        }
    }

    #[test]
    fn test_power_heuristic() {
        assert_eq!(power_heuristic(1.0, 1.0), 0.5);
        assert_eq!(power_heuristic(0.0, 0.0), 0.0);
        assert_eq!(power_heuristic(f32::INFINITY, 3.0), 1.0);
        assert!((power_heuristic(3.0, 1.0) - 0.9).abs() < 1e-6);
        assert!((power_heuristic(3.0, 1.0) + power_heuristic(1.0, 3.0) - 1.0).abs() < 1e-6);
    }
}
