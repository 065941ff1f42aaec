//! Surface scattering models.
//!
//! `Material` is a closed set of variants matched on directly by the
//! integrator. All directions passed in and out are world-space unit
//! vectors pointing away from the surface; `frame` is the shading frame at
//! the hit point. Opaque variants are two-sided: they scatter on whichever
//! side `wo` lies.

use std::f32::consts::FRAC_1_PI;

use lumen_math::sampling::{cosine_hemisphere_pdf, cosine_sample_hemisphere, gen_f32, gen_vec2};
use lumen_math::{Color, ColorExt, Frame, Vec3};
use rand::RngCore;

/// A direction sampled from a material.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BsdfSample {
    /// Incident direction (world space, unit length)
    pub wi: Vec3,
    /// `f * |cos| / pdf` for the sampled direction
    pub weight: Color,
    /// Probability density of the sample, or the discrete lobe
    /// probability for a specular sample
    pub pdf: f32,
    /// True if the sample came from a delta lobe
    pub specular: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Material {
    /// Lambertian reflector.
    Diffuse { reflectance: Color },
    /// Perfect specular reflector.
    Mirror { reflectance: Color },
    /// Smooth glass-like interface with relative index of refraction `eta`.
    Dielectric { eta: f32 },
    /// Smooth dielectric coating over a Lambertian base.
    Plastic {
        diffuse: Color,
        specular: Color,
        eta: f32,
    },
}

impl Default for Material {
    fn default() -> Self {
        Material::Diffuse {
            reflectance: Color::splat(0.5),
        }
    }
}

impl Material {
    /// True if every lobe is a delta distribution; direct light sampling
    /// can never hit such a lobe.
    pub fn is_specular(&self) -> bool {
        matches!(self, Material::Mirror { .. } | Material::Dielectric { .. })
    }

    pub fn validate(&self) -> Result<(), String> {
        let check_color = |name: &str, c: &Color| {
            if c.is_valid_radiance() {
                Ok(())
            } else {
                Err(format!("{name} {c} must be finite and non-negative"))
            }
        };
        let check_eta = |eta: f32| {
            if eta.is_finite() && eta > 0.0 {
                Ok(())
            } else {
                Err(format!("index of refraction {eta} must be positive"))
            }
        };
        match self {
            Material::Diffuse { reflectance } | Material::Mirror { reflectance } => {
                check_color("reflectance", reflectance)
            }
            Material::Dielectric { eta } => check_eta(*eta),
            Material::Plastic {
                diffuse,
                specular,
                eta,
            } => {
                check_color("diffuse", diffuse)?;
                check_color("specular", specular)?;
                check_eta(*eta)
            }
        }
    }

    /// BSDF value for the pair of directions, without the cosine term.
    /// Delta lobes evaluate to zero.
    pub fn eval(&self, frame: &Frame, wo: Vec3, wi: Vec3) -> Color {
        let (wo, wi) = (frame.to_local(wo), frame.to_local(wi));
        if wo.z * wi.z <= 0.0 {
            return Color::ZERO;
        }
        match *self {
            Material::Diffuse { reflectance } => reflectance * FRAC_1_PI,
            Material::Plastic { diffuse, eta, .. } => {
                let f_o = fresnel_dielectric(wo.z.abs(), 1.0, eta);
                let f_i = fresnel_dielectric(wi.z.abs(), 1.0, eta);
                diffuse * (FRAC_1_PI * (1.0 - f_i) * (1.0 - f_o))
            }
            Material::Mirror { .. } | Material::Dielectric { .. } => Color::ZERO,
        }
    }

    /// Density with which [`Material::sample`] produces `wi` from `wo`,
    /// counting only non-delta lobes.
    pub fn pdf(&self, frame: &Frame, wo: Vec3, wi: Vec3) -> f32 {
        let (wo, wi) = (frame.to_local(wo), frame.to_local(wi));
        if wo.z * wi.z <= 0.0 {
            return 0.0;
        }
        match *self {
            Material::Diffuse { .. } => cosine_hemisphere_pdf(wi.z.abs()),
            Material::Plastic { eta, .. } => {
                let f_o = fresnel_dielectric(wo.z.abs(), 1.0, eta);
                (1.0 - f_o) * cosine_hemisphere_pdf(wi.z.abs())
            }
            Material::Mirror { .. } | Material::Dielectric { .. } => 0.0,
        }
    }

    /// Sample an incident direction for outgoing direction `wo`.
    ///
    /// Returns `None` for grazing `wo` or when the sampled lobe has zero
    /// density.
    pub fn sample(&self, frame: &Frame, wo: Vec3, rng: &mut dyn RngCore) -> Option<BsdfSample> {
        let wo_local = frame.to_local(wo);
        if wo_local.z == 0.0 {
            return None;
        }
        // Opaque lobes live on the wo side of the surface.
        let side = if wo_local.z > 0.0 { *frame } else { frame.flipped() };

        match *self {
            Material::Diffuse { reflectance } => {
                let wi = cosine_sample_hemisphere(gen_vec2(rng));
                let pdf = cosine_hemisphere_pdf(wi.z);
                (pdf > 0.0).then(|| BsdfSample {
                    wi: side.to_world(wi),
                    weight: reflectance,
                    pdf,
                    specular: false,
                })
            }
            Material::Mirror { reflectance } => Some(BsdfSample {
                wi: reflect(wo, side.n),
                weight: reflectance,
                pdf: 1.0,
                specular: true,
            }),
            Material::Dielectric { eta } => sample_dielectric(frame, wo_local, eta, rng),
            Material::Plastic {
                diffuse,
                specular,
                eta,
            } => {
                let cos_o = wo_local.z.abs();
                let f_o = fresnel_dielectric(cos_o, 1.0, eta);
                if gen_f32(rng) < f_o {
                    return Some(BsdfSample {
                        wi: reflect(wo, side.n),
                        weight: specular,
                        pdf: f_o,
                        specular: true,
                    });
                }
                let wi = cosine_sample_hemisphere(gen_vec2(rng));
                let pdf = (1.0 - f_o) * cosine_hemisphere_pdf(wi.z);
                if pdf <= 0.0 {
                    return None;
                }
                let f_i = fresnel_dielectric(wi.z, 1.0, eta);
                Some(BsdfSample {
                    wi: side.to_world(wi),
                    weight: diffuse * (1.0 - f_i),
                    pdf,
                    specular: false,
                })
            }
        }
    }
}

fn sample_dielectric(
    frame: &Frame,
    wo_local: Vec3,
    eta: f32,
    rng: &mut dyn RngCore,
) -> Option<BsdfSample> {
    let entering = wo_local.z > 0.0;
    let (eta_i, eta_t) = if entering { (1.0, eta) } else { (eta, 1.0) };
    let cos_i = wo_local.z.abs();
    let reflectance = fresnel_dielectric(cos_i, eta_i, eta_t);

    // Normal on the wo side, in local space
    let n = Vec3::new(0.0, 0.0, wo_local.z.signum());

    if gen_f32(rng) < reflectance {
        let wi = Vec3::new(-wo_local.x, -wo_local.y, wo_local.z);
        return Some(BsdfSample {
            wi: frame.to_world(wi),
            weight: Color::ONE,
            pdf: reflectance,
            specular: true,
        });
    }

    let eta_rel = eta_i / eta_t;
    let sin2_t = eta_rel * eta_rel * (1.0 - cos_i * cos_i).max(0.0);
    if sin2_t >= 1.0 {
        return None;
    }
    let cos_t = (1.0 - sin2_t).sqrt();
    let wi = -wo_local * eta_rel + n * (eta_rel * cos_i - cos_t);

    Some(BsdfSample {
        wi: frame.to_world(wi).normalize(),
        // Radiance is compressed into the denser medium.
        weight: Color::splat(eta_rel * eta_rel),
        pdf: 1.0 - reflectance,
        specular: true,
    })
}

/// Mirror `wo` about `n`.
#[inline]
fn reflect(wo: Vec3, n: Vec3) -> Vec3 {
    -wo + n * (2.0 * wo.dot(n))
}

/// Unpolarized Fresnel reflectance at a smooth dielectric boundary.
///
/// `cos_theta_i` is measured against the normal on the `eta_i` side; a
/// negative value means the direction is on the `eta_t` side.
pub fn fresnel_dielectric(cos_theta_i: f32, eta_i: f32, eta_t: f32) -> f32 {
    let cos_theta_i = cos_theta_i.clamp(-1.0, 1.0);
    let (eta_i, eta_t, cos_theta_i) = if cos_theta_i > 0.0 {
        (eta_i, eta_t, cos_theta_i)
    } else {
        (eta_t, eta_i, -cos_theta_i)
    };

    let sin_theta_i = (1.0 - cos_theta_i * cos_theta_i).max(0.0).sqrt();
    let sin_theta_t = eta_i / eta_t * sin_theta_i;
    if sin_theta_t >= 1.0 {
        return 1.0;
    }
    let cos_theta_t = (1.0 - sin_theta_t * sin_theta_t).max(0.0).sqrt();
    let r_parl = (eta_t * cos_theta_i - eta_i * cos_theta_t)
        / (eta_t * cos_theta_i + eta_i * cos_theta_t);
    let r_perp = (eta_i * cos_theta_i - eta_t * cos_theta_t)
        / (eta_i * cos_theta_i + eta_t * cos_theta_t);
    (r_parl * r_parl + r_perp * r_perp) / 2.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn up_frame() -> Frame {
        Frame::from_normal(Vec3::Y)
    }

    #[test]
    fn test_fresnel_normal_incidence() {
        // ((1.5 - 1) / (1.5 + 1))^2
        assert!((fresnel_dielectric(1.0, 1.0, 1.5) - 0.04).abs() < 1e-5);
        assert!((fresnel_dielectric(-1.0, 1.0, 1.5) - 0.04).abs() < 1e-5);
        // Total internal reflection from inside at grazing angles
        assert_eq!(fresnel_dielectric(-0.1, 1.0, 1.5), 1.0);
    }

    #[test]
    fn test_diffuse_sample_matches_eval_and_pdf() {
        let material = Material::Diffuse {
            reflectance: Color::new(0.8, 0.5, 0.2),
        };
        let frame = up_frame();
        let wo = Vec3::new(0.3, 0.8, -0.1).normalize();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(1);

        for _ in 0..100 {
            let s = material.sample(&frame, wo, &mut rng).unwrap();
            assert!(!s.specular);
            assert!(s.wi.y > 0.0);
            let f = material.eval(&frame, wo, s.wi);
            let pdf = material.pdf(&frame, wo, s.wi);
            assert!((pdf - s.pdf).abs() < 1e-4);
            assert!((f * s.wi.y / pdf - s.weight).length() < 1e-3);
        }
    }

    #[test]
    fn test_opaque_materials_are_two_sided() {
        let material = Material::default();
        let frame = up_frame();
        let wo = Vec3::new(0.0, -1.0, 0.0);
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(2);

        let s = material.sample(&frame, wo, &mut rng).unwrap();
        assert!(s.wi.y < 0.0);
        assert!(material.eval(&frame, wo, s.wi).x > 0.0);
        // Transmission through an opaque surface is black.
        assert_eq!(material.eval(&frame, wo, Vec3::Y), Color::ZERO);
        assert_eq!(material.pdf(&frame, wo, Vec3::Y), 0.0);
    }

    #[test]
    fn test_mirror_reflects() {
        let material = Material::Mirror {
            reflectance: Color::ONE,
        };
        let frame = up_frame();
        let wo = Vec3::new(1.0, 1.0, 0.0).normalize();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(3);

        let s = material.sample(&frame, wo, &mut rng).unwrap();
        assert!(s.specular);
        assert!((s.wi - Vec3::new(-1.0, 1.0, 0.0).normalize()).length() < 1e-5);
        assert!(material.is_specular());
        assert_eq!(material.eval(&frame, wo, s.wi), Color::ZERO);
    }

    #[test]
    fn test_dielectric_splits_by_fresnel() {
        let material = Material::Dielectric { eta: 1.5 };
        let frame = up_frame();
        let wo = Vec3::Y;
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(4);

        let n = 20_000;
        let mut reflected = 0;
        for _ in 0..n {
            let s = material.sample(&frame, wo, &mut rng).unwrap();
            assert!(s.specular);
            if s.wi.y > 0.0 {
                reflected += 1;
                assert_eq!(s.weight, Color::ONE);
            } else {
                // Straight through at normal incidence
                assert!((s.wi - Vec3::NEG_Y).length() < 1e-5);
                assert!((s.weight.x - 1.0 / 2.25).abs() < 1e-5);
            }
        }
        let fraction = reflected as f32 / n as f32;
        assert!((fraction - 0.04).abs() < 0.006, "reflected {fraction}");
    }

    #[test]
    fn test_dielectric_refraction_obeys_snell() {
        let material = Material::Dielectric { eta: 1.5 };
        let frame = up_frame();
        let wo = Vec3::new(0.5, 0.5f32.sqrt(), 0.5).normalize();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);

        for _ in 0..64 {
            let s = material.sample(&frame, wo, &mut rng).unwrap();
            if s.wi.y < 0.0 {
                let sin_i = (1.0 - wo.y * wo.y).sqrt();
                let sin_t = (1.0 - s.wi.y * s.wi.y).sqrt();
                assert!((sin_i - 1.5 * sin_t).abs() < 1e-4);
                return;
            }
        }
        panic!("no refracted sample");
    }

    #[test]
    fn test_plastic_diffuse_lobe_consistent() {
        let material = Material::Plastic {
            diffuse: Color::new(0.6, 0.2, 0.2),
            specular: Color::ONE,
            eta: 1.5,
        };
        let frame = up_frame();
        let wo = Vec3::new(-0.4, 0.7, 0.2).normalize();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(6);

        let mut diffuse_samples = 0;
        for _ in 0..500 {
            let s = material.sample(&frame, wo, &mut rng).unwrap();
            if s.specular {
                continue;
            }
            diffuse_samples += 1;
            let f = material.eval(&frame, wo, s.wi);
            let pdf = material.pdf(&frame, wo, s.wi);
            assert!((pdf - s.pdf).abs() < 1e-4);
            assert!((f * s.wi.y / pdf - s.weight).length() < 1e-3);
        }
        assert!(diffuse_samples > 400);
        assert!(!material.is_specular());
    }

    #[test]
    fn test_validate() {
        assert!(Material::default().validate().is_ok());
        assert!(Material::Dielectric { eta: 0.0 }.validate().is_err());
        assert!(Material::Diffuse {
            reflectance: Color::new(-1.0, 0.0, 0.0)
        }
        .validate()
        .is_err());
    }
}
