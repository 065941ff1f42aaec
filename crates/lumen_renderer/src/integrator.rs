//! Radiance estimators.
//!
//! [`PathIntegrator`] turns one camera ray into one radiance sample. The
//! path loop is iterative: its state is the current ray, the throughput
//! carried so far and the number of scattering events, so maximum depth
//! and Russian roulette are plain loop exits.
//!
//! Direct lighting combines light sampling and BSDF sampling with the power
//! heuristic. Emission found by BSDF sampling is weighted against the
//! light-sampling density it competes with; after a specular bounce (or on
//! the camera ray) it is taken at full weight because light sampling could
//! not have produced it.

use lumen_core::{IntegratorKind, Light, Material, RenderOptions, Scene};
use lumen_math::sampling::{gen_f32, power_heuristic};
use lumen_math::{Color, ColorExt, Frame, Ray, Vec3};
use rand::RngCore;

use crate::accel::{Accelerator, Hit};

/// Surface data at a ray hit, shared by every estimator.
struct SurfaceInteraction<'a> {
    point: Vec3,
    /// Direction back along the incoming ray
    wo: Vec3,
    geometric_normal: Vec3,
    frame: Frame,
    material: &'a Material,
    light: Option<usize>,
}

pub struct PathIntegrator<'a> {
    scene: &'a Scene,
    accel: &'a dyn Accelerator,
    options: RenderOptions,
}

impl<'a> PathIntegrator<'a> {
    pub fn new(scene: &'a Scene, accel: &'a dyn Accelerator) -> Self {
        Self {
            scene,
            accel,
            options: *scene.options(),
        }
    }

    /// Estimate radiance arriving along `ray` with the scene's configured
    /// estimator. The result is not clamped.
    pub fn radiance(&self, ray: Ray, rng: &mut dyn RngCore) -> Color {
        match self.options.integrator {
            IntegratorKind::Path => self.path(ray, rng),
            IntegratorKind::Depth => self
                .accel
                .intersect(&ray)
                .map_or(Color::ZERO, |hit| Color::splat(hit.t)),
            IntegratorKind::ShadingNormal => self.accel.intersect(&ray).map_or(Color::ZERO, |hit| {
                let si = self.interaction(&ray, &hit);
                (si.frame.n + Vec3::ONE) * 0.5
            }),
        }
    }

    fn interaction(&self, ray: &Ray, hit: &Hit) -> SurfaceInteraction<'a> {
        let primitive = self.scene.primitive(hit.primitive);
        let ng = hit.geometric_normal;
        let ns = primitive
            .shading_normal(hit.triangle, hit.uv)
            .map(|n| if n.dot(ng) < 0.0 { -n } else { n })
            .unwrap_or(ng);
        SurfaceInteraction {
            point: ray.at(hit.t),
            wo: -ray.direction,
            geometric_normal: ng,
            frame: Frame::from_normal(ns),
            material: self.scene.material(primitive.material),
            light: primitive.light,
        }
    }

    fn path(&self, mut ray: Ray, rng: &mut dyn RngCore) -> Color {
        let mut radiance = Color::ZERO;
        let mut throughput = Color::ONE;
        let mut depth = 0;

        // State of the last BSDF sample, used to weight emission it finds
        let mut specular_bounce = false;
        let mut bsdf_pdf = 0.0;
        let mut prev_point = ray.origin;

        loop {
            let full_weight = depth == 0 || specular_bounce;

            let Some(hit) = self.accel.intersect(&ray) else {
                for (index, env) in self.scene.environment_lights() {
                    let weight = if full_weight {
                        1.0
                    } else {
                        power_heuristic(bsdf_pdf, self.scene.light_pmf(index) * env.pdf())
                    };
                    radiance += throughput * env.radiance * weight;
                }
                break;
            };

            let si = self.interaction(&ray, &hit);

            if let Some(index) = si.light {
                if let Light::Area(area) = self.scene.light(index) {
                    let emitted = area.emitted(si.geometric_normal, si.wo);
                    if !emitted.is_black() {
                        let weight = if full_weight {
                            1.0
                        } else {
                            let light_pdf = area.pdf(prev_point, si.point, si.geometric_normal)
                                * self.scene.light_pmf(index);
                            power_heuristic(bsdf_pdf, light_pdf)
                        };
                        radiance += throughput * emitted * weight;
                    }
                }
            }

            if depth >= self.options.max_depth {
                break;
            }

            if !si.material.is_specular() {
                radiance += throughput * self.sample_direct(&si, rng);
            }

            let Some(sample) = si.material.sample(&si.frame, si.wo, rng) else {
                break;
            };
            throughput *= sample.weight;
            if throughput.is_black() {
                break;
            }
            specular_bounce = sample.specular;
            bsdf_pdf = sample.pdf;
            prev_point = si.point;
            ray = Ray::spawn(si.point, si.geometric_normal, sample.wi);
            depth += 1;

            if depth > self.options.rr_depth {
                match russian_roulette(throughput, gen_f32(rng)) {
                    Some(scale) => throughput *= scale,
                    None => break,
                }
            }
        }

        radiance
    }

    /// One light-sampling estimate of direct illumination at `si`, without
    /// the path throughput.
    fn sample_direct(&self, si: &SurfaceInteraction, rng: &mut dyn RngCore) -> Color {
        let Some((index, pmf)) = self.scene.sample_light(gen_f32(rng)) else {
            return Color::ZERO;
        };
        let light = self.scene.light(index);
        let Some(ls) = light.sample_incoming(si.point, rng) else {
            return Color::ZERO;
        };
        if ls.pdf <= 0.0 {
            return Color::ZERO;
        }

        let f = si.material.eval(&si.frame, si.wo, ls.wi);
        if f.is_black() {
            return Color::ZERO;
        }
        let shadow = Ray::spawn_to(si.point, si.geometric_normal, ls.wi, ls.distance);
        if self.accel.occluded(&shadow, shadow.t_max) {
            return Color::ZERO;
        }

        let light_pdf = pmf * ls.pdf;
        let weight = if ls.is_delta {
            1.0
        } else {
            power_heuristic(light_pdf, si.material.pdf(&si.frame, si.wo, ls.wi))
        };
        let cos = ls.wi.dot(si.frame.n).abs();
        f * ls.radiance * (cos * weight / light_pdf)
    }
}

/// Decide whether a path with `throughput` continues.
///
/// The path survives with probability `q = min(1, max channel)` when
/// `u < q`; the returned factor `1 / q` keeps the estimate unbiased.
pub fn russian_roulette(throughput: Color, u: f32) -> Option<f32> {
    let q = throughput.max_element().min(1.0);
    if q <= 0.0 || u >= q {
        None
    } else {
        Some(1.0 / q)
    }
}

/// Replace an unusable sample with zero.
///
/// Returns the sample to accumulate and whether it was clamped.
pub fn clamp_sample(sample: Color) -> (Color, bool) {
    if sample.is_valid_radiance() {
        (sample, false)
    } else {
        (Color::ZERO, true)
    }
}
