//! Light sources.
//!
//! Like materials, lights are a closed enum. Each variant can be sampled
//! from a shading point and reports a scalar power used to pick lights in
//! proportion to their contribution.

use std::f32::consts::PI;

use lumen_math::sampling::{gen_f32, gen_vec2, uniform_sample_sphere, uniform_sample_triangle, uniform_sphere_pdf};
use lumen_math::{Color, ColorExt, Distribution1D, Vec3};
use rand::RngCore;

/// Incident illumination sampled from a light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightSample {
    /// Unit direction from the shading point towards the light
    pub wi: Vec3,
    /// Distance to the sampled point; infinite for environment lights
    pub distance: f32,
    /// Radiance arriving along `wi`
    pub radiance: Color,
    /// Solid-angle density of `wi`, or 1 for delta lights
    pub pdf: f32,
    /// True if the light can only be reached by explicit sampling
    pub is_delta: bool,
}

#[derive(Debug, Clone)]
pub enum Light {
    Area(AreaLight),
    Point(PointLight),
    Environment(EnvironmentLight),
}

impl Light {
    /// Sample incident illumination at `point`.
    ///
    /// Returns `None` when the sampled point cannot illuminate `point`
    /// (back side of a one-sided emitter, degenerate geometry).
    pub fn sample_incoming(&self, point: Vec3, rng: &mut dyn RngCore) -> Option<LightSample> {
        match self {
            Light::Area(light) => light.sample_incoming(point, rng),
            Light::Point(light) => light.sample_incoming(point),
            Light::Environment(light) => Some(light.sample_incoming(rng)),
        }
    }

    /// Total emitted power, as luminance.
    pub fn power(&self) -> f32 {
        match self {
            Light::Area(light) => light.power(),
            Light::Point(light) => light.power(),
            Light::Environment(light) => light.power(),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        let (name, value) = match self {
            Light::Area(light) => ("radiance", light.radiance),
            Light::Point(light) => {
                if !light.position.is_finite() {
                    return Err(format!("position {} is not finite", light.position));
                }
                ("intensity", light.intensity)
            }
            Light::Environment(light) => ("radiance", light.radiance),
        };
        if value.is_valid_radiance() {
            Ok(())
        } else {
            Err(format!("{name} {value} must be finite and non-negative"))
        }
    }
}

/// Emitter bound to the surface of a primitive.
///
/// Geometry is copied from the primitive when the scene is built.
#[derive(Debug, Clone)]
pub struct AreaLight {
    /// Index of the emitting primitive
    pub primitive: usize,
    /// Emitted radiance
    pub radiance: Color,
    /// Emit from both sides instead of only along the geometric normal
    pub two_sided: bool,
    triangles: Vec<[Vec3; 3]>,
    distribution: Distribution1D,
    area: f32,
}

impl AreaLight {
    pub fn new(primitive: usize, radiance: Color, two_sided: bool) -> Self {
        Self {
            primitive,
            radiance,
            two_sided,
            triangles: Vec::new(),
            distribution: Distribution1D::new(Vec::new()),
            area: 0.0,
        }
    }

    /// Attach world-space triangles of the bound primitive.
    pub(crate) fn attach_geometry(&mut self, triangles: Vec<[Vec3; 3]>) {
        let areas: Vec<f32> = triangles.iter().map(|t| triangle_area(t)).collect();
        self.area = areas.iter().sum();
        self.distribution = Distribution1D::new(areas);
        self.triangles = triangles;
    }

    /// Total world-space surface area.
    pub fn area(&self) -> f32 {
        self.area
    }

    /// Radiance leaving the surface with geometric normal `normal` along `wo`.
    #[inline]
    pub fn emitted(&self, normal: Vec3, wo: Vec3) -> Color {
        if self.two_sided || normal.dot(wo) > 0.0 {
            self.radiance
        } else {
            Color::ZERO
        }
    }

    /// Solid-angle density with which `sample_incoming` from `origin`
    /// produces the surface point `point` with geometric normal `normal`.
    pub fn pdf(&self, origin: Vec3, point: Vec3, normal: Vec3) -> f32 {
        let to_light = point - origin;
        let dist2 = to_light.length_squared();
        let cos_light = normal.dot(to_light).abs() / dist2.sqrt();
        if self.area <= 0.0 || cos_light <= 0.0 {
            return 0.0;
        }
        dist2 / (cos_light * self.area)
    }

    fn sample_incoming(&self, point: Vec3, rng: &mut dyn RngCore) -> Option<LightSample> {
        if self.area <= 0.0 {
            return None;
        }
        let (index, _) = self.distribution.sample_discrete(gen_f32(rng))?;
        let [p0, p1, p2] = self.triangles[index];
        let b = uniform_sample_triangle(gen_vec2(rng));
        let sampled = p0 * (1.0 - b.x - b.y) + p1 * b.x + p2 * b.y;
        let normal = (p1 - p0).cross(p2 - p0).try_normalize()?;

        let to_light = sampled - point;
        let distance = to_light.length();
        if distance <= 0.0 {
            return None;
        }
        let wi = to_light / distance;
        let radiance = self.emitted(normal, -wi);
        if radiance.is_black() {
            return None;
        }

        let cos_light = normal.dot(wi).abs();
        if cos_light <= 0.0 {
            return None;
        }
        Some(LightSample {
            wi,
            distance,
            radiance,
            pdf: distance * distance / (cos_light * self.area),
            is_delta: false,
        })
    }

    fn power(&self) -> f32 {
        let sides = if self.two_sided { 2.0 } else { 1.0 };
        sides * PI * self.area * self.radiance.luminance()
    }
}

/// Isotropic point light.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointLight {
    pub position: Vec3,
    /// Radiant intensity
    pub intensity: Color,
}

impl PointLight {
    fn sample_incoming(&self, point: Vec3) -> Option<LightSample> {
        let to_light = self.position - point;
        let dist2 = to_light.length_squared();
        if dist2 <= 0.0 {
            return None;
        }
        let distance = dist2.sqrt();
        Some(LightSample {
            wi: to_light / distance,
            distance,
            radiance: self.intensity / dist2,
            pdf: 1.0,
            is_delta: true,
        })
    }

    fn power(&self) -> f32 {
        4.0 * PI * self.intensity.luminance()
    }
}

/// Constant radiance arriving from every direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentLight {
    pub radiance: Color,
    /// Radius of the scene bounding sphere, set when the scene is built
    pub(crate) scene_radius: f32,
}

impl EnvironmentLight {
    pub fn new(radiance: Color) -> Self {
        Self {
            radiance,
            scene_radius: 0.0,
        }
    }

    /// Solid-angle density of any sampled direction.
    #[inline]
    pub fn pdf(&self) -> f32 {
        uniform_sphere_pdf()
    }

    fn sample_incoming(&self, rng: &mut dyn RngCore) -> LightSample {
        LightSample {
            wi: uniform_sample_sphere(gen_vec2(rng)),
            distance: f32::INFINITY,
            radiance: self.radiance,
            pdf: uniform_sphere_pdf(),
            is_delta: false,
        }
    }

    fn power(&self) -> f32 {
        PI * self.scene_radius * self.scene_radius * self.radiance.luminance()
    }
}

fn triangle_area([p0, p1, p2]: &[Vec3; 3]) -> f32 {
    0.5 * (*p1 - *p0).cross(*p2 - *p0).length()
}
