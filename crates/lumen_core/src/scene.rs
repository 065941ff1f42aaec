//! Scene store.
//!
//! A `Scene` is assembled through `SceneBuilder`, validated and baked into
//! world space once, and is read-only afterwards. Every index it hands out
//! (materials, lights, primitives) is guaranteed to resolve.

use std::sync::Arc;

use lumen_math::{Aabb, Color, Distribution1D, Mat4, Mat4Ext, Quat, Vec2, Vec3};
use serde::Deserialize;

use crate::camera::Camera;
use crate::error::SceneError;
use crate::light::{AreaLight, EnvironmentLight, Light, PointLight};
use crate::material::Material;
use crate::mesh::Mesh;
use crate::parallel::Engine;

/// Which estimator runs for every camera sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegratorKind {
    /// Unidirectional path tracing with next-event estimation.
    #[default]
    Path,
    /// Distance to the first hit, zero on a miss.
    Depth,
    /// First-hit shading normal remapped to [0, 1].
    ShadingNormal,
}

/// Integrator configuration carried by the scene.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    pub samples_per_pixel: u32,
    /// Maximum number of scattering events per path
    pub max_depth: u32,
    /// Depth at which Russian roulette starts
    pub rr_depth: u32,
    /// Mixed into every tile seed
    pub seed: u64,
    pub integrator: IntegratorKind,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            samples_per_pixel: 4,
            max_depth: 6,
            rr_depth: 5,
            seed: 0,
            integrator: IntegratorKind::Path,
        }
    }
}

impl RenderOptions {
    pub fn validate(&self) -> Result<(), SceneError> {
        if self.samples_per_pixel == 0 {
            return Err(SceneError::InvalidOptions(
                "samples_per_pixel must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Transform components that can be composed into a matrix.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Create a new transform with only translation.
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Convert to a 4x4 transformation matrix.
    ///
    /// Order: Scale -> Rotate -> Translate (SRT)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// A mesh placed in the world with a material.
///
/// World-space positions and normals are baked at build time so that ray
/// queries never touch the transform.
#[derive(Debug, Clone)]
pub struct Primitive {
    pub mesh: Arc<Mesh>,
    /// Index into the scene's materials
    pub material: usize,
    /// Index of the area light bound to this primitive, if it emits
    pub light: Option<usize>,
    world_positions: Vec<Vec3>,
    world_normals: Option<Vec<Vec3>>,
    bounds: Aabb,
}

impl Primitive {
    fn bake(mesh: Arc<Mesh>, transform: Mat4, material: usize) -> Self {
        let world_positions: Vec<Vec3> = mesh
            .positions
            .iter()
            .map(|&p| transform.transform_point3(p))
            .collect();
        let normal_matrix = transform.normal_matrix();
        let world_normals = mesh.normals.as_ref().map(|normals| {
            normals
                .iter()
                .map(|&n| (normal_matrix * n).normalize_or_zero())
                .collect()
        });
        let bounds = Aabb::enclosing(world_positions.iter().copied());
        Self {
            mesh,
            material,
            light: None,
            world_positions,
            world_normals,
            bounds,
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.mesh.triangle_count()
    }

    /// World-space vertices of triangle `i`.
    #[inline]
    pub fn triangle(&self, i: usize) -> [Vec3; 3] {
        let [a, b, c] = self.mesh.triangle(i);
        [
            self.world_positions[a],
            self.world_positions[b],
            self.world_positions[c],
        ]
    }

    /// World-space vertex positions.
    pub fn positions(&self) -> &[Vec3] {
        &self.world_positions
    }

    /// Unit geometric normal of triangle `i` (counter-clockwise winding).
    pub fn geometric_normal(&self, i: usize) -> Vec3 {
        let [p0, p1, p2] = self.triangle(i);
        (p1 - p0).cross(p2 - p0).normalize_or_zero()
    }

    /// Interpolated vertex normal at barycentrics `uv` of triangle `i`,
    /// if the mesh carries normals.
    pub fn shading_normal(&self, i: usize, uv: Vec2) -> Option<Vec3> {
        let normals = self.world_normals.as_ref()?;
        let [a, b, c] = self.mesh.triangle(i);
        let n = normals[a] * (1.0 - uv.x - uv.y) + normals[b] * uv.x + normals[c] * uv.y;
        n.try_normalize()
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }
}

struct PrimitiveDesc {
    mesh: Arc<Mesh>,
    transform: Mat4,
    material: usize,
}

/// Collects scene contents and validates them into a [`Scene`].
pub struct SceneBuilder {
    camera: Camera,
    options: RenderOptions,
    materials: Vec<Material>,
    primitives: Vec<PrimitiveDesc>,
    lights: Vec<Light>,
}

impl SceneBuilder {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,
            options: RenderOptions::default(),
            materials: Vec::new(),
            primitives: Vec::new(),
            lights: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options_mut(&mut self) -> &mut RenderOptions {
        &mut self.options
    }

    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    /// Add a material and return its index.
    pub fn add_material(&mut self, material: Material) -> usize {
        self.materials.push(material);
        self.materials.len() - 1
    }

    /// Add a primitive and return its index.
    pub fn add_primitive(&mut self, mesh: impl Into<Arc<Mesh>>, transform: Mat4, material: usize) -> usize {
        self.primitives.push(PrimitiveDesc {
            mesh: mesh.into(),
            transform,
            material,
        });
        self.primitives.len() - 1
    }

    /// Add a light and return its index.
    pub fn add_light(&mut self, light: Light) -> usize {
        self.lights.push(light);
        self.lights.len() - 1
    }

    /// Make `primitive` emit `radiance`.
    pub fn add_area_light(&mut self, primitive: usize, radiance: Color, two_sided: bool) -> usize {
        self.add_light(Light::Area(AreaLight::new(primitive, radiance, two_sided)))
    }

    pub fn add_point_light(&mut self, position: Vec3, intensity: Color) -> usize {
        self.add_light(Light::Point(PointLight {
            position,
            intensity,
        }))
    }

    pub fn add_environment_light(&mut self, radiance: Color) -> usize {
        self.add_light(Light::Environment(EnvironmentLight::new(radiance)))
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    /// Validate every reference and bake the scene.
    pub fn build(self, engine: &Engine) -> Result<Scene, SceneError> {
        let SceneBuilder {
            mut camera,
            options,
            materials,
            primitives,
            mut lights,
        } = self;

        camera.initialize()?;
        options.validate()?;

        for (index, material) in materials.iter().enumerate() {
            material
                .validate()
                .map_err(|reason| SceneError::InvalidMaterial {
                    material: index,
                    reason,
                })?;
        }

        for (index, desc) in primitives.iter().enumerate() {
            if desc.material >= materials.len() {
                return Err(SceneError::UnresolvedMaterial {
                    primitive: index,
                    material: desc.material,
                });
            }
            desc.mesh
                .validate()
                .map_err(|reason| SceneError::InvalidMesh {
                    primitive: index,
                    reason,
                })?;
            if !desc.transform.is_valid_transform() {
                return Err(SceneError::InvalidTransform { primitive: index });
            }
        }

        let mut emitters = vec![None; primitives.len()];
        for (index, light) in lights.iter().enumerate() {
            light
                .validate()
                .map_err(|reason| SceneError::InvalidLight {
                    light: index,
                    reason,
                })?;
            if let Light::Area(area) = light {
                let slot = emitters.get_mut(area.primitive).ok_or(
                    SceneError::UnresolvedPrimitive {
                        light: index,
                        primitive: area.primitive,
                    },
                )?;
                if slot.is_some() {
                    return Err(SceneError::DuplicateEmitter {
                        primitive: area.primitive,
                    });
                }
                *slot = Some(index);
            }
        }

        let mut primitives = engine.parallel_map(primitives.len(), |i| {
            let desc = &primitives[i];
            Primitive::bake(Arc::clone(&desc.mesh), desc.transform, desc.material)
        });
        for (primitive, light) in primitives.iter_mut().zip(emitters) {
            primitive.light = light;
        }

        let bounds = primitives
            .iter()
            .fold(Aabb::EMPTY, |acc, p| Aabb::surrounding(&acc, &p.bounds()));
        let scene_radius = if bounds.is_empty() {
            0.0
        } else {
            bounds.bounding_sphere().1
        };

        for light in &mut lights {
            match light {
                Light::Area(area) => {
                    let primitive = &primitives[area.primitive];
                    let triangles = (0..primitive.triangle_count())
                        .map(|t| primitive.triangle(t))
                        .collect();
                    area.attach_geometry(triangles);
                }
                Light::Environment(env) => env.scene_radius = scene_radius,
                Light::Point(_) => {}
            }
        }

        let powers = engine.parallel_map(lights.len(), |i| lights[i].power());
        let light_distribution = Distribution1D::new(powers);

        log::info!(
            "Built scene: {} primitives, {} triangles, {} materials, {} lights",
            primitives.len(),
            primitives.iter().map(Primitive::triangle_count).sum::<usize>(),
            materials.len(),
            lights.len()
        );

        Ok(Scene {
            camera,
            options,
            materials,
            primitives,
            lights,
            light_distribution,
            bounds,
        })
    }
}

/// Immutable, fully validated scene.
#[derive(Debug)]
pub struct Scene {
    camera: Camera,
    options: RenderOptions,
    materials: Vec<Material>,
    primitives: Vec<Primitive>,
    lights: Vec<Light>,
    light_distribution: Distribution1D,
    bounds: Aabb,
}

impl Scene {
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Output resolution as `(width, height)`.
    pub fn resolution(&self) -> (u32, u32) {
        (self.camera.image_width, self.camera.image_height)
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn primitive(&self, index: usize) -> &Primitive {
        &self.primitives[index]
    }

    pub fn primitive_count(&self) -> usize {
        self.primitives.len()
    }

    pub fn materials(&self) -> &[Material] {
        &self.materials
    }

    pub fn material(&self, index: usize) -> &Material {
        &self.materials[index]
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    pub fn light(&self, index: usize) -> &Light {
        &self.lights[index]
    }

    pub fn light_count(&self) -> usize {
        self.lights.len()
    }

    /// Environment lights, seen by rays that escape the scene.
    pub fn environment_lights(&self) -> impl Iterator<Item = (usize, &EnvironmentLight)> {
        self.lights.iter().enumerate().filter_map(|(i, light)| match light {
            Light::Environment(env) => Some((i, env)),
            _ => None,
        })
    }

    /// Pick a light in proportion to its power.
    ///
    /// Returns the light index and its selection probability.
    pub fn sample_light(&self, u: f32) -> Option<(usize, f32)> {
        self.light_distribution.sample_discrete(u)
    }

    /// Probability that [`Scene::sample_light`] picks `index`.
    pub fn light_pmf(&self, index: usize) -> f32 {
        self.light_distribution.pmf(index)
    }

    /// World-space bounds of all primitives.
    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn triangle_count(&self) -> usize {
        self.primitives.iter().map(Primitive::triangle_count).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new()
            .with_resolution(16, 8)
            .with_position(Vec3::new(0.0, 1.0, 5.0), Vec3::ZERO, Vec3::Y)
    }

    fn floor() -> Mesh {
        Mesh::quad(
            Vec3::new(-1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, 1.0),
            Vec3::new(1.0, 0.0, -1.0),
            Vec3::new(-1.0, 0.0, -1.0),
        )
    }

    #[test]
    fn test_build_bakes_world_geometry() {
        let engine = Engine::new(2).unwrap();
        let mut builder = SceneBuilder::new(camera());
        let mat = builder.add_material(Material::default());
        let prim = builder.add_primitive(
            floor(),
            Transform::from_translation(Vec3::new(0.0, 2.0, 0.0)).to_matrix(),
            mat,
        );
        builder.add_point_light(Vec3::new(0.0, 5.0, 0.0), Color::ONE);

        let scene = builder.build(&engine).unwrap();

        assert_eq!(scene.primitive_count(), 1);
        assert_eq!(scene.resolution(), (16, 8));
        assert_eq!(scene.triangle_count(), 2);
        let p = scene.primitive(prim);
        assert!(p.triangle(0).iter().all(|v| (v.y - 2.0).abs() < 1e-6));
        assert!((p.geometric_normal(0) - Vec3::Y).length() < 1e-6);
        assert!(p.shading_normal(0, Vec2::ZERO).is_none());
        assert!(p.light.is_none());
    }

    #[test]
    fn test_small_scale_accepted() {
        let engine = Engine::new(1).unwrap();
        let mut builder = SceneBuilder::new(camera());
        let mat = builder.add_material(Material::default());
        let prim = builder.add_primitive(floor(), Mat4::from_scale(Vec3::splat(0.001)), mat);

        let scene = builder.build(&engine).unwrap();

        let [p0, _, _] = scene.primitive(prim).triangle(0);
        assert!((p0 - Vec3::new(-0.001, 0.0, 0.001)).length() < 1e-7);
        assert!((scene.primitive(prim).geometric_normal(0) - Vec3::Y).length() < 1e-5);
    }

    #[test]
    fn test_light_selection_follows_power() {
        let engine = Engine::new(2).unwrap();
        let mut builder = SceneBuilder::new(camera());
        let mat = builder.add_material(Material::default());
        let floor = builder.add_primitive(floor(), Mat4::IDENTITY, mat);
        let weak = builder.add_point_light(Vec3::Y, Color::splat(1.0));
        let strong = builder.add_point_light(Vec3::Y, Color::splat(3.0));
        let area = builder.add_area_light(floor, Color::ONE, false);

        let scene = builder.build(&engine).unwrap();

        // Point power 4*pi*I, area power pi*A*L with A = 4
        let total = 4.0 + 12.0 + 4.0;
        assert!((scene.light_pmf(weak) - 4.0 / total).abs() < 1e-5);
        assert!((scene.light_pmf(strong) - 12.0 / total).abs() < 1e-5);
        assert!((scene.light_pmf(area) - 4.0 / total).abs() < 1e-5);
        assert_eq!(scene.primitive(floor).light, Some(area));
        assert_eq!(scene.sample_light(0.0).map(|s| s.0), Some(weak));
    }

    #[test]
    fn test_unresolved_references_rejected() {
        let engine = Engine::new(1).unwrap();

        let mut builder = SceneBuilder::new(camera());
        builder.add_primitive(floor(), Mat4::IDENTITY, 3);
        assert!(matches!(
            builder.build(&engine),
            Err(SceneError::UnresolvedMaterial {
                primitive: 0,
                material: 3
            })
        ));

        let mut builder = SceneBuilder::new(camera());
        builder.add_material(Material::default());
        builder.add_area_light(7, Color::ONE, false);
        assert!(matches!(
            builder.build(&engine),
            Err(SceneError::UnresolvedPrimitive {
                light: 0,
                primitive: 7
            })
        ));
    }

    #[test]
    fn test_duplicate_emitter_rejected() {
        let engine = Engine::new(1).unwrap();
        let mut builder = SceneBuilder::new(camera());
        let mat = builder.add_material(Material::default());
        let prim = builder.add_primitive(floor(), Mat4::IDENTITY, mat);
        builder.add_area_light(prim, Color::ONE, false);
        builder.add_area_light(prim, Color::ONE, true);

        assert!(matches!(
            builder.build(&engine),
            Err(SceneError::DuplicateEmitter { primitive: 0 })
        ));
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        let engine = Engine::new(1).unwrap();

        let bad_camera = SceneBuilder::new(camera().with_resolution(0, 0));
        assert!(matches!(
            bad_camera.build(&engine),
            Err(SceneError::InvalidCamera(_))
        ));

        let no_samples = SceneBuilder::new(camera()).with_options(RenderOptions {
            samples_per_pixel: 0,
            ..Default::default()
        });
        assert!(matches!(
            no_samples.build(&engine),
            Err(SceneError::InvalidOptions(_))
        ));

        let mut flat = SceneBuilder::new(camera());
        let mat = flat.add_material(Material::default());
        flat.add_primitive(floor(), Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)), mat);
        assert!(matches!(
            flat.build(&engine),
            Err(SceneError::InvalidTransform { primitive: 0 })
        ));

        let mut broken = SceneBuilder::new(camera());
        let mat = broken.add_material(Material::default());
        broken.add_primitive(Mesh::new(vec![Vec3::ZERO], vec![0, 0, 1], None), Mat4::IDENTITY, mat);
        assert!(matches!(
            broken.build(&engine),
            Err(SceneError::InvalidMesh { primitive: 0, .. })
        ));
    }

    #[test]
    fn test_environment_power_uses_scene_radius() {
        let engine = Engine::new(1).unwrap();
        let mut builder = SceneBuilder::new(camera());
        let mat = builder.add_material(Material::default());
        builder.add_primitive(floor(), Mat4::IDENTITY, mat);
        let env = builder.add_environment_light(Color::ONE);

        let scene = builder.build(&engine).unwrap();

        assert_eq!(scene.environment_lights().count(), 1);
        assert!(scene.light(env).power() > 0.0);
        assert_eq!(scene.light_pmf(env), 1.0);
    }

    #[test]
    fn test_render_options_deserialize_with_defaults() {
        let options: RenderOptions =
            serde_json::from_str(r#"{ "samples_per_pixel": 64, "integrator": "shading_normal" }"#)
                .unwrap();
        assert_eq!(options.samples_per_pixel, 64);
        assert_eq!(options.max_depth, 6);
        assert_eq!(options.integrator, IntegratorKind::ShadingNormal);
    }
}
