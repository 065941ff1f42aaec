//! JSON scene description loading.
//!
//! A scene file names its materials, lists shapes that reference them by
//! name, and optionally carries render options and an output filename:
//!
//! ```json
//! {
//!   "camera": { "resolution": [320, 240], "look_from": [0, 1, 4], "look_at": [0, 0.5, 0], "fov": 40 },
//!   "options": { "samples_per_pixel": 64 },
//!   "materials": { "white": { "type": "diffuse", "reflectance": [0.8, 0.8, 0.8] } },
//!   "shapes": [
//!     { "type": "quad", "corners": [[-1,0,1],[1,0,1],[1,0,-1],[-1,0,-1]], "material": "white" },
//!     { "type": "obj", "path": "bunny.obj", "material": "white",
//!       "transform": { "translate": [0, 0, 0], "rotate": { "axis": [0, 1, 0], "degrees": 30 }, "scale": 2 } }
//!   ],
//!   "lights": [ { "type": "point", "position": [0, 3, 0], "intensity": [10, 10, 10] } ]
//! }
//! ```
//!
//! Loading stops at a `SceneBuilder`, so a driver can still override
//! options before building.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use lumen_math::{Color, Mat4, Quat, Vec3};
use serde::Deserialize;
use thiserror::Error;

use crate::camera::Camera;
use crate::error::SceneError;
use crate::material::Material;
use crate::mesh::Mesh;
use crate::parallel::Engine;
use crate::scene::{RenderOptions, Scene, SceneBuilder, Transform};

/// Output filename used when a scene file does not name one.
pub const DEFAULT_OUTPUT: &str = "image.exr";

/// Errors that can occur while reading a scene description.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed scene description: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to load OBJ {path}: {source}")]
    Obj {
        path: PathBuf,
        #[source]
        source: tobj::LoadError,
    },

    #[error("Unknown material: {0}")]
    UnknownMaterial(String),

    #[error(transparent)]
    Scene(#[from] SceneError),
}

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// A parsed scene that has not been validated yet.
pub struct SceneDescription {
    pub builder: SceneBuilder,
    /// Where the rendered image should go, relative to the working directory
    pub output: PathBuf,
}

impl SceneDescription {
    pub fn build(self, engine: &Engine) -> LoadResult<Scene> {
        Ok(self.builder.build(engine)?)
    }
}

/// Read and parse a scene file. Relative paths inside the file (OBJ
/// meshes) resolve against the file's directory.
pub fn load_scene<P: AsRef<Path>>(path: P) -> LoadResult<SceneDescription> {
    let path = path.as_ref();
    log::info!("Loading scene: {}", path.display());
    let text = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    load_scene_from_str(&text, base_dir)
}

/// Parse a scene description from a string.
pub fn load_scene_from_str(text: &str, base_dir: &Path) -> LoadResult<SceneDescription> {
    let desc: SceneDesc = serde_json::from_str(text)?;

    let mut builder = SceneBuilder::new(desc.camera.to_camera()).with_options(desc.options);

    let mut material_ids = HashMap::new();
    for (name, material) in desc.materials {
        let id = builder.add_material(material.into());
        material_ids.insert(name, id);
    }

    for shape in desc.shapes {
        let material = *material_ids
            .get(&shape.material)
            .ok_or_else(|| LoadError::UnknownMaterial(shape.material.clone()))?;
        let transform = shape.transform.to_matrix();

        for (mesh, local) in shape.geometry.into_meshes(base_dir)? {
            let primitive = builder.add_primitive(mesh, transform * local, material);
            if let Some(emission) = &shape.emission {
                builder.add_area_light(
                    primitive,
                    Color::from(emission.radiance),
                    emission.two_sided,
                );
            }
        }
    }

    for light in desc.lights {
        match light {
            LightDesc::Point {
                position,
                intensity,
            } => builder.add_point_light(Vec3::from(position), Color::from(intensity)),
            LightDesc::Environment { radiance } => {
                builder.add_environment_light(Color::from(radiance))
            }
        };
    }

    log::debug!("Parsed {} primitives", builder.primitive_count());

    Ok(SceneDescription {
        builder,
        output: desc.output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
    })
}

#[derive(Deserialize)]
struct SceneDesc {
    camera: CameraDesc,
    #[serde(default)]
    options: RenderOptions,
    output: Option<PathBuf>,
    #[serde(default)]
    materials: BTreeMap<String, MaterialDesc>,
    #[serde(default)]
    shapes: Vec<ShapeDesc>,
    #[serde(default)]
    lights: Vec<LightDesc>,
}

#[derive(Deserialize)]
struct CameraDesc {
    resolution: [u32; 2],
    look_from: [f32; 3],
    look_at: [f32; 3],
    #[serde(default = "default_up")]
    up: [f32; 3],
    #[serde(default = "default_fov")]
    fov: f32,
    #[serde(default)]
    defocus_angle: f32,
    focus_distance: Option<f32>,
}

fn default_up() -> [f32; 3] {
    [0.0, 1.0, 0.0]
}

fn default_fov() -> f32 {
    45.0
}

impl CameraDesc {
    fn to_camera(&self) -> Camera {
        let (from, at) = (Vec3::from(self.look_from), Vec3::from(self.look_at));
        let focus = self.focus_distance.unwrap_or_else(|| from.distance(at));
        Camera::new()
            .with_resolution(self.resolution[0], self.resolution[1])
            .with_position(from, at, Vec3::from(self.up))
            .with_lens(self.fov, self.defocus_angle, focus)
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MaterialDesc {
    Diffuse {
        reflectance: [f32; 3],
    },
    Mirror {
        #[serde(default = "white")]
        reflectance: [f32; 3],
    },
    Dielectric {
        #[serde(default = "glass_eta")]
        eta: f32,
    },
    Plastic {
        diffuse: [f32; 3],
        #[serde(default = "white")]
        specular: [f32; 3],
        #[serde(default = "glass_eta")]
        eta: f32,
    },
}

fn white() -> [f32; 3] {
    [1.0; 3]
}

fn glass_eta() -> f32 {
    1.5
}

impl From<MaterialDesc> for Material {
    fn from(desc: MaterialDesc) -> Self {
        match desc {
            MaterialDesc::Diffuse { reflectance } => Material::Diffuse {
                reflectance: Color::from(reflectance),
            },
            MaterialDesc::Mirror { reflectance } => Material::Mirror {
                reflectance: Color::from(reflectance),
            },
            MaterialDesc::Dielectric { eta } => Material::Dielectric { eta },
            MaterialDesc::Plastic {
                diffuse,
                specular,
                eta,
            } => Material::Plastic {
                diffuse: Color::from(diffuse),
                specular: Color::from(specular),
                eta,
            },
        }
    }
}

#[derive(Deserialize)]
struct ShapeDesc {
    #[serde(flatten)]
    geometry: GeometryDesc,
    material: String,
    #[serde(default)]
    transform: TransformDesc,
    emission: Option<EmissionDesc>,
}

#[derive(Deserialize)]
struct EmissionDesc {
    radiance: [f32; 3],
    #[serde(default)]
    two_sided: bool,
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum GeometryDesc {
    Mesh {
        positions: Vec<[f32; 3]>,
        indices: Vec<u32>,
        normals: Option<Vec<[f32; 3]>>,
    },
    Quad {
        corners: [[f32; 3]; 4],
    },
    Sphere {
        #[serde(default)]
        center: [f32; 3],
        #[serde(default = "unit")]
        radius: f32,
        #[serde(default = "sphere_segments")]
        segments: u32,
        #[serde(default = "sphere_rings")]
        rings: u32,
    },
    Obj {
        path: PathBuf,
    },
}

fn unit() -> f32 {
    1.0
}

fn sphere_segments() -> u32 {
    48
}

fn sphere_rings() -> u32 {
    24
}

impl GeometryDesc {
    /// Meshes for this shape, each with a transform applied before the
    /// shape's own.
    fn into_meshes(self, base_dir: &Path) -> LoadResult<Vec<(Arc<Mesh>, Mat4)>> {
        let to_vecs = |v: Vec<[f32; 3]>| v.into_iter().map(Vec3::from).collect::<Vec<_>>();
        let meshes = match self {
            GeometryDesc::Mesh {
                positions,
                indices,
                normals,
            } => vec![(
                Mesh::new(to_vecs(positions), indices, normals.map(to_vecs)),
                Mat4::IDENTITY,
            )],
            GeometryDesc::Quad { corners } => {
                let [a, b, c, d] = corners.map(Vec3::from);
                vec![(Mesh::quad(a, b, c, d), Mat4::IDENTITY)]
            }
            GeometryDesc::Sphere {
                center,
                radius,
                segments,
                rings,
            } => vec![(
                Mesh::uv_sphere(radius, segments, rings),
                Mat4::from_translation(Vec3::from(center)),
            )],
            GeometryDesc::Obj { path } => {
                let path = base_dir.join(path);
                load_obj(&path)?
                    .into_iter()
                    .map(|mesh| (mesh, Mat4::IDENTITY))
                    .collect()
            }
        };
        Ok(meshes
            .into_iter()
            .map(|(mesh, local)| (Arc::new(mesh), local))
            .collect())
    }
}

/// Load every model of an OBJ file as its own mesh.
fn load_obj(path: &Path) -> LoadResult<Vec<Mesh>> {
    let (models, _materials) = tobj::load_obj(
        path,
        &tobj::LoadOptions {
            single_index: true,
            triangulate: true,
            ..Default::default()
        },
    )
    .map_err(|source| LoadError::Obj {
        path: path.to_path_buf(),
        source,
    })?;

    let meshes: Vec<Mesh> = models
        .into_iter()
        .map(|model| {
            let mesh = model.mesh;
            let positions = mesh
                .positions
                .chunks_exact(3)
                .map(Vec3::from_slice)
                .collect::<Vec<_>>();
            let normals = (mesh.normals.len() == mesh.positions.len()).then(|| {
                mesh.normals
                    .chunks_exact(3)
                    .map(Vec3::from_slice)
                    .collect::<Vec<_>>()
            });
            let mut mesh = Mesh::new(positions, mesh.indices, normals);
            if mesh.normals.is_none() {
                mesh.compute_normals();
            }
            mesh
        })
        .collect();

    log::info!(
        "Loaded {} ({} models, {} triangles)",
        path.display(),
        meshes.len(),
        meshes.iter().map(Mesh::triangle_count).sum::<usize>()
    );
    Ok(meshes)
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct TransformDesc {
    /// Row-major 4x4 matrix; overrides the components when present
    matrix: Option<[[f32; 4]; 4]>,
    translate: Option<[f32; 3]>,
    rotate: Option<RotationDesc>,
    scale: Option<ScaleDesc>,
}

#[derive(Deserialize)]
struct RotationDesc {
    axis: [f32; 3],
    degrees: f32,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScaleDesc {
    Uniform(f32),
    PerAxis([f32; 3]),
}

impl TransformDesc {
    fn to_matrix(&self) -> Mat4 {
        if let Some(rows) = self.matrix {
            return Mat4::from_cols_array_2d(&rows).transpose();
        }
        let rotation = self
            .rotate
            .as_ref()
            .map(|r| {
                // A zero axis yields a NaN rotation, rejected at scene build.
                let axis = Vec3::from(r.axis).normalize();
                Quat::from_axis_angle(axis, r.degrees.to_radians())
            })
            .unwrap_or(Quat::IDENTITY);
        let scale = match self.scale {
            Some(ScaleDesc::Uniform(s)) => Vec3::splat(s),
            Some(ScaleDesc::PerAxis(s)) => Vec3::from(s),
            None => Vec3::ONE,
        };
        Transform {
            translation: self.translate.map(Vec3::from).unwrap_or(Vec3::ZERO),
            rotation,
            scale,
        }
        .to_matrix()
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum LightDesc {
    Point {
        position: [f32; 3],
        intensity: [f32; 3],
    },
    Environment {
        radiance: [f32; 3],
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light::Light;
    use crate::scene::IntegratorKind;

    const BOX_SCENE: &str = r#"{
        "camera": { "resolution": [32, 24], "look_from": [0, 1, 4], "look_at": [0, 0.5, 0], "fov": 40 },
        "options": { "samples_per_pixel": 8, "integrator": "depth" },
        "output": "box.png",
        "materials": {
            "white": { "type": "diffuse", "reflectance": [0.8, 0.8, 0.8] },
            "glass": { "type": "dielectric" },
            "black": { "type": "diffuse", "reflectance": [0, 0, 0] }
        },
        "shapes": [
            { "type": "quad", "corners": [[-1,0,1],[1,0,1],[1,0,-1],[-1,0,-1]], "material": "white" },
            { "type": "sphere", "center": [0, 0.5, 0], "radius": 0.5, "material": "glass" },
            { "type": "quad", "corners": [[-0.2,1.9,-0.2],[0.2,1.9,-0.2],[0.2,1.9,0.2],[-0.2,1.9,0.2]],
              "material": "black", "emission": { "radiance": [10, 10, 10] } },
            { "type": "mesh", "positions": [[0,0,0],[1,0,0],[0,1,0]], "indices": [0, 1, 2],
              "material": "white", "transform": { "translate": [2, 0, 0], "scale": [1, 2, 1] } }
        ],
        "lights": [
            { "type": "point", "position": [0, 3, 0], "intensity": [5, 5, 5] },
            { "type": "environment", "radiance": [0.1, 0.1, 0.1] }
        ]
    }"#;

    #[test]
    fn test_load_full_scene() {
        let engine = Engine::new(2).unwrap();
        let desc = load_scene_from_str(BOX_SCENE, Path::new(".")).unwrap();
        assert_eq!(desc.output, PathBuf::from("box.png"));

        let scene = desc.build(&engine).unwrap();
        assert_eq!(scene.resolution(), (32, 24));
        assert_eq!(scene.primitive_count(), 4);
        assert_eq!(scene.material_count(), 3);
        assert_eq!(scene.light_count(), 3);
        assert_eq!(scene.options().samples_per_pixel, 8);
        assert_eq!(scene.options().integrator, IntegratorKind::Depth);

        // Quad corners face the declared side.
        let light_quad = scene.primitive(2);
        assert!((light_quad.geometric_normal(0) - Vec3::NEG_Y).length() < 1e-5);
        assert!(matches!(scene.light(light_quad.light.unwrap()), Light::Area(_)));

        // Component transform: scale then translate.
        let [_, b, c] = scene.primitive(3).triangle(0);
        assert!((b - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-5);
        assert!((c - Vec3::new(2.0, 2.0, 0.0)).length() < 1e-5);

        // Sphere is centered where asked.
        let sphere = scene.primitive(1);
        assert!((sphere.bounds().centroid() - Vec3::new(0.0, 0.5, 0.0)).length() < 1e-3);
    }

    #[test]
    fn test_default_output_and_options() {
        let text = r#"{
            "camera": { "resolution": [4, 4], "look_from": [0, 0, 1], "look_at": [0, 0, 0] }
        }"#;
        let desc = load_scene_from_str(text, Path::new(".")).unwrap();
        assert_eq!(desc.output, PathBuf::from(DEFAULT_OUTPUT));

        let scene = desc.build(&Engine::new(1).unwrap()).unwrap();
        assert_eq!(*scene.options(), RenderOptions::default());
        assert_eq!(scene.primitive_count(), 0);
    }

    #[test]
    fn test_matrix_transform_is_row_major() {
        let text = r#"{
            "camera": { "resolution": [4, 4], "look_from": [0, 0, 5], "look_at": [0, 0, 0] },
            "materials": { "m": { "type": "mirror" } },
            "shapes": [
                { "type": "mesh", "positions": [[0,0,0],[1,0,0],[0,1,0]], "indices": [0, 1, 2], "material": "m",
                  "transform": { "matrix": [[1,0,0,5],[0,1,0,0],[0,0,1,0],[0,0,0,1]] } }
            ]
        }"#;
        let scene = load_scene_from_str(text, Path::new("."))
            .unwrap()
            .build(&Engine::new(1).unwrap())
            .unwrap();
        assert!((scene.primitive(0).triangle(0)[0] - Vec3::new(5.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn test_unknown_material_is_an_error() {
        let text = r#"{
            "camera": { "resolution": [4, 4], "look_from": [0, 0, 1], "look_at": [0, 0, 0] },
            "shapes": [ { "type": "quad", "corners": [[0,0,0],[1,0,0],[1,1,0],[0,1,0]], "material": "nope" } ]
        }"#;
        match load_scene_from_str(text, Path::new(".")) {
            Err(LoadError::UnknownMaterial(name)) => assert_eq!(name, "nope"),
            other => panic!("expected UnknownMaterial, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        assert!(matches!(
            load_scene_from_str("{ \"camera\": ", Path::new(".")),
            Err(LoadError::Json(_))
        ));
        assert!(matches!(
            load_scene_from_str(r#"{ "camera": { "resolution": [1, 1] } }"#, Path::new(".")),
            Err(LoadError::Json(_))
        ));
    }

    #[test]
    fn test_invalid_camera_surfaces_on_build() {
        let text = r#"{
            "camera": { "resolution": [4, 4], "look_from": [0, 0, 0], "look_at": [0, 0, 0] }
        }"#;
        let result = load_scene_from_str(text, Path::new("."))
            .unwrap()
            .build(&Engine::new(1).unwrap());
        assert!(matches!(
            result,
            Err(LoadError::Scene(SceneError::InvalidCamera(_)))
        ));
    }

    #[test]
    fn test_load_obj_relative_to_scene_file() {
        let dir = std::env::temp_dir().join(format!("lumen_loader_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("tri.obj"),
            "v 0 0 0\nv 1 0 0\nv 0 1 0\nv 1 1 0\nf 1 2 3\nf 2 4 3\n",
        )
        .unwrap();
        let scene_path = dir.join("scene.json");
        std::fs::write(
            &scene_path,
            r#"{
                "camera": { "resolution": [4, 4], "look_from": [0, 0, 5], "look_at": [0, 0, 0] },
                "materials": { "m": { "type": "plastic", "diffuse": [0.5, 0.5, 0.5] } },
                "shapes": [ { "type": "obj", "path": "tri.obj", "material": "m" } ]
            }"#,
        )
        .unwrap();

        let scene = load_scene(&scene_path)
            .unwrap()
            .build(&Engine::new(1).unwrap())
            .unwrap();
        assert_eq!(scene.primitive_count(), 1);
        assert_eq!(scene.triangle_count(), 2);
        // No vn records: smooth normals are generated from the faces
        let normal = scene.primitive(0).shading_normal(1, lumen_math::Vec2::new(0.2, 0.3));
        assert!(normal.is_some_and(|n| (n - Vec3::Z).length() < 1e-5));

        let missing = load_scene(dir.join("missing.json"));
        assert!(matches!(missing, Err(LoadError::Io(_))));

        std::fs::remove_dir_all(&dir).ok();
    }
}
