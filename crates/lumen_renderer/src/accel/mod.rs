//! Ray-scene intersection.
//!
//! Everything the integrator needs from an intersection engine goes
//! through [`Accelerator`]: build once from a scene, then answer nearest-hit
//! and any-hit queries from any number of threads. Dropping the handle
//! releases the index.

mod bvh;
#[cfg(feature = "embree")]
mod embree;

pub use bvh::{Bvh, BvhNode};
#[cfg(feature = "embree")]
pub use embree::EmbreeScene;

use std::fmt;
use std::str::FromStr;

use lumen_core::{Engine, Scene};
use lumen_math::{Ray, Vec2, Vec3};
use thiserror::Error;

/// Errors from building an acceleration structure.
#[derive(Error, Debug)]
pub enum AccelerationError {
    #[error("Scene has no primitives to intersect")]
    NoPrimitives,

    #[error("Primitive {primitive} has a non-finite vertex at index {vertex}")]
    NonFiniteVertex { primitive: usize, vertex: usize },

    #[error("Intersection backend failed: {0}")]
    Backend(String),
}

/// Nearest intersection along a ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    /// Insertion index of the primitive in the scene
    pub primitive: usize,
    /// Triangle within the primitive's mesh
    pub triangle: usize,
    /// Ray parameter of the hit
    pub t: f32,
    /// Barycentric coordinates of vertices 1 and 2
    pub uv: Vec2,
    /// Unit geometric normal following the triangle winding
    pub geometric_normal: Vec3,
}

/// A built, immutable spatial index over a scene's triangles.
pub trait Accelerator: Send + Sync {
    /// Nearest hit with `ray.t_min <= t <= ray.t_max`. Hits at equal `t`
    /// (within tolerance) resolve to the lowest primitive index.
    fn intersect(&self, ray: &Ray) -> Option<Hit>;

    /// True if anything lies along the ray in `[ray.t_min, min(ray.t_max, max_t)]`.
    fn occluded(&self, ray: &Ray, max_t: f32) -> bool;
}

/// Available intersection backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AcceleratorKind {
    /// Built-in bounding volume hierarchy
    #[default]
    Bvh,
    /// Intel Embree 4, when compiled with the `embree` feature
    Embree,
}

impl AcceleratorKind {
    /// Whether hits at equal distance always resolve to the lowest
    /// primitive index. Embree reports whichever coincident hit its
    /// traversal reaches first, so images with overlapping surfaces can
    /// differ between backends.
    pub fn resolves_ties_by_index(self) -> bool {
        matches!(self, AcceleratorKind::Bvh)
    }
}

impl FromStr for AcceleratorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bvh" => Ok(AcceleratorKind::Bvh),
            "embree" => Ok(AcceleratorKind::Embree),
            other => Err(format!("unknown accelerator '{other}' (expected bvh or embree)")),
        }
    }
}

impl fmt::Display for AcceleratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcceleratorKind::Bvh => f.write_str("bvh"),
            AcceleratorKind::Embree => f.write_str("embree"),
        }
    }
}

/// Build the requested backend over every primitive of `scene`.
///
/// Fails if the scene has no primitives or any world-space vertex is not
/// finite. Blocks until the index is ready.
pub fn build(
    scene: &Scene,
    kind: AcceleratorKind,
    engine: &Engine,
) -> Result<Box<dyn Accelerator>, AccelerationError> {
    validate_geometry(scene)?;
    match kind {
        AcceleratorKind::Bvh => Ok(Box::new(Bvh::build(scene, engine))),
        #[cfg(feature = "embree")]
        AcceleratorKind::Embree => Ok(Box::new(EmbreeScene::build(scene)?)),
        #[cfg(not(feature = "embree"))]
        AcceleratorKind::Embree => Err(AccelerationError::Backend(
            "lumen was built without the `embree` feature".to_string(),
        )),
    }
}

fn validate_geometry(scene: &Scene) -> Result<(), AccelerationError> {
    if scene.primitive_count() == 0 {
        return Err(AccelerationError::NoPrimitives);
    }
    for (index, primitive) in scene.primitives().iter().enumerate() {
        if let Some(vertex) = primitive.positions().iter().position(|p| !p.is_finite()) {
            return Err(AccelerationError::NonFiniteVertex {
                primitive: index,
                vertex,
            });
        }
    }
    Ok(())
}

/// Relative tolerance under which two hit distances count as equal.
const TIE_EPSILON: f32 = 1e-6;

#[inline]
pub(crate) fn tie_tolerance(t: f32) -> f32 {
    TIE_EPSILON * t.abs().max(1.0)
}

/// Whether a candidate hit should replace the current best one.
#[inline]
pub(crate) fn is_closer(t: f32, primitive: usize, best: &Hit) -> bool {
    let tol = tie_tolerance(best.t);
    t < best.t - tol || ((t - best.t).abs() <= tol && primitive < best.primitive)
}
