//! Lumen Core - scene store and execution engine for the path tracer.
//!
//! This crate provides:
//!
//! - **Scene store**: `Scene`, `SceneBuilder`, `Primitive`, `Mesh`, `Camera`
//! - **Shading models**: closed `Material` and `Light` variants
//! - **Parallel engine**: `Engine`, a fixed worker pool shared by every
//!   parallel pass of a run
//! - **Scene loading**: JSON scene descriptions via `loader::load_scene`
//!
//! # Example
//!
//! ```ignore
//! use lumen_core::{loader::load_scene, Engine};
//!
//! let engine = Engine::with_available_parallelism()?;
//! let scene = load_scene("cornell.json")?.build(&engine)?;
//! println!("Loaded {} primitives, {} lights",
//!     scene.primitive_count(),
//!     scene.light_count());
//! ```

pub mod camera;
pub mod error;
pub mod light;
pub mod loader;
pub mod material;
pub mod mesh;
pub mod parallel;
pub mod scene;

// Re-export commonly used types
pub use camera::Camera;
pub use error::{ConfigError, SceneError};
pub use light::{AreaLight, EnvironmentLight, Light, LightSample, PointLight};
pub use material::{BsdfSample, Material};
pub use mesh::Mesh;
pub use parallel::{Engine, EngineConfig, DEFAULT_TILE_SIZE};
pub use scene::{IntegratorKind, Primitive, RenderOptions, Scene, SceneBuilder, Transform};
