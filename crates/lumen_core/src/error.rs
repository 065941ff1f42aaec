//! Construction-time errors.
//!
//! Everything here can only happen while configuring the engine or
//! assembling a scene; once a `Scene` exists, nothing that reads it fails.

use thiserror::Error;

/// Invalid run configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Worker count must be at least 1 (got {0})")]
    InvalidWorkerCount(usize),

    #[error("Tile size must be at least 1 pixel (got {0})")]
    InvalidTileSize(u32),

    #[error("Failed to start worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// A scene that references something it does not contain, or carries
/// parameters no renderer could use.
#[derive(Error, Debug)]
pub enum SceneError {
    #[error("Invalid camera: {0}")]
    InvalidCamera(String),

    #[error("Invalid render options: {0}")]
    InvalidOptions(String),

    #[error("Material {material} is invalid: {reason}")]
    InvalidMaterial { material: usize, reason: String },

    #[error("Light {light} is invalid: {reason}")]
    InvalidLight { light: usize, reason: String },

    #[error("Primitive {primitive} references missing material {material}")]
    UnresolvedMaterial { primitive: usize, material: usize },

    #[error("Light {light} references missing primitive {primitive}")]
    UnresolvedPrimitive { light: usize, primitive: usize },

    #[error("Primitive {primitive} is bound to more than one area light")]
    DuplicateEmitter { primitive: usize },

    #[error("Primitive {primitive} has an invalid mesh: {reason}")]
    InvalidMesh { primitive: usize, reason: String },

    #[error("Primitive {primitive} has a degenerate or non-finite transform")]
    InvalidTransform { primitive: usize },
}
