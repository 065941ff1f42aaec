//! lumen renderer - CPU path tracing
//!
//! Monte Carlo path tracer over a [`lumen_core::Scene`]:
//! - Ray queries through a pluggable [`Accelerator`] (built-in BVH, or
//!   Embree with the `embree` feature)
//! - Iterative path integrator with next-event estimation, MIS and
//!   Russian roulette
//! - Tile-parallel rendering into a lock-free [`Framebuffer`]

pub mod accel;
mod framebuffer;
mod integrator;
mod renderer;
mod tile;

pub use accel::{AccelerationError, Accelerator, AcceleratorKind, Hit};
pub use framebuffer::{color_to_rgba, linear_to_gamma, Framebuffer, TileRegion};
pub use integrator::{clamp_sample, russian_roulette, PathIntegrator};
pub use renderer::{
    dispatch_tiles, render, render_with_progress, tile_seed, RenderContext, RenderResult,
    RenderStats,
};
pub use tile::{generate_tiles, sort_spiral, Tile};

/// Re-export common math types from lumen_math
pub use lumen_math::{Color, Ray, Vec3};
