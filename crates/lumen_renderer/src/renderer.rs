//! Tile-parallel rendering.
//!
//! A render enumerates every tile of the framebuffer into the engine's work
//! queue, centre tiles first. Each worker takes a whole tile, runs every
//! sample of every pixel in it and writes the final means straight into the
//! tile's own region of the framebuffer.
//!
//! Every tile draws its random numbers from a generator seeded by the
//! tile's grid position and the scene seed, never by the worker that runs
//! it, so the image does not depend on the worker count or on which tile
//! finishes first.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use lumen_core::{Engine, Scene};
use lumen_math::Color;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::accel::Accelerator;
use crate::framebuffer::{Framebuffer, TileRegion};
use crate::integrator::{clamp_sample, PathIntegrator};
use crate::tile::{sort_spiral, Tile};

/// Sample counters for a finished render.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Camera samples traced
    pub samples: u64,
    /// Samples replaced by zero for being negative or non-finite
    pub clamped: u64,
}

/// Output of [`render`].
#[derive(Debug)]
pub struct RenderResult {
    pub framebuffer: Framebuffer,
    pub stats: RenderStats,
}

/// Seed for the tile at grid position `(tile_x, tile_y)`.
///
/// SplitMix64 finalizer over the packed coordinates and the scene seed.
pub fn tile_seed(tile_x: u32, tile_y: u32, seed: u64) -> u64 {
    let mut z = (((tile_y as u64) << 32) | tile_x as u64)
        ^ seed.wrapping_mul(0x9E37_79B9_7F4A_7C15);
    z = z.wrapping_add(0x9E37_79B9_7F4A_7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Per-tile private state.
pub struct RenderContext {
    pub rng: Xoshiro256PlusPlus,
    pub stats: RenderStats,
}

impl RenderContext {
    pub fn for_tile(tile: &Tile, tile_size: u32, seed: u64) -> Self {
        let (tx, ty) = tile.grid_coords(tile_size);
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(tile_seed(tx, ty, seed)),
            stats: RenderStats::default(),
        }
    }
}

/// Hand every tile region of `framebuffer` to `f` exactly once, spread
/// over the engine's workers. Returns when all tiles are done.
pub fn dispatch_tiles<T, F>(engine: &Engine, framebuffer: &mut Framebuffer<T>, f: F)
where
    T: Send,
    F: Fn(TileRegion<'_, T>) + Sync,
{
    let (width, height) = (framebuffer.width(), framebuffer.height());
    let mut regions = framebuffer.regions_mut();
    sort_spiral(&mut regions, width, height);
    engine.drain_queue(regions, f);
}

/// Render `scene` with the scene's options.
pub fn render(scene: &Scene, accel: &dyn Accelerator, engine: &Engine) -> RenderResult {
    render_with_progress(scene, accel, engine, |_, _| {})
}

/// Like [`render`], calling `progress(done, total)` after each tile.
///
/// The callback runs on worker threads.
pub fn render_with_progress<P>(
    scene: &Scene,
    accel: &dyn Accelerator,
    engine: &Engine,
    progress: P,
) -> RenderResult
where
    P: Fn(usize, usize) + Sync,
{
    let (width, height) = scene.resolution();
    let options = *scene.options();
    let tile_size = engine.tile_size();
    let mut framebuffer = Framebuffer::new(width, height, tile_size);
    let total_tiles = framebuffer.tiles().len();

    log::info!(
        "Rendering {}x{} at {} spp with {} workers ({} tiles of {}px)",
        width,
        height,
        options.samples_per_pixel,
        engine.workers(),
        total_tiles,
        tile_size
    );

    let integrator = PathIntegrator::new(scene, accel);
    let camera = scene.camera();
    let spp = options.samples_per_pixel;

    let samples = AtomicU64::new(0);
    let clamped = AtomicU64::new(0);
    let done = AtomicUsize::new(0);

    dispatch_tiles(engine, &mut framebuffer, |mut region| {
        let mut ctx = RenderContext::for_tile(&region.tile, tile_size, options.seed);

        for (x, y, pixel) in region.pixels_mut() {
            let mut mean = Color::ZERO;
            for i in 0..spp {
                let ray = camera.generate_ray(x, y, &mut ctx.rng);
                let (value, was_clamped) = clamp_sample(integrator.radiance(ray, &mut ctx.rng));
                if was_clamped {
                    ctx.stats.clamped += 1;
                }
                mean += (value - mean) / (i + 1) as f32;
            }
            *pixel = mean;
            ctx.stats.samples += spp as u64;
        }

        samples.fetch_add(ctx.stats.samples, Ordering::Relaxed);
        clamped.fetch_add(ctx.stats.clamped, Ordering::Relaxed);
        let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
        log::trace!("Tile {} done ({}/{})", region.tile.index, finished, total_tiles);
        progress(finished, total_tiles);
    });

    let stats = RenderStats {
        samples: samples.into_inner(),
        clamped: clamped.into_inner(),
    };
    if stats.clamped > 0 {
        log::warn!(
            "Clamped {} of {} samples with negative or non-finite radiance",
            stats.clamped,
            stats.samples
        );
    }
    log::info!("Render finished: {} samples", stats.samples);

    RenderResult { framebuffer, stats }
}
