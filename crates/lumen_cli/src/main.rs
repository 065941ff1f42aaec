//! lumen - render JSON scene files with the path tracer.
//!
//! Each scene file is loaded, built, rendered and written in turn. A file
//! that fails to load or build is reported and skipped; the exit status is
//! nonzero if any file failed.

mod output;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use lumen_core::{loader, Engine, EngineConfig, DEFAULT_TILE_SIZE};
use lumen_renderer::{accel, render_with_progress, AcceleratorKind};

#[derive(Parser, Debug)]
#[command(name = "lumen", version, about = "Monte Carlo path tracer")]
struct Args {
    /// Number of worker threads (default: available cores)
    #[arg(short = 't', long = "threads", value_name = "NUM")]
    threads: Option<usize>,

    /// Override the samples per pixel of every scene
    #[arg(long, value_name = "NUM")]
    spp: Option<u32>,

    /// Edge length of the square tiles handed to workers
    #[arg(long = "tile-size", value_name = "PIXELS", default_value_t = DEFAULT_TILE_SIZE)]
    tile_size: u32,

    /// Override the random seed of every scene
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Intersection backend: bvh or embree. Only bvh resolves coincident
    /// hits to the lowest primitive index
    #[arg(long, value_name = "KIND", default_value_t = AcceleratorKind::Bvh)]
    accelerator: AcceleratorKind,

    /// Output image, overriding the scene's (single scene only)
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Scene files to render
    #[arg(required = true, value_name = "SCENE")]
    scenes: Vec<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    match run(&args) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

/// Render every scene and return how many failed.
fn run(args: &Args) -> Result<usize> {
    if args.output.is_some() && args.scenes.len() > 1 {
        bail!("--output can only be used with a single scene file");
    }

    let mut config = EngineConfig::default().with_tile_size(args.tile_size);
    if let Some(threads) = args.threads {
        config = config.with_workers(threads);
    }
    let engine = Engine::with_config(config).context("Failed to create worker pool")?;
    log::info!(
        "Using {} worker threads, {}px tiles, {} accelerator",
        engine.workers(),
        engine.tile_size(),
        args.accelerator
    );
    if !args.accelerator.resolves_ties_by_index() {
        log::warn!(
            "The {} accelerator does not order coincident hits by primitive index; \
             overlapping surfaces may render differently than with bvh",
            args.accelerator
        );
    }

    let mut failed = 0;
    for path in &args.scenes {
        if let Err(err) = render_file(path, args, &engine) {
            log::error!("{}: {:#}", path.display(), err);
            failed += 1;
        }
    }

    if failed > 0 {
        log::error!("{} of {} scene files failed", failed, args.scenes.len());
    }
    Ok(failed)
}

fn render_file(path: &Path, args: &Args, engine: &Engine) -> Result<()> {
    let start = Instant::now();
    let mut description = loader::load_scene(path).context("Failed to load scene")?;
    let options = description.builder.options_mut();
    if let Some(spp) = args.spp {
        options.samples_per_pixel = spp;
    }
    if let Some(seed) = args.seed {
        options.seed = seed;
    }
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| description.output.clone());
    let scene = description.build(engine).context("Invalid scene")?;
    log::info!("Scene ready in {:.2?}", start.elapsed());

    let start = Instant::now();
    let accel = accel::build(&scene, args.accelerator, engine)
        .context("Failed to build acceleration structure")?;
    log::info!("Acceleration structure built in {:.2?}", start.elapsed());

    let start = Instant::now();
    let progress = progress_bar(engine, &scene);
    let result = render_with_progress(&scene, accel.as_ref(), engine, |done, _| {
        progress.set_position(done as u64);
    });
    progress.finish_and_clear();
    log::info!(
        "Rendered {} samples in {:.2?}",
        result.stats.samples,
        start.elapsed()
    );

    output::write_image(&result.framebuffer, &output)
}

fn progress_bar(engine: &Engine, scene: &lumen_core::Scene) -> ProgressBar {
    let (width, height) = scene.resolution();
    let tile = engine.tile_size();
    let tiles = width.div_ceil(tile) as u64 * height.div_ceil(tile) as u64;

    let bar = ProgressBar::new(tiles);
    let style = ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} tiles {eta}",
    )
    .map(|style| style.progress_chars("#>-"))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    bar.set_style(style);
    bar
}
