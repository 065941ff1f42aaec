//! Simple path tracer example.
//!
//! Builds a small scene in code (a floor, a glass and a plastic ball under
//! a ceiling light) and saves it as PNG.

use lumen_core::{Camera, Engine, Material, Mesh, RenderOptions, SceneBuilder, Transform};
use lumen_math::Mat4;
use lumen_renderer::{accel, render, AcceleratorKind, Color, Vec3};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    print_banner();

    let engine = Engine::with_available_parallelism()?;

    // Build the scene
    let start = std::time::Instant::now();
    let scene = build_scene().build(&engine)?;
    let accel = accel::build(&scene, AcceleratorKind::Bvh, &engine)?;
    println!("Scene built in {:?}", start.elapsed());

    let (width, height) = scene.resolution();
    println!(
        "Rendering {}x{} @ {} spp...",
        width,
        height,
        scene.options().samples_per_pixel
    );

    let start = std::time::Instant::now();
    let result = render(&scene, accel.as_ref(), &engine);
    println!(
        "Rendered in {:?} ({} samples)",
        start.elapsed(),
        result.stats.samples
    );

    let filename = "output.png";
    image::save_buffer(
        filename,
        &result.framebuffer.to_rgba8(),
        width,
        height,
        image::ColorType::Rgba8,
    )?;
    println!("Saved to {}", filename);
    Ok(())
}

fn print_banner() {
    println!("lumen path tracer - simple example");
    println!("==================================");
}

fn build_scene() -> SceneBuilder {
    let camera = Camera::new()
        .with_resolution(400, 300)
        .with_position(Vec3::new(0.0, 1.2, 4.5), Vec3::new(0.0, 0.6, 0.0), Vec3::Y)
        .with_fov(40.0);
    let mut builder = SceneBuilder::new(camera).with_options(RenderOptions {
        samples_per_pixel: 64,
        ..Default::default()
    });

    // Ground
    let grey = builder.add_material(Material::Diffuse {
        reflectance: Color::splat(0.5),
    });
    builder.add_primitive(
        Mesh::quad(
            Vec3::new(-5.0, 0.0, 5.0),
            Vec3::new(5.0, 0.0, 5.0),
            Vec3::new(5.0, 0.0, -5.0),
            Vec3::new(-5.0, 0.0, -5.0),
        ),
        Mat4::IDENTITY,
        grey,
    );

    // Two balls
    let glass = builder.add_material(Material::Dielectric { eta: 1.5 });
    builder.add_primitive(
        Mesh::uv_sphere(0.6, 48, 24),
        Transform::from_translation(Vec3::new(-0.7, 0.6, 0.0)).to_matrix(),
        glass,
    );
    let plastic = builder.add_material(Material::Plastic {
        diffuse: Color::new(0.7, 0.15, 0.1),
        specular: Color::ONE,
        eta: 1.5,
    });
    builder.add_primitive(
        Mesh::uv_sphere(0.5, 48, 24),
        Transform::from_translation(Vec3::new(0.7, 0.5, 0.3)).to_matrix(),
        plastic,
    );

    // Ceiling light facing down
    let black = builder.add_material(Material::Diffuse {
        reflectance: Color::ZERO,
    });
    let panel = builder.add_primitive(
        Mesh::quad(
            Vec3::new(-0.75, 3.0, -0.75),
            Vec3::new(0.75, 3.0, -0.75),
            Vec3::new(0.75, 3.0, 0.75),
            Vec3::new(-0.75, 3.0, 0.75),
        ),
        Mat4::IDENTITY,
        black,
    );
    builder.add_area_light(panel, Color::splat(8.0), false);
    builder.add_environment_light(Color::new(0.05, 0.07, 0.1));

    builder
}
