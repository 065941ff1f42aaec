//! Image file output.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use anyhow::{Context, Result};
use image::codecs::hdr::HdrEncoder;
use image::{Rgb, Rgb32FImage, RgbaImage};
use lumen_renderer::Framebuffer;

/// How pixels are encoded for a given file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// Linear float RGB, OpenEXR
    Exr,
    /// Linear float RGB, Radiance HDR
    Hdr,
    /// Gamma-corrected 8-bit RGBA in whatever format the extension names
    Ldr,
}

impl OutputKind {
    pub fn for_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("exr") => OutputKind::Exr,
            Some("hdr") => OutputKind::Hdr,
            _ => OutputKind::Ldr,
        }
    }
}

/// Write a finished framebuffer to `path`.
pub fn write_image(framebuffer: &Framebuffer, path: &Path) -> Result<()> {
    let (width, height) = (framebuffer.width(), framebuffer.height());
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    match OutputKind::for_path(path) {
        OutputKind::Exr => {
            let image = Rgb32FImage::from_raw(width, height, framebuffer.to_rgb_f32())
                .context("Framebuffer size does not match its resolution")?;
            image
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        OutputKind::Hdr => {
            let pixels: Vec<Rgb<f32>> = framebuffer
                .to_rgb_f32()
                .chunks_exact(3)
                .map(|c| Rgb([c[0], c[1], c[2]]))
                .collect();
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            HdrEncoder::new(BufWriter::new(file))
                .encode(&pixels, width as usize, height as usize)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
        OutputKind::Ldr => {
            let image = RgbaImage::from_raw(width, height, framebuffer.to_rgba8())
                .context("Framebuffer size does not match its resolution")?;
            image
                .save(path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }
    }

    log::info!("Wrote {}x{} image to {}", width, height, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_renderer::Color;

    #[test]
    fn test_output_kind_from_extension() {
        assert_eq!(OutputKind::for_path(Path::new("a/b.EXR")), OutputKind::Exr);
        assert_eq!(OutputKind::for_path(Path::new("b.hdr")), OutputKind::Hdr);
        assert_eq!(OutputKind::for_path(Path::new("b.png")), OutputKind::Ldr);
        assert_eq!(OutputKind::for_path(Path::new("noext")), OutputKind::Ldr);
    }

    #[test]
    fn test_write_png_round_trip() {
        let mut fb = Framebuffer::new(3, 2, 16);
        for mut region in fb.regions_mut() {
            for (x, _, pixel) in region.pixels_mut() {
                *pixel = if x == 0 { Color::ONE } else { Color::ZERO };
            }
        }
        let dir = std::env::temp_dir().join(format!("lumen_output_{}", std::process::id()));
        let path = dir.join("out.png");

        write_image(&fb, &path).unwrap();
        let image = image::open(&path).unwrap().to_rgba8();

        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(0, 1).0, [255, 255, 255, 255]);
        assert_eq!(image.get_pixel(2, 0).0, [0, 0, 0, 255]);
        let _ = std::fs::remove_dir_all(dir);
    }
}
