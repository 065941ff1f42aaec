//! Pinhole / thin-lens camera for primary ray generation.

use lumen_math::sampling::{concentric_sample_disk, gen_vec2};
use lumen_math::{Ray, Vec3};
use rand::RngCore;

use crate::error::SceneError;

/// Camera for generating rays into the scene.
///
/// Configure with the `with_*` builders, then call [`Camera::initialize`]
/// once; `SceneBuilder::build` does this for you.
#[derive(Clone, Debug)]
pub struct Camera {
    // Image settings
    pub image_width: u32,
    pub image_height: u32,

    // Camera positioning
    look_from: Vec3,
    look_at: Vec3,
    vup: Vec3,

    // Lens settings
    vfov: f32,          // Vertical field of view in degrees
    defocus_angle: f32, // Cone angle of rays through each pixel, degrees
    focus_dist: f32,    // Distance from camera to plane of perfect focus

    // Cached computed values (set by initialize())
    center: Vec3,
    pixel00_loc: Vec3,
    pixel_delta_u: Vec3,
    pixel_delta_v: Vec3,
    w: Vec3,
    defocus_disk_u: Vec3,
    defocus_disk_v: Vec3,
}

impl Camera {
    /// Create a new camera with default settings.
    pub fn new() -> Self {
        Self {
            image_width: 640,
            image_height: 480,
            look_from: Vec3::new(0.0, 0.0, 0.0),
            look_at: Vec3::new(0.0, 0.0, -1.0),
            vup: Vec3::new(0.0, 1.0, 0.0),
            vfov: 45.0,
            defocus_angle: 0.0,
            focus_dist: 1.0,
            center: Vec3::ZERO,
            pixel00_loc: Vec3::ZERO,
            pixel_delta_u: Vec3::ZERO,
            pixel_delta_v: Vec3::ZERO,
            w: Vec3::Z,
            defocus_disk_u: Vec3::ZERO,
            defocus_disk_v: Vec3::ZERO,
        }
    }

    /// Set image resolution.
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    /// Set camera position.
    pub fn with_position(mut self, look_from: Vec3, look_at: Vec3, vup: Vec3) -> Self {
        self.look_from = look_from;
        self.look_at = look_at;
        self.vup = vup;
        self
    }

    /// Set vertical field of view in degrees.
    pub fn with_fov(mut self, vfov: f32) -> Self {
        self.vfov = vfov;
        self
    }

    /// Set lens settings. A zero `defocus_angle` gives a pinhole camera.
    pub fn with_lens(mut self, vfov: f32, defocus_angle: f32, focus_dist: f32) -> Self {
        self.vfov = vfov;
        self.defocus_angle = defocus_angle;
        self.focus_dist = focus_dist;
        self
    }

    pub fn position(&self) -> Vec3 {
        self.look_from
    }

    /// Unit vector the camera looks along.
    pub fn forward(&self) -> Vec3 {
        -self.w
    }

    /// Validate parameters and cache the viewport basis.
    pub fn initialize(&mut self) -> Result<(), SceneError> {
        if self.image_width == 0 || self.image_height == 0 {
            return Err(SceneError::InvalidCamera(format!(
                "resolution {}x{} has no pixels",
                self.image_width, self.image_height
            )));
        }
        if !(self.vfov.is_finite() && self.vfov > 0.0 && self.vfov < 180.0) {
            return Err(SceneError::InvalidCamera(format!(
                "vertical fov {} is outside (0, 180)",
                self.vfov
            )));
        }
        if !(self.focus_dist.is_finite() && self.focus_dist > 0.0)
            || !(self.defocus_angle.is_finite() && self.defocus_angle >= 0.0)
        {
            return Err(SceneError::InvalidCamera(
                "focus distance must be positive and defocus angle non-negative".to_string(),
            ));
        }
        if !(self.look_from.is_finite() && self.look_at.is_finite() && self.vup.is_finite()) {
            return Err(SceneError::InvalidCamera(
                "non-finite camera position".to_string(),
            ));
        }

        let w = (self.look_from - self.look_at)
            .try_normalize()
            .ok_or_else(|| SceneError::InvalidCamera("look_from equals look_at".to_string()))?;
        let u = self
            .vup
            .cross(w)
            .try_normalize()
            .ok_or_else(|| SceneError::InvalidCamera("up vector is parallel to view".to_string()))?;
        let v = w.cross(u);

        self.center = self.look_from;
        self.w = w;

        // Calculate viewport dimensions
        let h = (self.vfov.to_radians() / 2.0).tan();
        let viewport_height = 2.0 * h * self.focus_dist;
        let viewport_width = viewport_height * (self.image_width as f32 / self.image_height as f32);

        let viewport_u = viewport_width * u;
        let viewport_v = -viewport_height * v;

        self.pixel_delta_u = viewport_u / self.image_width as f32;
        self.pixel_delta_v = viewport_v / self.image_height as f32;

        let viewport_upper_left =
            self.center - self.focus_dist * w - viewport_u / 2.0 - viewport_v / 2.0;
        self.pixel00_loc = viewport_upper_left + 0.5 * (self.pixel_delta_u + self.pixel_delta_v);

        let defocus_radius = self.focus_dist * (self.defocus_angle / 2.0).to_radians().tan();
        self.defocus_disk_u = u * defocus_radius;
        self.defocus_disk_v = v * defocus_radius;
        Ok(())
    }

    /// Generate a ray through a uniformly jittered point of pixel `(x, y)`.
    ///
    /// Row 0 is the top of the image. The direction is unit length.
    pub fn generate_ray(&self, x: u32, y: u32, rng: &mut dyn RngCore) -> Ray {
        let offset = gen_vec2(rng);
        let pixel_sample = self.pixel00_loc
            + (x as f32 + offset.x - 0.5) * self.pixel_delta_u
            + (y as f32 + offset.y - 0.5) * self.pixel_delta_v;

        let origin = if self.defocus_angle <= 0.0 {
            self.center
        } else {
            let p = concentric_sample_disk(gen_vec2(rng));
            self.center + p.x * self.defocus_disk_u + p.y * self.defocus_disk_v
        };

        Ray::new(origin, (pixel_sample - origin).normalize())
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    #[test]
    fn test_camera_initialize() {
        let mut camera = Camera::new()
            .with_resolution(800, 600)
            .with_position(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y)
            .with_lens(90.0, 0.0, 1.0);

        camera.initialize().unwrap();

        assert_eq!(camera.center, Vec3::ZERO);
        assert!((camera.forward() - Vec3::NEG_Z).length() < 1e-5);
    }

    #[test]
    fn test_camera_ray_direction() {
        let mut camera = Camera::new()
            .with_resolution(100, 100)
            .with_position(Vec3::ZERO, Vec3::new(0.0, 0.0, -1.0), Vec3::Y)
            .with_fov(90.0);
        camera.initialize().unwrap();

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);

        let center = camera.generate_ray(50, 50, &mut rng);
        assert!(center.direction.z < -0.99);
        assert!((center.direction.length() - 1.0).abs() < 1e-5);

        // Top-left pixel points up and to the left
        let corner = camera.generate_ray(0, 0, &mut rng);
        assert!(corner.direction.x < 0.0);
        assert!(corner.direction.y > 0.0);
    }

    #[test]
    fn test_invalid_cameras_rejected() {
        let base = Camera::new().with_position(Vec3::ZERO, Vec3::NEG_Z, Vec3::Y);

        assert!(matches!(
            base.clone().with_resolution(0, 10).initialize(),
            Err(SceneError::InvalidCamera(_))
        ));
        assert!(base.clone().with_fov(180.0).initialize().is_err());
        assert!(base.clone().with_fov(f32::NAN).initialize().is_err());
        assert!(Camera::new()
            .with_position(Vec3::ONE, Vec3::ONE, Vec3::Y)
            .initialize()
            .is_err());
        assert!(Camera::new()
            .with_position(Vec3::ZERO, Vec3::Y, Vec3::Y)
            .initialize()
            .is_err());
    }

    #[test]
    fn test_same_rng_state_gives_same_ray() {
        let mut camera = Camera::new().with_resolution(8, 8);
        camera.initialize().unwrap();

        let mut a = Xoshiro256PlusPlus::seed_from_u64(5);
        let mut b = Xoshiro256PlusPlus::seed_from_u64(5);
        assert_eq!(
            camera.generate_ray(3, 4, &mut a),
            camera.generate_ray(3, 4, &mut b)
        );
    }
}
