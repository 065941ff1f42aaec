use crate::Vec3;

/// Linear RGB radiance / reflectance triple.
pub type Color = Vec3;

/// Radiometric helpers on top of the `Vec3` color alias.
pub trait ColorExt {
    /// Rec. 709 luminance.
    fn luminance(&self) -> f32;

    fn is_black(&self) -> bool;

    /// True if every channel is finite and non-negative.
    fn is_valid_radiance(&self) -> bool;
}

impl ColorExt for Color {
    #[inline]
    fn luminance(&self) -> f32 {
        0.2126 * self.x + 0.7152 * self.y + 0.0722 * self.z
    }

    #[inline]
    fn is_black(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    #[inline]
    fn is_valid_radiance(&self) -> bool {
        self.is_finite() && self.min_element() >= 0.0
    }
}
