mod stats;

pub use stats::Stats;

use crate::geometry::FloatType;

pub type Color = rgb::RGB<FloatType>;

pub trait ColorExt {
    fn black() -> Self;
    fn gray(value: FloatType) -> Self;
    /// Componentwise product.
    fn modulate(&self, other: &Self) -> Self;
    fn is_black(&self) -> bool;
}

impl ColorExt for Color {
    fn black() -> Self {
        Color::new(0.0, 0.0, 0.0)
    }

    fn gray(value: FloatType) -> Self {
        Color::new(value, value, value)
    }

    fn modulate(&self, other: &Self) -> Self {
        Color::new(self.r * other.r, self.g * other.g, self.b * other.b)
    }

    fn is_black(&self) -> bool {
        self.r == 0.0 && self.g == 0.0 && self.b == 0.0
    }
}

/// Maps a 0-1 float color to pixel type compatible with module image.
pub fn color_to_image(color: Color) -> image::Rgb<u8> {
    let channel = |x: FloatType| (x * 255.0).round().clamp(0.0, 255.0) as u8;
    image::Rgb([channel(color.r), channel(color.g), channel(color.b)])
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::assert;

    #[test]
    fn modulate_is_componentwise() {
        let a = Color::new(0.5, 1.0, 0.0);
        let b = Color::new(0.5, 0.25, 1.0);
        assert!(a.modulate(&b) == Color::new(0.25, 0.25, 0.0));
    }

    #[test]
    fn image_conversion_clamps() {
        assert!(color_to_image(Color::new(-1.0, 0.5, 7.0)) == image::Rgb([0, 128, 255]));
        assert!(color_to_image(Color::black()) == image::Rgb([0, 0, 0]));
    }
}
