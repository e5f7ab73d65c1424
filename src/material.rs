use bon::Builder;

use crate::{
    geometry::{EPSILON, FloatType, WorldPoint},
    util::{Color, ColorExt as _},
};

/// How a surface responds to light, beyond its Phong coefficients.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub enum Surface {
    /// Plain diffuse color.
    #[default]
    Flat,
    /// 3D checkerboard alternating between the diffuse color and `color`.
    Checkerboard { color: Color, cell_size: FloatType },
    /// Perfect mirror, reflected light is tinted by the specular color.
    Mirror,
    /// Transparent refracting material.
    /// Light travelling inside is attenuated by `exp(-absorption * distance)` per channel.
    Dielectric {
        refractive_index: FloatType,
        absorption: Color,
    },
    /// Lookup into a measured BRDF dataset, by material index.
    MeasuredBrdf { index: usize },
}

#[derive(Copy, Clone, Debug, PartialEq, Builder)]
pub struct Material {
    #[builder(default = Color::black())]
    pub emission: Color,
    #[builder(default = Color::gray(0.1))]
    pub ambient: Color,
    #[builder(default = Color::gray(0.8))]
    pub diffuse: Color,
    #[builder(default = Color::gray(0.2))]
    pub specular: Color,
    #[builder(default = 20.0)]
    pub shininess: FloatType,
    #[builder(default)]
    pub surface: Surface,
}

impl Default for Material {
    fn default() -> Self {
        Material::builder().build()
    }
}

impl Material {
    /// Color of the surface at the point, before lighting.
    pub fn surface_color(&self, point: &WorldPoint) -> Color {
        match self.surface {
            Surface::Checkerboard { color, cell_size } => {
                // Offset keeps faces lying exactly on a cell boundary from flickering
                let parity = point
                    .coords
                    .iter()
                    .map(|x| ((x + EPSILON) / cell_size).floor() as i64)
                    .sum::<i64>()
                    .rem_euclid(2);
                if parity == 0 { self.diffuse } else { color }
            }
            _ => self.diffuse,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::assert;
    use test_case::test_case;

    fn checkerboard() -> Material {
        Material::builder()
            .diffuse(Color::gray(1.0))
            .surface(Surface::Checkerboard {
                color: Color::black(),
                cell_size: 2.0,
            })
            .build()
    }

    #[test_case([0.5, 0.5, 0.5], true)]
    #[test_case([2.5, 0.5, 0.5], false)]
    #[test_case([2.5, 2.5, 0.5], true)]
    #[test_case([-0.5, 0.5, 0.5], false)]
    #[test_case([0.0, 0.0, 0.0], true ; "on_boundary")]
    fn checkerboard_cells(point: [FloatType; 3], first_color: bool) {
        let color = checkerboard().surface_color(&point.into());
        assert!((color == Color::gray(1.0)) == first_color);
    }

    #[test]
    fn flat_uses_diffuse() {
        let material = Material::builder().diffuse(Color::new(0.1, 0.2, 0.3)).build();
        assert!(material.surface_color(&WorldPoint::new(5.0, -3.0, 1.0)) == Color::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn default_is_flat() {
        assert!(Material::default().surface == Surface::Flat);
    }
}
