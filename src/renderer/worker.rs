use std::num::NonZeroU32;

use image::RgbImage;
use rand::{SeedableRng, rngs::SmallRng};

use crate::{
    camera::Camera,
    geometry::ScreenBlock,
    screen_block::ScreenBlockExt,
    shading::Tracer,
    util::color_to_image,
};

/// Random generator for a single tile, depends only on the render seed and the tile position
/// in the tile ordering.
pub fn tile_rng(seed: u64, tile_index: usize) -> SmallRng {
    SmallRng::seed_from_u64(seed ^ (tile_index as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15))
}

pub struct Worker {
    buffer: RgbImage,
}

impl Worker {
    pub fn new(tile_size: NonZeroU32) -> Self {
        Self {
            buffer: RgbImage::new(tile_size.get(), tile_size.get()),
        }
    }

    /// Renders the tile into the top left corner of the internal buffer and returns it.
    pub fn render_tile(
        &mut self,
        tracer: &Tracer,
        camera: &Camera,
        seed: u64,
        tile_index: usize,
        tile: &ScreenBlock,
    ) -> &RgbImage {
        let mut rng = tile_rng(seed, tile_index);

        for point in tile.internal_points() {
            let pixel = tracer.render_pixel(camera, &point, &mut rng);
            let buffer_position = point - tile.min;
            self.buffer
                .put_pixel(buffer_position.x, buffer_position.y, color_to_image(pixel));
        }

        &self.buffer
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geometry::{ScreenPoint, ScreenSize, WorldPoint, WorldVector},
        material::Material,
        renderer::{LightingModel, RenderSettings},
        scene::{Light, Scene, Shape, Sphere},
    };
    use assert2::assert;
    use rand::Rng as _;

    #[test]
    fn tiles_get_different_sequences() {
        let a: u64 = tile_rng(1, 0).random();
        let b: u64 = tile_rng(1, 1).random();
        let c: u64 = tile_rng(2, 0).random();
        assert!(a != b);
        assert!(a != c);
        assert!(a == tile_rng(1, 0).random::<u64>());
    }

    #[test]
    fn tile_is_written_to_buffer_corner() {
        let mut scene = Scene::new(Light::new(WorldPoint::new(0.0, 5.0, 5.0)));
        scene.add(
            Shape::Sphere(Sphere::new(WorldPoint::origin(), 100.0)),
            Material::builder()
                .diffuse(crate::util::Color::new(0.0, 1.0, 0.0))
                .build(),
        );
        let settings = RenderSettings::builder()
            .lighting(LightingModel::Flat)
            .build();
        let camera = Camera::builder()
            .center(WorldPoint::origin())
            .forward(-WorldVector::z())
            .up(WorldVector::y())
            .resolution(ScreenSize::new(64, 64))
            .build();
        let tracer = Tracer::new(&scene, &settings);

        let mut worker = Worker::new(NonZeroU32::new(16).unwrap());
        let tile = ScreenBlock::new(ScreenPoint::new(10, 20), ScreenPoint::new(14, 23));
        let buffer = worker.render_tile(&tracer, &camera, 0, 3, &tile);

        // Camera inside the sphere sees green everywhere
        for (x, y) in itertools::iproduct!(0..4, 0..3) {
            assert!(buffer.get_pixel(x, y).0 == [0, 255, 0]);
        }
        assert!(buffer.get_pixel(4, 0).0 == [0, 0, 0]);
    }
}
