use assert2::assert;
use bon::bon;
use nalgebra::Unit;
use rand_distr::Distribution as _;

use crate::geometry::{EPSILON, FloatType, Ray, ScreenPoint, ScreenSize, WorldPoint, WorldVector};

/// Perspective camera with an optional thin lens.
#[derive(Copy, Clone, Debug)]
pub struct Camera {
    center: WorldPoint,

    resolution: ScreenSize,

    up: Unit<WorldVector>,
    right: Unit<WorldVector>,
    /// Vector from the camera center to the center of pixel (0, 0) on the focus plane
    film_origin_offset: WorldVector,

    /// Distance between pixels on the focus plane
    pixel_pitch: FloatType,

    lens_radius: FloatType,
}

#[bon]
impl Camera {
    #[builder]
    pub fn new(
        center: WorldPoint,
        forward: WorldVector,
        up: WorldVector,
        resolution: ScreenSize,
        // Vertical field of view in degrees
        #[builder(default = 60.0)]
        vertical_fov: FloatType,
        // Lens diameter, zero gives a pinhole camera
        #[builder(default = 0.0)]
        aperture: FloatType,
        // Distance of the plane in perfect focus
        #[builder(default = 1.0)]
        focus_distance: FloatType,
    ) -> Self {
        let forward = Unit::try_new(forward, EPSILON).expect("Forward vector must be non-zero");
        let up = Unit::try_new(up, EPSILON).expect("Up vector must be non-zero");
        let right = Unit::try_new(forward.cross(up.as_ref()), EPSILON)
            .expect("`up` and `forward` must be linearly independent");
        let up = Unit::new_normalize(right.cross(forward.as_ref()));

        assert!(resolution.x > 0);
        assert!(resolution.y > 0);
        assert!(vertical_fov > 0.0 && vertical_fov < 180.0);
        assert!(aperture >= 0.0);
        assert!(focus_distance > 0.0);

        let film_height = 2.0 * (vertical_fov.to_radians() / 2.0).tan() * focus_distance;
        let pixel_pitch = film_height / (resolution.y as FloatType);
        let resolution_minus_one = ScreenSize::new(resolution.x - 1, resolution.y - 1);
        let film_origin_uv = resolution_minus_one.cast::<FloatType>() * pixel_pitch / 2.0;
        let film_origin_offset = forward.as_ref() * focus_distance
            - right.as_ref() * film_origin_uv.x
            + up.as_ref() * film_origin_uv.y;

        Camera {
            center,

            resolution,

            up,
            right,
            film_origin_offset,
            pixel_pitch,
            lens_radius: aperture / 2.0,
        }
    }
}

impl Camera {
    pub fn resolution(&self) -> ScreenSize {
        self.resolution
    }

    /// Ray through the center of the pixel, from the center of the lens.
    pub fn center_ray(&self, point: &ScreenPoint) -> Ray {
        Ray::new(
            self.center,
            self.film_offset(point.x as FloatType, point.y as FloatType),
        )
    }

    /// Samples a new ray from the camera for the given image pixel,
    /// jittered within the pixel and across the lens.
    pub fn sample_ray(&self, point: &ScreenPoint, rng: &mut impl rand::Rng) -> Ray {
        let film_u = point.x as FloatType + rng.random_range(-0.5..=0.5);
        let film_v = point.y as FloatType + rng.random_range(-0.5..=0.5);
        let film_point_offset = self.film_offset(film_u, film_v);

        if self.lens_radius == 0.0 {
            return Ray::new(self.center, film_point_offset);
        }

        let lens_uv: [FloatType; 2] = rand_distr::UnitDisc.sample(rng);
        let lens_vector = self.right.as_ref() * (self.lens_radius * lens_uv[0])
            + self.up.as_ref() * (self.lens_radius * lens_uv[1]);

        Ray::new(self.center + lens_vector, film_point_offset - lens_vector)
    }

    fn film_offset(&self, u: FloatType, v: FloatType) -> WorldVector {
        self.film_origin_offset + self.right.as_ref() * (u * self.pixel_pitch)
            - self.up.as_ref() * (v * self.pixel_pitch)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::assert;
    use rand::{SeedableRng, rngs::SmallRng};

    fn camera(aperture: FloatType) -> Camera {
        // X goes right, Y goes away, Z goes up
        Camera::builder()
            .center(WorldPoint::new(0.0, 0.0, 0.0))
            .forward(WorldVector::new(0.0, 1.0, 0.0))
            .up(WorldVector::new(0.0, 0.0, 1.0))
            .resolution(ScreenSize::new(801, 601))
            .vertical_fov(90.0)
            .aperture(aperture)
            .focus_distance(2.0)
            .build()
    }

    #[test]
    fn left_right_up_down() {
        let camera = camera(0.0);
        let mut rng = SmallRng::seed_from_u64(1);

        let ray_center = camera.sample_ray(&ScreenPoint::new(400, 300), &mut rng);
        let ray_left = camera.sample_ray(&ScreenPoint::new(0, 300), &mut rng);
        let ray_right = camera.sample_ray(&ScreenPoint::new(800, 300), &mut rng);
        let ray_up = camera.sample_ray(&ScreenPoint::new(400, 0), &mut rng);
        let ray_down = camera.sample_ray(&ScreenPoint::new(400, 600), &mut rng);

        assert!(ray_center.direction.x.abs() < 1e-2);
        assert!(ray_center.direction.z.abs() < 1e-2);
        assert!(ray_left.direction.x < ray_center.direction.x);
        assert!(ray_right.direction.x > ray_center.direction.x);
        assert!(ray_up.direction.z > ray_center.direction.z);
        assert!(ray_down.direction.z < ray_center.direction.z);
    }

    #[test]
    fn field_of_view() {
        let camera = camera(0.0);
        let center = camera.center_ray(&ScreenPoint::new(400, 300));
        assert!((center.direction - WorldVector::y()).norm() < 1e-5);

        // Top edge of the image is 45 degrees up, minus half a pixel
        let top = camera.center_ray(&ScreenPoint::new(400, 0));
        let angle = top.direction.z.atan2(top.direction.y).to_degrees();
        assert!((angle - 45.0).abs() < 0.2);
    }

    #[test]
    fn lens_rays_meet_on_focus_plane() {
        let camera = camera(0.5);
        let mut rng = SmallRng::seed_from_u64(7);
        let target = camera.center_ray(&ScreenPoint::new(123, 456));
        let focus_point = target.point_at(2.0 / target.direction.y);

        for _ in 0..20 {
            let ray = camera.sample_ray(&ScreenPoint::new(123, 456), &mut rng);
            let t = (focus_point.y - ray.origin.y) / ray.direction.y;
            // Within a pixel of the focus point
            assert!((ray.point_at(t) - focus_point).norm() < 2.0 * camera.pixel_pitch);
        }
    }
}
