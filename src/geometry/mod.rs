mod aabb;
mod ray_box_intersection;
mod ray_triangle_intersection;
mod triangle;

pub use aabb::AABB;
pub use ray_triangle_intersection::Culling;
pub use triangle::{BarycentricCoordinates, Triangle};

use nalgebra::{Point2, Point3, Unit, Vector2, Vector3};

pub type FloatType = f32;

/// Minimum distance along a ray for an intersection to count.
/// Keeps rays restarted on a surface from hitting that same surface again.
pub const EPSILON: FloatType = 1e-4;

pub type ScreenPoint = Point2<u32>;
pub type ScreenSize = Vector2<u32>;
pub type ScreenBlock = AABB<ScreenPoint>;

pub type WorldPoint = Point3<FloatType>;
pub type WorldVector = Vector3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;

#[derive(Copy, Clone, Debug)]
pub struct Ray {
    pub origin: WorldPoint,
    /// Normalized direction of the ray
    pub direction: WorldVector,

    /// Componentwise inverse of the ray direction
    /// Zeros in direction get turned into positive infinity regardless of the sign of the zero
    pub inv_direction: WorldVector,
}

impl Ray {
    pub fn new(origin: WorldPoint, direction: WorldVector) -> Ray {
        let direction = direction.normalize();
        let inv_direction = direction.map(|x| if x == 0.0 { FloatType::INFINITY } else { 1.0 / x });

        Ray {
            origin,
            direction,
            inv_direction,
        }
    }

    pub fn point_at(&self, distance: FloatType) -> WorldPoint {
        self.origin + self.direction * distance
    }
}

/// Result of a successful ray intersection with a single shape.
#[derive(Clone, Debug)]
pub struct HitRecord {
    /// Distance along the ray
    pub t: FloatType,
    pub point: WorldPoint,
    pub normal: Unit<WorldVector>,
}

/// Mirrors `direction` about `normal`.
pub fn reflect(direction: &WorldVector, normal: &WorldVector) -> WorldVector {
    direction - normal * (2.0 * direction.dot(normal))
}

/// Builds an orthonormal basis (tangent, bitangent) perpendicular to `normal`.
pub fn tangent_frame(normal: &Unit<WorldVector>) -> (WorldVector, WorldVector) {
    let helper = if normal.x.abs() > 0.9 {
        WorldVector::y()
    } else {
        WorldVector::x()
    };
    let tangent = helper.cross(normal.as_ref()).normalize();
    let bitangent = normal.cross(&tangent);
    (tangent, bitangent)
}

/// Samples a direction from the cosine weighted hemisphere around `normal`.
pub fn cosine_hemisphere(normal: &Unit<WorldVector>, rng: &mut impl rand::Rng) -> WorldVector {
    use rand_distr::Distribution as _;

    let [x, y]: [FloatType; 2] = rand_distr::UnitDisc.sample(rng);
    let z = (1.0 - x * x - y * y).max(0.0).sqrt();
    let (tangent, bitangent) = tangent_frame(normal);
    tangent * x + bitangent * y + normal.as_ref() * z
}

#[cfg(test)]
pub mod test {
    use super::*;
    use assert2::assert;
    use proptest::prelude::*;
    use rand::{SeedableRng, rngs::SmallRng};
    use test_strategy::proptest;

    fn simple_float() -> impl Strategy<Value = FloatType> {
        (-1000i32..1000).prop_map(|n| n as FloatType * 1e-2)
    }

    pub fn world_point() -> impl Strategy<Value = WorldPoint> {
        (simple_float(), simple_float(), simple_float())
            .prop_map(|(x, y, z)| WorldPoint::new(x, y, z))
    }

    pub fn nonzero_world_vector() -> impl Strategy<Value = WorldVector> {
        (simple_float(), simple_float(), simple_float()).prop_filter_map(
            "vector is zero",
            |(x, y, z)| {
                let vector = WorldVector::new(x, y, z);
                if vector.norm() < 1e-2 {
                    None
                } else {
                    Some(vector)
                }
            },
        )
    }

    #[proptest]
    fn ray_direction_is_normalized(
        #[strategy(world_point())] origin: WorldPoint,
        #[strategy(nonzero_world_vector())] direction: WorldVector,
    ) {
        let ray = Ray::new(origin, direction);
        assert!((ray.direction.norm() - 1.0).abs() < 1e-5);
    }

    #[proptest]
    fn reflection_preserves_length_and_flips_normal_component(
        #[strategy(nonzero_world_vector())] direction: WorldVector,
        #[strategy(nonzero_world_vector())] normal: WorldVector,
    ) {
        let normal = normal.normalize();
        let reflected = reflect(&direction, &normal);

        assert!((reflected.norm() - direction.norm()).abs() < 1e-3 * direction.norm().max(1.0));
        assert!((reflected.dot(&normal) + direction.dot(&normal)).abs() < 1e-3 * direction.norm().max(1.0));
    }

    #[test]
    fn cosine_hemisphere_stays_above_surface() {
        let mut rng = SmallRng::seed_from_u64(7);
        let normal = Unit::new_normalize(WorldVector::new(1.0, 2.0, -0.5));
        for _ in 0..1000 {
            let direction = cosine_hemisphere(&normal, &mut rng);
            assert!(direction.dot(normal.as_ref()) >= -1e-6);
            assert!((direction.norm() - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn tangent_frame_is_orthonormal() {
        for normal in [WorldVector::x(), WorldVector::y(), WorldVector::new(1.0, 1.0, 1.0)] {
            let normal = Unit::new_normalize(normal);
            let (t, b) = tangent_frame(&normal);
            assert!(t.dot(normal.as_ref()).abs() < 1e-6);
            assert!(b.dot(normal.as_ref()).abs() < 1e-6);
            assert!(t.dot(&b).abs() < 1e-6);
            assert!((t.norm() - 1.0).abs() < 1e-6);
        }
    }
}
