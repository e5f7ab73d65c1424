use super::{BarycentricCoordinates, FloatType, Ray, Triangle, WorldPoint};

/// Rays closer to parallel with the triangle plane than this (as a sine of the angle,
/// for a unit direction) miss the triangle.
const PARALLEL_EPSILON: FloatType = 1e-7;

/// Whether triangles are visible from their back side.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Culling {
    /// Hits on the back side (clockwise winding as seen from the ray) are rejected.
    #[default]
    Backface,
    /// Triangles are double sided.
    None,
}

impl Triangle<WorldPoint> {
    /// Calculates ray intersection with the triangle.
    /// Returns distance along the ray and barycentric uv coordinates of the hit.
    /// Hits closer than `min_t` are rejected.
    /// Adapted from https://en.wikipedia.org/wiki/M%C3%B6ller%E2%80%93Trumbore_intersection_algorithm#Rust_implementation
    pub fn intersect(
        &self,
        ray: &Ray,
        culling: Culling,
        min_t: FloatType,
    ) -> Option<(FloatType, BarycentricCoordinates)> {
        let [e1, e2] = self.edges();

        let ray_cross_e2 = ray.direction.cross(&e2);
        let det = e1.dot(&ray_cross_e2);

        // Determinant scales with the triangle area and the ray direction length
        let threshold = PARALLEL_EPSILON * e1.cross(&e2).norm() * ray.direction.norm();
        match culling {
            Culling::Backface if det <= threshold => return None,
            Culling::None if det.abs() <= threshold => return None,
            _ => {}
        }

        let inv_det = 1.0 / det;
        let s = ray.origin - self[0];
        let u = inv_det * s.dot(&ray_cross_e2);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }

        let s_cross_e1 = s.cross(&e1);
        let v = inv_det * ray.direction.dot(&s_cross_e1);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = inv_det * e2.dot(&s_cross_e1);
        (t > min_t).then_some((t, BarycentricCoordinates { u, v }))
    }
}
