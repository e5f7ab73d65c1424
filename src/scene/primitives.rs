use assert2::assert;
use nalgebra::Unit;

use crate::geometry::{EPSILON, FloatType, HitRecord, Ray, WorldBox, WorldPoint, WorldVector};

/// Flat polygon given by its corners.
///
/// Containment is tested against the axis aligned bounding box of the corners, not the
/// polygon itself, so only axis aligned rectangles are represented exactly.
#[derive(Clone, Debug)]
pub struct Plane {
    corners: Vec<WorldPoint>,
    /// Implicit plane equation `normal.dot(p) + d = 0`, `normal` is (A, B, C).
    /// Zero normal for degenerate (colinear) corners.
    normal: WorldVector,
    d: FloatType,
    bounds: WorldBox,
}

impl Plane {
    /// Creates a plane from at least three coplanar corners.
    /// Normal follows the counter-clockwise winding of the first three corners.
    pub fn new(corners: Vec<WorldPoint>) -> Plane {
        assert!(corners.len() >= 3, "A plane needs at least three corners");

        let normal = (corners[1] - corners[0]).cross(&(corners[2] - corners[0]));
        let normal = normal
            .try_normalize(EPSILON * EPSILON)
            .unwrap_or_else(WorldVector::zeros);
        let d = -normal.dot(&corners[0].coords);
        let bounds = WorldBox::from_points(&corners)
            .unwrap_or_else(|| unreachable!("there are at least three corners"));

        Plane {
            corners,
            normal,
            d,
            bounds,
        }
    }

    /// Axis aligned rectangle with `min` and `max` as opposite corners.
    /// Exactly one coordinate of the two points must be equal.
    pub fn axis_aligned(min: WorldPoint, max: WorldPoint) -> Plane {
        let flat_axis = (0..3)
            .find(|axis| min[*axis] == max[*axis])
            .unwrap_or(2);
        let (a, b) = ((flat_axis + 1) % 3, (flat_axis + 2) % 3);

        let mut c1 = min;
        c1[a] = max[a];
        let mut c3 = min;
        c3[b] = max[b];

        Plane::new(vec![min, c1, max, c3])
    }

    pub fn corners(&self) -> &[WorldPoint] {
        &self.corners
    }

    /// Coefficients (A, B, C, D) of the implicit plane equation.
    pub fn coefficients(&self) -> [FloatType; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.d]
    }

    pub fn bounding_box(&self) -> WorldBox {
        self.bounds
    }

    pub fn intersect(&self, ray: &Ray) -> Option<HitRecord> {
        let denominator = self.normal.dot(&ray.direction);
        if denominator.abs() < EPSILON {
            return None;
        }

        let t = -(self.normal.dot(&ray.origin.coords) + self.d) / denominator;
        if t <= EPSILON {
            return None;
        }

        let point = ray.point_at(t);
        if !self.bounds.padded(EPSILON).contains(&point) {
            return None;
        }

        let normal = if denominator > 0.0 {
            -self.normal
        } else {
            self.normal
        };

        Some(HitRecord {
            t,
            point,
            normal: Unit::new_unchecked(normal),
        })
    }
}

#[derive(Clone, Debug)]
pub struct Sphere {
    pub center: WorldPoint,
    pub radius: FloatType,
}

impl Sphere {
    pub fn new(center: WorldPoint, radius: FloatType) -> Sphere {
        assert!(radius > 0.0);
        Sphere { center, radius }
    }

    pub fn bounding_box(&self) -> WorldBox {
        let r_vec = WorldVector::repeat(self.radius);
        WorldBox {
            min: self.center - r_vec,
            max: self.center + r_vec,
        }
    }

    /// Returns the nearest intersection in front of the ray with outward facing normal.
    pub fn intersect(&self, ray: &Ray) -> Option<HitRecord> {
        let oc = ray.origin - self.center;
        let b = oc.dot(&ray.direction);
        let c = oc.dot(&oc) - self.radius * self.radius;
        let discriminant = b * b - c;

        if discriminant < 0.0 {
            return None;
        }

        let sqrt_disc = discriminant.sqrt();
        let t1 = -b - sqrt_disc;
        let t2 = -b + sqrt_disc;

        let (mut t, other) = if t1 > 0.0 {
            (t1, t2)
        } else if t2 > 0.0 {
            (t2, t1)
        } else {
            return None;
        };

        // A root this close to the origin is the surface the ray starts on
        if (ray.point_at(t) - ray.origin).norm() <= EPSILON {
            if other > EPSILON {
                t = other;
            } else {
                return None;
            }
        }

        let point = ray.point_at(t);
        let normal = Unit::new_normalize(point - self.center);

        Some(HitRecord { t, point, normal })
    }
}
