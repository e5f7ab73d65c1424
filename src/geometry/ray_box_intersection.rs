use crate::geometry::{FloatType, Ray, WorldBox};

impl WorldBox {
    /// Calculates ray intersection with the box.
    /// Returns minimum and maximum distance along the ray, ray intersects if min <= max.
    /// Distances are not clamped, min is negative when the origin is inside the box.
    pub fn intersect(&self, ray: &Ray) -> (FloatType, FloatType) {
        // Componentwise distances along the ray to the box's min and max corners
        // The multiplication is NAN if the ray is starting inside the slab bounding plane
        // and is parallel to it. In this case we replace it with +-infinity, so that the range becomes infinite
        let to_box_min = (self.min - ray.origin)
            .component_mul(&ray.inv_direction)
            .map(|x| if x.is_nan() { FloatType::NEG_INFINITY } else { x });
        let to_box_max = (self.max - ray.origin)
            .component_mul(&ray.inv_direction)
            .map(|x| if x.is_nan() { FloatType::INFINITY } else { x });

        // Correctly ordered (min_t <= max_t)
        let componentwise_min_t = to_box_min.zip_map(&to_box_max, FloatType::min);
        let componentwise_max_t = to_box_min.zip_map(&to_box_max, FloatType::max);

        (componentwise_min_t.max(), componentwise_max_t.min())
    }

    /// Returns the distance along the ray where it enters the box, clamped to 0 if the origin
    /// is inside. None if the box is missed or lies entirely behind the ray.
    pub fn entry_distance(&self, ray: &Ray) -> Option<FloatType> {
        let (t1, t2) = self.intersect(ray);
        let t1 = t1.max(0.0);
        (t1 <= t2).then_some(t1)
    }

    /// Fast reject test used by bounding volumes.
    pub fn is_hit_by(&self, ray: &Ray) -> bool {
        self.entry_distance(ray).is_some()
    }
}

#[cfg(test)]
pub mod test {
    use assert2::assert;
    use test_case::{test_case, test_matrix};

    use crate::geometry::{Ray, WorldBox, WorldPoint, WorldVector};

    /// Checks cases when the ray hits the box, including some corner cases.
    #[test_matrix(
        [5.0, 7.0, 10.0],
        [5.0, 7.0, 10.0],
        [5.0, 7.0, 10.0],
        [-1.0, 0.0, 2.0],
        [-1.0, 0.0, 2.0],
        [-1.0, 0.0, 2.0],
        [-10.0, -1.0, 0.0, 2.0, 5.0, 20.0]
    )]
    fn hit(px: f32, py: f32, pz: f32, dx: f32, dy: f32, dz: f32, origin_pos: f32) {
        if dx == 0.0 && dy == 0.0 && dz == 0.0 {
            return;
        }

        let b = WorldBox::new([5.0, 5.0, 5.0].into(), [10.0, 10.0, 10.0].into());

        let p = WorldPoint::new(px, py, pz);
        let d = WorldVector::new(dx, dy, dz);
        let temp_r = Ray::new(p, d);
        let origin = temp_r.point_at(origin_pos);
        let r = Ray::new(origin, d);

        let (t1, t2) = with_tolerance(b.intersect(&r))
            .expect("The ray line passes through the box, we should always have an intersection");

        let p1 = r.point_at(t1);
        let p2 = r.point_at(t2);

        assert!(point_is_on_box_surface(&p1, &b), "{p1:?} must be on {b:?}");
        assert!(point_is_on_box_surface(&p2, &b), "{p2:?} must be on {b:?}");
    }

    fn with_tolerance((t1, t2): (f32, f32)) -> Option<(f32, f32)> {
        const TOLERANCE: f32 = 1e-3;

        if t1 <= t2 {
            Some((t1, t2))
        } else if t1 <= t2 + TOLERANCE {
            let t = (t1 + t2) / 2.0;
            Some((t, t))
        } else {
            None
        }
    }

    /// Just a manual example of ray grazing along an edge.
    #[test]
    fn hit_along_edge() {
        let b = WorldBox::new([5.0, 5.0, 5.0].into(), [10.0, 10.0, 10.0].into());

        let r = Ray::new(
            WorldPoint::new(5.0, 5.0, 0.0),
            WorldVector::new(0.0, 0.0, 1.0),
        );

        assert!(with_tolerance(b.intersect(&r)) == Some((5.0, 10.0)));
        assert!(b.entry_distance(&r) == Some(5.0));
    }

    #[test]
    fn box_behind_the_ray_is_not_hit() {
        let b = WorldBox::new([5.0, 5.0, 5.0].into(), [10.0, 10.0, 10.0].into());
        let r = Ray::new(
            WorldPoint::new(7.0, 7.0, 20.0),
            WorldVector::new(0.0, 0.0, 1.0),
        );
        assert!(!b.is_hit_by(&r));
    }

    #[test]
    fn origin_inside_box() {
        let b = WorldBox::new([5.0, 5.0, 5.0].into(), [10.0, 10.0, 10.0].into());
        let r = Ray::new(
            WorldPoint::new(7.0, 7.0, 7.0),
            WorldVector::new(1.0, 0.3, -0.2),
        );
        assert!(b.entry_distance(&r) == Some(0.0));
    }

    /// Rays that lie parallel to one axis and start outside the corresponding slab
    /// must miss, even if they move toward the box on other axes or remain unchanged.
    #[test_case( 0.0,  7.0,  7.0,   0.0, 1.0, 0.0,   0.0 ; "low_x_parallel_miss")]
    #[test_case(12.0,  7.0,  7.0,   0.0, 1.0, 0.0,   0.0 ; "high_x_parallel_miss")]
    #[test_case( 7.0,  0.0,  7.0,   1.0, 0.0, 0.0,   0.0 ; "low_y_parallel_miss")]
    #[test_case( 7.0, 12.0,  7.0,   1.0, 0.0, 0.0,   0.0 ; "high_y_parallel_miss")]
    #[test_case( 7.0,  7.0,  0.0,   1.0, 0.0, 0.0,   0.0 ; "low_z_parallel_miss")]
    #[test_case( 7.0,  7.0, 12.0,   1.0, 0.0, 0.0,   0.0 ; "high_z_parallel_miss")]
    #[test_case( 0.0,  5.0,  7.0,   1.0, 0.0, 1.0,   0.0 ; "corner_miss")]
    #[test_case( 0.0,  0.0,  0.0,  -1.0, 1.0, 1.0,   0.0 ; "corner_miss2")]
    fn only_misses(px: f32, py: f32, pz: f32, dx: f32, dy: f32, dz: f32, origin_pos: f32) {
        let b = WorldBox::new([5.0, 5.0, 5.0].into(), [10.0, 10.0, 10.0].into());

        let p = WorldPoint::new(px, py, pz);
        let d = WorldVector::new(dx, dy, dz);
        let temp_r = Ray::new(p, d);
        let origin = temp_r.point_at(origin_pos);
        let r = Ray::new(origin, d);

        assert!(with_tolerance(b.intersect(&r)) == None);
    }

    fn point_is_on_box_surface(p: &WorldPoint, b: &WorldBox) -> bool {
        const TOLERANCE: f32 = 1e-3;

        let within = |axis: usize| {
            p[axis] >= b.min[axis] - TOLERANCE && p[axis] <= b.max[axis] + TOLERANCE
        };
        let on_face = |axis: usize| {
            (p[axis] - b.min[axis]).abs() <= TOLERANCE || (p[axis] - b.max[axis]).abs() <= TOLERANCE
        };

        (0..3).all(within) && (0..3).any(on_face)
    }
}
