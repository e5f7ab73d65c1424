use std::ops::Sub;

use nalgebra::{Point2, Scalar};

use super::{FloatType, WorldBox, WorldPoint, WorldVector};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AABB<Point> {
    pub min: Point,
    pub max: Point,
}

impl<Point> AABB<Point> {
    pub fn new(min: Point, max: Point) -> AABB<Point> {
        AABB { min, max }
    }
}

impl<Point: Sub + Copy> AABB<Point> {
    pub fn size(&self) -> Point::Output {
        self.max - self.min
    }
}

impl<T: Scalar + Copy + Sub> AABB<Point2<T>> {
    pub fn width(&self) -> T::Output {
        self.max[0] - self.min[0]
    }

    pub fn height(&self) -> T::Output {
        self.max[1] - self.min[1]
    }
}

impl WorldBox {
    /// Smallest box containing all the points, None if the iterator is empty.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a WorldPoint>) -> Option<WorldBox> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        Some(iter.fold(WorldBox::new(*first, *first), |acc, p| acc.grown_to(p)))
    }

    /// Returns a box that also contains `p`.
    pub fn grown_to(&self, p: &WorldPoint) -> WorldBox {
        WorldBox {
            min: self.min.inf(p),
            max: self.max.sup(p),
        }
    }

    pub fn union(&self, other: &WorldBox) -> WorldBox {
        WorldBox {
            min: self.min.inf(&other.min),
            max: self.max.sup(&other.max),
        }
    }

    /// Returns the box expanded by `margin` in every direction.
    pub fn padded(&self, margin: FloatType) -> WorldBox {
        let margin = WorldVector::repeat(margin);
        WorldBox {
            min: self.min - margin,
            max: self.max + margin,
        }
    }

    /// Length of the box diagonal.
    pub fn diagonal(&self) -> FloatType {
        self.size().norm()
    }

    pub fn contains(&self, p: &WorldPoint) -> bool {
        (0..3).all(|axis| p[axis] >= self.min[axis] && p[axis] <= self.max[axis])
    }

    /// Squared euclidean distance from `p` to the closest point of the box.
    /// Zero if the point is inside.
    pub fn distance_squared(&self, p: &WorldPoint) -> FloatType {
        (0..3)
            .map(|axis| {
                let d = (self.min[axis] - p[axis]).max(p[axis] - self.max[axis]).max(0.0);
                d * d
            })
            .sum()
    }

    /// Splits the box by a plane perpendicular to `axis` at `position`.
    /// Returns (lower half, upper half).
    pub fn split(&self, axis: usize, position: FloatType) -> (WorldBox, WorldBox) {
        let mut lower = *self;
        let mut upper = *self;
        lower.max[axis] = position;
        upper.min[axis] = position;
        (lower, upper)
    }
}

impl From<[WorldPoint; 2]> for WorldBox {
    fn from(value: [WorldPoint; 2]) -> Self {
        let [min, max] = value;
        AABB { min, max }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use assert2::{assert, let_assert};

    #[test]
    fn from_points_encloses_everything() {
        let points = [
            WorldPoint::new(1.0, -2.0, 3.0),
            WorldPoint::new(-1.0, 5.0, 0.0),
            WorldPoint::new(0.5, 0.0, 7.0),
        ];
        let_assert!(Some(b) = WorldBox::from_points(&points));
        assert!(b.min == WorldPoint::new(-1.0, -2.0, 0.0));
        assert!(b.max == WorldPoint::new(1.0, 5.0, 7.0));
        assert!(points.iter().all(|p| b.contains(p)));
    }

    #[test]
    fn from_no_points() {
        assert!(WorldBox::from_points(&[]).is_none());
    }

    #[test]
    fn distance_to_box() {
        let b = WorldBox::new(WorldPoint::new(0.0, 0.0, 0.0), WorldPoint::new(1.0, 1.0, 1.0));
        assert!(b.distance_squared(&WorldPoint::new(0.5, 0.5, 0.5)) == 0.0);
        assert!(b.distance_squared(&WorldPoint::new(3.0, 0.5, 0.5)) == 4.0);
        assert!(b.distance_squared(&WorldPoint::new(-1.0, -1.0, 0.5)) == 2.0);
    }

    #[test]
    fn split_halves() {
        let b = WorldBox::new(WorldPoint::new(0.0, 0.0, 0.0), WorldPoint::new(2.0, 4.0, 6.0));
        let (lower, upper) = b.split(1, 1.0);
        assert!(lower.max == WorldPoint::new(2.0, 1.0, 6.0));
        assert!(upper.min == WorldPoint::new(0.0, 1.0, 0.0));
        assert!(lower.union(&upper) == b);
    }
}
