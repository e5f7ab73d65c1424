use std::ops::{Add, Index, IndexMut, Mul};

use super::{FloatType, WorldBox, WorldPoint, WorldVector};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Triangle<Point>([Point; 3]);

impl<Point> Triangle<Point> {
    pub fn new(a: Point, b: Point, c: Point) -> Triangle<Point> {
        Triangle([a, b, c])
    }

    pub fn iter<'a>(&'a self) -> impl Iterator<Item = &'a Point> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        3
    }

    pub fn map<Point2, F: FnMut(&Point) -> Point2>(&self, mut f: F) -> Triangle<Point2> {
        Triangle([f(&self[0]), f(&self[1]), f(&self[2])])
    }
}

impl<Point> Index<usize> for Triangle<Point> {
    type Output = Point;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl<Point> IndexMut<usize> for Triangle<Point> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.0[index]
    }
}

impl Triangle<WorldPoint> {
    pub fn centroid(&self) -> WorldPoint {
        WorldPoint::from(self.iter().map(|p| p.coords).sum::<WorldVector>() / 3.0)
    }

    /// Returns edge vectors, coming from self[0]
    pub fn edges(&self) -> [WorldVector; 2] {
        [self[1] - self[0], self[2] - self[0]]
    }

    /// Returns a normal vector of the triangle, not normalized.
    /// Length of the normal is twice the triangle area.
    pub fn normal(&self) -> WorldVector {
        let [e1, e2] = self.edges();
        e1.cross(&e2)
    }

    pub fn bounding_box(&self) -> WorldBox {
        WorldBox::new(
            self[0].inf(&self[1]).inf(&self[2]),
            self[0].sup(&self[1]).sup(&self[2]),
        )
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BarycentricCoordinates {
    pub u: FloatType,
    pub v: FloatType,
}

impl BarycentricCoordinates {
    /// Weight of the first vertex.
    pub fn w(&self) -> FloatType {
        1.0 - self.u - self.v
    }

    pub fn interpolate<T>(&self, a: &T, b: &T, c: &T) -> T
    where
        for<'a> &'a T: Mul<FloatType, Output = T>,
        T: Add<Output = T>,
    {
        a * self.w() + b * self.u + c * self.v
    }

    pub fn interpolate_triangle<T>(&self, triangle: &Triangle<T>) -> T
    where
        for<'a> &'a T: Mul<FloatType, Output = T>,
        T: Add<Output = T>,
    {
        self.interpolate(&triangle[0], &triangle[1], &triangle[2])
    }
}
