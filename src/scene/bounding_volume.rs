use crate::geometry::{FloatType, Ray, WorldBox, WorldPoint, WorldVector};

/// Cheap conservative bound around a scene object.
#[derive(Clone, Debug)]
pub enum BoundingVolume {
    Box(WorldBox),
    Sphere {
        center: WorldPoint,
        radius: FloatType,
    },
    /// Root box of a mesh KD-tree. None for meshes without faces.
    KdTreeRoot(Option<WorldBox>),
}

impl BoundingVolume {
    /// Returns false only if the ray certainly misses everything inside the volume.
    pub fn intersects(&self, ray: &Ray) -> bool {
        match self {
            BoundingVolume::Box(b) => b.is_hit_by(ray),
            BoundingVolume::Sphere { center, radius } => {
                let oc = ray.origin - center;
                let c = oc.norm_squared() - radius * radius;
                if c <= 0.0 {
                    return true;
                }
                let b = oc.dot(&ray.direction);
                let discriminant = b * b - c;
                discriminant >= 0.0 && b < 0.0
            }
            BoundingVolume::KdTreeRoot(Some(b)) => b.is_hit_by(ray),
            BoundingVolume::KdTreeRoot(None) => true,
        }
    }

    pub fn min(&self) -> WorldPoint {
        match self {
            BoundingVolume::Box(b) | BoundingVolume::KdTreeRoot(Some(b)) => b.min,
            BoundingVolume::Sphere { center, radius } => center - WorldVector::repeat(*radius),
            BoundingVolume::KdTreeRoot(None) => WorldPoint::origin(),
        }
    }

    pub fn max(&self) -> WorldPoint {
        match self {
            BoundingVolume::Box(b) | BoundingVolume::KdTreeRoot(Some(b)) => b.max,
            BoundingVolume::Sphere { center, radius } => center + WorldVector::repeat(*radius),
            BoundingVolume::KdTreeRoot(None) => WorldPoint::origin(),
        }
    }
}
