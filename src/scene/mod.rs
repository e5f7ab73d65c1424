mod bounding_volume;
pub mod kd_tree;
pub mod mesh;
pub mod primitives;

pub use bounding_volume::BoundingVolume;
pub use mesh::{MeshLoadError, TriangleMesh};
pub use primitives::{Plane, Sphere};

use index_vec::IndexVec;
use nalgebra::Unit;
use ordered_float::OrderedFloat;

use crate::{
    geometry::{Culling, EPSILON, FloatType, HitRecord, Ray, WorldPoint, WorldVector},
    material::{Material, Surface},
    util::{Color, ColorExt as _},
};

index_vec::define_index_type! {
    pub struct ObjectIdx = u32;
}

/// Switches that affect how intersections are resolved, but not their result.
#[derive(Copy, Clone, Debug)]
pub struct QueryOptions {
    /// Use the KD-tree for meshes instead of testing every face.
    pub accelerate: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        QueryOptions { accelerate: true }
    }
}

/// Point light.
#[derive(Clone, Debug)]
pub struct Light {
    pub position: WorldPoint,
    /// Color and strength of the direct light.
    pub emission: Color,
    /// Ambient term added everywhere, also returned by reflected rays that escape the scene.
    pub ambient: Color,
    /// Photons are emitted into the hemisphere around this direction.
    pub direction: Unit<WorldVector>,
}

impl Light {
    pub fn new(position: WorldPoint) -> Light {
        Light {
            position,
            emission: Color::gray(1.0),
            ambient: Color::gray(0.1),
            direction: -WorldVector::y_axis(),
        }
    }
}

#[derive(Clone, Debug)]
pub enum Shape {
    Plane(Plane),
    Sphere(Sphere),
    Mesh(TriangleMesh),
}

impl Shape {
    fn bounding_volume(&self) -> BoundingVolume {
        match self {
            Shape::Plane(plane) => BoundingVolume::Box(plane.bounding_box().padded(EPSILON)),
            Shape::Sphere(sphere) => BoundingVolume::Sphere {
                center: sphere.center,
                radius: sphere.radius,
            },
            Shape::Mesh(mesh) => BoundingVolume::KdTreeRoot(mesh.kd_tree().padded_bounding_box()),
        }
    }
}

/// A shape with its material and the bounding volume used for fast rejection.
#[derive(Clone, Debug)]
pub struct SceneObject {
    shape: Shape,
    material: Material,
    bounds: BoundingVolume,
}

impl SceneObject {
    /// Dielectric meshes are made double sided, rays inside them have to hit the back faces.
    pub fn new(shape: Shape, material: Material) -> SceneObject {
        let shape = match shape {
            Shape::Mesh(mesh) if matches!(material.surface, Surface::Dielectric { .. }) => {
                Shape::Mesh(mesh.with_culling(Culling::None))
            }
            shape => shape,
        };
        let bounds = shape.bounding_volume();
        SceneObject {
            shape,
            material,
            bounds,
        }
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn material(&self) -> &Material {
        &self.material
    }

    /// Color of the surface at the given point, before any lighting.
    pub fn surface_color(&self, point: &WorldPoint) -> Color {
        self.material.surface_color(point)
    }

    /// Exact intersection with the wrapped shape.
    pub fn intersect(&self, ray: &Ray, options: &QueryOptions) -> Option<HitRecord> {
        match &self.shape {
            Shape::Plane(plane) => plane.intersect(ray),
            Shape::Sphere(sphere) => sphere.intersect(ray),
            Shape::Mesh(mesh) => mesh.intersect(ray, options),
        }
    }
}

/// Intersection of a ray with the closest object in the scene.
#[derive(Clone, Debug)]
pub struct Intersection {
    pub ray: Ray,
    pub object: ObjectIdx,
    pub point: WorldPoint,
    pub normal: Unit<WorldVector>,
    /// Distance from the ray origin
    pub distance: FloatType,
}

#[derive(Clone, Debug)]
pub struct Scene {
    objects: IndexVec<ObjectIdx, SceneObject>,
    pub light: Light,
    /// Refractive index of the medium between objects.
    pub aether_index: FloatType,
    /// Color of primary rays that miss everything.
    pub background: Color,
}

impl Scene {
    pub fn new(light: Light) -> Scene {
        Scene {
            objects: IndexVec::new(),
            light,
            aether_index: 1.0,
            background: Color::black(),
        }
    }

    pub fn add(&mut self, shape: Shape, material: Material) -> ObjectIdx {
        self.objects.push(SceneObject::new(shape, material))
    }

    pub fn object(&self, index: ObjectIdx) -> &SceneObject {
        &self.objects[index]
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Finds the nearest intersection of a ray from `origin` in `direction`,
    /// ignoring the object `exclude`.
    pub fn closest_hit(
        &self,
        exclude: Option<ObjectIdx>,
        origin: WorldPoint,
        direction: WorldVector,
        options: &QueryOptions,
    ) -> Option<Intersection> {
        let ray = Ray::new(origin, direction);

        self.objects
            .iter_enumerated()
            .filter(|(index, _)| Some(*index) != exclude)
            .filter(|(_, object)| object.bounds.intersects(&ray))
            .filter_map(|(index, object)| {
                object
                    .intersect(&ray, options)
                    .filter(|hit| hit.t > EPSILON)
                    .map(|hit| (index, hit))
            })
            .min_by_key(|(_, hit)| OrderedFloat(hit.t))
            .map(|(object, hit)| Intersection {
                ray,
                object,
                point: hit.point,
                normal: hit.normal,
                distance: hit.t,
            })
    }
}
