mod obj;
mod ply;

use index_vec::IndexVec;
use nalgebra::Unit;
use thiserror::Error;

use crate::{
    geometry::{
        BarycentricCoordinates, Culling, EPSILON, FloatType, HitRecord, Ray, Triangle, WorldBox,
        WorldPoint, WorldVector,
    },
    scene::{
        QueryOptions,
        kd_tree::{FaceHit, FaceIdx, KdTree},
    },
};

/// Minimum hit distance of a mesh, relative to the diagonal of its bounding box.
const SHADOW_DISTANCE_FACTOR: FloatType = 1e-4;

/// Indexed triangle mesh with per vertex normals.
#[derive(Clone, Debug)]
pub struct TriangleMesh {
    positions: Vec<WorldPoint>,
    normals: Vec<WorldVector>,
    faces: IndexVec<FaceIdx, Triangle<usize>>,

    kd_tree: KdTree,
    /// Hits closer than this are ignored, so that rays leaving the mesh surface
    /// don't hit the face they start on.
    shadow_distance: FloatType,
    culling: Culling,
}

#[derive(Debug, Error)]
pub enum MeshLoadError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse OBJ file: {0}")]
    ObjParseError(#[from] wavefront_obj::ParseError),

    #[error("Failed to parse PLY file: {0}")]
    PlyParseError(String),

    #[error("Face {face} references vertex {index}, but the mesh only has {vertex_count} vertices")]
    VertexIndexOutOfRange {
        face: usize,
        index: usize,
        vertex_count: usize,
    },

    #[error("Mesh has {normal_count} normals for {vertex_count} vertices")]
    NormalCountMismatch {
        normal_count: usize,
        vertex_count: usize,
    },
}

impl TriangleMesh {
    /// Creates a mesh and builds its KD-tree.
    /// If `normals` is None, vertex normals are averaged from the adjacent faces.
    pub fn new(
        positions: Vec<WorldPoint>,
        normals: Option<Vec<WorldVector>>,
        faces: Vec<Triangle<usize>>,
    ) -> Result<TriangleMesh, MeshLoadError> {
        let vertex_count = positions.len();
        for (face, triangle) in faces.iter().enumerate() {
            if let Some(&index) = triangle.iter().find(|&&i| i >= vertex_count) {
                return Err(MeshLoadError::VertexIndexOutOfRange {
                    face,
                    index,
                    vertex_count,
                });
            }
        }

        let faces: IndexVec<FaceIdx, Triangle<usize>> = faces.into_iter().collect();

        let normals = match normals {
            Some(normals) if normals.len() != vertex_count => {
                return Err(MeshLoadError::NormalCountMismatch {
                    normal_count: normals.len(),
                    vertex_count,
                });
            }
            Some(normals) => normals,
            None => vertex_normals(&positions, &faces),
        };

        let face_boxes: IndexVec<FaceIdx, WorldBox> = faces
            .iter()
            .map(|face| face.map(|i| positions[*i]).bounding_box())
            .collect();
        let kd_tree = KdTree::build(&face_boxes);
        let shadow_distance = kd_tree
            .bounding_box()
            .map_or(EPSILON, |b| (b.diagonal() * SHADOW_DISTANCE_FACTOR).max(EPSILON));

        log::info!(
            "Loaded mesh with {} vertices and {} faces",
            positions.len(),
            faces.len()
        );
        kd_tree.log_statistics();

        Ok(TriangleMesh {
            positions,
            normals,
            faces,
            kd_tree,
            shadow_distance,
            culling: Culling::default(),
        })
    }

    /// Sets whether back faces are visible.
    pub fn with_culling(mut self, culling: Culling) -> TriangleMesh {
        self.culling = culling;
        self
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn normals(&self) -> &[WorldVector] {
        &self.normals
    }

    pub fn shadow_distance(&self) -> FloatType {
        self.shadow_distance
    }

    pub fn kd_tree(&self) -> &KdTree {
        &self.kd_tree
    }

    pub fn bounding_box(&self) -> Option<WorldBox> {
        self.kd_tree.bounding_box()
    }

    pub fn triangle(&self, face: FaceIdx) -> Triangle<WorldPoint> {
        self.faces[face].map(|i| self.positions[*i])
    }

    fn intersect_face(
        &self,
        face: FaceIdx,
        ray: &Ray,
    ) -> Option<(FloatType, BarycentricCoordinates)> {
        self.triangle(face)
            .intersect(ray, self.culling, self.shadow_distance)
    }

    /// Nearest face hit, found by testing every face.
    pub fn closest_face_brute_force(&self, ray: &Ray) -> Option<FaceHit> {
        self.faces
            .indices()
            .filter_map(|face| {
                self.intersect_face(face, ray)
                    .map(|(t, uv)| FaceHit { face, t, uv })
            })
            .min_by(|a, b| a.t.total_cmp(&b.t))
    }

    /// Nearest face hit, found using the KD-tree.
    pub fn closest_face(&self, ray: &Ray) -> Option<FaceHit> {
        self.kd_tree
            .closest_hit(ray, |face| self.intersect_face(face, ray))
    }

    pub fn intersect(&self, ray: &Ray, options: &QueryOptions) -> Option<HitRecord> {
        let hit = if options.accelerate {
            self.closest_face(ray)
        } else {
            self.closest_face_brute_force(ray)
        }?;

        let triangle = self.faces[hit.face];
        let normals = triangle.map(|i| self.normals[*i]);
        let normal = Unit::try_new(hit.uv.interpolate_triangle(&normals), EPSILON)
            .unwrap_or_else(|| Unit::new_normalize(self.triangle(hit.face).normal()));

        Some(HitRecord {
            t: hit.t,
            point: ray.point_at(hit.t),
            normal,
        })
    }
}

/// Averages face normals around each vertex, weighted by face area.
fn vertex_normals(
    positions: &[WorldPoint],
    faces: &IndexVec<FaceIdx, Triangle<usize>>,
) -> Vec<WorldVector> {
    let mut normals = vec![WorldVector::zeros(); positions.len()];
    for face in faces.iter() {
        let face_normal = face.map(|i| positions[*i]).normal();
        for &i in face.iter() {
            normals[i] += face_normal;
        }
    }
    for normal in normals.iter_mut() {
        *normal = normal.try_normalize(0.0).unwrap_or_else(WorldVector::zeros);
    }
    normals
}
