use std::{fs, path::Path};

use indexmap::IndexMap;

use super::{MeshLoadError, TriangleMesh};
use crate::geometry::{FloatType, Triangle, WorldPoint, WorldVector};

/// Vertex key within an OBJ file: object index, position index, normal index.
type VertexKey = (usize, usize, Option<usize>);

impl TriangleMesh {
    /// Loads all triangles of all objects in a Wavefront OBJ file as a single mesh.
    pub fn from_obj(p: impl AsRef<Path>) -> Result<TriangleMesh, MeshLoadError> {
        let content = fs::read_to_string(p)?;
        Self::from_obj_str(content)
    }

    pub fn from_obj_str(content: impl Into<String>) -> Result<TriangleMesh, MeshLoadError> {
        let parsed = wavefront_obj::obj::parse(content.into())?;
        let (positions, normals, faces) = load_obj(parsed);
        TriangleMesh::new(positions, normals, faces)
    }
}

/// Flattens the OBJ objects into one vertex list, deduplicating position/normal pairs.
/// Normals are only used if every vertex has one.
fn load_obj(
    obj: wavefront_obj::obj::ObjSet,
) -> (Vec<WorldPoint>, Option<Vec<WorldVector>>, Vec<Triangle<usize>>) {
    let mut faces = Vec::new();
    let mut vertices: IndexMap<VertexKey, (WorldPoint, Option<WorldVector>)> = IndexMap::new();
    let mut skipped = 0usize;

    for (object_index, o) in obj.objects.iter().enumerate() {
        for geometry in &o.geometry {
            for shape in &geometry.shapes {
                let wavefront_obj::obj::Primitive::Triangle(a, b, c) = shape.primitive else {
                    skipped += 1;
                    continue;
                };

                let mut handle_vertex = |(vertex, _tex, normal): wavefront_obj::obj::VTNIndex| {
                    let entry = vertices.entry((object_index, vertex, normal));
                    let index = entry.index();
                    entry.or_insert_with(|| {
                        let v = &o.vertices[vertex];
                        let n = normal.map(|i| &o.normals[i]);
                        (
                            WorldPoint::new(v.x as FloatType, v.y as FloatType, v.z as FloatType),
                            n.map(|n| {
                                WorldVector::new(n.x as FloatType, n.y as FloatType, n.z as FloatType)
                                    .normalize()
                            }),
                        )
                    });
                    index
                };

                let a = handle_vertex(a);
                let b = handle_vertex(b);
                let c = handle_vertex(c);

                faces.push(Triangle::new(a, b, c));
            }
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {skipped} non-triangle primitives");
    }

    let (positions, normals): (Vec<_>, Vec<_>) = vertices.into_values().unzip();
    let normals = normals.into_iter().collect::<Option<Vec<_>>>();

    (positions, normals, faces)
}
