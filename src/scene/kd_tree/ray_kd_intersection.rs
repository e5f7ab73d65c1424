use arrayvec::ArrayVec;

use super::{FaceIdx, KdNodeIdx, KdTree, MAX_DEPTH, NodeContent};
use crate::geometry::{BarycentricCoordinates, FloatType, Ray};

/// Closest face hit found by a traversal.
#[derive(Clone, Debug)]
pub struct FaceHit {
    pub face: FaceIdx,
    pub t: FloatType,
    pub uv: BarycentricCoordinates,
}

impl KdTree {
    /// Finds the nearest face hit along the ray.
    ///
    /// `intersect_face` is the exact test for a single face, it is called for faces in
    /// every leaf the ray passes through (possibly more than once for faces shared by
    /// several leaves). The result is the same as testing all faces.
    pub fn closest_hit<F>(&self, ray: &Ray, mut intersect_face: F) -> Option<FaceHit>
    where
        F: FnMut(FaceIdx) -> Option<(FloatType, BarycentricCoordinates)>,
    {
        let root = self.root?;
        let root_t = self.entry_distance(root, ray)?;

        let mut stack = ArrayVec::<(KdNodeIdx, FloatType), { MAX_DEPTH + 2 }>::new();
        stack.push((root, root_t));

        let mut best: Option<FaceHit> = None;

        while let Some((index, node_t)) = stack.pop() {
            let best_t = best.as_ref().map_or(FloatType::INFINITY, |hit| hit.t);
            if node_t > best_t {
                // The node starts further away than the best hit so far, nothing in it can win.
                continue;
            }

            match self.nodes[index].content {
                NodeContent::Inner { left, right } => {
                    let mut children = [left, right].map(|child| {
                        child.and_then(|child| {
                            self.entry_distance(child, ray)
                                .filter(|t| *t <= best_t)
                                .map(|t| (child, t))
                        })
                    });
                    // Nearer child goes on the stack last, to be popped first
                    if let [Some((_, t0)), Some((_, t1))] = children {
                        if t0 < t1 {
                            children.swap(0, 1);
                        }
                    }
                    stack.extend(children.into_iter().flatten());
                }
                NodeContent::Leaf { first, count } => {
                    for &face in self.leaf_faces(first, count) {
                        let Some((t, uv)) = intersect_face(face) else {
                            continue;
                        };
                        if best.as_ref().is_none_or(|hit| t < hit.t) {
                            best = Some(FaceHit { face, t, uv });
                        }
                    }
                }
            }
        }

        best
    }

    /// Distance where the ray enters the node's padded box, None if it misses it.
    fn entry_distance(&self, index: KdNodeIdx, ray: &Ray) -> Option<FloatType> {
        self.nodes[index].bounds.padded(self.padding).entry_distance(ray)
    }

    /// Whether the ray passes through the tree's bounds at all.
    pub fn intersects(&self, ray: &Ray) -> bool {
        self.root
            .is_none_or(|root| self.entry_distance(root, ray).is_some())
    }
}
