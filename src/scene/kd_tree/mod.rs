//! KD-tree over triangle faces of a mesh.
//!
//! Nodes live in an arena and refer to their children by index. Inner nodes split their
//! box in half along an axis that cycles with depth, faces that straddle the split plane
//! are referenced from both children.

mod building;
mod ray_kd_intersection;
mod statistics;

pub use ray_kd_intersection::FaceHit;

use index_vec::IndexVec;

use crate::geometry::{FloatType, WorldBox};

/// Nodes with at most this many faces are not split further.
pub const LEAF_MAX_FACES: usize = 8;
/// Maximum depth of the tree, root is at depth 0.
pub const MAX_DEPTH: usize = 24;

index_vec::define_index_type! {
    pub struct FaceIdx = u32;
}

index_vec::define_index_type! {
    struct KdNodeIdx = u32;
}

#[derive(Clone, Debug)]
pub struct KdTree {
    root: Option<KdNodeIdx>,
    nodes: IndexVec<KdNodeIdx, KdNode>,

    /// Face references of all leaves, each leaf owns a contiguous range.
    leaf_faces: Vec<FaceIdx>,

    /// Node boxes are expanded by this much when testing against rays,
    /// so that hits exactly on a split plane are not lost to rounding.
    padding: FloatType,
}

#[derive(Clone, Debug)]
struct KdNode {
    bounds: WorldBox,
    axis: usize,
    content: NodeContent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum NodeContent {
    Inner {
        left: Option<KdNodeIdx>,
        right: Option<KdNodeIdx>,
    },
    Leaf {
        first: usize,
        count: usize,
    },
}

impl KdTree {
    pub fn bounding_box(&self) -> Option<WorldBox> {
        self.root.map(|root| self.nodes[root].bounds)
    }

    /// Root box expanded by the padding used during traversal.
    pub fn padded_bounding_box(&self) -> Option<WorldBox> {
        self.bounding_box().map(|b| b.padded(self.padding))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    fn leaf_faces(&self, first: usize, count: usize) -> &[FaceIdx] {
        &self.leaf_faces[first..first + count]
    }
}
