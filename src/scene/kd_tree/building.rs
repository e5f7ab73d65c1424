use index_vec::{IndexSlice, IndexVec};

use super::{FaceIdx, KdNode, KdNodeIdx, KdTree, LEAF_MAX_FACES, MAX_DEPTH, NodeContent};
use crate::geometry::{EPSILON, WorldBox};

impl KdTree {
    /// Builds the tree from bounding boxes of the faces, indexed by face.
    pub fn build(face_boxes: &IndexSlice<FaceIdx, [WorldBox]>) -> KdTree {
        let mut tree = KdTree {
            root: None,
            nodes: IndexVec::new(),
            leaf_faces: Vec::new(),
            padding: EPSILON,
        };

        let Some(bounds) = face_boxes.iter().copied().reduce(|a, b| a.union(&b)) else {
            return tree;
        };

        tree.padding = EPSILON.max(bounds.diagonal() * 1e-5);
        let faces = face_boxes.indices().collect();
        tree.root = Some(tree.build_recursive(faces, face_boxes, bounds, 0));

        log::debug!(
            "KD-tree built: {} faces, {} nodes, {} face references",
            face_boxes.len(),
            tree.nodes.len(),
            tree.leaf_faces.len()
        );

        tree
    }

    fn build_recursive(
        &mut self,
        faces: Vec<FaceIdx>,
        face_boxes: &IndexSlice<FaceIdx, [WorldBox]>,
        bounds: WorldBox,
        depth: usize,
    ) -> KdNodeIdx {
        let axis = depth % 3;

        if faces.len() <= LEAF_MAX_FACES || depth >= MAX_DEPTH {
            return self.build_leaf(&faces, bounds, axis);
        }

        let split = (bounds.min[axis] + bounds.max[axis]) / 2.0;
        let (left, right) = split_faces(&faces, face_boxes, axis, split);

        if left.len() == faces.len() && right.len() == faces.len() {
            // Every face straddles the split plane, splitting would only duplicate them.
            // Move on to the next axis instead.
            return self.build_recursive(faces, face_boxes, bounds, depth + 1);
        }

        // Create placeholder node that will be overwriten later
        let node_index = self.nodes.push(KdNode {
            bounds,
            axis,
            content: NodeContent::Inner {
                left: None,
                right: None,
            },
        });

        let (left_bounds, right_bounds) = bounds.split(axis, split);
        let left = (!left.is_empty())
            .then(|| self.build_recursive(left, face_boxes, left_bounds, depth + 1));
        let right = (!right.is_empty())
            .then(|| self.build_recursive(right, face_boxes, right_bounds, depth + 1));

        self.nodes[node_index].content = NodeContent::Inner { left, right };

        node_index
    }

    fn build_leaf(&mut self, faces: &[FaceIdx], bounds: WorldBox, axis: usize) -> KdNodeIdx {
        let first = self.leaf_faces.len();
        self.leaf_faces.extend_from_slice(faces);
        self.nodes.push(KdNode {
            bounds,
            axis,
            content: NodeContent::Leaf {
                first,
                count: faces.len(),
            },
        })
    }
}

/// Distributes faces to the two halves of a node.
/// Faces entirely below the split go left, entirely above go right,
/// faces crossing the split plane go to both.
fn split_faces(
    faces: &[FaceIdx],
    face_boxes: &IndexSlice<FaceIdx, [WorldBox]>,
    axis: usize,
    split: f32,
) -> (Vec<FaceIdx>, Vec<FaceIdx>) {
    let mut left = Vec::new();
    let mut right = Vec::new();

    for &face in faces {
        let b = &face_boxes[face];
        if b.max[axis] <= split {
            left.push(face);
        } else if b.min[axis] >= split {
            right.push(face);
        } else {
            left.push(face);
            right.push(face);
        }
    }

    (left, right)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::WorldPoint;
    use assert2::assert;
    use std::collections::BTreeSet;

    fn unit_box_at(x: f32, y: f32, z: f32) -> WorldBox {
        WorldBox::new(WorldPoint::new(x, y, z), WorldPoint::new(x + 1.0, y + 1.0, z + 1.0))
    }

    fn grid_boxes(n: usize) -> IndexVec<FaceIdx, WorldBox> {
        (0..n)
            .flat_map(|x| (0..n).map(move |y| unit_box_at(2.0 * x as f32, 2.0 * y as f32, 0.0)))
            .collect()
    }

    #[test]
    fn split_assigns_straddling_faces_to_both() {
        let boxes: IndexVec<FaceIdx, WorldBox> = [
            unit_box_at(0.0, 0.0, 0.0),
            unit_box_at(4.0, 0.0, 0.0),
            unit_box_at(2.5, 0.0, 0.0),
        ]
        .into_iter()
        .collect();
        let faces: Vec<FaceIdx> = boxes.indices().collect();
        let (left, right) = split_faces(&faces, &boxes, 0, 3.0);
        assert!(left == vec![FaceIdx::new(0), FaceIdx::new(2)]);
        assert!(right == vec![FaceIdx::new(1), FaceIdx::new(2)]);
    }

    #[test]
    fn every_face_reaches_a_leaf() {
        let boxes = grid_boxes(10);
        let tree = KdTree::build(&boxes);

        let referenced: BTreeSet<FaceIdx> = tree.leaf_faces.iter().copied().collect();
        assert!(referenced.len() == boxes.len());
        assert!(tree.node_count() > 1);
    }

    #[test]
    fn leaves_respect_limits() {
        let tree = KdTree::build(&grid_boxes(12));
        for node in tree.nodes.iter() {
            if let NodeContent::Leaf { count, .. } = node.content {
                assert!(count <= LEAF_MAX_FACES);
            }
        }
        assert!(tree.depth_statistics().max <= MAX_DEPTH + 1);
    }

    #[test]
    fn identical_faces_terminate() {
        let boxes: IndexVec<FaceIdx, WorldBox> =
            (0..100).map(|_| unit_box_at(0.0, 0.0, 0.0)).collect();
        let tree = KdTree::build(&boxes);
        assert!(tree.node_count() == 1);
        let referenced: BTreeSet<FaceIdx> = tree.leaf_faces.iter().copied().collect();
        assert!(referenced.len() == 100);
    }

    #[test]
    fn empty_tree() {
        let boxes: IndexVec<FaceIdx, WorldBox> = IndexVec::new();
        let tree = KdTree::build(&boxes);
        assert!(tree.bounding_box().is_none());
        assert!(tree.node_count() == 0);
    }
}
