use arrayvec::ArrayVec;
use index_vec::IndexVec;

use super::Photon;
use crate::{
    geometry::{FloatType, WorldBox, WorldPoint},
    util::Stats,
};

/// Nodes with at most this many photons are not split further.
pub const PHOTON_LEAF_SIZE: usize = 8;
/// Maximum depth of the photon tree, root is at depth 0.
pub const PHOTON_MAX_DEPTH: usize = 32;

index_vec::define_index_type! {
    struct PhotonNodeIdx = u32;
}

/// KD-tree over photon positions.
///
/// Splits boxes in half along an axis cycling with depth. Unlike the mesh tree every photon
/// is stored in exactly one leaf, photons exactly on the split plane go right.
#[derive(Clone, Debug, Default)]
pub struct PhotonTree {
    root: Option<PhotonNodeIdx>,
    nodes: IndexVec<PhotonNodeIdx, PhotonNode>,
    /// Photons ordered so that each leaf owns a contiguous range.
    photons: Vec<Photon>,
}

#[derive(Clone, Debug)]
struct PhotonNode {
    bounds: WorldBox,
    content: PhotonNodeContent,
}

#[derive(Clone, Debug)]
enum PhotonNodeContent {
    Inner {
        left: Option<PhotonNodeIdx>,
        right: Option<PhotonNodeIdx>,
    },
    Leaf {
        first: usize,
        count: usize,
    },
}

impl PhotonTree {
    pub fn build(photons: Vec<Photon>) -> PhotonTree {
        let mut tree = PhotonTree::default();

        let Some(bounds) = WorldBox::from_points(photons.iter().map(|p| &p.position)) else {
            return tree;
        };

        tree.photons.reserve(photons.len());
        tree.root = Some(tree.build_recursive(photons, bounds, 0));
        tree
    }

    fn build_recursive(
        &mut self,
        photons: Vec<Photon>,
        bounds: WorldBox,
        depth: usize,
    ) -> PhotonNodeIdx {
        if photons.len() <= PHOTON_LEAF_SIZE || depth >= PHOTON_MAX_DEPTH {
            let first = self.photons.len();
            let count = photons.len();
            self.photons.extend(photons);
            return self.nodes.push(PhotonNode {
                bounds,
                content: PhotonNodeContent::Leaf { first, count },
            });
        }

        let axis = depth % 3;
        let split = (bounds.min[axis] + bounds.max[axis]) / 2.0;
        let (left, right): (Vec<Photon>, Vec<Photon>) = photons
            .into_iter()
            .partition(|photon| photon.position[axis] < split);

        let (left_bounds, right_bounds) = bounds.split(axis, split);

        // Everything on one side, descend into that half without creating a node
        if left.is_empty() {
            return self.build_recursive(right, right_bounds, depth + 1);
        }
        if right.is_empty() {
            return self.build_recursive(left, left_bounds, depth + 1);
        }

        let node_index = self.nodes.push(PhotonNode {
            bounds,
            content: PhotonNodeContent::Inner {
                left: None,
                right: None,
            },
        });

        let left = Some(self.build_recursive(left, left_bounds, depth + 1));
        let right = Some(self.build_recursive(right, right_bounds, depth + 1));
        self.nodes[node_index].content = PhotonNodeContent::Inner { left, right };

        node_index
    }

    pub fn len(&self) -> usize {
        self.photons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photons.is_empty()
    }

    pub fn photons(&self) -> &[Photon] {
        &self.photons
    }

    /// Calls `f` with every photon within `radius` of `point` (inclusive), each exactly once.
    pub fn for_each_within<'a, F: FnMut(&'a Photon, FloatType)>(
        &'a self,
        point: &WorldPoint,
        radius: FloatType,
        mut f: F,
    ) {
        let Some(root) = self.root else {
            return;
        };
        let radius_squared = radius * radius;

        let mut stack = ArrayVec::<PhotonNodeIdx, { PHOTON_MAX_DEPTH + 2 }>::new();
        stack.push(root);

        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            if node.bounds.distance_squared(point) > radius_squared {
                continue;
            }

            match node.content {
                PhotonNodeContent::Inner { left, right } => {
                    stack.extend([left, right].into_iter().flatten());
                }
                PhotonNodeContent::Leaf { first, count } => {
                    for photon in &self.photons[first..first + count] {
                        let distance_squared = (photon.position - point).norm_squared();
                        if distance_squared <= radius_squared {
                            f(photon, distance_squared.sqrt());
                        }
                    }
                }
            }
        }
    }

    /// Photons within `radius` of `point`.
    pub fn within(&self, point: &WorldPoint, radius: FloatType) -> Vec<&Photon> {
        let mut found = Vec::new();
        self.for_each_within(point, radius, |photon, _| found.push(photon));
        found
    }

    /// Depth of leaves, root has depth 1.
    pub fn depth_statistics(&self) -> Stats {
        let Some(root) = self.root else {
            return Stats::default();
        };
        let mut stats = Stats::default();
        let mut stack = vec![(root, 1usize)];
        while let Some((index, depth)) = stack.pop() {
            match self.nodes[index].content {
                PhotonNodeContent::Inner { left, right } => {
                    stack.extend([left, right].into_iter().flatten().map(|i| (i, depth + 1)))
                }
                PhotonNodeContent::Leaf { .. } => stats.add_sample(depth),
            }
        }
        stats
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        geometry::{WorldVector, test::world_point},
        photon_map::BounceKind,
        util::{Color, ColorExt as _},
    };
    use assert2::assert;
    use test_strategy::proptest;

    fn photon_at(position: WorldPoint, id: usize) -> Photon {
        Photon {
            color: Color::gray(1.0),
            position,
            incoming: -WorldVector::y(),
            intensity: id as FloatType,
            kind: BounceKind::Diffuse,
        }
    }

    fn tree(points: &[WorldPoint]) -> PhotonTree {
        PhotonTree::build(
            points
                .iter()
                .enumerate()
                .map(|(i, p)| photon_at(*p, i))
                .collect(),
        )
    }

    /// Identifies photons by their intensity.
    fn ids(photons: &[&Photon]) -> Vec<usize> {
        let mut ids: Vec<usize> = photons.iter().map(|p| p.intensity as usize).collect();
        ids.sort();
        ids
    }

    #[proptest]
    fn range_query_matches_linear_scan(
        #[strategy(proptest::collection::vec(world_point(), 0..300))] points: Vec<WorldPoint>,
        #[strategy(world_point())] center: WorldPoint,
        #[strategy(0.0f32..8.0)] radius: FloatType,
    ) {
        let tree = tree(&points);
        let found = ids(&tree.within(&center, radius));

        let expected: Vec<usize> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| (*p - center).norm_squared() <= radius * radius)
            .map(|(i, _)| i)
            .collect();

        assert!(found == expected);
    }

    #[proptest]
    fn every_photon_is_found_at_its_position(
        #[strategy(proptest::collection::vec(world_point(), 1..200))] points: Vec<WorldPoint>,
    ) {
        let tree = tree(&points);
        assert!(tree.len() == points.len());
        for (i, p) in points.iter().enumerate() {
            assert!(ids(&tree.within(p, 0.0)).contains(&i));
        }
    }

    #[test]
    fn identical_positions_terminate() {
        let points = vec![WorldPoint::new(1.0, 2.0, 3.0); 100];
        let tree = tree(&points);
        assert!(tree.nodes.len() == 1);
        assert!(tree.within(&points[0], 0.1).len() == 100);
    }

    #[test]
    fn empty_tree() {
        let tree = PhotonTree::build(Vec::new());
        assert!(tree.is_empty());
        assert!(tree.within(&WorldPoint::origin(), 100.0).is_empty());
        assert!(tree.depth_statistics().count == 0);
    }

    #[test]
    fn leaves_respect_size_limit() {
        let points: Vec<WorldPoint> = (0..1000)
            .map(|i| WorldPoint::new((i % 10) as f32, ((i / 10) % 10) as f32, (i / 100) as f32))
            .collect();
        let tree = tree(&points);
        for node in tree.nodes.iter() {
            if let PhotonNodeContent::Leaf { count, .. } = node.content {
                assert!(count <= PHOTON_LEAF_SIZE);
            }
        }
    }
}
