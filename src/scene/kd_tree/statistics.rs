use crate::util::Stats;

use super::{KdNodeIdx, KdTree, NodeContent};

impl KdTree {
    /// Logs depth and leaf fill statistics.
    pub fn log_statistics(&self) {
        log::debug!("KD-tree depth: {}", self.depth_statistics());
        log::debug!("KD-tree leaf faces: {}", self.leaf_fill_statistics());
        log::debug!(
            "KD-tree face references: {} in {} nodes",
            self.leaf_faces.len(),
            self.nodes.len()
        );
    }

    /// Depths of all leaves, root has depth 1.
    pub fn depth_statistics(&self) -> Stats {
        self.root
            .map(|root| self.depth_statistics_recursive(root))
            .unwrap_or_default()
    }

    fn depth_statistics_recursive(&self, node: KdNodeIdx) -> Stats {
        let NodeContent::Inner { left, right } = self.nodes[node].content else {
            return Stats::new_single(1);
        };

        let mut ret = [left, right]
            .into_iter()
            .flatten()
            .map(|child| self.depth_statistics_recursive(child))
            .reduce(|a, b| a.merge(&b))
            .unwrap_or_default();

        ret.min += 1;
        ret.max += 1;
        ret.avg += 1.0;

        ret
    }

    /// Number of faces referenced by each leaf.
    pub fn leaf_fill_statistics(&self) -> Stats {
        self.nodes
            .iter()
            .filter_map(|node| match node.content {
                NodeContent::Leaf { count, .. } => Some(count),
                NodeContent::Inner { .. } => None,
            })
            .collect()
    }
}
