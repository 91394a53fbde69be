//! Tree node representation.
//!
//! A node is either a leaf carrying a prediction or an internal split
//! owning its two children. The left child takes samples whose feature
//! value is less than or equal to the threshold.

use crate::core::types::FeatureIndex;
use serde::{Deserialize, Serialize};

/// Payload distinguishing leaves from internal splits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    /// Terminal node.
    Leaf {
        /// Value returned for samples routed here.
        prediction: f64,
    },
    /// Binary split on one feature.
    Internal {
        feature: FeatureIndex,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// A single tree node.
///
/// Every node records how many training samples reached it and its
/// impurity at growth time; pruners use both to weigh subtrees against
/// collapsed leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Training samples that reached this node.
    pub samples: usize,
    /// Impurity of those samples under the training criterion.
    pub metric: f64,
    /// Mean target of those samples; the prediction this node would
    /// make if collapsed to a leaf.
    pub node_mean: f64,
    pub kind: NodeKind,
}

impl Node {
    /// Construct a leaf.
    pub fn leaf(prediction: f64, node_mean: f64, samples: usize, metric: f64) -> Self {
        Node {
            samples,
            metric,
            node_mean,
            kind: NodeKind::Leaf { prediction },
        }
    }

    /// Construct an internal node owning both children.
    pub fn internal(
        feature: FeatureIndex,
        threshold: f64,
        node_mean: f64,
        samples: usize,
        metric: f64,
        left: Node,
        right: Node,
    ) -> Self {
        Node {
            samples,
            metric,
            node_mean,
            kind: NodeKind::Internal {
                feature,
                threshold,
                left: Box::new(left),
                right: Box::new(right),
            },
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self.kind, NodeKind::Leaf { .. })
    }

    /// Route a sample down the subtree and return the leaf prediction.
    pub fn predict(&self, sample: &[f64]) -> f64 {
        let mut node = self;
        loop {
            match &node.kind {
                NodeKind::Leaf { prediction } => return *prediction,
                NodeKind::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    /// Number of leaves in the subtree.
    pub fn num_leaves(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf { .. } => 1,
            NodeKind::Internal { left, right, .. } => left.num_leaves() + right.num_leaves(),
        }
    }

    /// Total node count of the subtree, this node included.
    pub fn num_nodes(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf { .. } => 1,
            NodeKind::Internal { left, right, .. } => 1 + left.num_nodes() + right.num_nodes(),
        }
    }

    /// Height of the subtree; a lone leaf has depth 0.
    pub fn depth(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf { .. } => 0,
            NodeKind::Internal { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Sum over leaves of `metric * samples`, the subtree training error
    /// used by cost-complexity pruning.
    pub fn subtree_error(&self) -> f64 {
        match &self.kind {
            NodeKind::Leaf { .. } => self.metric * self.samples as f64,
            NodeKind::Internal { left, right, .. } => {
                left.subtree_error() + right.subtree_error()
            }
        }
    }

    /// Collapse the subtree into a leaf predicting the stored node mean.
    pub fn collapse_to_leaf(&mut self) {
        self.kind = NodeKind::Leaf {
            prediction: self.node_mean,
        };
    }
}

/// Structural summary of a grown tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeStats {
    pub num_nodes: usize,
    pub num_leaves: usize,
    pub depth: usize,
}

impl Node {
    pub fn stats(&self) -> TreeStats {
        TreeStats {
            num_nodes: self.num_nodes(),
            num_leaves: self.num_leaves(),
            depth: self.depth(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> Node {
        // x0 <= 2.0 -> 1.0, else (x1 <= 0.5 -> 2.0, else 3.0)
        Node::internal(
            0,
            2.0,
            2.0,
            10,
            1.0,
            Node::leaf(1.0, 1.0, 4, 0.0),
            Node::internal(
                1,
                0.5,
                2.5,
                6,
                0.5,
                Node::leaf(2.0, 2.0, 3, 0.0),
                Node::leaf(3.0, 3.0, 3, 0.0),
            ),
        )
    }

    #[test]
    fn test_predict_routing() {
        let tree = sample_tree();
        assert_eq!(tree.predict(&[1.0, 0.0]), 1.0);
        assert_eq!(tree.predict(&[2.0, 0.0]), 1.0); // boundary goes left
        assert_eq!(tree.predict(&[3.0, 0.4]), 2.0);
        assert_eq!(tree.predict(&[3.0, 0.6]), 3.0);
    }

    #[test]
    fn test_stats() {
        let tree = sample_tree();
        let stats = tree.stats();
        assert_eq!(stats.num_nodes, 5);
        assert_eq!(stats.num_leaves, 3);
        assert_eq!(stats.depth, 2);
    }

    #[test]
    fn test_collapse() {
        let mut tree = sample_tree();
        tree.collapse_to_leaf();
        assert!(tree.is_leaf());
        assert_eq!(tree.predict(&[100.0, 100.0]), 2.0);
        assert_eq!(tree.samples, 10);
    }

    #[test]
    fn test_subtree_error() {
        let tree = sample_tree();
        assert_eq!(tree.subtree_error(), 0.0);
        assert_eq!(
            Node::leaf(1.0, 1.0, 4, 0.5).subtree_error(),
            2.0
        );
    }

    #[test]
    fn test_clone_is_deep() {
        let tree = sample_tree();
        let mut copy = tree.clone();
        copy.collapse_to_leaf();
        assert!(!tree.is_leaf());
        assert_eq!(tree.num_leaves(), 3);
    }

    #[test]
    fn test_serialization_round_trip() {
        let tree = sample_tree();
        let json = serde_json::to_string(&tree).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert_eq!(tree, back);
    }
}
