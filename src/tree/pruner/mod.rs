//! Tree pruning.
//!
//! Post-pruners rewrite a grown tree bottom-up; the min-gain rule is a
//! policy the growth engine consults while splitting, not a rewrite
//! pass. All pruners are idempotent: a second application leaves the
//! tree unchanged.

use crate::core::types::PrunerKind;
use crate::dataset::Dataset;
use crate::tree::node::{Node, NodeKind};

/// Post-growth tree rewrite.
pub trait Pruner: Send + Sync {
    fn prune(&self, root: &mut Node);
    fn name(&self) -> &'static str;
}

/// Gain threshold consulted during growth; splits below it are refused.
#[derive(Debug, Clone, Copy)]
pub struct MinGainPolicy {
    min_gain: f64,
}

impl MinGainPolicy {
    pub fn new(min_gain: f64) -> Self {
        MinGainPolicy { min_gain }
    }

    pub fn approves(&self, gain: f64) -> bool {
        gain >= self.min_gain
    }
}

/// Instantiate the pruner selected by configuration. Reduced-error
/// pruning degrades to no pruning when no validation set was supplied.
pub fn create_pruner(
    kind: PrunerKind,
    param: f64,
    validation: Option<Dataset>,
) -> Box<dyn Pruner> {
    match kind {
        PrunerKind::None | PrunerKind::MinGain => Box::new(NoPruner),
        PrunerKind::CostComplexity => Box::new(CostComplexityPruner::new(param)),
        PrunerKind::ReducedError => match validation {
            Some(validation) => Box::new(ReducedErrorPruner::new(validation)),
            None => {
                log::warn!("reduced-error pruning requires a validation set; skipping pruning");
                Box::new(NoPruner)
            }
        },
    }
}

pub struct NoPruner;

impl Pruner for NoPruner {
    fn prune(&self, _root: &mut Node) {}

    fn name(&self) -> &'static str {
        "none"
    }
}

/// CART cost-complexity pruning: an internal node is collapsed when the
/// cost of a single leaf, `metric * samples + alpha`, does not exceed
/// the subtree cost, `sum of leaf errors + alpha * leaf count`.
pub struct CostComplexityPruner {
    alpha: f64,
}

impl CostComplexityPruner {
    pub fn new(alpha: f64) -> Self {
        CostComplexityPruner { alpha }
    }

    /// Prune bottom-up; returns the subtree's total leaf error.
    fn prune_rec(&self, node: &mut Node) -> f64 {
        let (left_err, right_err, leaves) = match &mut node.kind {
            NodeKind::Leaf { .. } => return node.metric * node.samples as f64,
            NodeKind::Internal { left, right, .. } => {
                let l = self.prune_rec(left);
                let r = self.prune_rec(right);
                (l, r, left.num_leaves() + right.num_leaves())
            }
        };

        let subtree_error = left_err + right_err;
        let leaf_cost = node.metric * node.samples as f64 + self.alpha;
        let subtree_cost = subtree_error + self.alpha * leaves as f64;

        if leaf_cost <= subtree_cost {
            node.collapse_to_leaf();
            node.metric * node.samples as f64
        } else {
            subtree_error
        }
    }
}

impl Pruner for CostComplexityPruner {
    fn prune(&self, root: &mut Node) {
        self.prune_rec(root);
    }

    fn name(&self) -> &'static str {
        "cost_complexity"
    }
}

/// Reduced-error pruning: collapse a subtree whenever the collapsed
/// leaf does not validate worse than the subtree on held-out data.
pub struct ReducedErrorPruner {
    validation: Dataset,
}

impl ReducedErrorPruner {
    pub fn new(validation: Dataset) -> Self {
        ReducedErrorPruner { validation }
    }

    /// Validation MSE of a subtree, routing every held-out sample from
    /// the subtree's root.
    fn validate(&self, node: &Node) -> f64 {
        let n = self.validation.num_rows();
        let mut mse = 0.0;
        for row in 0..n {
            let sample = self.validation.features().row(row);
            let mut cur = node;
            while let NodeKind::Internal {
                feature,
                threshold,
                left,
                right,
            } = &cur.kind
            {
                cur = if sample[*feature] <= *threshold {
                    left
                } else {
                    right
                };
            }
            let prediction = match cur.kind {
                NodeKind::Leaf { prediction } => prediction,
                NodeKind::Internal { .. } => unreachable!(),
            };
            let diff = self.validation.target(row) - prediction;
            mse += diff * diff;
        }
        mse / n as f64
    }

    fn prune_rec(&self, node: &mut Node) {
        if node.is_leaf() {
            return;
        }
        if let NodeKind::Internal { left, right, .. } = &mut node.kind {
            self.prune_rec(left);
            self.prune_rec(right);
        }

        let mse_subtree = self.validate(node);
        let backup = node.kind.clone();
        node.collapse_to_leaf();
        let mse_pruned = self.validate(node);

        if mse_pruned > mse_subtree {
            node.kind = backup;
        }
    }
}

impl Pruner for ReducedErrorPruner {
    fn prune(&self, root: &mut Node) {
        if self.validation.num_rows() == 0 {
            return;
        }
        self.prune_rec(root);
    }

    fn name(&self) -> &'static str {
        "reduced_error"
    }
}
