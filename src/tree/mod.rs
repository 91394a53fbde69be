//! Decision-tree construction: nodes, criteria, split search,
//! histograms, pruning, and the growth engine.

pub mod criterion;
pub mod grower;
pub mod histogram;
pub mod node;
pub mod pruner;
pub mod split;

pub use grower::SingleTreeTrainer;
pub use node::{Node, NodeKind, TreeStats};
pub use split::Split;
