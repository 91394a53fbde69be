//! Tree growth engine.
//!
//! [`SingleTreeTrainer`] grows one regression tree from a dataset using
//! the configured criterion, split finder, and pruner. Two growth paths
//! produce identical trees:
//!
//! - a recursive path that partitions the sample-index subset in place
//!   and forks both children with `rayon::join` near the root, and
//! - a task-queue path where a fixed worker pool drains a channel of
//!   node tasks, records per-node results, and the owned tree is
//!   assembled once the queue runs dry.
//!
//! The queue path is chosen for datasets above the task-queue threshold
//! when more than one worker thread is available.

use crate::config::TreeConfig;
use crate::core::constants::{
    MAX_QUEUE_WORKERS, PARALLEL_RECURSION_CHILD, PARALLEL_RECURSION_DEPTH,
    PARALLEL_RECURSION_NODE, PARALLEL_THRESHOLD, TASK_QUEUE_THRESHOLD,
};
use crate::core::error::{Result, TreeError};
use crate::core::types::PrunerKind;
use crate::dataset::Dataset;
use crate::tree::criterion::{create_criterion, Criterion};
use crate::tree::node::{Node, NodeKind, TreeStats};
use crate::tree::pruner::{create_pruner, MinGainPolicy};
use crate::tree::split::{create_finder, Split, SplitFinder};
use crossbeam_channel::{unbounded, Receiver, Sender};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trains and holds a single regression tree.
pub struct SingleTreeTrainer {
    config: TreeConfig,
    criterion: Box<dyn Criterion>,
    finder: Box<dyn SplitFinder>,
    min_gain: Option<MinGainPolicy>,
    validation: Option<Dataset>,
    root: Option<Node>,
}

impl SingleTreeTrainer {
    pub fn new(config: TreeConfig) -> Result<Self> {
        config.validate()?;
        let criterion = create_criterion(config.criterion);
        let finder = create_finder(config.split_method, config.seed);
        let min_gain = match config.pruner {
            PrunerKind::MinGain => Some(MinGainPolicy::new(config.pruner_param)),
            _ => None,
        };
        Ok(SingleTreeTrainer {
            config,
            criterion,
            finder,
            min_gain,
            validation: None,
            root: None,
        })
    }

    /// Attach a held-out set for reduced-error pruning.
    pub fn with_validation(mut self, validation: Dataset) -> Self {
        self.validation = Some(validation);
        self
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Grow the tree, then apply the configured pruner.
    pub fn train(&mut self, dataset: &Dataset) -> Result<()> {
        let n = dataset.num_rows();
        let threads = self.config.effective_threads();
        // Histogram finders precompute boundaries for the dataset they
        // first see; rebuild so retraining never reuses stale ones.
        self.finder = create_finder(self.config.split_method, self.config.seed);
        let ctx = GrowContext {
            dataset,
            criterion: self.criterion.as_ref(),
            finder: self.finder.as_ref(),
            max_depth: self.config.max_depth,
            min_samples_leaf: self.config.min_samples_leaf,
            min_gain: self.min_gain,
        };

        let mut root = if n > TASK_QUEUE_THRESHOLD && threads > 1 {
            log::debug!(
                "growing via task queue: {} samples, {} workers",
                n,
                threads.min(MAX_QUEUE_WORKERS)
            );
            grow_with_queue(&ctx, threads.min(MAX_QUEUE_WORKERS))?
        } else {
            log::debug!("growing recursively: {} samples", n);
            let mut indices = dataset.all_indices();
            grow_recursive(&ctx, &mut indices, 0)
        };

        let pruner = create_pruner(
            self.config.pruner,
            self.config.pruner_param,
            self.validation.clone(),
        );
        pruner.prune(&mut root);

        let stats = root.stats();
        log::info!(
            "trained tree: {} nodes, {} leaves, depth {} ({} criterion, {} finder)",
            stats.num_nodes,
            stats.num_leaves,
            stats.depth,
            self.criterion.name(),
            self.finder.name()
        );
        self.root = Some(root);
        Ok(())
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.as_ref()
    }

    /// Deep copy of the trained tree, detached from the trainer.
    pub fn tree(&self) -> Option<Node> {
        self.root.clone()
    }

    pub fn predict(&self, sample: &[f64]) -> Result<f64> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| TreeError::prediction("tree has not been trained"))?;
        Ok(root.predict(sample))
    }

    pub fn predict_batch(&self, dataset: &Dataset) -> Result<Vec<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| TreeError::prediction("tree has not been trained"))?;
        Ok(dataset
            .features()
            .outer_iter()
            .map(|row| {
                let mut node = root;
                while let NodeKind::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } = &node.kind
                {
                    node = if row[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
                match node.kind {
                    NodeKind::Leaf { prediction } => prediction,
                    NodeKind::Internal { .. } => unreachable!(),
                }
            })
            .collect())
    }

    /// Predict a flat row-major buffer of samples.
    pub fn predict_rows(&self, data: &[f64], row_length: usize) -> Result<Vec<f64>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| TreeError::prediction("tree has not been trained"))?;
        if row_length == 0 || data.len() % row_length != 0 {
            return Err(TreeError::prediction(format!(
                "buffer of {} values is not a multiple of row length {}",
                data.len(),
                row_length
            )));
        }
        Ok(data.chunks_exact(row_length).map(|row| root.predict(row)).collect())
    }

    /// `(mse, mae)` of the trained tree on a dataset, parallel over rows
    /// past the serial threshold.
    pub fn evaluate(&self, dataset: &Dataset) -> Result<(f64, f64)> {
        let predictions = self.predict_batch(dataset)?;
        let n = predictions.len();
        if n == 0 {
            return Err(TreeError::prediction("empty evaluation set"));
        }
        let residual = |(i, p): (usize, &f64)| {
            let d = dataset.target(i) - p;
            (d * d, d.abs())
        };
        let add = |a: (f64, f64), b: (f64, f64)| (a.0 + b.0, a.1 + b.1);
        let (sq, abs) = if n >= PARALLEL_THRESHOLD {
            predictions
                .par_iter()
                .enumerate()
                .map(|(i, p)| residual((i, p)))
                .reduce(|| (0.0, 0.0), add)
        } else {
            predictions
                .iter()
                .enumerate()
                .map(residual)
                .fold((0.0, 0.0), add)
        };
        Ok((sq / n as f64, abs / n as f64))
    }

    pub fn stats(&self) -> Option<TreeStats> {
        self.root.as_ref().map(Node::stats)
    }
}

/// Shared, immutable state for one growth run.
struct GrowContext<'a> {
    dataset: &'a Dataset,
    criterion: &'a dyn Criterion,
    finder: &'a dyn SplitFinder,
    max_depth: usize,
    min_samples_leaf: usize,
    min_gain: Option<MinGainPolicy>,
}

impl GrowContext<'_> {
    /// Weighted subset mean; the leaf prediction and node mean.
    fn subset_mean(&self, indices: &[usize]) -> f64 {
        if self.dataset.has_weights() {
            let mut sum = 0.0;
            let mut weight = 0.0;
            for &i in indices {
                let w = self.dataset.weight(i);
                sum += w * self.dataset.target(i);
                weight += w;
            }
            if weight > 0.0 {
                sum / weight
            } else {
                0.0
            }
        } else {
            indices.iter().map(|&i| self.dataset.target(i)).sum::<f64>() / indices.len() as f64
        }
    }

    /// Split proposal for a node, or `None` when a stopping rule fires.
    /// Child minimum-size violations are checked by the caller after
    /// partitioning.
    fn decide(&self, indices: &[usize], depth: usize, metric: f64) -> Option<Split> {
        let n = indices.len();
        if depth >= self.max_depth || n < 2 * self.min_samples_leaf || n < 2 {
            return None;
        }
        let split = self
            .finder
            .find_best_split(self.dataset, indices, metric, self.criterion)?;
        if split.gain <= 0.0 {
            return None;
        }
        if let Some(policy) = &self.min_gain {
            if !policy.approves(split.gain) {
                return None;
            }
        }
        Some(split)
    }
}

/// Stable partition of an index slice: left block keeps all samples with
/// `value <= threshold` in their original order. Returns the boundary.
fn partition_indices(
    dataset: &Dataset,
    indices: &mut [usize],
    feature: usize,
    threshold: f64,
) -> usize {
    let mut left = Vec::with_capacity(indices.len());
    let mut right = Vec::with_capacity(indices.len());
    for &i in indices.iter() {
        if dataset.value(i, feature) <= threshold {
            left.push(i);
        } else {
            right.push(i);
        }
    }
    let mid = left.len();
    indices[..mid].copy_from_slice(&left);
    indices[mid..].copy_from_slice(&right);
    mid
}

fn grow_recursive(ctx: &GrowContext<'_>, indices: &mut [usize], depth: usize) -> Node {
    let n = indices.len();
    let metric = ctx.criterion.score(ctx.dataset.targets(), indices);
    let mean = ctx.subset_mean(indices);

    let split = match ctx.decide(indices, depth, metric) {
        Some(split) => split,
        None => return Node::leaf(mean, mean, n, metric),
    };

    let mid = partition_indices(ctx.dataset, indices, split.feature, split.threshold);
    if mid < ctx.min_samples_leaf || n - mid < ctx.min_samples_leaf {
        return Node::leaf(mean, mean, n, metric);
    }

    let (left_slice, right_slice) = indices.split_at_mut(mid);
    let fork = depth <= PARALLEL_RECURSION_DEPTH
        && n > PARALLEL_RECURSION_NODE
        && left_slice.len() > PARALLEL_RECURSION_CHILD
        && right_slice.len() > PARALLEL_RECURSION_CHILD;

    let (left, right) = if fork {
        rayon::join(
            || grow_recursive(ctx, left_slice, depth + 1),
            || grow_recursive(ctx, right_slice, depth + 1),
        )
    } else {
        (
            grow_recursive(ctx, left_slice, depth + 1),
            grow_recursive(ctx, right_slice, depth + 1),
        )
    };

    Node::internal(split.feature, split.threshold, mean, n, metric, left, right)
}

/// A unit of work on the queue: one node's subset awaiting a decision.
struct Task {
    node_id: usize,
    indices: Vec<usize>,
    depth: usize,
}

enum Message {
    Work(Task),
    Shutdown,
}

/// Flat record of a decided node, linked to its children by id.
enum NodeRecord {
    Leaf {
        prediction: f64,
        mean: f64,
        samples: usize,
        metric: f64,
    },
    Internal {
        feature: usize,
        threshold: f64,
        mean: f64,
        samples: usize,
        metric: f64,
        left: usize,
        right: usize,
    },
}

/// Grow via a shared task queue. Workers pull node tasks, emit records,
/// and enqueue child tasks; an in-flight counter detects the moment the
/// queue is drained and every worker is idle, at which point shutdown
/// messages unblock the pool.
fn grow_with_queue(ctx: &GrowContext<'_>, workers: usize) -> Result<Node> {
    let (sender, receiver): (Sender<Message>, Receiver<Message>) = unbounded();
    let next_id = AtomicUsize::new(1);
    let in_flight = AtomicUsize::new(1);

    sender
        .send(Message::Work(Task {
            node_id: 0,
            indices: ctx.dataset.all_indices(),
            depth: 0,
        }))
        .map_err(|_| TreeError::training("task queue closed before growth started"))?;

    let records: Vec<(usize, NodeRecord)> = std::thread::scope(|scope| {
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let receiver = receiver.clone();
            let sender = sender.clone();
            let next_id = &next_id;
            let in_flight = &in_flight;
            handles.push(scope.spawn(move || {
                let mut local: Vec<(usize, NodeRecord)> = Vec::new();
                while let Ok(message) = receiver.recv() {
                    let task = match message {
                        Message::Work(task) => task,
                        Message::Shutdown => break,
                    };
                    let (record, children) = process_task(ctx, &task, next_id);
                    local.push((task.node_id, record));

                    if let Some((left_task, right_task)) = children {
                        in_flight.fetch_add(2, Ordering::SeqCst);
                        let _ = sender.send(Message::Work(left_task));
                        let _ = sender.send(Message::Work(right_task));
                    }
                    if in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
                        for _ in 0..workers {
                            let _ = sender.send(Message::Shutdown);
                        }
                    }
                }
                local
            }));
        }
        drop(sender);

        let mut all = Vec::new();
        for handle in handles {
            if let Ok(local) = handle.join() {
                all.extend(local);
            }
        }
        all
    });

    let map: HashMap<usize, NodeRecord> = records.into_iter().collect();
    assemble(&map, 0)
}

/// Decide one node: emit its record and, for splits, the child tasks.
fn process_task(
    ctx: &GrowContext<'_>,
    task: &Task,
    next_id: &AtomicUsize,
) -> (NodeRecord, Option<(Task, Task)>) {
    let indices = &task.indices;
    let n = indices.len();
    let metric = ctx.criterion.score(ctx.dataset.targets(), indices);
    let mean = ctx.subset_mean(indices);

    let leaf = NodeRecord::Leaf {
        prediction: mean,
        mean,
        samples: n,
        metric,
    };

    let split = match ctx.decide(indices, task.depth, metric) {
        Some(split) => split,
        None => return (leaf, None),
    };

    let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
        .iter()
        .copied()
        .partition(|&i| ctx.dataset.value(i, split.feature) <= split.threshold);
    if left_indices.len() < ctx.min_samples_leaf || right_indices.len() < ctx.min_samples_leaf {
        return (leaf, None);
    }

    let left_id = next_id.fetch_add(2, Ordering::SeqCst);
    let right_id = left_id + 1;
    let record = NodeRecord::Internal {
        feature: split.feature,
        threshold: split.threshold,
        mean,
        samples: n,
        metric,
        left: left_id,
        right: right_id,
    };
    let children = (
        Task {
            node_id: left_id,
            indices: left_indices,
            depth: task.depth + 1,
        },
        Task {
            node_id: right_id,
            indices: right_indices,
            depth: task.depth + 1,
        },
    );
    (record, Some(children))
}

/// Rebuild the owned tree from the flat id-linked records.
fn assemble(map: &HashMap<usize, NodeRecord>, id: usize) -> Result<Node> {
    let record = map
        .get(&id)
        .ok_or_else(|| TreeError::internal(format!("missing node record {}", id)))?;
    match *record {
        NodeRecord::Leaf {
            prediction,
            mean,
            samples,
            metric,
        } => Ok(Node::leaf(prediction, mean, samples, metric)),
        NodeRecord::Internal {
            feature,
            threshold,
            mean,
            samples,
            metric,
            left,
            right,
        } => {
            let left_node = assemble(map, left)?;
            let right_node = assemble(map, right)?;
            Ok(Node::internal(
                feature, threshold, mean, samples, metric, left_node, right_node,
            ))
        }
    }
}
