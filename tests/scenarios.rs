//! End-to-end training scenarios and engine-wide properties.

use approx::assert_relative_eq;
use cartree::tree::criterion::create_criterion;
use cartree::tree::node::NodeKind;
use cartree::{
    CriterionKind, Dataset, Node, PrunerKind, SingleTreeTrainer, SplitMethod, TreeConfigBuilder,
};
use proptest::prelude::*;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Single separating feature: y = 1 for the low cluster, 5 for the high.
fn separable_dataset() -> Dataset {
    init_logging();
    let data = vec![1.0, 2.0, 3.0, 4.0, 10.0, 11.0, 12.0, 13.0];
    let targets = vec![1.0, 1.0, 1.0, 1.0, 5.0, 5.0, 5.0, 5.0];
    Dataset::from_rows(data, 1, targets).unwrap()
}

fn leaf_predictions(node: &Node, out: &mut Vec<f64>) {
    match &node.kind {
        NodeKind::Leaf { prediction } => out.push(*prediction),
        NodeKind::Internal { left, right, .. } => {
            leaf_predictions(left, out);
            leaf_predictions(right, out);
        }
    }
}

#[test]
fn exhaustive_mse_separates_two_groups() {
    let dataset = separable_dataset();
    let config = TreeConfigBuilder::new()
        .criterion(CriterionKind::Mse)
        .split_method(SplitMethod::Exhaustive)
        .build()
        .unwrap();
    let mut trainer = SingleTreeTrainer::new(config).unwrap();
    trainer.train(&dataset).unwrap();

    let root = trainer.root().unwrap();
    assert_eq!(root.num_leaves(), 2);
    assert_eq!(root.depth(), 1);

    let mut leaves = Vec::new();
    leaf_predictions(root, &mut leaves);
    leaves.sort_by(f64::total_cmp);
    assert_eq!(leaves, vec![1.0, 5.0]);
    let (mse, mae) = trainer.evaluate(&dataset).unwrap();
    assert_relative_eq!(mse, 0.0, epsilon = 1e-12);
    assert_relative_eq!(mae, 0.0, epsilon = 1e-12);
}

#[test]
fn histogram_reaches_same_predictions_as_exhaustive() {
    let dataset = separable_dataset();
    let config = TreeConfigBuilder::new()
        .split_method(SplitMethod::HistogramEw { bins: 4 })
        .build()
        .unwrap();
    let mut trainer = SingleTreeTrainer::new(config).unwrap();
    trainer.train(&dataset).unwrap();

    let root = trainer.root().unwrap();
    if let NodeKind::Internal { threshold, .. } = &root.kind {
        // the chosen boundary must fall in the gap between the clusters
        assert!(*threshold > 4.0 && *threshold < 10.0);
    } else {
        panic!("expected a split at the root");
    }

    for (sample, expected) in [([2.0], 1.0), ([12.0], 5.0)] {
        let p = trainer.predict(&sample).unwrap();
        assert_relative_eq!(p, expected, epsilon = 1e-6);
    }
}

#[test]
fn min_samples_leaf_larger_than_dataset_yields_single_leaf() {
    let data: Vec<f64> = (0..10).map(|i| i as f64).collect();
    let targets: Vec<f64> = (0..10).map(|i| i as f64 * 2.0).collect();
    let dataset = Dataset::from_rows(data, 1, targets).unwrap();

    let config = TreeConfigBuilder::new()
        .min_samples_leaf(100)
        .build()
        .unwrap();
    let mut trainer = SingleTreeTrainer::new(config).unwrap();
    trainer.train(&dataset).unwrap();

    let root = trainer.root().unwrap();
    assert!(root.is_leaf());
    assert_relative_eq!(trainer.predict(&[3.0]).unwrap(), 9.0, epsilon = 1e-12);
}

#[test]
fn cost_complexity_alpha_zero_changes_nothing() {
    let dataset = separable_dataset();

    let grow = |pruner: PrunerKind, param: f64| {
        let config = TreeConfigBuilder::new()
            .pruner(pruner)
            .pruner_param(param)
            .build()
            .unwrap();
        let mut trainer = SingleTreeTrainer::new(config).unwrap();
        trainer.train(&dataset).unwrap();
        trainer.tree().unwrap()
    };

    let unpruned = grow(PrunerKind::None, 0.0);
    let pruned = grow(PrunerKind::CostComplexity, 0.0);
    assert_eq!(unpruned, pruned);
}

#[test]
fn cost_complexity_large_alpha_collapses_tree() {
    let dataset = separable_dataset();
    let config = TreeConfigBuilder::new()
        .pruner(PrunerKind::CostComplexity)
        .pruner_param(1e9)
        .build()
        .unwrap();
    let mut trainer = SingleTreeTrainer::new(config).unwrap();
    trainer.train(&dataset).unwrap();
    assert!(trainer.root().unwrap().is_leaf());
}

#[test]
fn reduced_error_pruning_uses_validation_set() {
    // Training data supports a split; validation data contradicts it.
    let train = separable_dataset();
    let validation = Dataset::from_rows(
        vec![2.0, 3.0, 11.0, 12.0],
        1,
        vec![3.0, 3.0, 3.0, 3.0],
    )
    .unwrap();

    let config = TreeConfigBuilder::new()
        .pruner(PrunerKind::ReducedError)
        .build()
        .unwrap();
    let mut trainer = SingleTreeTrainer::new(config)
        .unwrap()
        .with_validation(validation);
    trainer.train(&train).unwrap();
    assert!(trainer.root().unwrap().is_leaf());
}

#[test]
fn reduced_error_without_validation_trains_unpruned() {
    let dataset = separable_dataset();
    let config = TreeConfigBuilder::new()
        .pruner(PrunerKind::ReducedError)
        .build()
        .unwrap();
    let mut trainer = SingleTreeTrainer::new(config).unwrap();
    trainer.train(&dataset).unwrap();
    assert_eq!(trainer.root().unwrap().num_leaves(), 2);
}

#[test]
fn prediction_is_deterministic() {
    let dataset = separable_dataset();
    let mut trainer = SingleTreeTrainer::new(TreeConfigBuilder::new().build().unwrap()).unwrap();
    trainer.train(&dataset).unwrap();

    let first = trainer.predict(&[6.5]).unwrap();
    for _ in 0..100 {
        assert_eq!(trainer.predict(&[6.5]).unwrap(), first);
    }
}

#[test]
fn retraining_is_deterministic() {
    let data: Vec<f64> = (0..200).map(|i| ((i * 37) % 97) as f64).collect();
    let targets: Vec<f64> = (0..200).map(|i| ((i * 11) % 13) as f64).collect();
    let dataset = Dataset::from_rows(data, 1, targets).unwrap();

    let tree = |threads: usize| {
        let config = TreeConfigBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap();
        let mut trainer = SingleTreeTrainer::new(config).unwrap();
        trainer.train(&dataset).unwrap();
        trainer.tree().unwrap()
    };

    assert_eq!(tree(1), tree(1));
    assert_eq!(tree(1), tree(4));
}

#[test]
fn criteria_scores_are_non_negative() {
    let targets: Vec<f64> = vec![-3.0, -1.0, 0.0, 0.5, 2.0, 100.0];
    let indices: Vec<usize> = (0..targets.len()).collect();
    for kind in [
        CriterionKind::Mse,
        CriterionKind::Mae,
        CriterionKind::Huber { delta: 1.0 },
        CriterionKind::Quantile { tau: 0.3 },
        CriterionKind::LogCosh,
    ] {
        let criterion = create_criterion(kind);
        for end in 1..=targets.len() {
            let score = criterion.score(&targets, &indices[..end]);
            assert!(
                score >= 0.0,
                "{} produced negative score {}",
                criterion.name(),
                score
            );
        }
    }
}

#[test]
fn trained_tree_survives_serialization() {
    let dataset = separable_dataset();
    let mut trainer = SingleTreeTrainer::new(TreeConfigBuilder::new().build().unwrap()).unwrap();
    trainer.train(&dataset).unwrap();

    let tree = trainer.tree().unwrap();
    let json = serde_json::to_string(&tree).unwrap();
    let back: Node = serde_json::from_str(&json).unwrap();
    assert_eq!(tree, back);
    assert_eq!(back.predict(&[2.0]), 1.0);
}

fn collect_subsets(
    node: &Node,
    dataset: &Dataset,
    indices: Vec<usize>,
    out: &mut Vec<(Vec<usize>, Vec<usize>, Vec<usize>)>,
) {
    if let NodeKind::Internal {
        feature,
        threshold,
        left,
        right,
    } = &node.kind
    {
        let (l, r): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| dataset.value(i, *feature) <= *threshold);
        out.push((indices, l.clone(), r.clone()));
        collect_subsets(left, dataset, l, out);
        collect_subsets(right, dataset, r, out);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every applied split partitions its subset exactly: children are
    /// disjoint, their union is the parent, and counts match the node
    /// sample counts recorded at growth time.
    #[test]
    fn partition_invariant_holds(
        values in prop::collection::vec((0.0_f64..100.0, -50.0_f64..50.0), 8..60)
    ) {
        let data: Vec<f64> = values.iter().map(|(x, _)| *x).collect();
        let targets: Vec<f64> = values.iter().map(|(_, y)| *y).collect();
        let dataset = Dataset::from_rows(data, 1, targets).unwrap();

        let config = TreeConfigBuilder::new().max_depth(4).build().unwrap();
        let mut trainer = SingleTreeTrainer::new(config).unwrap();
        trainer.train(&dataset).unwrap();

        let mut partitions = Vec::new();
        collect_subsets(
            trainer.root().unwrap(),
            &dataset,
            dataset.all_indices(),
            &mut partitions,
        );

        for (parent, left, right) in partitions {
            prop_assert_eq!(left.len() + right.len(), parent.len());
            let mut merged: Vec<usize> = left.iter().chain(right.iter()).copied().collect();
            merged.sort_unstable();
            let mut expected = parent.clone();
            expected.sort_unstable();
            prop_assert_eq!(merged, expected);
            prop_assert!(left.iter().all(|i| !right.contains(i)));
        }
    }

    /// Internal nodes always record strictly smaller weighted child
    /// impurity than their own metric would suggest alone; leaves never
    /// hide a positive-gain exhaustive split above the stopping rules.
    #[test]
    fn internal_nodes_have_positive_gain(
        targets in prop::collection::vec(-10.0_f64..10.0, 8..40)
    ) {
        let data: Vec<f64> = (0..targets.len()).map(|i| i as f64).collect();
        let dataset = Dataset::from_rows(data, 1, targets).unwrap();

        let mut trainer =
            SingleTreeTrainer::new(TreeConfigBuilder::new().build().unwrap()).unwrap();
        trainer.train(&dataset).unwrap();

        fn check(node: &Node) -> bool {
            match &node.kind {
                NodeKind::Leaf { .. } => true,
                NodeKind::Internal { left, right, .. } => {
                    let parent_err = node.metric * node.samples as f64;
                    let child_err = left.metric * left.samples as f64
                        + right.metric * right.samples as f64;
                    child_err < parent_err + 1e-9 && check(left) && check(right)
                }
            }
        }
        prop_assert!(check(trainer.root().unwrap()));
    }

    /// Batch prediction agrees with single-sample prediction.
    #[test]
    fn batch_matches_single_prediction(
        values in prop::collection::vec((0.0_f64..50.0, 0.0_f64..10.0), 10..40)
    ) {
        let data: Vec<f64> = values.iter().map(|(x, _)| *x).collect();
        let targets: Vec<f64> = values.iter().map(|(_, y)| *y).collect();
        let dataset = Dataset::from_rows(data.clone(), 1, targets).unwrap();

        let mut trainer =
            SingleTreeTrainer::new(TreeConfigBuilder::new().build().unwrap()).unwrap();
        trainer.train(&dataset).unwrap();

        let batch = trainer.predict_batch(&dataset).unwrap();
        for (i, x) in data.iter().enumerate() {
            prop_assert_eq!(batch[i], trainer.predict(&[*x]).unwrap());
        }
    }
}
