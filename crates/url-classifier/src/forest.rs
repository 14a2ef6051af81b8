// SPDX-FileCopyrightText: 2025 Semiotic Labs
//
// SPDX-License-Identifier: Apache-2.0

//! Random forest classifier
//!
//! An ensemble of CART trees grown on bootstrap samples with weighted Gini
//! impurity. Class imbalance is corrected by weighting each sample inversely
//! to its class frequency, and every random draw derives from a single seed,
//! so identical data and parameters always yield an identical forest.
//!
//! Trees are stored as flat node arrays in which children always follow their
//! parent. That layout serializes directly into the model bundle and makes
//! structural validation after loading a single pass.

use rand::{Rng, RngCore, SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::{
    classifier::Classifier,
    error::{ClassifierError, ClassifierResult},
    features::FeatureVector,
    labels::ClassId,
};

/// Number of features examined when searching a node split
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`
    Sqrt,
    /// `floor(log2(n_features))`
    Log2,
    /// Every feature
    All,
    /// A fixed number of features, capped at the feature count
    Count(usize),
}

impl MaxFeatures {
    /// Resolve to a concrete feature count for `n_features` columns
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn resolve(self, n_features: usize) -> usize {
        let count = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(count) => count,
        };
        count.clamp(1, n_features.max(1))
    }
}

/// Per-class sample weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// `n_samples / (n_classes * count_c)` for each class `c`
    Balanced,
    /// Every sample weighs 1
    #[serde(rename = "none")]
    Uniform,
}

impl ClassWeight {
    /// Weight of each class given its sample counts
    #[allow(clippy::cast_precision_loss)]
    pub fn weights(self, class_counts: &[usize]) -> Vec<f64> {
        match self {
            ClassWeight::Uniform => vec![1.0; class_counts.len()],
            ClassWeight::Balanced => {
                let total: usize = class_counts.iter().sum();
                let n_classes = class_counts.len() as f64;
                class_counts
                    .iter()
                    .map(|&count| {
                        if count == 0 {
                            0.0
                        } else {
                            total as f64 / (n_classes * count as f64)
                        }
                    })
                    .collect()
            }
        }
    }
}

/// Random forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum tree depth, unlimited when `None`
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs to be split
    pub min_samples_split: usize,
    /// Minimum samples each child of a split must keep
    pub min_samples_leaf: usize,
    /// Features examined per split
    pub max_features: MaxFeatures,
    /// Grow each tree on a bootstrap sample
    pub bootstrap: bool,
    /// Class imbalance correction
    pub class_weight: ClassWeight,
    /// Seed for bootstrap draws and feature sampling
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::Sqrt,
            bootstrap: true,
            class_weight: ClassWeight::Balanced,
            seed: 42,
        }
    }
}

impl ForestParams {
    /// Validate the hyperparameters
    pub fn validate(&self) -> ClassifierResult<()> {
        if self.n_estimators == 0 {
            return Err(ClassifierError::config("n_estimators must be at least 1"));
        }
        if self.min_samples_split < 2 {
            return Err(ClassifierError::config(
                "min_samples_split must be at least 2",
            ));
        }
        if self.min_samples_leaf == 0 {
            return Err(ClassifierError::config("min_samples_leaf must be at least 1"));
        }
        if self.max_depth == Some(0) {
            return Err(ClassifierError::config("max_depth must be at least 1"));
        }
        if self.max_features == MaxFeatures::Count(0) {
            return Err(ClassifierError::config("max_features must be at least 1"));
        }
        Ok(())
    }
}

/// A tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    /// Rows with `row[feature] <= threshold` go left
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    /// Weighted class distribution, normalised to sum to 1
    Leaf { distribution: Vec<f64> },
}

/// A single CART tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    nodes: Vec<Node>,
}

impl DecisionTree {
    /// Class distribution of the leaf `row` lands in
    pub fn predict_proba(&self, row: &[f64]) -> ClassifierResult<&[f64]> {
        let mut index = 0;
        loop {
            match self.nodes.get(index) {
                Some(Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                }) => {
                    let value = row.get(*feature).ok_or_else(|| {
                        ClassifierError::schema(format!(
                            "split on feature {feature} but row has {} features",
                            row.len()
                        ))
                    })?;
                    index = if value <= threshold { *left } else { *right };
                }
                Some(Node::Leaf { distribution }) => return Ok(distribution),
                None => {
                    return Err(ClassifierError::internal(format!(
                        "tree node {index} out of range"
                    )));
                }
            }
        }
    }

    /// Number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Length of the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut deepest = 0;
        for (index, node) in self.nodes.iter().enumerate() {
            if let Node::Split { left, right, .. } = node {
                let parent = depths[index];
                for child in [*left, *right] {
                    if let Some(slot) = depths.get_mut(child) {
                        *slot = parent + 1;
                        deepest = deepest.max(*slot);
                    }
                }
            }
        }
        deepest
    }

    fn validate(&self, n_features: usize, n_classes: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (index, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if *feature >= n_features {
                        return Err(format!(
                            "node {index} splits on feature {feature} of {n_features}"
                        ));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {index} has a non-finite threshold"));
                    }
                    for child in [*left, *right] {
                        if child <= index || child >= self.nodes.len() {
                            return Err(format!("node {index} has invalid child {child}"));
                        }
                    }
                }
                Node::Leaf { distribution } => {
                    if distribution.len() != n_classes {
                        return Err(format!(
                            "leaf {index} has {} classes, expected {n_classes}",
                            distribution.len()
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Ensemble of decision trees voting by averaged leaf probabilities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    n_features: usize,
    n_classes: usize,
    trees: Vec<DecisionTree>,
}

impl RandomForest {
    /// Fit a forest on extracted URL features
    ///
    /// `labels[i]` is the class id of `features[i]`; ids range over
    /// `0..n_classes` and every class must be present.
    pub fn fit(
        features: &[FeatureVector],
        labels: &[ClassId],
        n_classes: usize,
        params: &ForestParams,
    ) -> ClassifierResult<Self> {
        let rows: Vec<Vec<f64>> = features.iter().map(|f| f.to_array().to_vec()).collect();
        Self::fit_rows(&rows, labels, n_classes, params)
    }

    /// Fit a forest on raw numeric rows
    #[instrument(skip(rows, labels, params), fields(rows = rows.len(), n_estimators = params.n_estimators))]
    pub fn fit_rows(
        rows: &[Vec<f64>],
        labels: &[ClassId],
        n_classes: usize,
        params: &ForestParams,
    ) -> ClassifierResult<Self> {
        params.validate()?;

        if rows.len() != labels.len() {
            return Err(ClassifierError::data_shape(format!(
                "{} feature rows but {} labels",
                rows.len(),
                labels.len()
            )));
        }
        let Some(first) = rows.first() else {
            return Err(ClassifierError::data_shape("cannot fit on an empty dataset"));
        };
        let n_features = first.len();
        if n_features == 0 {
            return Err(ClassifierError::data_shape("feature rows have no columns"));
        }
        if let Some((index, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != n_features)
        {
            return Err(ClassifierError::data_shape(format!(
                "row {index} has {} features, expected {n_features}",
                row.len()
            )));
        }
        if rows.iter().flatten().any(|value| !value.is_finite()) {
            return Err(ClassifierError::data_shape("feature values must be finite"));
        }
        if n_classes == 0 {
            return Err(ClassifierError::data_shape("n_classes must be at least 1"));
        }

        let mut class_counts = vec![0usize; n_classes];
        for &label in labels {
            let Some(count) = class_counts.get_mut(label) else {
                return Err(ClassifierError::data_shape(format!(
                    "label {label} outside 0..{n_classes}"
                )));
            };
            *count += 1;
        }
        if let Some(missing) = class_counts.iter().position(|&count| count == 0) {
            return Err(ClassifierError::data_shape(format!(
                "class {missing} has no training examples"
            )));
        }

        let class_weights = params.class_weight.weights(&class_counts);
        let builder = TreeBuilder {
            rows,
            labels,
            n_classes,
            params,
            max_features: params.max_features.resolve(n_features),
        };

        let mut rng = StdRng::seed_from_u64(params.seed);
        let trees = (0..params.n_estimators)
            .map(|_| {
                let mut tree_rng = StdRng::seed_from_u64(rng.next_u64());
                let draws = sample_draws(rows.len(), params.bootstrap, &mut tree_rng);
                let weights: Vec<f64> = draws
                    .iter()
                    .zip(labels)
                    .map(|(&draw, &label)| f64::from(draw) * class_weights[label])
                    .collect();
                let samples: Vec<usize> = (0..rows.len()).filter(|&i| draws[i] > 0).collect();
                builder.build(samples, &weights, &mut tree_rng)
            })
            .collect::<Vec<_>>();

        debug!(
            n_features,
            n_classes,
            total_nodes = trees.iter().map(DecisionTree::node_count).sum::<usize>(),
            "random forest fitted"
        );

        Ok(Self {
            params: params.clone(),
            n_features,
            n_classes,
            trees,
        })
    }

    /// Averaged class probabilities for a raw row
    pub fn predict_proba_row(&self, row: &[f64]) -> ClassifierResult<Vec<f64>> {
        if row.len() != self.n_features {
            return Err(ClassifierError::schema(format!(
                "model expects {} features, got {}",
                self.n_features,
                row.len()
            )));
        }

        let mut totals = vec![0.0; self.n_classes];
        for tree in &self.trees {
            for (total, p) in totals.iter_mut().zip(tree.predict_proba(row)?) {
                *total += p;
            }
        }
        #[allow(clippy::cast_precision_loss)]
        let n_trees = self.trees.len().max(1) as f64;
        for total in &mut totals {
            *total /= n_trees;
        }
        Ok(totals)
    }

    /// Most probable class for a raw row, ties going to the lowest id
    pub fn predict_row(&self, row: &[f64]) -> ClassifierResult<ClassId> {
        let probabilities = self.predict_proba_row(row)?;
        let mut best = 0;
        for (class, &p) in probabilities.iter().enumerate() {
            if p > probabilities[best] {
                best = class;
            }
        }
        Ok(best)
    }

    /// Check a deserialized forest for structural consistency
    pub fn validate(&self) -> ClassifierResult<()> {
        if self.trees.is_empty() {
            return Err(ClassifierError::schema("forest has no trees"));
        }
        if self.n_classes == 0 {
            return Err(ClassifierError::schema("forest has no classes"));
        }
        for (index, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.n_classes)
                .map_err(|reason| ClassifierError::schema(format!("tree {index}: {reason}")))?;
        }
        Ok(())
    }

    /// Number of input features the forest was fitted on
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Hyperparameters the forest was fitted with
    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// The fitted trees
    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }
}

impl Classifier for RandomForest {
    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn predict(&self, features: &FeatureVector) -> ClassifierResult<ClassId> {
        self.predict_row(&features.to_array())
    }
}

/// How many times each row is drawn into a tree's sample
fn sample_draws(n_rows: usize, bootstrap: bool, rng: &mut StdRng) -> Vec<u32> {
    if !bootstrap {
        return vec![1; n_rows];
    }
    let mut draws = vec![0u32; n_rows];
    for _ in 0..n_rows {
        draws[rng.gen_range(0..n_rows)] += 1;
    }
    draws
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    impurity: f64,
}

struct TreeBuilder<'a> {
    rows: &'a [Vec<f64>],
    labels: &'a [ClassId],
    n_classes: usize,
    params: &'a ForestParams,
    max_features: usize,
}

impl TreeBuilder<'_> {
    fn build(&self, samples: Vec<usize>, weights: &[f64], rng: &mut StdRng) -> DecisionTree {
        let mut nodes = vec![Node::Leaf {
            distribution: Vec::new(),
        }];
        let mut pending = vec![(0usize, samples, 0usize)];

        while let Some((index, samples, depth)) = pending.pop() {
            let distribution = self.class_totals(&samples, weights);

            let Some(split) = self.find_split(&samples, weights, &distribution, depth, rng) else {
                nodes[index] = Node::Leaf {
                    distribution: normalise(distribution),
                };
                continue;
            };

            let (left, right): (Vec<usize>, Vec<usize>) = samples
                .into_iter()
                .partition(|&s| self.rows[s][split.feature] <= split.threshold);

            let left_index = nodes.len();
            let right_index = left_index + 1;
            nodes.push(Node::Leaf {
                distribution: Vec::new(),
            });
            nodes.push(Node::Leaf {
                distribution: Vec::new(),
            });
            nodes[index] = Node::Split {
                feature: split.feature,
                threshold: split.threshold,
                left: left_index,
                right: right_index,
            };

            pending.push((right_index, right, depth + 1));
            pending.push((left_index, left, depth + 1));
        }

        DecisionTree { nodes }
    }

    fn class_totals(&self, samples: &[usize], weights: &[f64]) -> Vec<f64> {
        let mut totals = vec![0.0; self.n_classes];
        for &sample in samples {
            totals[self.labels[sample]] += weights[sample];
        }
        totals
    }

    fn find_split(
        &self,
        samples: &[usize],
        weights: &[f64],
        distribution: &[f64],
        depth: usize,
        rng: &mut StdRng,
    ) -> Option<SplitCandidate> {
        let n_samples = samples.len();
        let depth_reached = self.params.max_depth.is_some_and(|max| depth >= max);
        let pure = distribution.iter().filter(|&&w| w > 0.0).count() <= 1;
        if depth_reached
            || pure
            || n_samples < self.params.min_samples_split
            || n_samples < 2 * self.params.min_samples_leaf
        {
            return None;
        }

        let total_weight: f64 = distribution.iter().sum();
        let mut features: Vec<usize> = (0..self.rows[samples[0]].len()).collect();
        features.shuffle(rng);

        // Keep searching past max_features until at least one valid split exists
        let mut best: Option<SplitCandidate> = None;
        for (visited, &feature) in features.iter().enumerate() {
            if visited >= self.max_features && best.is_some() {
                break;
            }
            if let Some(candidate) =
                self.best_split_on(feature, samples, weights, distribution, total_weight)
                && best
                    .as_ref()
                    .is_none_or(|current| candidate.impurity < current.impurity)
            {
                best = Some(candidate);
            }
        }
        best
    }

    fn best_split_on(
        &self,
        feature: usize,
        samples: &[usize],
        weights: &[f64],
        distribution: &[f64],
        total_weight: f64,
    ) -> Option<SplitCandidate> {
        let mut order: Vec<(f64, usize)> = samples
            .iter()
            .map(|&s| (self.rows[s][feature], s))
            .collect();
        order.sort_by(|a, b| a.0.total_cmp(&b.0));

        let min_leaf = self.params.min_samples_leaf;
        let mut left = vec![0.0; self.n_classes];
        let mut best: Option<SplitCandidate> = None;

        for i in 0..order.len().saturating_sub(1) {
            let (value, sample) = order[i];
            left[self.labels[sample]] += weights[sample];

            let next = order[i + 1].0;
            if value >= next {
                continue;
            }
            let n_left = i + 1;
            if n_left < min_leaf || order.len() - n_left < min_leaf {
                continue;
            }

            let left_weight: f64 = left.iter().sum();
            let right_weight = total_weight - left_weight;
            let left_sq: f64 = left.iter().map(|w| w * w).sum();
            let right_sq: f64 = distribution
                .iter()
                .zip(&left)
                .map(|(total, l)| (total - l) * (total - l))
                .sum();

            let impurity = (left_weight * gini(left_weight, left_sq)
                + right_weight * gini(right_weight, right_sq))
                / total_weight;

            if best
                .as_ref()
                .is_none_or(|current| impurity < current.impurity)
            {
                let midpoint = value + (next - value) / 2.0;
                let threshold = if midpoint < next { midpoint } else { value };
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    impurity,
                });
            }
        }
        best
    }
}

fn gini(weight: f64, sum_of_squares: f64) -> f64 {
    if weight <= 0.0 {
        0.0
    } else {
        1.0 - sum_of_squares / (weight * weight)
    }
}

fn normalise(mut distribution: Vec<f64>) -> Vec<f64> {
    let total: f64 = distribution.iter().sum();
    if total > 0.0 {
        for value in &mut distribution {
            *value /= total;
        }
    }
    distribution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::extract;

    fn separable_rows() -> (Vec<Vec<f64>>, Vec<ClassId>) {
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for i in 0..30 {
            let x = f64::from(i);
            rows.push(vec![x, 100.0 - x]);
            labels.push(usize::from(i >= 15));
        }
        (rows, labels)
    }

    fn small_params() -> ForestParams {
        ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        }
    }

    #[test]
    fn fits_separable_data() {
        let (rows, labels) = separable_rows();
        let forest = RandomForest::fit_rows(&rows, &labels, 2, &small_params()).expect("fit");

        assert_eq!(forest.predict_row(&[2.0, 98.0]).expect("predict"), 0);
        assert_eq!(forest.predict_row(&[27.0, 73.0]).expect("predict"), 1);
        assert_eq!(forest.trees().len(), 10);
        assert!(forest.validate().is_ok());
    }

    #[test]
    fn same_seed_gives_same_forest() {
        let (rows, labels) = separable_rows();
        let a = RandomForest::fit_rows(&rows, &labels, 2, &small_params()).expect("fit");
        let b = RandomForest::fit_rows(&rows, &labels, 2, &small_params()).expect("fit");
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_mismatched_lengths() {
        let (rows, mut labels) = separable_rows();
        labels.pop();
        let err = RandomForest::fit_rows(&rows, &labels, 2, &small_params())
            .expect_err("length mismatch");
        assert!(matches!(err, ClassifierError::DataShape { .. }));
    }

    #[test]
    fn rejects_absent_class() {
        let (rows, labels) = separable_rows();
        let err =
            RandomForest::fit_rows(&rows, &labels, 3, &small_params()).expect_err("class 2 absent");
        assert!(err.to_string().contains("class 2 has no training examples"));
    }

    #[test]
    fn rejects_empty_dataset_and_bad_params() {
        assert!(RandomForest::fit_rows(&[], &[], 1, &small_params()).is_err());

        let (rows, labels) = separable_rows();
        let params = ForestParams {
            n_estimators: 0,
            ..ForestParams::default()
        };
        let err = RandomForest::fit_rows(&rows, &labels, 2, &params).expect_err("bad params");
        assert!(err.is_config_error());
    }

    #[test]
    fn predict_checks_feature_width() {
        let (rows, labels) = separable_rows();
        let forest = RandomForest::fit_rows(&rows, &labels, 2, &small_params()).expect("fit");

        let err = forest
            .predict(&extract("https://example.com"))
            .expect_err("2-feature model given a 9-feature vector");
        assert!(err.is_schema_error());
    }

    #[test]
    fn single_class_forest_always_predicts_it() {
        let features: Vec<_> = ["http://a.com", "https://b.org/x", "c.net"]
            .iter()
            .map(|u| extract(u))
            .collect();
        let forest =
            RandomForest::fit(&features, &[0, 0, 0], 1, &small_params()).expect("fit one class");

        assert_eq!(forest.n_classes(), 1);
        assert_eq!(
            forest
                .predict(&extract("http://anything.example"))
                .expect("predict"),
            0
        );
    }

    #[test]
    fn balanced_weights_favour_rare_class() {
        let weights = ClassWeight::Balanced.weights(&[90, 10]);
        assert!((weights[0] - 100.0 / 180.0).abs() < 1e-12);
        assert!((weights[1] - 5.0).abs() < 1e-12);
        assert_eq!(ClassWeight::Uniform.weights(&[90, 10]), vec![1.0, 1.0]);
    }

    #[test]
    fn max_features_resolution() {
        assert_eq!(MaxFeatures::Sqrt.resolve(9), 3);
        assert_eq!(MaxFeatures::Log2.resolve(9), 3);
        assert_eq!(MaxFeatures::All.resolve(9), 9);
        assert_eq!(MaxFeatures::Count(20).resolve(9), 9);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
    }

    #[test]
    fn max_depth_limits_tree() {
        let (rows, labels) = separable_rows();
        let params = ForestParams {
            n_estimators: 3,
            max_depth: Some(1),
            ..ForestParams::default()
        };
        let forest = RandomForest::fit_rows(&rows, &labels, 2, &params).expect("fit");
        assert!(forest.trees().iter().all(|tree| tree.depth() <= 1));
    }

    #[test]
    fn validate_rejects_corrupt_structure() {
        let forest = RandomForest {
            params: ForestParams::default(),
            n_features: 2,
            n_classes: 2,
            trees: vec![DecisionTree {
                nodes: vec![Node::Split {
                    feature: 0,
                    threshold: 1.0,
                    left: 0,
                    right: 5,
                }],
            }],
        };
        assert!(forest.validate().is_err());
    }

    #[test]
    fn depth_follows_longest_branch() {
        let leaf = || Node::Leaf {
            distribution: vec![1.0, 0.0],
        };
        let tree = DecisionTree {
            nodes: vec![
                Node::Split {
                    feature: 0,
                    threshold: 0.5,
                    left: 1,
                    right: 2,
                },
                leaf(),
                Node::Split {
                    feature: 1,
                    threshold: 2.5,
                    left: 3,
                    right: 4,
                },
                leaf(),
                leaf(),
            ],
        };
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.node_count(), 5);
        assert_eq!(DecisionTree { nodes: vec![leaf()] }.depth(), 0);
    }
}
