//! Additive ensemble of regression trees.
//!
//! A [`Forest`] is a base score plus an ordered sequence of trees whose
//! outputs sum on the (log) target scale. Tree order matters: staged
//! prediction exposes the cumulative output of the first k trees, which the
//! predictor uses as an uncertainty proxy. Forests are immutable after
//! training and safe to share across threads.

use ndarray::{Array1, ArrayView2};
use rayon::prelude::*;

/// Trained additive tree ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct Forest {
    base_score: f32,
    trees: Vec<super::Tree>,
    n_features: usize,
}

impl Forest {
    pub fn new(base_score: f32, n_features: usize) -> Self {
        Self {
            base_score,
            trees: Vec::new(),
            n_features,
        }
    }

    pub fn from_parts(base_score: f32, n_features: usize, trees: Vec<super::Tree>) -> Self {
        Self {
            base_score,
            trees,
            n_features,
        }
    }

    pub fn push_tree(&mut self, tree: super::Tree) {
        self.trees.push(tree);
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Input width this forest was trained on.
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn base_score(&self) -> f32 {
        self.base_score
    }

    pub fn trees(&self) -> &[super::Tree] {
        &self.trees
    }

    /// Whole-model prediction for one sample.
    #[inline]
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        let mut acc = self.base_score;
        for tree in &self.trees {
            acc += tree.predict_row(features);
        }
        acc
    }

    /// Whole-model prediction for a batch, shape `[n_samples, n_features]`.
    ///
    /// Rows are independent; `parallel` fans them out over rayon.
    pub fn predict(&self, features: ArrayView2<f32>, parallel: bool) -> Array1<f32> {
        let rows: Vec<Vec<f32>> = features.outer_iter().map(|r| r.to_vec()).collect();
        let predictions: Vec<f32> = if parallel {
            rows.par_iter().map(|r| self.predict_row(r)).collect()
        } else {
            rows.iter().map(|r| self.predict_row(r)).collect()
        };
        Array1::from_vec(predictions)
    }

    /// Staged predictions: cumulative output after each of the first k trees,
    /// k = 1..=n_trees. Empty when the forest has no trees.
    pub fn predict_staged_row(&self, features: &[f32]) -> Vec<f32> {
        let mut staged = Vec::with_capacity(self.trees.len());
        let mut acc = self.base_score;
        for tree in &self.trees {
            acc += tree.predict_row(features);
            staged.push(acc);
        }
        staged
    }

    /// Gain-based feature importance, normalized to sum to one.
    ///
    /// All-zero gains (e.g. a forest of pure leaves) yield all zeros.
    pub fn feature_importance(&self) -> Vec<f32> {
        let mut totals = vec![0.0f64; self.n_features];
        for tree in &self.trees {
            tree.accumulate_gains(&mut totals);
        }
        let sum: f64 = totals.iter().sum();
        if sum > 0.0 {
            totals.iter().map(|&g| (g / sum) as f32).collect()
        } else {
            vec![0.0; self.n_features]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::Tree;
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::arr2;

    fn stump(feature: u32, threshold: f32, left: f32, right: f32, gain: f32) -> Tree {
        Tree::from_arrays(
            vec![feature, 0, 0],
            vec![threshold, 0.0, 0.0],
            vec![1, 0, 0],
            vec![2, 0, 0],
            vec![false, true, true],
            vec![0.0, left, right],
            vec![gain, 0.0, 0.0],
        )
    }

    fn small_forest() -> Forest {
        let mut forest = Forest::new(10.0, 2);
        forest.push_tree(stump(0, 0.5, -1.0, 1.0, 8.0));
        forest.push_tree(stump(1, 0.0, -0.5, 0.5, 2.0));
        forest
    }

    #[test]
    fn prediction_sums_base_and_trees() {
        let forest = small_forest();
        assert_abs_diff_eq!(forest.predict_row(&[0.3, 1.0]), 10.0 - 1.0 + 0.5);
        assert_abs_diff_eq!(forest.predict_row(&[0.9, -1.0]), 10.0 + 1.0 - 0.5);
    }

    #[test]
    fn staged_predictions_are_cumulative() {
        let forest = small_forest();
        let staged = forest.predict_staged_row(&[0.3, 1.0]);
        assert_eq!(staged.len(), 2);
        assert_abs_diff_eq!(staged[0], 9.0);
        assert_abs_diff_eq!(staged[1], 9.5);
        // Final stage equals the whole-model prediction.
        assert_abs_diff_eq!(staged[1], forest.predict_row(&[0.3, 1.0]));
    }

    #[test]
    fn batch_matches_row_prediction() {
        let forest = small_forest();
        let features = arr2(&[[0.3, 1.0], [0.9, -1.0]]);
        let sequential = forest.predict(features.view(), false);
        let parallel = forest.predict(features.view(), true);
        assert_eq!(sequential, parallel);
        assert_abs_diff_eq!(sequential[0], forest.predict_row(&[0.3, 1.0]));
    }

    #[test]
    fn importance_normalizes_gains() {
        let forest = small_forest();
        let importance = forest.feature_importance();
        assert_abs_diff_eq!(importance[0], 0.8);
        assert_abs_diff_eq!(importance[1], 0.2);
    }

    #[test]
    fn importance_of_leaf_only_forest_is_zero() {
        let mut forest = Forest::new(1.0, 3);
        forest.push_tree(Tree::leaf(0.5));
        assert_eq!(forest.feature_importance(), vec![0.0, 0.0, 0.0]);
    }
}
