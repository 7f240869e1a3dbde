//! Gradient boosted regression training.
//!
//! Squared-loss boosting on the (log-transformed) target: the base score is
//! the target mean, and each round fits one tree to the current residuals on
//! a seeded row subsample, then shrinks its leaves by the learning rate.
//! Training is fully deterministic for a fixed parameter set and seed.

use bon::Builder;
use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::grower::{grow_tree, GrowerParams};
use crate::repr::Forest;

pub use super::grower::ColumnSampling;

/// Hyperparameters for the boosted ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
pub struct GbrtParams {
    /// Number of boosting rounds (trees).
    #[builder(default = 500)]
    pub n_trees: u32,

    /// Shrinkage applied to each tree's contribution.
    #[builder(default = 0.05)]
    pub learning_rate: f32,

    /// Maximum tree depth.
    #[builder(default = 5)]
    pub max_depth: u32,

    /// Minimum samples required to consider splitting a node.
    #[builder(default = 10)]
    pub min_samples_split: usize,

    /// Minimum samples on each side of a split.
    #[builder(default = 4)]
    pub min_samples_leaf: usize,

    /// Fraction of rows drawn (without replacement) per round.
    #[builder(default = 0.8)]
    pub subsample: f32,

    /// Features considered per split node.
    #[builder(default = ColumnSampling::Sqrt)]
    pub colsample: ColumnSampling,

    /// Seed for row and column sampling.
    #[builder(default = 42)]
    pub seed: u64,
}

impl Default for GbrtParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl GbrtParams {
    fn grower_params(&self) -> GrowerParams {
        GrowerParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
            colsample: self.colsample,
        }
    }
}

/// Train an ensemble on `features` (shape `[n_samples, n_features]`) against
/// `targets` (already on the log scale).
pub fn train(features: ArrayView2<'_, f32>, targets: &[f32], params: &GbrtParams) -> Forest {
    let n = targets.len();
    debug_assert_eq!(features.nrows(), n);

    let base = if n > 0 {
        (targets.iter().map(|&t| t as f64).sum::<f64>() / n as f64) as f32
    } else {
        0.0
    };
    let mut forest = Forest::new(base, features.ncols());
    if n < 2 {
        return forest;
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let grower = params.grower_params();
    let mut predictions = vec![base; n];
    let mut residuals = vec![0.0f32; n];

    let sample_size = if params.subsample < 1.0 {
        (((n as f32) * params.subsample).round() as usize).clamp(1, n)
    } else {
        n
    };

    for round in 0..params.n_trees {
        for i in 0..n {
            residuals[i] = targets[i] - predictions[i];
        }

        let rows: Vec<usize> = if sample_size < n {
            rand::seq::index::sample(&mut rng, n, sample_size).into_vec()
        } else {
            (0..n).collect()
        };

        let mut tree = grow_tree(features, &residuals, rows, &grower, &mut rng);
        tree.scale_leaves(params.learning_rate);

        for (i, prediction) in predictions.iter_mut().enumerate() {
            let row = features.row(i);
            let row = row.as_slice().expect("features are row-major");
            *prediction += tree.predict_row(row);
        }
        forest.push_tree(tree);

        if (round + 1) % 100 == 0 {
            debug!(round = round + 1, "boosting progress");
        }
    }

    forest
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn synthetic(n: usize) -> (Array2<f32>, Vec<f32>) {
        // y = 2·x0 + step(x1) with mild structure, no noise.
        let mut features = Array2::<f32>::zeros((n, 2));
        let mut targets = Vec::with_capacity(n);
        for i in 0..n {
            let x0 = (i as f32) / (n as f32);
            let x1 = ((i * 7) % n) as f32 / (n as f32);
            features[[i, 0]] = x0;
            features[[i, 1]] = x1;
            targets.push(2.0 * x0 + if x1 > 0.5 { 1.0 } else { 0.0 });
        }
        (features, targets)
    }

    fn small_params(n_trees: u32) -> GbrtParams {
        GbrtParams::builder()
            .n_trees(n_trees)
            .learning_rate(0.3)
            .max_depth(3)
            .min_samples_split(4)
            .min_samples_leaf(2)
            .subsample(1.0)
            .colsample(ColumnSampling::All)
            .build()
    }

    #[test]
    fn default_params_match_the_fixed_set() {
        let params = GbrtParams::default();
        assert_eq!(params.n_trees, 500);
        assert_eq!(params.learning_rate, 0.05);
        assert_eq!(params.max_depth, 5);
        assert_eq!(params.min_samples_split, 10);
        assert_eq!(params.min_samples_leaf, 4);
        assert_eq!(params.subsample, 0.8);
        assert_eq!(params.colsample, ColumnSampling::Sqrt);
    }

    #[test]
    fn boosting_reduces_training_error() {
        let (features, targets) = synthetic(200);
        let forest = train(features.view(), &targets, &small_params(50));

        let base_sse: f64 = {
            let mean = targets.iter().map(|&t| t as f64).sum::<f64>() / targets.len() as f64;
            targets.iter().map(|&t| (t as f64 - mean).powi(2)).sum()
        };
        let model_sse: f64 = (0..targets.len())
            .map(|i| {
                let row = features.row(i);
                let p = forest.predict_row(row.as_slice().unwrap()) as f64;
                (targets[i] as f64 - p).powi(2)
            })
            .sum();

        assert!(model_sse < base_sse * 0.1, "{model_sse} vs {base_sse}");
    }

    #[test]
    fn training_is_deterministic_for_a_seed() {
        let (features, targets) = synthetic(100);
        let params = GbrtParams::builder()
            .n_trees(10)
            .subsample(0.7)
            .seed(7)
            .build();
        let a = train(features.view(), &targets, &params);
        let b = train(features.view(), &targets, &params);
        assert_eq!(a, b);
    }

    #[test]
    fn tiny_dataset_yields_base_score_only() {
        let features = Array2::<f32>::zeros((1, 2));
        let forest = train(features.view(), &[3.0], &small_params(10));
        assert_eq!(forest.n_trees(), 0);
        assert_eq!(forest.predict_row(&[0.0, 0.0]), 3.0);
    }

    #[test]
    fn forest_has_one_tree_per_round() {
        let (features, targets) = synthetic(50);
        let forest = train(features.view(), &targets, &small_params(7));
        assert_eq!(forest.n_trees(), 7);
    }
}
