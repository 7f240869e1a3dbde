//! Hyperparameter search: k-fold cross-validation and grid search.
//!
//! The grid is enumerated in one fixed nesting order, and candidates are
//! scored by mean negative RMSE on the log scale. Fold evaluation is
//! embarrassingly parallel; selection is a sequential scan over the collected
//! scores, so the winner is deterministic: highest score, ties broken by the
//! first occurrence in enumeration order.

use ndarray::{ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use tracing::info;

use super::gbrt::{self, GbrtParams};
use super::metrics;

/// Candidate values per hyperparameter.
///
/// `enumerate` nests in field-declaration order (n_trees outermost,
/// subsample innermost); that order is part of the tie-breaking contract.
#[derive(Debug, Clone)]
pub struct ParamGrid {
    pub n_trees: Vec<u32>,
    pub learning_rate: Vec<f32>,
    pub max_depth: Vec<u32>,
    pub min_samples_split: Vec<usize>,
    pub min_samples_leaf: Vec<usize>,
    pub subsample: Vec<f32>,
}

impl Default for ParamGrid {
    fn default() -> Self {
        Self {
            n_trees: vec![300, 500],
            learning_rate: vec![0.05, 0.1],
            max_depth: vec![4, 5, 6],
            min_samples_split: vec![5, 10],
            min_samples_leaf: vec![2, 4],
            subsample: vec![0.8, 0.9],
        }
    }
}

impl ParamGrid {
    /// All combinations, in fixed enumeration order. Unlisted parameters
    /// (column sampling, seed) come from `base`.
    pub fn enumerate(&self, base: &GbrtParams) -> Vec<GbrtParams> {
        let mut combos = Vec::new();
        for &n_trees in &self.n_trees {
            for &learning_rate in &self.learning_rate {
                for &max_depth in &self.max_depth {
                    for &min_samples_split in &self.min_samples_split {
                        for &min_samples_leaf in &self.min_samples_leaf {
                            for &subsample in &self.subsample {
                                combos.push(GbrtParams {
                                    n_trees,
                                    learning_rate,
                                    max_depth,
                                    min_samples_split,
                                    min_samples_leaf,
                                    subsample,
                                    ..base.clone()
                                });
                            }
                        }
                    }
                }
            }
        }
        combos
    }
}

/// Shuffled k-fold split of `0..n`: (train_rows, validation_rows) per fold.
///
/// Fold sizes differ by at most one; every row lands in exactly one
/// validation fold.
pub fn kfold_indices(n: usize, k: usize, seed: u64) -> Vec<(Vec<usize>, Vec<usize>)> {
    assert!(k >= 2, "k-fold needs at least two folds");
    assert!(n >= k, "need at least one row per fold");

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut StdRng::seed_from_u64(seed));

    let base = n / k;
    let remainder = n % k;
    let mut folds = Vec::with_capacity(k);
    let mut start = 0;
    for fold in 0..k {
        let size = base + usize::from(fold < remainder);
        let validation: Vec<usize> = order[start..start + size].to_vec();
        let train: Vec<usize> = order[..start]
            .iter()
            .chain(order[start + size..].iter())
            .copied()
            .collect();
        folds.push((train, validation));
        start += size;
    }
    folds
}

/// Mean and standard deviation of per-fold RMSE (log scale) for one
/// parameter set.
pub fn cv_rmse(
    features: ArrayView2<'_, f32>,
    targets: &[f32],
    params: &GbrtParams,
    folds: usize,
    seed: u64,
) -> (f64, f64) {
    let fold_rmse: Vec<f64> = kfold_indices(targets.len(), folds, seed)
        .par_iter()
        .map(|(train_rows, val_rows)| {
            let train_x = features.select(Axis(0), train_rows);
            let train_y: Vec<f32> = train_rows.iter().map(|&r| targets[r]).collect();
            let forest = gbrt::train(train_x.view(), &train_y, params);

            let labels: Vec<f64> = val_rows.iter().map(|&r| targets[r] as f64).collect();
            let predictions: Vec<f64> = val_rows
                .iter()
                .map(|&r| {
                    let row = features.row(r);
                    forest.predict_row(row.as_slice().expect("features are row-major")) as f64
                })
                .collect();
            metrics::rmse(&labels, &predictions)
        })
        .collect();

    (metrics::mean(&fold_rmse), metrics::std_dev(&fold_rmse))
}

/// Outcome of a grid search.
#[derive(Debug, Clone)]
pub struct GridSearchResult {
    pub params: GbrtParams,
    /// Mean negative RMSE (log scale) of the winning candidate.
    pub score: f64,
    /// Index of the winner in grid enumeration order.
    pub candidate_index: usize,
    pub n_candidates: usize,
}

/// Exhaustive grid search with k-fold cross-validation.
///
/// Candidate × fold evaluations run in parallel; the argmax is a sequential
/// scan, so ties resolve to the first candidate in enumeration order.
pub fn grid_search(
    features: ArrayView2<'_, f32>,
    targets: &[f32],
    grid: &ParamGrid,
    base: &GbrtParams,
    folds: usize,
    seed: u64,
) -> GridSearchResult {
    let candidates = grid.enumerate(base);
    info!(
        candidates = candidates.len(),
        folds, "starting hyperparameter grid search"
    );

    let scores: Vec<f64> = candidates
        .par_iter()
        .map(|params| -cv_rmse(features, targets, params, folds, seed).0)
        .collect();

    let mut best = 0usize;
    for (idx, &score) in scores.iter().enumerate() {
        if score > scores[best] {
            best = idx;
        }
    }

    info!(
        candidate = best,
        score = scores[best],
        "grid search selected parameters"
    );
    GridSearchResult {
        params: candidates[best].clone(),
        score: scores[best],
        candidate_index: best,
        n_candidates: candidates.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::gbrt::ColumnSampling;
    use ndarray::Array2;

    fn synthetic(n: usize) -> (Array2<f32>, Vec<f32>) {
        let mut features = Array2::<f32>::zeros((n, 2));
        let mut targets = Vec::with_capacity(n);
        for i in 0..n {
            let x0 = (i as f32) / (n as f32);
            let x1 = ((i * 13) % n) as f32 / (n as f32);
            features[[i, 0]] = x0;
            features[[i, 1]] = x1;
            targets.push(3.0 * x0 - x1);
        }
        (features, targets)
    }

    fn base_params() -> GbrtParams {
        GbrtParams::builder()
            .colsample(ColumnSampling::All)
            .build()
    }

    #[test]
    fn kfold_covers_every_row_once() {
        let folds = kfold_indices(23, 5, 42);
        assert_eq!(folds.len(), 5);

        let mut seen = vec![0usize; 23];
        for (train, validation) in &folds {
            assert_eq!(train.len() + validation.len(), 23);
            for &r in validation {
                seen[r] += 1;
            }
        }
        assert!(seen.iter().all(|&c| c == 1));
    }

    #[test]
    fn kfold_is_deterministic_per_seed() {
        assert_eq!(kfold_indices(20, 4, 7), kfold_indices(20, 4, 7));
        assert_ne!(kfold_indices(20, 4, 7), kfold_indices(20, 4, 8));
    }

    #[test]
    fn enumeration_order_is_fixed() {
        let grid = ParamGrid {
            n_trees: vec![10, 20],
            learning_rate: vec![0.1],
            max_depth: vec![2, 3],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1],
            subsample: vec![1.0],
        };
        let combos = grid.enumerate(&base_params());
        assert_eq!(combos.len(), 4);
        assert_eq!((combos[0].n_trees, combos[0].max_depth), (10, 2));
        assert_eq!((combos[1].n_trees, combos[1].max_depth), (10, 3));
        assert_eq!((combos[2].n_trees, combos[2].max_depth), (20, 2));
        assert_eq!((combos[3].n_trees, combos[3].max_depth), (20, 3));
    }

    #[test]
    fn default_grid_matches_the_fixed_grid() {
        let grid = ParamGrid::default();
        assert_eq!(grid.n_trees, vec![300, 500]);
        assert_eq!(grid.learning_rate, vec![0.05, 0.1]);
        assert_eq!(grid.max_depth, vec![4, 5, 6]);
        assert_eq!(
            grid.enumerate(&base_params()).len(),
            2 * 2 * 3 * 2 * 2 * 2
        );
    }

    #[test]
    fn grid_search_prefers_the_stronger_candidate() {
        let (features, targets) = synthetic(80);
        // One candidate is plainly too weak to compete (a single stump).
        let grid = ParamGrid {
            n_trees: vec![1, 40],
            learning_rate: vec![0.3],
            max_depth: vec![3],
            min_samples_split: vec![4],
            min_samples_leaf: vec![2],
            subsample: vec![1.0],
        };
        let result = grid_search(features.view(), &targets, &grid, &base_params(), 3, 42);
        assert_eq!(result.params.n_trees, 40);
        assert_eq!(result.n_candidates, 2);
        assert_eq!(result.candidate_index, 1);
    }

    #[test]
    fn grid_search_is_deterministic() {
        let (features, targets) = synthetic(60);
        let grid = ParamGrid {
            n_trees: vec![5, 10],
            learning_rate: vec![0.2, 0.3],
            max_depth: vec![2],
            min_samples_split: vec![2],
            min_samples_leaf: vec![1],
            subsample: vec![0.9],
        };
        let a = grid_search(features.view(), &targets, &grid, &base_params(), 3, 1);
        let b = grid_search(features.view(), &targets, &grid, &base_params(), 3, 1);
        assert_eq!(a.candidate_index, b.candidate_index);
        assert_eq!(a.params, b.params);
    }
}
