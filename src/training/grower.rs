//! Exact greedy regression tree growing.
//!
//! Grows one variance-reduction CART tree over the residuals of the boosting
//! round. Splits are searched exactly: per candidate feature, node samples are
//! sorted by value and every boundary between distinct values is scored by
//! the sum-of-squares reduction it buys. Thresholds are midpoints, so a value
//! seen at fit time routes the same way at inference time.

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::repr::Tree;

/// Minimum gain for a split to be worth keeping.
const MIN_GAIN: f64 = 1e-12;

/// How many features each split considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnSampling {
    /// Every feature.
    All,
    /// A fresh random sample of ⌈√n_features⌉ features per node.
    Sqrt,
}

#[derive(Debug, Clone)]
pub(crate) struct GrowerParams {
    pub max_depth: u32,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub colsample: ColumnSampling,
}

/// Grow one tree over `rows`, predicting `residuals`.
pub(crate) fn grow_tree(
    features: ArrayView2<'_, f32>,
    residuals: &[f32],
    rows: Vec<usize>,
    params: &GrowerParams,
    rng: &mut StdRng,
) -> Tree {
    let mut builder = TreeBuilder::default();
    build_node(&mut builder, features, residuals, rows, 0, params, rng);
    builder.freeze()
}

#[derive(Default)]
struct TreeBuilder {
    split_features: Vec<u32>,
    thresholds: Vec<f32>,
    left_children: Vec<u32>,
    right_children: Vec<u32>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<f32>,
    gains: Vec<f32>,
}

impl TreeBuilder {
    fn push_leaf(&mut self, value: f32) -> u32 {
        self.push(0, 0.0, true, value, 0.0)
    }

    fn push(&mut self, feature: u32, threshold: f32, leaf: bool, value: f32, gain: f32) -> u32 {
        let id = self.split_features.len() as u32;
        self.split_features.push(feature);
        self.thresholds.push(threshold);
        self.left_children.push(0);
        self.right_children.push(0);
        self.is_leaf.push(leaf);
        self.leaf_values.push(value);
        self.gains.push(gain);
        id
    }

    fn set_children(&mut self, node: u32, left: u32, right: u32) {
        self.left_children[node as usize] = left;
        self.right_children[node as usize] = right;
    }

    fn freeze(self) -> Tree {
        Tree::from_arrays(
            self.split_features,
            self.thresholds,
            self.left_children,
            self.right_children,
            self.is_leaf,
            self.leaf_values,
            self.gains,
        )
    }
}

struct Split {
    feature: usize,
    threshold: f32,
    gain: f64,
}

fn build_node(
    builder: &mut TreeBuilder,
    features: ArrayView2<'_, f32>,
    residuals: &[f32],
    rows: Vec<usize>,
    depth: u32,
    params: &GrowerParams,
    rng: &mut StdRng,
) -> u32 {
    let n = rows.len();
    let (sum, sum_sq) = rows.iter().fold((0.0f64, 0.0f64), |(s, ss), &r| {
        let v = residuals[r] as f64;
        (s + v, ss + v * v)
    });
    let node_mean = (sum / n as f64) as f32;

    let splittable =
        depth < params.max_depth && n >= params.min_samples_split && n >= 2 * params.min_samples_leaf;
    if !splittable {
        return builder.push_leaf(node_mean);
    }

    let parent_sse = sum_sq - sum * sum / n as f64;
    let split = match find_best_split(features, residuals, &rows, sum, parent_sse, params, rng) {
        Some(s) if s.gain > MIN_GAIN => s,
        _ => return builder.push_leaf(node_mean),
    };

    let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
        .into_iter()
        .partition(|&r| features[[r, split.feature]] < split.threshold);

    let node = builder.push(
        split.feature as u32,
        split.threshold,
        false,
        0.0,
        split.gain as f32,
    );
    let left = build_node(builder, features, residuals, left_rows, depth + 1, params, rng);
    let right = build_node(builder, features, residuals, right_rows, depth + 1, params, rng);
    builder.set_children(node, left, right);
    node
}

fn candidate_features(
    n_features: usize,
    colsample: ColumnSampling,
    rng: &mut StdRng,
) -> Vec<usize> {
    match colsample {
        ColumnSampling::All => (0..n_features).collect(),
        ColumnSampling::Sqrt => {
            let k = ((n_features as f64).sqrt().ceil() as usize).clamp(1, n_features);
            rand::seq::index::sample(rng, n_features, k).into_vec()
        }
    }
}

fn find_best_split(
    features: ArrayView2<'_, f32>,
    residuals: &[f32],
    rows: &[usize],
    total_sum: f64,
    parent_sse: f64,
    params: &GrowerParams,
    rng: &mut StdRng,
) -> Option<Split> {
    let n = rows.len();
    let mut best: Option<Split> = None;
    let mut ordered: Vec<(f32, f64)> = Vec::with_capacity(n);

    for feature in candidate_features(features.ncols(), params.colsample, rng) {
        ordered.clear();
        ordered.extend(
            rows.iter()
                .map(|&r| (features[[r, feature]], residuals[r] as f64)),
        );
        ordered.sort_by(|a, b| a.0.partial_cmp(&b.0).expect("imputed features are not NaN"));

        let mut left_sum = 0.0f64;
        let mut left_sum_sq = 0.0f64;
        for i in 1..n {
            let (prev_value, value) = (ordered[i - 1].0, ordered[i].0);
            let v = ordered[i - 1].1;
            left_sum += v;
            left_sum_sq += v * v;

            // No boundary between equal values.
            if value <= prev_value {
                continue;
            }
            if i < params.min_samples_leaf || n - i < params.min_samples_leaf {
                continue;
            }

            let left_n = i as f64;
            let right_n = (n - i) as f64;
            let right_sum = total_sum - left_sum;
            let left_sse = left_sum_sq - left_sum * left_sum / left_n;
            let right_sse = {
                let right_sum_sq: f64 = parent_sse + total_sum * total_sum / n as f64 - left_sum_sq;
                right_sum_sq - right_sum * right_sum / right_n
            };
            let gain = parent_sse - left_sse - right_sse;

            if best.as_ref().map_or(true, |b| gain > b.gain) {
                best = Some(Split {
                    feature,
                    threshold: (prev_value + value) / 2.0,
                    gain,
                });
            }
        }
    }
    best
}
