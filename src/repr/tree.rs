//! Regression tree storage (structure-of-arrays).
//!
//! Nodes live in flat parallel arrays for cache-friendly traversal. Child
//! indices are local to the tree; node 0 is the root. Internal nodes route
//! `value < threshold` left, everything else right. Inputs are fully imputed
//! upstream, so traversal never sees NaN.

/// Immutable SoA regression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    split_features: Vec<u32>,
    thresholds: Vec<f32>,
    left_children: Vec<u32>,
    right_children: Vec<u32>,
    is_leaf: Vec<bool>,
    leaf_values: Vec<f32>,
    /// Impurity reduction at each split node (0 at leaves). Feeds importance.
    gains: Vec<f32>,
}

impl Tree {
    /// Create a tree from its node arrays.
    ///
    /// # Panics
    ///
    /// Panics if the arrays disagree in length or the tree is empty.
    pub fn from_arrays(
        split_features: Vec<u32>,
        thresholds: Vec<f32>,
        left_children: Vec<u32>,
        right_children: Vec<u32>,
        is_leaf: Vec<bool>,
        leaf_values: Vec<f32>,
        gains: Vec<f32>,
    ) -> Self {
        let n = split_features.len();
        assert!(n > 0, "tree must have at least one node");
        assert_eq!(thresholds.len(), n);
        assert_eq!(left_children.len(), n);
        assert_eq!(right_children.len(), n);
        assert_eq!(is_leaf.len(), n);
        assert_eq!(leaf_values.len(), n);
        assert_eq!(gains.len(), n);
        Self {
            split_features,
            thresholds,
            left_children,
            right_children,
            is_leaf,
            leaf_values,
            gains,
        }
    }

    /// Single-leaf tree.
    pub fn leaf(value: f32) -> Self {
        Self::from_arrays(
            vec![0],
            vec![0.0],
            vec![0],
            vec![0],
            vec![true],
            vec![value],
            vec![0.0],
        )
    }

    pub fn n_nodes(&self) -> usize {
        self.split_features.len()
    }

    pub fn is_leaf(&self, node: usize) -> bool {
        self.is_leaf[node]
    }

    pub fn split_feature(&self, node: usize) -> u32 {
        self.split_features[node]
    }

    pub fn threshold(&self, node: usize) -> f32 {
        self.thresholds[node]
    }

    pub fn leaf_value(&self, node: usize) -> f32 {
        self.leaf_values[node]
    }

    pub fn gain(&self, node: usize) -> f32 {
        self.gains[node]
    }

    /// Scale every leaf value, e.g. by the learning rate.
    pub fn scale_leaves(&mut self, factor: f32) {
        for (value, &leaf) in self.leaf_values.iter_mut().zip(&self.is_leaf) {
            if leaf {
                *value *= factor;
            }
        }
    }

    /// Predict the tree's contribution for one sample.
    #[inline]
    pub fn predict_row(&self, features: &[f32]) -> f32 {
        let mut node = 0usize;
        while !self.is_leaf[node] {
            let feature = self.split_features[node] as usize;
            node = if features[feature] < self.thresholds[node] {
                self.left_children[node] as usize
            } else {
                self.right_children[node] as usize
            };
        }
        self.leaf_values[node]
    }

    /// Add this tree's split gains into a per-feature accumulator.
    pub fn accumulate_gains(&self, totals: &mut [f64]) {
        for node in 0..self.n_nodes() {
            if !self.is_leaf[node] {
                totals[self.split_features[node] as usize] += self.gains[node] as f64;
            }
        }
    }

    // Raw array accessors for persistence.

    pub fn split_features_raw(&self) -> &[u32] {
        &self.split_features
    }

    pub fn thresholds_raw(&self) -> &[f32] {
        &self.thresholds
    }

    pub fn left_children_raw(&self) -> &[u32] {
        &self.left_children
    }

    pub fn right_children_raw(&self) -> &[u32] {
        &self.right_children
    }

    pub fn is_leaf_raw(&self) -> &[bool] {
        &self.is_leaf
    }

    pub fn leaf_values_raw(&self) -> &[f32] {
        &self.leaf_values
    }

    pub fn gains_raw(&self) -> &[f32] {
        &self.gains
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two-level stump: x0 < 0.5 ? 1.0 : (x1 < 0.3 ? 2.0 : 3.0)
    fn two_split_tree() -> Tree {
        Tree::from_arrays(
            vec![0, 0, 1, 0, 0],
            vec![0.5, 0.0, 0.3, 0.0, 0.0],
            vec![1, 0, 3, 0, 0],
            vec![2, 0, 4, 0, 0],
            vec![false, true, false, true, true],
            vec![0.0, 1.0, 0.0, 2.0, 3.0],
            vec![10.0, 0.0, 4.0, 0.0, 0.0],
        )
    }

    #[test]
    fn traversal_routes_left_below_threshold() {
        let tree = two_split_tree();
        assert_eq!(tree.predict_row(&[0.3, 0.9]), 1.0);
        assert_eq!(tree.predict_row(&[0.7, 0.1]), 2.0);
        assert_eq!(tree.predict_row(&[0.7, 0.9]), 3.0);
    }

    #[test]
    fn gains_accumulate_per_feature() {
        let tree = two_split_tree();
        let mut totals = vec![0.0f64; 2];
        tree.accumulate_gains(&mut totals);
        assert_eq!(totals, vec![10.0, 4.0]);
    }

    #[test]
    fn leaf_scaling_touches_only_leaves() {
        let mut tree = two_split_tree();
        tree.scale_leaves(0.5);
        assert_eq!(tree.predict_row(&[0.3, 0.9]), 0.5);
        assert_eq!(tree.threshold(0), 0.5);
    }
}
