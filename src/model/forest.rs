//! Bagged ensemble of regression trees.
//!
//! Each tree is grown on a bootstrap resample of the training rows with its own
//! RNG, seeded from `(seed, tree index)`. Trees are fitted in parallel; since
//! no RNG is shared, the forest is identical regardless of thread count.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::ForestParams;
use crate::error::AppError;
use crate::math::seed::derive_seed;
use crate::model::tree::{RegressionTree, TreeParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    n_features: usize,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    /// Fit `params.n_trees` trees on `rows` (one row per sample).
    pub fn fit(rows: &[Vec<f64>], y: &[f64], params: &ForestParams, seed: u64) -> Result<Self, AppError> {
        if rows.is_empty() {
            return Err(AppError::insufficient_data("Cannot fit a forest on zero rows."));
        }
        if rows.len() != y.len() {
            return Err(AppError::computation(format!(
                "Row count ({}) does not match target count ({}).",
                rows.len(),
                y.len()
            )));
        }
        if params.n_trees == 0 {
            return Err(AppError::invalid_input("Ensemble size must be >= 1."));
        }

        let n_features = rows[0].len();
        if n_features == 0 || rows.iter().any(|r| r.len() != n_features) {
            return Err(AppError::computation("Training rows must share a non-zero width."));
        }
        if rows.iter().flatten().chain(y.iter()).any(|v| !v.is_finite()) {
            return Err(AppError::computation("Training data contains non-finite values."));
        }

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_leaf: params.min_samples_leaf,
            features_per_split: params
                .features_per_split
                .unwrap_or_else(|| (n_features as f64).sqrt().ceil() as usize),
        };

        let n = rows.len();
        let trees: Vec<RegressionTree> = (0..params.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(tree_seed(seed, t));
                let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(rows, y, &bootstrap, &tree_params, &mut rng)
            })
            .collect();

        Ok(Self { n_features, trees })
    }

    /// Mean of the per-tree predictions.
    pub fn predict(&self, row: &[f64]) -> f64 {
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        sum / self.trees.len() as f64
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Structural check of every tree against `n_features`.
    pub fn check(&self) -> Result<(), String> {
        if self.trees.is_empty() {
            return Err("forest has no trees".to_string());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.check(self.n_features).map_err(|e| format!("tree {i}: {e}"))?;
        }
        Ok(())
    }
}

fn tree_seed(seed: u64, tree: usize) -> u64 {
    derive_seed(seed, "tree", &[tree as u64])
}
