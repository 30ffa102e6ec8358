//! CART regression tree.
//!
//! Splits minimise the summed squared error of the two children. At each node
//! only a random subset of features is searched (`features_per_split`), which
//! decorrelates the trees of a bagged ensemble.
//!
//! Nodes live in a flat vector; children are referenced by index.

use rand::rngs::StdRng;
use rand::seq::index;
use serde::{Deserialize, Serialize};

/// Minimum SSE improvement for a split to be accepted.
const MIN_GAIN: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Node {
    Leaf {
        value: f64,
        n: usize,
    },
    /// Rows with `row[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub features_per_split: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    nodes: Vec<Node>,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    /// Grow a tree on the rows named by `indices` (duplicates allowed, as
    /// produced by bootstrap resampling).
    ///
    /// # Panics
    /// Panics if `indices` is empty or references rows out of bounds.
    pub fn fit(rows: &[Vec<f64>], y: &[f64], indices: &[usize], params: &TreeParams, rng: &mut StdRng) -> Self {
        assert!(!indices.is_empty(), "cannot grow a tree on zero rows");
        let mut tree = Self { nodes: Vec::new() };
        let mut idx = indices.to_vec();
        tree.grow(rows, y, &mut idx, 0, params, rng);
        tree
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Leaf { value, .. } => return *value,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    at = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Check the node graph of a tree that did not come out of `fit` (e.g. one
    /// read from a model file): children point forward within the node list and
    /// every split reads an input below `n_features`.
    pub fn check(&self, n_features: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        let len = self.nodes.len();
        for (at, node) in self.nodes.iter().enumerate() {
            if let Node::Split { feature, left, right, .. } = node {
                if *feature >= n_features {
                    return Err(format!("node {at} splits on input {feature} of {n_features}"));
                }
                if *left <= at || *right <= at || *left >= len || *right >= len {
                    return Err(format!("node {at} has out-of-order children ({left}, {right})"));
                }
            }
        }
        Ok(())
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| matches!(n, Node::Leaf { .. })).count()
    }

    pub fn depth(&self) -> usize {
        fn walk(nodes: &[Node], at: usize) -> usize {
            match &nodes[at] {
                Node::Leaf { .. } => 0,
                Node::Split { left, right, .. } => 1 + walk(nodes, *left).max(walk(nodes, *right)),
            }
        }
        walk(&self.nodes, 0)
    }

    fn grow(
        &mut self,
        rows: &[Vec<f64>],
        y: &[f64],
        idx: &mut [usize],
        depth: usize,
        params: &TreeParams,
        rng: &mut StdRng,
    ) -> usize {
        let n = idx.len();
        let sum: f64 = idx.iter().map(|&i| y[i]).sum();
        let sum_sq: f64 = idx.iter().map(|&i| y[i] * y[i]).sum();
        let mean = sum / n as f64;
        let sse = sum_sq - sum * sum / n as f64;

        let at = self.nodes.len();
        self.nodes.push(Node::Leaf { value: mean, n });

        let min_leaf = params.min_samples_leaf.max(1);
        if depth >= params.max_depth || n < 2 * min_leaf || sse <= MIN_GAIN {
            return at;
        }

        let Some(split) = best_split(rows, y, idx, params, rng) else {
            return at;
        };
        if split.sse >= sse - MIN_GAIN {
            return at;
        }

        // Partition in place: left block first.
        let mut mid = 0;
        for k in 0..n {
            if rows[idx[k]][split.feature] <= split.threshold {
                idx.swap(k, mid);
                mid += 1;
            }
        }
        if mid == 0 || mid == n {
            return at;
        }

        let (left_idx, right_idx) = idx.split_at_mut(mid);
        let left = self.grow(rows, y, left_idx, depth + 1, params, rng);
        let right = self.grow(rows, y, right_idx, depth + 1, params, rng);
        self.nodes[at] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        at
    }
}

fn best_split(
    rows: &[Vec<f64>],
    y: &[f64],
    idx: &[usize],
    params: &TreeParams,
    rng: &mut StdRng,
) -> Option<SplitCandidate> {
    let p = rows[idx[0]].len();
    if p == 0 {
        return None;
    }
    let mtry = params.features_per_split.clamp(1, p);
    let mut features: Vec<usize> = index::sample(rng, p, mtry).into_vec();
    features.sort_unstable();

    let n = idx.len();
    let min_leaf = params.min_samples_leaf.max(1);
    let mut order: Vec<usize> = idx.to_vec();
    let mut best: Option<SplitCandidate> = None;

    for &f in &features {
        order.sort_by(|&a, &b| rows[a][f].partial_cmp(&rows[b][f]).unwrap_or(std::cmp::Ordering::Equal));

        let total: f64 = order.iter().map(|&i| y[i]).sum();
        let total_sq: f64 = order.iter().map(|&i| y[i] * y[i]).sum();
        let mut left_sum = 0.0;
        let mut left_sq = 0.0;

        for k in 1..n {
            let yi = y[order[k - 1]];
            left_sum += yi;
            left_sq += yi * yi;

            if k < min_leaf || n - k < min_leaf {
                continue;
            }
            let lo = rows[order[k - 1]][f];
            let hi = rows[order[k]][f];
            if hi <= lo {
                continue;
            }

            let nl = k as f64;
            let nr = (n - k) as f64;
            let right_sum = total - left_sum;
            let right_sq = total_sq - left_sq;
            let sse = (left_sq - left_sum * left_sum / nl) + (right_sq - right_sum * right_sum / nr);

            let better = match best {
                None => true,
                Some(b) => sse < b.sse,
            };
            if better && sse.is_finite() {
                best = Some(SplitCandidate {
                    feature: f,
                    threshold: lo + (hi - lo) / 2.0,
                    sse,
                });
            }
        }
    }

    best
}
