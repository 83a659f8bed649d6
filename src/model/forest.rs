//! Isolation forest
//!
//! Unsupervised ensemble scorer: anomalies are easier to isolate, so they
//! end up with shorter average path lengths across randomly built trees.

use ndarray::ArrayView2;
use rand::prelude::*;

use crate::config::ForestConfig;
use crate::error::{PipelineError, Result};

use super::{OutlierBackend, OutlierScorer};

/// A node in an isolation tree
#[derive(Debug, Clone)]
enum IsolationNode {
    /// Internal node with split information
    Internal {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    /// Leaf node with the number of samples that landed here
    Leaf { size: usize },
}

/// Single isolation tree
#[derive(Debug, Clone)]
struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    /// Build a tree over the given sample rows
    fn build(
        data: ArrayView2<'_, f64>,
        rows: &[usize],
        max_depth: usize,
        rng: &mut impl Rng,
    ) -> Self {
        let root = Self::build_node(data, rows, 0, max_depth, rng);
        Self { root }
    }

    fn build_node(
        data: ArrayView2<'_, f64>,
        rows: &[usize],
        depth: usize,
        max_depth: usize,
        rng: &mut impl Rng,
    ) -> IsolationNode {
        let n_features = data.ncols();

        if depth >= max_depth || rows.len() <= 1 {
            return IsolationNode::Leaf { size: rows.len() };
        }

        // Random feature, random split between its min and max
        let feature = rng.gen_range(0..n_features);

        let mut min_val = f64::INFINITY;
        let mut max_val = f64::NEG_INFINITY;
        for &i in rows {
            let v = data[[i, feature]];
            min_val = min_val.min(v);
            max_val = max_val.max(v);
        }

        if (max_val - min_val).abs() < 1e-12 {
            return IsolationNode::Leaf { size: rows.len() };
        }

        let threshold = rng.gen_range(min_val..max_val);

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .copied()
            .partition(|&i| data[[i, feature]] < threshold);

        if left_rows.is_empty() || right_rows.is_empty() {
            return IsolationNode::Leaf { size: rows.len() };
        }

        IsolationNode::Internal {
            feature,
            threshold,
            left: Box::new(Self::build_node(data, &left_rows, depth + 1, max_depth, rng)),
            right: Box::new(Self::build_node(data, &right_rows, depth + 1, max_depth, rng)),
        }
    }

    /// Path length for a single row
    fn path_length(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;

        loop {
            match node {
                IsolationNode::Leaf { size } => return depth as f64 + c(*size),
                IsolationNode::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row.get(*feature).copied().unwrap_or(0.0) < *threshold {
                        left
                    } else {
                        right
                    };
                    depth += 1;
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over n points
fn c(n: usize) -> f64 {
    if n <= 1 {
        0.0
    } else if n == 2 {
        1.0
    } else {
        let n = n as f64;
        2.0 * (n.ln() + 0.5772156649) - 2.0 * (n - 1.0) / n
    }
}

/// Fitted isolation forest
///
/// Immutable once built; [`IsolationForest::fit`] returns a new forest
/// rather than retraining in place, so swapping models is a plain
/// assignment.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    /// Samples drawn per tree, used to normalize path lengths
    sample_size: usize,
}

impl IsolationForest {
    /// Fit a forest on the training matrix (rows = samples).
    ///
    /// Fails with `TrainingFailed` when fewer than two samples are given or
    /// every feature column is constant; such a set cannot express what
    /// "normal" variation looks like.
    pub fn fit(samples: ArrayView2<'_, f64>, config: &ForestConfig) -> Result<Self> {
        let n_samples = samples.nrows();

        if n_samples < 2 {
            return Err(PipelineError::TrainingFailed(format!(
                "need at least 2 samples, got {n_samples}"
            )));
        }

        let has_variance = (0..samples.ncols()).any(|j| {
            let col = samples.column(j);
            let min = col.iter().cloned().fold(f64::INFINITY, f64::min);
            let max = col.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            max - min > 1e-12
        });
        if !has_variance {
            return Err(PipelineError::TrainingFailed(
                "training set has zero variance in every feature".into(),
            ));
        }

        let sample_size = config.max_tree_samples.min(n_samples);
        let max_depth = (sample_size as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(config.seed);

        let trees = (0..config.trees)
            .map(|_| {
                let rows: Vec<usize> = (0..n_samples).choose_multiple(&mut rng, sample_size);
                IsolationTree::build(samples, &rows, max_depth, &mut rng)
            })
            .collect();

        Ok(Self { trees, sample_size })
    }

    /// Number of trees in the forest
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }
}

impl OutlierScorer for IsolationForest {
    /// Anomaly score 2^(-E[h(x)] / c(psi)) in (0, 1], higher = more anomalous
    fn score(&self, row: &[f64]) -> f64 {
        let avg_path: f64 = self
            .trees
            .iter()
            .map(|tree| tree.path_length(row))
            .sum::<f64>()
            / self.trees.len() as f64;

        let norm = c(self.sample_size);
        if norm > 0.0 {
            2.0_f64.powf(-avg_path / norm)
        } else {
            0.5
        }
    }
}

impl OutlierBackend for ForestConfig {
    fn fit(&self, samples: ArrayView2<'_, f64>) -> Result<Box<dyn OutlierScorer>> {
        Ok(Box::new(IsolationForest::fit(samples, self)?))
    }

    fn name(&self) -> &'static str {
        "IsolationForest"
    }
}
