//! Pairwise dissimilarity between samples.
//!
//! Any metric that is symmetric with zero self-distance can be plugged in
//! through [`DissimilarityMetric`]; Bray-Curtis is the default.
//!
//! # Example
//!
//! ```ignore
//! use betadiv::distance::{compute_dissimilarity, BrayCurtis};
//!
//! let distances = compute_dissimilarity(&abundance, &BrayCurtis)?;
//! ```

pub mod bray_curtis;

pub use bray_curtis::{bray_curtis, BrayCurtis};

use crate::data::{AbundanceMatrix, DissimilarityMatrix};
use crate::error::{BetaError, Result};
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// A dissimilarity function over two abundance profiles of equal length.
///
/// Implementations must return finite, non-negative values, be symmetric in
/// their arguments, and return 0 for identical inputs.
pub trait DissimilarityMetric: Send + Sync {
    /// Short identifier used in logs and output.
    fn name(&self) -> &str;

    fn dissimilarity(&self, x: &[f64], y: &[f64]) -> f64;
}

/// Metrics selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    #[default]
    BrayCurtis,
}

impl MetricKind {
    pub fn metric(&self) -> Box<dyn DissimilarityMetric> {
        match self {
            MetricKind::BrayCurtis => Box::new(BrayCurtis),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MetricKind::BrayCurtis => "bray_curtis",
        }
    }
}

/// Compute the sample-by-sample dissimilarity matrix.
///
/// Runs in O(n² · f) for n samples and f features. Each sample is densified
/// once and the upper triangle is filled in parallel; the result does not
/// depend on thread scheduling.
///
/// # Errors
/// - `InvalidInput` if fewer than 2 samples are supplied
/// - `InvalidInput` if the metric yields a negative or non-finite value
pub fn compute_dissimilarity(
    matrix: &AbundanceMatrix,
    metric: &dyn DissimilarityMetric,
) -> Result<DissimilarityMatrix> {
    let n = matrix.n_samples();
    if n < 2 {
        return Err(BetaError::InvalidInput(format!(
            "at least 2 samples are required to compute dissimilarities, got {}",
            n
        )));
    }

    tracing::debug!(
        metric = metric.name(),
        samples = n,
        features = matrix.n_features(),
        "computing dissimilarity matrix"
    );

    let rows = matrix.dense_rows();
    let upper: Vec<Vec<f64>> = (0..n)
        .into_par_iter()
        .map(|i| {
            ((i + 1)..n)
                .map(|j| metric.dissimilarity(&rows[i], &rows[j]))
                .collect()
        })
        .collect();

    let sample_ids = matrix.sample_ids();
    let mut data = DMatrix::zeros(n, n);
    for (i, row) in upper.iter().enumerate() {
        for (offset, &d) in row.iter().enumerate() {
            let j = i + 1 + offset;
            if !d.is_finite() || d < 0.0 {
                return Err(BetaError::InvalidInput(format!(
                    "{} dissimilarity between '{}' and '{}' is {}",
                    metric.name(),
                    sample_ids[i],
                    sample_ids[j],
                    d
                )));
            }
            data[(i, j)] = d;
            data[(j, i)] = d;
        }
    }

    DissimilarityMatrix::new(data, sample_ids.to_vec())
}
