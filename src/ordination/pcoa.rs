//! Principal Coordinates Analysis (PCoA), also known as classical
//! multidimensional scaling.
//!
//! Embeds samples in a low-dimensional Euclidean space that preserves their
//! pairwise dissimilarities as closely as possible.
//!
//! # Algorithm
//!
//! 1. Square the dissimilarities element-wise: A = D²
//! 2. Double-center: B = -½ (A - row_means - col_means + grand_mean)
//! 3. Symmetric eigendecomposition of B, eigenvalues sorted descending
//! 4. Coordinates on axis k: eigenvector_k × √max(λ_k, 0)
//! 5. Variance explained on axis k: λ_k / Σ|λ_i|
//!
//! Non-Euclidean dissimilarities such as Bray-Curtis can produce negative
//! eigenvalues. They are clipped to zero when scaling coordinates but kept,
//! signed, in the variance-explained denominator.

use crate::data::{check_dissimilarity, DissimilarityMatrix};
use crate::error::{BetaError, Result};
use nalgebra::{DMatrix, SymmetricEigen};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Iteration cap handed to the symmetric eigensolver.
const MAX_EIGEN_ITERATIONS: usize = 10_000;

/// Eigenvalues below `-NEGATIVE_EIGEN_TOLERANCE × max|λ|` count as negative.
const NEGATIVE_EIGEN_TOLERANCE: f64 = 1e-10;

/// Sample coordinates in ordination space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coordinates {
    /// Sample identifiers, in the order of the input matrix.
    pub sample_ids: Vec<String>,
    /// Coordinates per sample. Shape: `n_samples × n_axes`.
    pub axes: Vec<Vec<f64>>,
    /// All eigenvalues of the centered matrix, signed, in descending order.
    pub eigenvalues: Vec<f64>,
    /// Fraction of total variation carried by each retained axis.
    pub variance_explained: Vec<f64>,
    /// Number of eigenvalues that are meaningfully negative.
    pub n_negative_eigenvalues: usize,
}

impl Coordinates {
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    pub fn n_axes(&self) -> usize {
        self.variance_explained.len()
    }

    /// Values of every sample on axis `k` (0-based).
    pub fn axis(&self, k: usize) -> Option<Vec<f64>> {
        if k >= self.n_axes() {
            return None;
        }
        Some(self.axes.iter().map(|row| row[k]).collect())
    }

    /// Coordinates of one sample.
    pub fn sample(&self, sample_id: &str) -> Option<&[f64]> {
        let idx = self.sample_ids.iter().position(|s| s == sample_id)?;
        Some(&self.axes[idx])
    }

    /// Axis labels of the form `PCo1 (42.1%)`.
    pub fn axis_labels(&self) -> Vec<String> {
        self.variance_explained
            .iter()
            .enumerate()
            .map(|(k, v)| format!("PCo{} ({:.1}%)", k + 1, v * 100.0))
            .collect()
    }

    /// Write sample coordinates as TSV.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "sample_id")?;
        for k in 0..self.n_axes() {
            write!(writer, "\tPCo{}", k + 1)?;
        }
        writeln!(writer)?;

        for (sid, row) in self.sample_ids.iter().zip(&self.axes) {
            write!(writer, "{}", sid)?;
            for value in row {
                write!(writer, "\t{:.6}", value)?;
            }
            writeln!(writer)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Write per-axis eigenvalues and variance explained as TSV.
    pub fn eigenvalues_to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        writeln!(writer, "axis\teigenvalue\tvariance_explained")?;
        for (k, v) in self.variance_explained.iter().enumerate() {
            writeln!(writer, "PCo{}\t{:.6e}\t{:.6}", k + 1, self.eigenvalues[k], v)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Run PCoA on a dissimilarity matrix, keeping the first `n_axes` axes.
///
/// # Errors
/// - `InvalidParameter` if `n_axes` is 0 or exceeds the number of samples
/// - `Numerical` if the matrix is not a valid dissimilarity matrix or the
///   eigendecomposition does not converge
pub fn pcoa(distances: &DissimilarityMatrix, n_axes: usize) -> Result<Coordinates> {
    pcoa_matrix(distances.matrix(), distances.sample_ids(), n_axes)
}

/// Run PCoA on a raw square matrix.
///
/// The matrix is checked for squareness, symmetry, zero diagonal and finite
/// non-negative entries before decomposition.
pub fn pcoa_matrix(
    distances: &DMatrix<f64>,
    sample_ids: &[String],
    n_axes: usize,
) -> Result<Coordinates> {
    if let Some(problem) = check_dissimilarity(distances) {
        return Err(BetaError::Numerical(format!("PCoA input rejected: {}", problem)));
    }
    let n = distances.nrows();
    if n < 2 {
        return Err(BetaError::InvalidInput(
            "PCoA requires at least 2 samples".to_string(),
        ));
    }
    if sample_ids.len() != n {
        return Err(BetaError::DimensionMismatch {
            expected: n,
            actual: sample_ids.len(),
        });
    }
    if n_axes == 0 || n_axes > n {
        return Err(BetaError::InvalidParameter(format!(
            "n_axes ({}) must be in [1, {}]",
            n_axes, n
        )));
    }

    let centered = gower_center(distances);
    let eigen = SymmetricEigen::try_new(centered, f64::EPSILON, MAX_EIGEN_ITERATIONS)
        .ok_or_else(|| {
            BetaError::Numerical("eigendecomposition did not converge".to_string())
        })?;

    if eigen.eigenvalues.iter().any(|v| !v.is_finite())
        || eigen.eigenvectors.iter().any(|v| !v.is_finite())
    {
        return Err(BetaError::Numerical(
            "eigendecomposition produced non-finite values".to_string(),
        ));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));
    let eigenvalues: Vec<f64> = order.iter().map(|&k| eigen.eigenvalues[k]).collect();

    let max_abs = eigenvalues.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
    let n_negative = eigenvalues
        .iter()
        .filter(|&&v| v < -NEGATIVE_EIGEN_TOLERANCE * max_abs)
        .count();
    if n_negative > 0 {
        tracing::warn!(
            n_negative,
            "dissimilarities are not Euclidean; negative eigenvalues clipped for coordinates"
        );
    }

    let total: f64 = eigenvalues.iter().map(|v| v.abs()).sum();
    let variance_explained: Vec<f64> = eigenvalues
        .iter()
        .take(n_axes)
        .map(|&v| if total > 0.0 { v / total } else { 0.0 })
        .collect();

    let mut axes = vec![vec![0.0; n_axes]; n];
    for (k, &col) in order.iter().take(n_axes).enumerate() {
        let vector = eigen.eigenvectors.column(col);
        // Fix the sign so the largest-magnitude component is positive.
        let pivot = vector.iter().fold(0.0_f64, |best, &v| {
            if v.abs() > best.abs() {
                v
            } else {
                best
            }
        });
        let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
        let scale = eigenvalues[k].max(0.0).sqrt();
        for i in 0..n {
            axes[i][k] = sign * vector[i] * scale;
        }
    }

    tracing::debug!(
        samples = n,
        axes = n_axes,
        explained = ?variance_explained,
        "PCoA complete"
    );

    Ok(Coordinates {
        sample_ids: sample_ids.to_vec(),
        axes,
        eigenvalues,
        variance_explained,
        n_negative_eigenvalues: n_negative,
    })
}

/// Gower's double centering of squared distances: B = -½ J D² J.
fn gower_center(distances: &DMatrix<f64>) -> DMatrix<f64> {
    let n = distances.nrows();
    let squared = distances.map(|d| d * d);

    let row_means: Vec<f64> = (0..n)
        .map(|i| squared.row(i).iter().sum::<f64>() / n as f64)
        .collect();
    let col_means: Vec<f64> = (0..n)
        .map(|j| squared.column(j).iter().sum::<f64>() / n as f64)
        .collect();
    let grand_mean = row_means.iter().sum::<f64>() / n as f64;

    let mut centered = DMatrix::from_fn(n, n, |i, j| {
        -0.5 * (squared[(i, j)] - row_means[i] - col_means[j] + grand_mean)
    });
    // Keep exact symmetry for the eigensolver.
    for i in 0..n {
        for j in (i + 1)..n {
            let mean = 0.5 * (centered[(i, j)] + centered[(j, i)]);
            centered[(i, j)] = mean;
            centered[(j, i)] = mean;
        }
    }
    centered
}
