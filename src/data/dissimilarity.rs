//! Square, symmetric sample-by-sample dissimilarity matrix.

use super::infer_delimiter;
use crate::error::{BetaError, Result};
use nalgebra::DMatrix;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Absolute tolerance for symmetry and zero-diagonal checks.
pub const SYMMETRY_TOLERANCE: f64 = 1e-10;

/// Pairwise dissimilarities between samples.
///
/// Invariants, checked on construction: square, finite, non-negative,
/// `D[i][j] == D[j][i]` and `D[i][i] == 0`. Entries within
/// [`SYMMETRY_TOLERANCE`] of satisfying the last two are snapped to exact
/// values. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct DissimilarityMatrix {
    data: DMatrix<f64>,
    sample_ids: Vec<String>,
}

impl DissimilarityMatrix {
    pub fn new(mut data: DMatrix<f64>, sample_ids: Vec<String>) -> Result<Self> {
        if let Some(problem) = check_dissimilarity(&data) {
            return Err(BetaError::InvalidInput(problem));
        }
        if data.nrows() != sample_ids.len() {
            return Err(BetaError::DimensionMismatch {
                expected: data.nrows(),
                actual: sample_ids.len(),
            });
        }
        {
            let mut seen = HashSet::with_capacity(sample_ids.len());
            if let Some(dup) = sample_ids.iter().find(|s| !seen.insert(s.as_str())) {
                return Err(BetaError::InvalidInput(format!(
                    "duplicate sample identifier '{}'",
                    dup
                )));
            }
        }

        let n = data.nrows();
        for i in 0..n {
            data[(i, i)] = 0.0;
            for j in (i + 1)..n {
                let mean = 0.5 * (data[(i, j)] + data[(j, i)]);
                data[(i, j)] = mean;
                data[(j, i)] = mean;
            }
        }

        Ok(Self { data, sample_ids })
    }

    /// Load a square matrix written by [`Self::to_tsv`] (or any delimited
    /// table with matching row and column sample IDs).
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let delimiter = infer_delimiter(path.as_ref());
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let sample_ids: Vec<String> = reader.headers()?.iter().skip(1).map(String::from).collect();
        let n = sample_ids.len();
        if n == 0 {
            return Err(BetaError::EmptyData("dissimilarity table has no samples".to_string()));
        }

        let mut data = DMatrix::zeros(n, n);
        let mut n_rows = 0;
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            if i >= n {
                return Err(BetaError::DimensionMismatch {
                    expected: n,
                    actual: i + 1,
                });
            }
            if record.get(0) != Some(sample_ids[i].as_str()) {
                return Err(BetaError::SampleMismatch(format!(
                    "row {} is labelled '{}', expected '{}'",
                    i + 1,
                    record.get(0).unwrap_or_default(),
                    sample_ids[i]
                )));
            }
            for (j, raw) in record.iter().skip(1).enumerate() {
                data[(i, j)] = raw.parse().map_err(|_| {
                    BetaError::InvalidInput(format!(
                        "non-numeric dissimilarity '{}' at row '{}'",
                        raw, sample_ids[i]
                    ))
                })?;
            }
            n_rows += 1;
        }
        if n_rows != n {
            return Err(BetaError::DimensionMismatch {
                expected: n,
                actual: n_rows,
            });
        }

        Self::new(data, sample_ids)
    }

    /// Write the full matrix as TSV with sample IDs on both axes.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "sample_id")?;
        for sid in &self.sample_ids {
            write!(writer, "\t{}", sid)?;
        }
        writeln!(writer)?;

        for (i, sid) in self.sample_ids.iter().enumerate() {
            write!(writer, "{}", sid)?;
            for j in 0..self.n_samples() {
                write!(writer, "\t{}", self.data[(i, j)])?;
            }
            writeln!(writer)?;
        }

        writer.flush()?;
        Ok(())
    }

    #[inline]
    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[(i, j)]
    }

    /// Dissimilarity between two samples by identifier.
    pub fn get_by_id(&self, a: &str, b: &str) -> Option<f64> {
        Some(self.get(self.index_of(a)?, self.index_of(b)?))
    }

    /// Position of a sample by identifier.
    pub fn index_of(&self, sample_id: &str) -> Option<usize> {
        self.sample_ids.iter().position(|s| s == sample_id)
    }

    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.nrows()
    }

    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Get reference to the underlying matrix.
    #[inline]
    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.data
    }

    /// Upper triangle (excluding the diagonal) in row-major order.
    pub fn condensed(&self) -> Vec<f64> {
        let n = self.n_samples();
        let mut out = Vec::with_capacity(n * n.saturating_sub(1) / 2);
        for i in 0..n {
            for j in (i + 1)..n {
                out.push(self.data[(i, j)]);
            }
        }
        out
    }

    /// Sub-matrix over the given sample indices, in the given order.
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.n_samples()) {
            return Err(BetaError::InvalidParameter(format!(
                "Sample index {} out of bounds",
                bad
            )));
        }
        let data = DMatrix::from_fn(indices.len(), indices.len(), |r, c| {
            self.data[(indices[r], indices[c])]
        });
        let sample_ids = indices.iter().map(|&i| self.sample_ids[i].clone()).collect();
        Self::new(data, sample_ids)
    }
}

/// Describe the first violated dissimilarity invariant, if any.
pub(crate) fn check_dissimilarity(data: &DMatrix<f64>) -> Option<String> {
    let (nrows, ncols) = data.shape();
    if nrows != ncols {
        return Some(format!("dissimilarity matrix is {}x{}, not square", nrows, ncols));
    }
    for i in 0..nrows {
        for j in 0..ncols {
            let d = data[(i, j)];
            if !d.is_finite() {
                return Some(format!("non-finite dissimilarity at ({}, {})", i, j));
            }
            if d < 0.0 {
                return Some(format!("negative dissimilarity {} at ({}, {})", d, i, j));
            }
        }
        if data[(i, i)].abs() > SYMMETRY_TOLERANCE {
            return Some(format!("non-zero diagonal entry {} at {}", data[(i, i)], i));
        }
        for j in (i + 1)..ncols {
            if (data[(i, j)] - data[(j, i)]).abs() > SYMMETRY_TOLERANCE {
                return Some(format!(
                    "matrix is not symmetric at ({}, {}): {} vs {}",
                    i,
                    j,
                    data[(i, j)],
                    data[(j, i)]
                ));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn ids(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("S{}", i)).collect()
    }

    fn example() -> DissimilarityMatrix {
        let data = DMatrix::from_row_slice(3, 3, &[0.0, 0.2, 0.5, 0.2, 0.0, 0.7, 0.5, 0.7, 0.0]);
        DissimilarityMatrix::new(data, ids(3)).unwrap()
    }

    #[test]
    fn test_accessors() {
        let d = example();
        assert_eq!(d.n_samples(), 3);
        assert_eq!(d.get(0, 2), 0.5);
        assert_eq!(d.get_by_id("S3", "S2"), Some(0.7));
        assert_eq!(d.get_by_id("S3", "S9"), None);
        assert_eq!(d.condensed(), vec![0.2, 0.5, 0.7]);
    }

    #[test]
    fn test_rejects_asymmetric() {
        let data = DMatrix::from_row_slice(2, 2, &[0.0, 0.2, 0.3, 0.0]);
        let result = DissimilarityMatrix::new(data, ids(2));
        assert!(matches!(result, Err(BetaError::InvalidInput(_))));
    }

    #[test]
    fn test_rejects_nonzero_diagonal_and_negative() {
        let data = DMatrix::from_row_slice(2, 2, &[0.1, 0.2, 0.2, 0.0]);
        assert!(DissimilarityMatrix::new(data, ids(2)).is_err());

        let data = DMatrix::from_row_slice(2, 2, &[0.0, -0.2, -0.2, 0.0]);
        assert!(DissimilarityMatrix::new(data, ids(2)).is_err());

        let data = DMatrix::from_row_slice(2, 3, &[0.0; 6]);
        assert!(DissimilarityMatrix::new(data, ids(2)).is_err());
    }

    #[test]
    fn test_snaps_tiny_asymmetry() {
        let data = DMatrix::from_row_slice(2, 2, &[0.0, 0.5, 0.5 + 1e-12, 0.0]);
        let d = DissimilarityMatrix::new(data, ids(2)).unwrap();
        assert_eq!(d.get(0, 1), d.get(1, 0));
    }

    #[test]
    fn test_subset() {
        let d = example();
        let sub = d.subset(&[2, 0]).unwrap();
        assert_eq!(sub.sample_ids(), &["S3", "S1"]);
        assert_eq!(sub.get(0, 1), 0.5);
        assert!(d.subset(&[3]).is_err());
    }

    #[test]
    fn test_tsv_roundtrip() {
        let d = example();
        let file = NamedTempFile::new().unwrap();
        d.to_tsv(file.path()).unwrap();
        let loaded = DissimilarityMatrix::from_path(file.path()).unwrap();
        assert_eq!(loaded, d);
    }
}
