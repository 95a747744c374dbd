//! Sample-by-feature abundance matrix with sparse storage.

use super::infer_delimiter;
use crate::error::{BetaError, Result};
use rayon::prelude::*;
use sprs::{CsMat, TriMat};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// A sparse abundance matrix.
///
/// Rows represent samples, columns represent features (taxa/genes). Values
/// are non-negative and finite; this is checked on construction and the
/// matrix is read-only afterwards. Uses CSR (Compressed Sparse Row) format so
/// that whole samples can be extracted cheaply.
#[derive(Debug, Clone)]
pub struct AbundanceMatrix {
    /// Sparse matrix in CSR format (samples × features)
    data: CsMat<f64>,
    /// Sample identifiers (row names)
    sample_ids: Vec<String>,
    /// Feature identifiers (column names)
    feature_ids: Vec<String>,
}

impl AbundanceMatrix {
    /// Create a new AbundanceMatrix from a sparse matrix and identifiers.
    pub fn new(data: CsMat<f64>, sample_ids: Vec<String>, feature_ids: Vec<String>) -> Result<Self> {
        let (nrows, ncols) = data.shape();
        if nrows != sample_ids.len() {
            return Err(BetaError::DimensionMismatch {
                expected: nrows,
                actual: sample_ids.len(),
            });
        }
        if ncols != feature_ids.len() {
            return Err(BetaError::DimensionMismatch {
                expected: ncols,
                actual: feature_ids.len(),
            });
        }
        check_unique("sample", &sample_ids)?;
        check_unique("feature", &feature_ids)?;

        if !data.is_csr() {
            return Err(BetaError::InvalidInput(
                "abundance matrix must be stored in CSR (sample-major) order".to_string(),
            ));
        }
        for (row, row_vec) in data.outer_iterator().enumerate() {
            for (col, &val) in row_vec.iter() {
                if !val.is_finite() || val < 0.0 {
                    return Err(BetaError::InvalidInput(format!(
                        "abundance for sample '{}', feature '{}' is {}; values must be finite and non-negative",
                        sample_ids[row], feature_ids[col], val
                    )));
                }
            }
        }

        Ok(Self {
            data,
            sample_ids,
            feature_ids,
        })
    }

    /// Build a matrix from dense per-sample rows.
    ///
    /// Every row must have one value per feature.
    pub fn from_rows(
        sample_ids: Vec<String>,
        feature_ids: Vec<String>,
        rows: &[Vec<f64>],
    ) -> Result<Self> {
        if rows.len() != sample_ids.len() {
            return Err(BetaError::DimensionMismatch {
                expected: sample_ids.len(),
                actual: rows.len(),
            });
        }
        let n_features = feature_ids.len();
        let mut tri_mat = TriMat::new((rows.len(), n_features));
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(BetaError::InvalidInput(format!(
                    "sample '{}' has {} values, expected {}",
                    sample_ids[i],
                    row.len(),
                    n_features
                )));
            }
            for (j, &val) in row.iter().enumerate() {
                if val != 0.0 {
                    tri_mat.add_triplet(i, j, val);
                }
            }
        }
        Self::new(tri_mat.to_csr(), sample_ids, feature_ids)
    }

    /// Load from a delimited file, inferring the delimiter from the extension.
    ///
    /// `.csv` files are comma separated, anything else is read as tab separated.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let delimiter = infer_delimiter(path.as_ref());
        Self::from_delimited(path, delimiter)
    }

    /// Load from a TSV file.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_delimited(path, b'\t')
    }

    /// Load from a CSV file.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_delimited(path, b',')
    }

    /// Load an abundance table stored with features as rows.
    ///
    /// Expected format:
    /// - First row: header with sample IDs (first column is the feature ID header)
    /// - Subsequent rows: feature ID followed by one abundance per sample
    ///
    /// The table is transposed on load so that samples become rows.
    pub fn from_delimited<P: AsRef<Path>>(path: P, delimiter: u8) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let header = reader.headers()?.clone();
        if header.len() < 2 {
            return Err(BetaError::EmptyData(
                "abundance table must have at least one sample column".to_string(),
            ));
        }
        let sample_ids: Vec<String> = header.iter().skip(1).map(String::from).collect();
        let n_samples = sample_ids.len();

        let mut triplets: Vec<(usize, usize, f64)> = Vec::new();
        let mut feature_ids: Vec<String> = Vec::new();

        for record in reader.records() {
            let record = record?;
            if record.iter().all(|field| field.is_empty()) {
                continue;
            }
            if record.len() != n_samples + 1 {
                return Err(BetaError::InvalidInput(format!(
                    "feature row '{}' has {} values, expected {}",
                    record.get(0).unwrap_or_default(),
                    record.len().saturating_sub(1),
                    n_samples
                )));
            }

            let feature_idx = feature_ids.len();
            let feature_id = record.get(0).unwrap_or_default().to_string();

            for (sample_idx, raw) in record.iter().skip(1).enumerate() {
                let value: f64 = raw.parse().map_err(|_| BetaError::InvalidValue {
                    value: raw.to_string(),
                    feature: feature_id.clone(),
                    sample: sample_ids[sample_idx].clone(),
                })?;
                if value != 0.0 {
                    triplets.push((sample_idx, feature_idx, value));
                }
            }
            feature_ids.push(feature_id);
        }

        if feature_ids.is_empty() {
            return Err(BetaError::EmptyData("no features in abundance table".to_string()));
        }

        let mut tri_mat = TriMat::new((n_samples, feature_ids.len()));
        for (row, col, val) in triplets {
            tri_mat.add_triplet(row, col, val);
        }

        let matrix = Self::new(tri_mat.to_csr(), sample_ids, feature_ids)?;
        tracing::debug!(
            samples = matrix.n_samples(),
            features = matrix.n_features(),
            nnz = matrix.nnz(),
            "loaded abundance table"
        );
        Ok(matrix)
    }

    /// Write the matrix as TSV in the features-as-rows layout it is read from.
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "feature_id")?;
        for sample_id in &self.sample_ids {
            write!(writer, "\t{}", sample_id)?;
        }
        writeln!(writer)?;

        for (col, feature_id) in self.feature_ids.iter().enumerate() {
            write!(writer, "{}", feature_id)?;
            for row in 0..self.n_samples() {
                write!(writer, "\t{}", self.get(row, col))?;
            }
            writeln!(writer)?;
        }

        writer.flush()?;
        Ok(())
    }

    /// Get the value at (sample, feature), returning 0 for missing entries.
    #[inline]
    pub fn get(&self, sample: usize, feature: usize) -> f64 {
        self.data.get(sample, feature).copied().unwrap_or(0.0)
    }

    /// Number of samples (rows).
    #[inline]
    pub fn n_samples(&self) -> usize {
        self.data.rows()
    }

    /// Number of features (columns).
    #[inline]
    pub fn n_features(&self) -> usize {
        self.data.cols()
    }

    /// Total number of non-zero entries.
    #[inline]
    pub fn nnz(&self) -> usize {
        self.data.nnz()
    }

    /// Sample identifiers.
    #[inline]
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Feature identifiers.
    #[inline]
    pub fn feature_ids(&self) -> &[String] {
        &self.feature_ids
    }

    /// Get the underlying sparse matrix.
    #[inline]
    pub fn data(&self) -> &CsMat<f64> {
        &self.data
    }

    /// Get a dense vector for a specific sample.
    pub fn row_dense(&self, sample: usize) -> Vec<f64> {
        let mut dense = vec![0.0; self.n_features()];
        if let Some(row_vec) = self.data.outer_view(sample) {
            for (col, &val) in row_vec.iter() {
                dense[col] = val;
            }
        }
        dense
    }

    /// Dense rows for every sample, in sample order.
    pub fn dense_rows(&self) -> Vec<Vec<f64>> {
        (0..self.n_samples())
            .into_par_iter()
            .map(|row| self.row_dense(row))
            .collect()
    }

    /// Total abundance per sample.
    pub fn sample_totals(&self) -> Vec<f64> {
        self.data
            .outer_iterator()
            .map(|row_vec| row_vec.iter().map(|(_, &val)| val).sum())
            .collect()
    }

    /// Subset the matrix to include only specified samples (by index).
    pub fn subset_samples(&self, indices: &[usize]) -> Result<Self> {
        let mut tri_mat = TriMat::new((indices.len(), self.n_features()));
        let mut new_sample_ids = Vec::with_capacity(indices.len());

        for (new_row, &old_row) in indices.iter().enumerate() {
            if old_row >= self.n_samples() {
                return Err(BetaError::InvalidParameter(format!(
                    "Sample index {} out of bounds",
                    old_row
                )));
            }
            new_sample_ids.push(self.sample_ids[old_row].clone());
            if let Some(row_vec) = self.data.outer_view(old_row) {
                for (col, &val) in row_vec.iter() {
                    tri_mat.add_triplet(new_row, col, val);
                }
            }
        }

        Self::new(tri_mat.to_csr(), new_sample_ids, self.feature_ids.clone())
    }
}

fn check_unique(kind: &str, ids: &[String]) -> Result<()> {
    let mut seen = HashSet::with_capacity(ids.len());
    for id in ids {
        if !seen.insert(id.as_str()) {
            return Err(BetaError::InvalidInput(format!("duplicate {} identifier '{}'", kind, id)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn ids(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{}{}", prefix, i)).collect()
    }

    fn create_test_matrix() -> AbundanceMatrix {
        AbundanceMatrix::from_rows(
            ids("S", 4),
            ids("taxon_", 2),
            &[
                vec![10.0, 0.0],
                vec![8.0, 2.0],
                vec![0.0, 10.0],
                vec![2.0, 8.0],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_dimensions() {
        let mat = create_test_matrix();
        assert_eq!(mat.n_samples(), 4);
        assert_eq!(mat.n_features(), 2);
        assert_eq!(mat.nnz(), 6);
    }

    #[test]
    fn test_get_values() {
        let mat = create_test_matrix();
        assert_eq!(mat.get(0, 0), 10.0);
        assert_eq!(mat.get(0, 1), 0.0);
        assert_eq!(mat.row_dense(3), vec![2.0, 8.0]);
        assert_eq!(mat.sample_totals(), vec![10.0, 10.0, 10.0, 10.0]);
    }

    #[test]
    fn test_negative_value_rejected() {
        let result = AbundanceMatrix::from_rows(ids("S", 2), ids("f", 2), &[vec![1.0, -1.0], vec![1.0, 1.0]]);
        assert!(matches!(result, Err(BetaError::InvalidInput(_))));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let result = AbundanceMatrix::from_rows(ids("S", 2), ids("f", 2), &[vec![1.0, 2.0], vec![1.0]]);
        assert!(matches!(result, Err(BetaError::InvalidInput(_))));
    }

    #[test]
    fn test_duplicate_samples_rejected() {
        let sample_ids = vec!["S1".to_string(), "S1".to_string()];
        let result = AbundanceMatrix::from_rows(sample_ids, ids("f", 1), &[vec![1.0], vec![2.0]]);
        assert!(matches!(result, Err(BetaError::InvalidInput(_))));
    }

    #[test]
    fn test_load_transposes_features_as_rows() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "feature_id\tS1\tS2\tS3").unwrap();
        writeln!(file, "taxon_a\t10\t0\t3.5").unwrap();
        writeln!(file, "taxon_b\t0\t4\t1").unwrap();
        file.flush().unwrap();

        let mat = AbundanceMatrix::from_tsv(file.path()).unwrap();
        assert_eq!(mat.sample_ids(), &["S1", "S2", "S3"]);
        assert_eq!(mat.feature_ids(), &["taxon_a", "taxon_b"]);
        assert_eq!(mat.row_dense(2), vec![3.5, 1.0]);
        assert_eq!(mat.row_dense(1), vec![0.0, 4.0]);
    }

    #[test]
    fn test_load_csv() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "gene,A,B").unwrap();
        writeln!(file, "g1,1,2").unwrap();
        file.flush().unwrap();

        let mat = AbundanceMatrix::from_path(file.path()).unwrap();
        assert_eq!(mat.n_samples(), 2);
        assert_eq!(mat.get(1, 0), 2.0);
    }

    #[test]
    fn test_load_invalid_value() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "feature_id\tS1\tS2").unwrap();
        writeln!(file, "taxon_a\t10\tabc").unwrap();
        file.flush().unwrap();

        let result = AbundanceMatrix::from_tsv(file.path());
        assert!(matches!(result, Err(BetaError::InvalidValue { .. })));
    }

    #[test]
    fn test_tsv_roundtrip() {
        let mat = create_test_matrix();
        let file = NamedTempFile::new().unwrap();
        mat.to_tsv(file.path()).unwrap();

        let loaded = AbundanceMatrix::from_tsv(file.path()).unwrap();
        assert_eq!(loaded.sample_ids(), mat.sample_ids());
        assert_eq!(loaded.feature_ids(), mat.feature_ids());
        assert_eq!(loaded.dense_rows(), mat.dense_rows());
    }

    #[test]
    fn test_subset_samples() {
        let mat = create_test_matrix();
        let subset = mat.subset_samples(&[2, 0]).unwrap();
        assert_eq!(subset.sample_ids(), &["S3", "S1"]);
        assert_eq!(subset.row_dense(0), vec![0.0, 10.0]);
        assert!(mat.subset_samples(&[7]).is_err());
    }
}
