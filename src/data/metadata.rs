//! Sample metadata handling.

use super::{infer_delimiter, GroupAssignment};
use crate::error::{BetaError, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Sample metadata holding categorical variables for each sample.
///
/// Values are kept as strings; empty cells and `NA` are recorded as missing.
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Sample IDs in file order.
    sample_ids: Vec<String>,
    /// Column names (excluding the sample ID column).
    column_names: Vec<String>,
    /// Data stored as sample_id -> column_name -> value.
    data: HashMap<String, HashMap<String, Option<String>>>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load metadata, inferring the delimiter from the file extension.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let delimiter = infer_delimiter(path.as_ref());
        Self::from_delimited(path, delimiter)
    }

    /// Load metadata from a TSV file.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_delimited(path, b'\t')
    }

    /// Load metadata from a delimited file.
    ///
    /// Expected format:
    /// - First row: header with column names (first column is sample ID)
    /// - Subsequent rows: sample ID followed by variable values
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
                "Metadata must have at least one variable column".to_string(),
            ));
        }
        let column_names: Vec<String> = header.iter().skip(1).map(String::from).collect();

        let mut sample_ids = Vec::new();
        let mut data = HashMap::new();

        for record in reader.records() {
            let record = record?;
            let sample_id = match record.get(0) {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => continue,
            };
            if data.contains_key(&sample_id) {
                return Err(BetaError::InvalidInput(format!(
                    "duplicate sample '{}' in metadata",
                    sample_id
                )));
            }

            let mut sample_data = HashMap::new();
            for (col_idx, col_name) in column_names.iter().enumerate() {
                let value = record
                    .get(col_idx + 1)
                    .filter(|raw| !raw.is_empty() && *raw != "NA" && *raw != "na")
                    .map(String::from);
                sample_data.insert(col_name.clone(), value);
            }
            sample_ids.push(sample_id.clone());
            data.insert(sample_id, sample_data);
        }

        if sample_ids.is_empty() {
            return Err(BetaError::EmptyData("No samples in metadata".to_string()));
        }

        Ok(Self {
            sample_ids,
            column_names,
            data,
        })
    }

    /// Sample IDs in order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Column names.
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Number of samples.
    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Get a value for a specific sample and column, `None` when absent or missing.
    pub fn get(&self, sample_id: &str, column: &str) -> Option<&str> {
        self.data
            .get(sample_id)
            .and_then(|m| m.get(column))
            .and_then(|v| v.as_deref())
    }

    /// Get all values for a column, in sample order.
    pub fn column(&self, column: &str) -> Result<Vec<Option<&str>>> {
        if !self.has_column(column) {
            return Err(BetaError::MissingColumn(column.to_string()));
        }
        Ok(self
            .sample_ids
            .iter()
            .map(|sid| self.get(sid, column))
            .collect())
    }

    /// Get unique levels for a column, sorted.
    pub fn levels(&self, column: &str) -> Result<Vec<String>> {
        let mut levels: Vec<String> = self
            .column(column)?
            .into_iter()
            .flatten()
            .map(String::from)
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        levels.sort();
        Ok(levels)
    }

    /// Check if a column exists.
    pub fn has_column(&self, column: &str) -> bool {
        self.column_names.iter().any(|c| c == column)
    }

    /// Extract the grouping factor stored in `column`.
    ///
    /// Every sample must carry a label.
    pub fn group_assignment(&self, column: &str) -> Result<GroupAssignment> {
        let values = self.column(column)?;
        let mut labels = Vec::with_capacity(values.len());
        for (sid, value) in self.sample_ids.iter().zip(values) {
            match value {
                Some(label) => labels.push(label.to_string()),
                None => {
                    return Err(BetaError::InvalidInput(format!(
                        "sample '{}' has no value in column '{}'",
                        sid, column
                    )))
                }
            }
        }
        GroupAssignment::new(self.sample_ids.clone(), labels)
    }

    /// Subset metadata to only include specified samples, in the given order.
    pub fn subset_samples(&self, sample_ids: &[String]) -> Result<Self> {
        let mut new_data = HashMap::new();
        for sid in sample_ids {
            let sample_data = self.data.get(sid).ok_or_else(|| {
                BetaError::SampleMismatch(format!("Sample '{}' not found in metadata", sid))
            })?;
            new_data.insert(sid.clone(), sample_data.clone());
        }

        Ok(Self {
            sample_ids: sample_ids.to_vec(),
            column_names: self.column_names.clone(),
            data: new_data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_test_tsv() -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tGroup\tSite").unwrap();
        writeln!(file, "S1\tcontrol\tgut").unwrap();
        writeln!(file, "S2\ttreatment\tgut").unwrap();
        writeln!(file, "S3\tcontrol\tNA").unwrap();
        writeln!(file, "S4\ttreatment\tskin").unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_metadata() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();

        assert_eq!(meta.n_samples(), 4);
        assert_eq!(meta.sample_ids(), &["S1", "S2", "S3", "S4"]);
        assert_eq!(meta.column_names(), &["Group", "Site"]);
        assert_eq!(meta.get("S2", "Group"), Some("treatment"));
        assert_eq!(meta.get("S3", "Site"), None);
    }

    #[test]
    fn test_levels() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();
        assert_eq!(meta.levels("Group").unwrap(), vec!["control", "treatment"]);
        assert_eq!(meta.levels("Site").unwrap(), vec!["gut", "skin"]);
    }

    #[test]
    fn test_group_assignment() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();
        let groups = meta.group_assignment("Group").unwrap();
        assert_eq!(groups.n_groups(), 2);
        assert_eq!(groups.label_of("S4"), Some("treatment"));
    }

    #[test]
    fn test_group_assignment_missing_label() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();
        assert!(matches!(
            meta.group_assignment("Site"),
            Err(BetaError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_missing_column() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();
        assert!(matches!(
            meta.group_assignment("Treatment"),
            Err(BetaError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_subset_samples() {
        let file = create_test_tsv();
        let meta = Metadata::from_tsv(file.path()).unwrap();

        let subset = meta
            .subset_samples(&["S3".to_string(), "S1".to_string()])
            .unwrap();
        assert_eq!(subset.sample_ids(), &["S3", "S1"]);
        assert!(meta.subset_samples(&["S9".to_string()]).is_err());
    }
}
