//! Categorical grouping factor keyed by sample identifier.

use crate::error::{BetaError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Assignment of every sample to exactly one group label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "GroupAssignmentRecord")]
pub struct GroupAssignment {
    sample_ids: Vec<String>,
    labels: Vec<String>,
}

/// Unchecked serialized form, validated through [`GroupAssignment::new`].
#[derive(Deserialize)]
struct GroupAssignmentRecord {
    sample_ids: Vec<String>,
    labels: Vec<String>,
}

impl TryFrom<GroupAssignmentRecord> for GroupAssignment {
    type Error = BetaError;

    fn try_from(record: GroupAssignmentRecord) -> Result<Self> {
        Self::new(record.sample_ids, record.labels)
    }
}

impl GroupAssignment {
    /// Create an assignment from parallel identifier and label vectors.
    pub fn new(sample_ids: Vec<String>, labels: Vec<String>) -> Result<Self> {
        if sample_ids.len() != labels.len() {
            return Err(BetaError::DimensionMismatch {
                expected: sample_ids.len(),
                actual: labels.len(),
            });
        }
        {
            let mut seen = HashSet::with_capacity(sample_ids.len());
            for (sid, label) in sample_ids.iter().zip(&labels) {
                if !seen.insert(sid.as_str()) {
                    return Err(BetaError::InvalidInput(format!(
                        "sample '{}' is assigned more than once",
                        sid
                    )));
                }
                if label.is_empty() {
                    return Err(BetaError::InvalidInput(format!(
                        "sample '{}' has an empty group label",
                        sid
                    )));
                }
            }
        }
        Ok(Self { sample_ids, labels })
    }

    /// Build from `(sample_id, label)` pairs.
    pub fn from_pairs<I, S, L>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, L)>,
        S: Into<String>,
        L: Into<String>,
    {
        let (sample_ids, labels) = pairs
            .into_iter()
            .map(|(s, l)| (s.into(), l.into()))
            .unzip();
        Self::new(sample_ids, labels)
    }

    /// Sample identifiers, in assignment order.
    pub fn sample_ids(&self) -> &[String] {
        &self.sample_ids
    }

    /// Labels, parallel to [`Self::sample_ids`].
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn n_samples(&self) -> usize {
        self.sample_ids.len()
    }

    /// Distinct labels, sorted.
    pub fn levels(&self) -> Vec<String> {
        let mut levels: Vec<String> = self
            .labels
            .iter()
            .cloned()
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        levels.sort();
        levels
    }

    /// Number of distinct labels.
    pub fn n_groups(&self) -> usize {
        self.labels.iter().collect::<HashSet<_>>().len()
    }

    /// Index into [`Self::levels`] for each sample.
    pub fn codes(&self) -> Vec<usize> {
        let levels = self.levels();
        let index: HashMap<&str, usize> = levels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();
        self.labels.iter().map(|l| index[l.as_str()]).collect()
    }

    /// Number of samples in each level, in level order.
    pub fn group_sizes(&self) -> Vec<(String, usize)> {
        let mut sizes = vec![0usize; self.n_groups()];
        for code in self.codes() {
            sizes[code] += 1;
        }
        self.levels().into_iter().zip(sizes).collect()
    }

    /// Label assigned to a sample.
    pub fn label_of(&self, sample_id: &str) -> Option<&str> {
        self.sample_ids
            .iter()
            .position(|s| s == sample_id)
            .map(|i| self.labels[i].as_str())
    }

    /// Whether the assignment lists exactly `sample_ids`, in the same order.
    pub fn is_aligned_with(&self, sample_ids: &[String]) -> bool {
        self.sample_ids == sample_ids
    }

    /// Reorder the assignment to follow `sample_ids`.
    ///
    /// Labels are matched by identifier. Fails when the two identifier sets
    /// are not identical.
    pub fn align_to(&self, sample_ids: &[String]) -> Result<Self> {
        let by_id: HashMap<&str, &String> = self
            .sample_ids
            .iter()
            .map(String::as_str)
            .zip(&self.labels)
            .collect();

        let missing: Vec<&str> = sample_ids
            .iter()
            .map(String::as_str)
            .filter(|sid| !by_id.contains_key(sid))
            .collect();
        let wanted: HashSet<&str> = sample_ids.iter().map(String::as_str).collect();
        let extra: Vec<&str> = self
            .sample_ids
            .iter()
            .map(String::as_str)
            .filter(|sid| !wanted.contains(sid))
            .collect();

        if !missing.is_empty() || !extra.is_empty() {
            return Err(BetaError::SampleMismatch(format!(
                "{} sample(s) without a group label {}; {} labelled sample(s) absent from the data {}",
                missing.len(),
                preview(&missing),
                extra.len(),
                preview(&extra)
            )));
        }

        let labels = sample_ids
            .iter()
            .map(|sid| by_id[sid.as_str()].clone())
            .collect();
        Self::new(sample_ids.to_vec(), labels)
    }
}

fn preview(ids: &[&str]) -> String {
    const SHOWN: usize = 5;
    if ids.len() > SHOWN {
        format!("{:?}...", &ids[..SHOWN])
    } else {
        format!("{:?}", ids)
    }
}
