//! Pipeline runner tying dissimilarity, ordination and PERMANOVA together.

use crate::data::{AbundanceMatrix, DissimilarityMatrix, GroupAssignment, Metadata};
use crate::distance::{compute_dissimilarity, MetricKind};
use crate::error::{BetaError, Result};
use crate::ordination::{pcoa, Coordinates};
use crate::test::{
    test_permanova, test_permanova_pairwise, PairwisePermanova, PermanovaConfig, PermanovaResult,
};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_name() -> String {
    "unnamed".to_string()
}

fn default_group_column() -> String {
    "Group".to_string()
}

fn default_axes() -> usize {
    2
}

fn default_permutations() -> usize {
    999
}

fn default_true() -> bool {
    true
}

/// Analysis configuration for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Name of the analysis.
    #[serde(default = "default_name")]
    pub name: String,
    /// Description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Dissimilarity metric.
    #[serde(default)]
    pub metric: MetricKind,
    /// Metadata column holding the grouping factor.
    #[serde(default = "default_group_column")]
    pub group_column: String,
    /// Number of ordination axes to keep.
    #[serde(default = "default_axes")]
    pub n_axes: usize,
    /// Number of PERMANOVA permutations.
    #[serde(default = "default_permutations")]
    pub permutations: usize,
    /// Base random seed; drawn at random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
    /// Run permutations in parallel.
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Also run pairwise PERMANOVA between every pair of groups.
    #[serde(default)]
    pub pairwise: bool,
    /// Abort PERMANOVA after this many seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit_secs: Option<f64>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: None,
            metric: MetricKind::default(),
            group_column: default_group_column(),
            n_axes: default_axes(),
            permutations: default_permutations(),
            seed: None,
            parallel: true,
            pairwise: false,
            time_limit_secs: None,
        }
    }
}

impl AnalysisConfig {
    /// Load from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(BetaError::from)
    }

    /// Save to YAML string.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(BetaError::from)
    }

    /// Load from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let yaml = fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }

    /// Example configuration written by `betadiv example`.
    pub fn example() -> Self {
        Self {
            name: "beta-diversity".to_string(),
            description: Some("Bray-Curtis PCoA and PERMANOVA by group".to_string()),
            seed: Some(121314),
            ..Default::default()
        }
    }
}

/// Builder for constructing and running an analysis.
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: AnalysisConfig,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    /// Create a pipeline with default settings.
    pub fn new() -> Self {
        Self {
            config: AnalysisConfig::default(),
        }
    }

    /// Create from a config.
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Set the analysis name.
    pub fn name(mut self, name: &str) -> Self {
        self.config.name = name.to_string();
        self
    }

    pub fn metric(mut self, metric: MetricKind) -> Self {
        self.config.metric = metric;
        self
    }

    /// Metadata column used by [`Pipeline::run_with_metadata`].
    pub fn group_column(mut self, column: &str) -> Self {
        self.config.group_column = column.to_string();
        self
    }

    /// Number of PCoA axes to keep.
    pub fn axes(mut self, n_axes: usize) -> Self {
        self.config.n_axes = n_axes;
        self
    }

    pub fn permutations(mut self, n: usize) -> Self {
        self.config.permutations = n;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = Some(seed);
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.config.parallel = parallel;
        self
    }

    /// Add pairwise PERMANOVA between every pair of groups.
    pub fn pairwise(mut self, pairwise: bool) -> Self {
        self.config.pairwise = pairwise;
        self
    }

    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.config.time_limit_secs = Some(limit.as_secs_f64());
        self
    }

    /// Convert to config for serialization.
    pub fn to_config(&self, description: Option<&str>) -> AnalysisConfig {
        AnalysisConfig {
            description: description.map(String::from),
            ..self.config.clone()
        }
    }

    fn permanova_config(&self) -> Result<PermanovaConfig> {
        if self.config.permutations < 1 {
            return Err(BetaError::InvalidParameter(
                "permutations must be at least 1".to_string(),
            ));
        }
        let time_limit = match self.config.time_limit_secs {
            Some(secs) => Some(Duration::try_from_secs_f64(secs).map_err(|_| {
                BetaError::InvalidParameter(format!(
                    "time limit must be a non-negative number of seconds, got {}",
                    secs
                ))
            })?),
            None => None,
        };
        Ok(PermanovaConfig {
            n_permutations: self.config.permutations,
            seed: self.config.seed,
            parallel: self.config.parallel,
            time_limit,
        })
    }

    /// Run the analysis on an abundance matrix and group labels.
    ///
    /// Groups are matched to the matrix by sample identifier. Either every
    /// stage succeeds or an error is returned.
    pub fn run(&self, matrix: &AbundanceMatrix, groups: &GroupAssignment) -> Result<AnalysisResult> {
        let permanova_config = self.permanova_config()?;
        let groups = groups.align_to(matrix.sample_ids())?;

        tracing::info!(
            name = %self.config.name,
            samples = matrix.n_samples(),
            features = matrix.n_features(),
            groups = groups.n_groups(),
            "starting analysis"
        );

        let metric = self.config.metric.metric();
        let dissimilarity = compute_dissimilarity(matrix, metric.as_ref())?;
        tracing::info!(metric = metric.name(), "dissimilarity matrix computed");

        let coordinates = pcoa(&dissimilarity, self.config.n_axes)?;
        tracing::info!(axes = coordinates.n_axes(), "ordination complete");

        let permanova = test_permanova(&dissimilarity, &groups, &permanova_config)?;
        tracing::info!(
            pseudo_f = permanova.pseudo_f,
            p_value = permanova.p_value,
            "PERMANOVA complete"
        );

        let pairwise = if self.config.pairwise {
            let config = PermanovaConfig {
                seed: Some(permanova.seed),
                ..permanova_config
            };
            Some(test_permanova_pairwise(&dissimilarity, &groups, &config)?)
        } else {
            None
        };

        Ok(AnalysisResult {
            name: self.config.name.clone(),
            dissimilarity,
            coordinates,
            permanova,
            pairwise,
        })
    }

    /// Run the analysis, taking groups from the configured metadata column.
    pub fn run_with_metadata(
        &self,
        matrix: &AbundanceMatrix,
        metadata: &Metadata,
    ) -> Result<AnalysisResult> {
        let groups = metadata.group_assignment(&self.config.group_column)?;
        self.run(matrix, &groups)
    }
}

/// Everything produced by one analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub name: String,
    pub dissimilarity: DissimilarityMatrix,
    pub coordinates: Coordinates,
    pub permanova: PermanovaResult,
    pub pairwise: Option<PairwisePermanova>,
}

impl AnalysisResult {
    /// Write all result tables into `dir`, creating it if needed.
    ///
    /// Returns the paths written.
    pub fn write_outputs<P: AsRef<Path>>(&self, dir: P) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        let path = dir.join("distances.tsv");
        self.dissimilarity.to_tsv(&path)?;
        written.push(path);

        let path = dir.join("coordinates.tsv");
        self.coordinates.to_tsv(&path)?;
        written.push(path);

        let path = dir.join("eigenvalues.tsv");
        self.coordinates.eigenvalues_to_tsv(&path)?;
        written.push(path);

        let path = dir.join("permanova.json");
        fs::write(&path, serde_json::to_string_pretty(&self.permanova)?)?;
        written.push(path);

        if let Some(pairwise) = &self.pairwise {
            let path = dir.join("pairwise.tsv");
            pairwise.to_tsv(&path)?;
            written.push(path);
        }

        tracing::debug!(dir = %dir.display(), files = written.len(), "outputs written");
        Ok(written)
    }

    /// Human-readable summary of the run.
    pub fn summary(&self) -> String {
        let p = &self.permanova;
        let mut out = String::new();
        let _ = writeln!(out, "Analysis: {}", self.name);
        let _ = writeln!(out, "  Samples: {}, groups: {}", p.n_samples, p.n_groups);
        for label in self.coordinates.axis_labels() {
            let _ = writeln!(out, "  {}", label);
        }
        if self.coordinates.n_negative_eigenvalues > 0 {
            let _ = writeln!(
                out,
                "  Negative eigenvalues: {}",
                self.coordinates.n_negative_eigenvalues
            );
        }
        let _ = writeln!(
            out,
            "  PERMANOVA: F = {:.4}, R² = {:.4}, p = {:.4} ({} permutations, seed {})",
            p.pseudo_f, p.r_squared, p.p_value, p.n_permutations, p.seed
        );
        if p.p_value <= p.min_p_value() {
            let _ = writeln!(
                out,
                "  p is at the permutation floor; more permutations may resolve it further"
            );
        }
        if let Some(pairwise) = &self.pairwise {
            for c in &pairwise.comparisons {
                let _ = writeln!(
                    out,
                    "    {} vs {}: F = {:.4}, p = {:.4}, q = {:.4}",
                    c.group_a, c.group_b, c.pseudo_f, c.p_value, c.q_value
                );
            }
        }
        out
    }
}

/// Convenience function: Bray-Curtis, PCoA and PERMANOVA in one call.
pub fn run_analysis(
    matrix: &AbundanceMatrix,
    groups: &GroupAssignment,
    n_axes: usize,
    permutations: usize,
    seed: Option<u64>,
) -> Result<AnalysisResult> {
    let mut pipeline = Pipeline::new()
        .name("analysis")
        .axes(n_axes)
        .permutations(permutations);
    if let Some(seed) = seed {
        pipeline = pipeline.seed(seed);
    }
    pipeline.run(matrix, groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    fn example_matrix() -> AbundanceMatrix {
        AbundanceMatrix::from_rows(
            (1..=4).map(|i| format!("S{}", i)).collect(),
            vec!["f1".to_string(), "f2".to_string()],
            &[
                vec![10.0, 0.0],
                vec![8.0, 2.0],
                vec![0.0, 10.0],
                vec![2.0, 8.0],
            ],
        )
        .unwrap()
    }

    fn example_groups() -> GroupAssignment {
        GroupAssignment::from_pairs([("S1", "A"), ("S2", "A"), ("S3", "B"), ("S4", "B")]).unwrap()
    }

    #[test]
    fn test_pipeline_builder() {
        let pipeline = Pipeline::new()
            .name("test")
            .axes(3)
            .permutations(199)
            .seed(5)
            .pairwise(true);

        let config = pipeline.to_config(Some("Test analysis"));
        assert_eq!(config.name, "test");
        assert_eq!(config.n_axes, 3);
        assert_eq!(config.permutations, 199);
        assert_eq!(config.seed, Some(5));
        assert!(config.pairwise);
        assert_eq!(config.description.as_deref(), Some("Test analysis"));
    }

    #[test]
    fn test_config_yaml_roundtrip() {
        let config = AnalysisConfig::example();
        let yaml = config.to_yaml().unwrap();
        let loaded = AnalysisConfig::from_yaml(&yaml).unwrap();
        assert_eq!(config, loaded);
    }

    #[test]
    fn test_config_defaults() {
        let config = AnalysisConfig::from_yaml("name: minimal\n").unwrap();
        assert_eq!(config.metric, MetricKind::BrayCurtis);
        assert_eq!(config.group_column, "Group");
        assert_eq!(config.n_axes, 2);
        assert_eq!(config.permutations, 999);
        assert!(config.parallel);
        assert!(!config.pairwise);
        assert!(config.seed.is_none());
    }

    #[test]
    fn test_default_group_column_reads_group_header() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\tGroup").unwrap();
        for (sid, label) in [("S1", "A"), ("S2", "A"), ("S3", "B"), ("S4", "B")] {
            writeln!(file, "{}\t{}", sid, label).unwrap();
        }
        file.flush().unwrap();
        let metadata = Metadata::from_tsv(file.path()).unwrap();

        let result = Pipeline::new()
            .permutations(99)
            .seed(1)
            .run_with_metadata(&example_matrix(), &metadata)
            .unwrap();
        assert_eq!(result.permanova.n_groups, 2);
    }

    #[test]
    fn test_summary_flags_permutation_floor() {
        let matrix = AbundanceMatrix::from_rows(
            (0..40).map(|i| format!("S{}", i)).collect(),
            vec!["f1".to_string(), "f2".to_string()],
            &(0..40)
                .map(|i| if i < 20 { vec![20.0 + i as f64, 1.0] } else { vec![1.0, 20.0 + i as f64] })
                .collect::<Vec<_>>(),
        )
        .unwrap();
        let groups = GroupAssignment::new(
            (0..40).map(|i| format!("S{}", i)).collect(),
            (0..40).map(|i| if i < 20 { "A" } else { "B" }.to_string()).collect(),
        )
        .unwrap();

        let result = run_analysis(&matrix, &groups, 2, 9, Some(4)).unwrap();
        assert_eq!(result.permanova.min_p_value(), 0.1);
        assert_eq!(result.permanova.p_value, 0.1);
        assert!(result.summary().contains("permutation floor"));

        let example = run_analysis(&example_matrix(), &example_groups(), 2, 99, Some(4)).unwrap();
        assert!(!example.summary().contains("permutation floor"));
    }

    #[test]
    fn test_run_example() {
        let result = run_analysis(&example_matrix(), &example_groups(), 2, 999, Some(121314)).unwrap();

        assert!((result.dissimilarity.get(0, 2) - 1.0).abs() < 1e-12);
        assert_eq!(result.coordinates.n_axes(), 2);
        assert!(result.permanova.pseudo_f > 1.0);
        assert!(result.permanova.p_value > 0.0 && result.permanova.p_value <= 1.0);
        assert!(result.pairwise.is_none());

        let again = run_analysis(&example_matrix(), &example_groups(), 2, 999, Some(121314)).unwrap();
        assert_eq!(result.permanova.p_value, again.permanova.p_value);
    }

    #[test]
    fn test_run_rejects_mismatch() {
        let groups = GroupAssignment::from_pairs([("S1", "A"), ("S2", "A"), ("S3", "B"), ("S9", "B")])
            .unwrap();
        let result = run_analysis(&example_matrix(), &groups, 2, 99, Some(1));
        assert!(matches!(result, Err(BetaError::SampleMismatch(_))));
    }

    #[test]
    fn test_run_rejects_bad_parameters() {
        let zero_perms = run_analysis(&example_matrix(), &example_groups(), 2, 0, Some(1));
        assert!(matches!(zero_perms, Err(BetaError::InvalidParameter(_))));

        let too_many_axes = run_analysis(&example_matrix(), &example_groups(), 5, 99, Some(1));
        assert!(matches!(too_many_axes, Err(BetaError::InvalidParameter(_))));

        let negative_limit = Pipeline::from_config(&AnalysisConfig {
            time_limit_secs: Some(-1.0),
            ..Default::default()
        })
        .run(&example_matrix(), &example_groups());
        assert!(matches!(negative_limit, Err(BetaError::InvalidParameter(_))));
    }

    #[test]
    fn test_run_with_metadata_and_outputs() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "sample_id\ttreatment").unwrap();
        for (sid, label) in [("S4", "B"), ("S3", "B"), ("S2", "A"), ("S1", "A")] {
            writeln!(file, "{}\t{}", sid, label).unwrap();
        }
        file.flush().unwrap();
        let metadata = Metadata::from_tsv(file.path()).unwrap();

        let result = Pipeline::new()
            .group_column("treatment")
            .permutations(99)
            .seed(3)
            .pairwise(true)
            .run_with_metadata(&example_matrix(), &metadata)
            .unwrap();
        assert_eq!(result.pairwise.as_ref().map(|p| p.len()), Some(1));

        let dir = tempdir().unwrap();
        let written = result.write_outputs(dir.path().join("out")).unwrap();
        assert_eq!(written.len(), 5);
        for path in &written {
            assert!(path.exists());
        }

        let json = std::fs::read_to_string(dir.path().join("out/permanova.json")).unwrap();
        let parsed: PermanovaResult = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.seed, 3);
        assert!(result.summary().contains("PERMANOVA: F = 32.0000"));
    }
}
