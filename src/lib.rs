//! Distance-based beta-diversity analysis.
//!
//! This library compares samples described by non-negative abundance
//! profiles (microbial taxa, species counts) through their pairwise
//! dissimilarities.
//!
//! # Overview
//!
//! - **data**: Core data structures (AbundanceMatrix, DissimilarityMatrix, Metadata, GroupAssignment)
//! - **distance**: Pairwise dissimilarity (Bray-Curtis)
//! - **ordination**: Principal Coordinates Analysis
//! - **test**: PERMANOVA and pairwise PERMANOVA
//! - **correct**: Multiple testing correction (Benjamini-Hochberg)
//! - **pipeline**: End-to-end analysis configuration and execution
//!
//! # Example
//!
//! ```no_run
//! use betadiv::prelude::*;
//!
//! let abundance = AbundanceMatrix::from_tsv("abundance.tsv").unwrap();
//! let metadata = Metadata::from_tsv("metadata.tsv").unwrap();
//!
//! let result = Pipeline::new()
//!     .name("gut-study")
//!     .group_column("treatment")
//!     .permutations(999)
//!     .seed(121314)
//!     .run_with_metadata(&abundance, &metadata)
//!     .unwrap();
//!
//! println!("{}", result.summary());
//! ```

pub mod correct;
pub mod data;
pub mod distance;
pub mod error;
pub mod ordination;
pub mod pipeline;
pub mod test;

/// Convenient re-exports for common usage.
pub mod prelude {
    pub use crate::correct::{correct_bh, BhCorrected};
    pub use crate::data::{AbundanceMatrix, DissimilarityMatrix, GroupAssignment, Metadata};
    pub use crate::distance::{bray_curtis, compute_dissimilarity, BrayCurtis, DissimilarityMetric, MetricKind};
    pub use crate::error::{BetaError, Result};
    pub use crate::ordination::{pcoa, pcoa_matrix, Coordinates};
    pub use crate::pipeline::{run_analysis, AnalysisConfig, AnalysisResult, Pipeline};
    pub use crate::test::{
        pseudo_f, test_permanova, test_permanova_pairwise, PairwiseComparison, PairwisePermanova,
        PermanovaConfig, PermanovaResult,
    };
}
