//! Permutation-based hypothesis testing on dissimilarity matrices.


pub use pairwise::{test_permanova_pairwise, PairwiseComparison, PairwisePermanova};
pub use permanova::{pseudo_f, test_permanova, PermanovaConfig, PermanovaResult};
