//! Data structures for distance-based analysis.

mod abundance;
mod dissimilarity;
mod groups;
mod metadata;

pub use abundance::AbundanceMatrix;
pub(crate) use dissimilarity::check_dissimilarity;
pub use dissimilarity::{DissimilarityMatrix, SYMMETRY_TOLERANCE};
pub use groups::GroupAssignment;
pub use metadata::Metadata;

use std::path::Path;

/// Comma for `.csv` files, tab for everything else.
pub(crate) fn infer_delimiter(path: &Path) -> u8 {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("csv") => b',',
        _ => b'\t',
    }
}
