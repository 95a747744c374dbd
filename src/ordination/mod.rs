//! Ordination of samples from their pairwise dissimilarities.

pub mod pcoa;

pub use pcoa::{pcoa, pcoa_matrix, Coordinates};
