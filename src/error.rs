//! Error types for the betadiv library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum BetaError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid abundance value '{value}' for feature '{feature}', sample '{sample}'")]
    InvalidValue {
        value: String,
        feature: String,
        sample: String,
    },

    /// Malformed, negative or otherwise unusable input data.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Sample identifiers disagree between two inputs.
    #[error("Sample ID mismatch: {0}")]
    SampleMismatch(String),

    #[error("Missing column '{0}' in metadata")]
    MissingColumn(String),

    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Eigendecomposition failure or non-finite values in a numeric routine.
    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Time limit of {limit_secs:.1}s exceeded after {completed} of {requested} permutations")]
    DeadlineExceeded {
        limit_secs: f64,
        completed: usize,
        requested: usize,
    },

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, BetaError>;
