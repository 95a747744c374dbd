//! Analysis pipeline composition and execution.

mod runner;

pub use runner::{run_analysis, AnalysisConfig, AnalysisResult, Pipeline};
