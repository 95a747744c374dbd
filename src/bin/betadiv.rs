//! betadiv - beta-diversity analysis CLI
//!
//! Command-line interface for Bray-Curtis dissimilarity, PCoA and PERMANOVA.

use betadiv::data::{AbundanceMatrix, Metadata};
use betadiv::distance::{compute_dissimilarity, MetricKind};
use betadiv::error::Result;
use betadiv::pipeline::{AnalysisConfig, Pipeline};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// CLI-friendly metric enum
#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliMetric {
    /// Bray-Curtis dissimilarity
    BrayCurtis,
}

impl From<CliMetric> for MetricKind {
    fn from(metric: CliMetric) -> Self {
        match metric {
            CliMetric::BrayCurtis => MetricKind::BrayCurtis,
        }
    }
}

/// Distance-based beta-diversity analysis
#[derive(Parser)]
#[command(name = "betadiv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an analysis from a YAML configuration file
    Run {
        /// Path to analysis configuration YAML
        #[arg(short, long)]
        config: PathBuf,

        /// Path to abundance table (features as rows, samples as columns)
        #[arg(short, long)]
        abundance: PathBuf,

        /// Path to sample metadata
        #[arg(short, long)]
        metadata: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Run an analysis configured from flags
    Analyze {
        /// Path to abundance table (features as rows, samples as columns)
        #[arg(short, long)]
        abundance: PathBuf,

        /// Path to sample metadata
        #[arg(short, long)]
        metadata: PathBuf,

        /// Metadata column holding the grouping factor
        #[arg(short, long, default_value = "Group")]
        group: String,

        /// Output directory
        #[arg(short, long)]
        output: PathBuf,

        /// Dissimilarity metric
        #[arg(long, value_enum, default_value = "bray-curtis")]
        metric: CliMetric,

        /// Number of PCoA axes to keep
        #[arg(long, default_value = "2")]
        axes: usize,

        /// Number of PERMANOVA permutations
        #[arg(short, long, default_value = "999")]
        permutations: usize,

        /// Random seed
        #[arg(long)]
        seed: Option<u64>,

        /// Also run pairwise PERMANOVA between groups
        #[arg(long)]
        pairwise: bool,

        /// Run permutations on a single thread
        #[arg(long)]
        sequential: bool,

        /// Abort PERMANOVA after this many seconds
        #[arg(long)]
        time_limit: Option<f64>,
    },

    /// Compute and write the dissimilarity matrix only
    Distance {
        /// Path to abundance table (features as rows, samples as columns)
        #[arg(short, long)]
        abundance: PathBuf,

        /// Output TSV path
        #[arg(short, long)]
        output: PathBuf,

        /// Dissimilarity metric
        #[arg(long, value_enum, default_value = "bray-curtis")]
        metric: CliMetric,
    },

    /// Generate an example analysis configuration
    Example {
        /// Output path for YAML config
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("betadiv=debug,info")
    } else {
        EnvFilter::new("betadiv=warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .init();

    let result = match cli.command {
        Commands::Run {
            config,
            abundance,
            metadata,
            output,
        } => cmd_run(&config, &abundance, &metadata, &output),

        Commands::Analyze {
            abundance,
            metadata,
            group,
            output,
            metric,
            axes,
            permutations,
            seed,
            pairwise,
            sequential,
            time_limit,
        } => {
            let config = AnalysisConfig {
                name: "analyze".to_string(),
                description: None,
                metric: metric.into(),
                group_column: group,
                n_axes: axes,
                permutations,
                seed,
                parallel: !sequential,
                pairwise,
                time_limit_secs: time_limit,
            };
            cmd_analyze(&config, &abundance, &metadata, &output)
        }

        Commands::Distance {
            abundance,
            output,
            metric,
        } => cmd_distance(&abundance, &output, metric),

        Commands::Example { output } => cmd_example(&output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Run an analysis from configuration
fn cmd_run(config_path: &Path, abundance_path: &Path, metadata_path: &Path, output: &Path) -> Result<()> {
    eprintln!("Loading analysis configuration from {:?}...", config_path);
    let config = AnalysisConfig::from_file(config_path)?;
    cmd_analyze(&config, abundance_path, metadata_path, output)
}

fn cmd_analyze(
    config: &AnalysisConfig,
    abundance_path: &Path,
    metadata_path: &Path,
    output: &Path,
) -> Result<()> {
    eprintln!("Loading data...");
    let abundance = AbundanceMatrix::from_path(abundance_path)?;
    let metadata = Metadata::from_path(metadata_path)?;

    eprintln!(
        "Loaded {} samples x {} features",
        abundance.n_samples(),
        abundance.n_features()
    );

    eprintln!("Running analysis '{}'...", config.name);
    let result = Pipeline::from_config(config).run_with_metadata(&abundance, &metadata)?;

    eprintln!("Writing results to {:?}...", output);
    let written = result.write_outputs(output)?;
    for path in &written {
        eprintln!("  {}", path.display());
    }

    eprintln!();
    print!("{}", result.summary());

    Ok(())
}

/// Write the dissimilarity matrix for an abundance table
fn cmd_distance(abundance_path: &Path, output: &Path, metric: CliMetric) -> Result<()> {
    eprintln!("Loading abundance table...");
    let abundance = AbundanceMatrix::from_path(abundance_path)?;

    let metric = MetricKind::from(metric).metric();
    eprintln!(
        "Computing {} dissimilarities for {} samples...",
        metric.name(),
        abundance.n_samples()
    );
    let distances = compute_dissimilarity(&abundance, metric.as_ref())?;

    distances.to_tsv(output)?;
    eprintln!("Wrote {}x{} matrix to {:?}", distances.n_samples(), distances.n_samples(), output);

    Ok(())
}

/// Generate example analysis configuration
fn cmd_example(output_path: &Path) -> Result<()> {
    let yaml = AnalysisConfig::example().to_yaml()?;

    std::fs::write(output_path, &yaml)?;
    eprintln!("Wrote example configuration to {:?}", output_path);
    eprintln!();
    eprintln!("Contents:");
    println!("{}", yaml);

    Ok(())
}
