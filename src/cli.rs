use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::anomaly_detection::DetectionConfig;

/// Ledger fraud scanner CLI (library-facing definitions)
#[derive(Debug, Parser)]
#[command(
    name = "ledger-scan",
    about = "Flag anomalous transfers in a ledger file",
    version,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Ledger file to read
    #[arg(long, global = true, default_value = "database.json")]
    pub ledger: PathBuf,

    /// Detection config file (.json or .toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Score confirmed transactions and report suspicious ones
    Fraud(FraudArgs),
    /// List confirmed transactions
    Transactions,
    /// List pending transactions
    Pending,
    /// Show the block log
    Logs,
}

#[derive(Debug, Default, Args)]
pub struct FraudArgs {
    /// Number of isolation trees
    #[arg(long)]
    pub trees: Option<usize>,
    /// Points drawn per tree
    #[arg(long)]
    pub subsample: Option<usize>,
    /// Expected anomalous fraction, in [0, 1)
    #[arg(long)]
    pub contamination: Option<f64>,
    /// Fix the random seed for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,
}

impl FraudArgs {
    /// Overlay command-line flags on a config loaded from file/env.
    pub fn apply_to(&self, config: &mut DetectionConfig) {
        if let Some(trees) = self.trees {
            config.num_trees = trees;
        }
        if let Some(subsample) = self.subsample {
            config.subsample_size = Some(subsample);
        }
        if let Some(contamination) = self.contamination {
            config.contamination = contamination;
        }
        if let Some(seed) = self.seed {
            config.random_seed = Some(seed);
        }
    }
}
