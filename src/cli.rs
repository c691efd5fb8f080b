//! Command-line interface definitions.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dealflow")]
#[command(about = "Multi-cycle underwriting analysis for investment deals", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full multi-cycle analysis pipeline over a deal input file
    Analyze {
        /// Structured deal input JSON (pre-extracted dimensions)
        #[arg(short, long)]
        input: PathBuf,

        /// Deal identifier; falls back to the input file's `deal_id` field
        #[arg(long)]
        deal_id: Option<String>,

        /// Engine configuration file
        #[arg(short, long, default_value = "dealflow.toml")]
        config: PathBuf,

        /// Persist DIO history under this directory instead of in memory
        #[arg(long, env = "DEALFLOW_STORE")]
        store: Option<PathBuf>,

        /// Enable fundability shadow mode
        #[arg(long)]
        shadow: bool,

        /// Enable fundability soft caps (implies shadow mode)
        #[arg(long)]
        soft_caps: bool,

        /// Enable fundability hard gates (implies shadow mode)
        #[arg(long)]
        hard_gates: bool,

        /// Override the cycle ceiling (1-3)
        #[arg(long)]
        cycles: Option<u8>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
        format: OutputFormat,
    },

    /// Show the stored DIO version history for a deal
    History {
        #[arg(long)]
        deal_id: String,

        /// Store directory written by a previous `analyze --store` run
        #[arg(long, env = "DEALFLOW_STORE")]
        store: PathBuf,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Summary)]
        format: OutputFormat,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Summary,
    Json,
}
