use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::core::types::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "brand-hunter",
    version,
    about = "Brand impersonation radar: search, typosquat and look-alike login page detection"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to config file (TOML). Default: config/brand-hunter.toml
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Increase verbosity (debug, trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log file path
    #[arg(long, global = true, default_value = "data/brand-hunter.log")]
    pub log_file: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Search, analyze candidates and emit ranked findings
    Scan {
        /// Brand profile (TOML)
        #[arg(long)]
        profile: PathBuf,
        /// Search query; defaults to "<company_name> login"
        #[arg(long)]
        query: Option<String>,
        /// Output format
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormatArg,
        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Domain confidence (0-100) required to crawl a candidate
        #[arg(long)]
        threshold: Option<u8>,
        /// Skip structural comparison against the real login page
        #[arg(long)]
        no_structural: bool,
        /// Restrict to these backend ids
        #[arg(long, value_delimiter = ',')]
        backends: Option<Vec<String>>,
    },
    /// Run the federated search only and print deduplicated results
    Search {
        #[arg(long)]
        query: String,
        /// Restrict to these backend ids
        #[arg(long, value_delimiter = ',')]
        backends: Option<Vec<String>>,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormatArg {
    Json,
    Jsonl,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(value: OutputFormatArg) -> Self {
        match value {
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Jsonl => OutputFormat::Jsonl,
        }
    }
}
