//! CLI parse: clap types for collocate. No behavior; definitions only.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Collocate CLI - inspect collocated caller policies
#[derive(Parser)]
#[command(name = "collocate")]
#[command(about = "Inspect and check collocated caller policies")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config file)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long, global = true)]
    pub log_format: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List configured policies
    Policies {
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Check whether a call from a source file would be allowed
    Check {
        /// Owner type name as configured
        #[arg(long)]
        owner: String,
        /// Operation name
        #[arg(long)]
        operation: String,
        /// Source file of the call site
        #[arg(long)]
        path: String,
        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    /// Validate configuration
    Validate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    /// TOML, in the layout of the configuration file
    Toml,
}
