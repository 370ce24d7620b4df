//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: launch the data-preparation program (default)
//! - show: print the effective invocation
//! - config: print the effective configuration

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// punctprep - Launch punctuation/capitalization data preparation for WMT/TED corpora
#[derive(Parser, Debug)]
#[command(name = "punctprep")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Run the data-preparation program and exit with its exit code
    Run {
        /// Print the command line instead of running it
        #[arg(short = 'n', long)]
        dry_run: bool,
    },

    /// Show the invocation that would be launched
    Show {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = ShowFormat::Text)]
        format: ShowFormat,
    },

    /// Print the effective configuration as YAML
    Config,
}

/// Output formats for `show`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShowFormat {
    /// Shell-quoted command line
    Text,
    /// Invocation record as JSON
    Json,
    /// Invocation record as YAML
    Yaml,
}
