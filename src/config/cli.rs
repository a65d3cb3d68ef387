//! CLI argument parsing using clap
//!
//! Short options take their value attached (`-b64`, `-o32`, `-w30`,
//! `-pPHASE1:`). The two-letter `-ss` switch is rewritten to `--ss` before
//! clap sees it.

use crate::engine::EngineType;
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;

/// precondition - drive a storage target into a representative workload state
#[derive(Parser, Debug, Clone)]
#[command(name = "precondition")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Target file or block device; a bare number N names /dev/disk/by-diskseq/N
    #[arg(value_name = "TARGET")]
    pub target: String,

    /// Don't prompt before writing the target (use with caution)
    #[arg(short = 'Y')]
    pub yes: bool,

    /// Block size in kilobytes (default: 1024)
    #[arg(short = 'b', value_name = "KB")]
    pub block_size_kb: Option<u64>,

    /// Use a random pattern of IOs instead of sequential
    #[arg(short = 'r')]
    pub random: bool,

    /// Outstanding IOs, 1-256 (default: 256)
    #[arg(short = 'o', value_name = "N")]
    pub outstanding_ios: Option<usize>,

    /// Percentage of IOs that are writes (default: 100)
    #[arg(short = 'w', value_name = "PCT")]
    pub write_percentage: Option<u32>,

    /// Run until steady-state is achieved (also accepted as -ss)
    #[arg(long = "ss")]
    pub steady_state: bool,

    /// Gather throughput for this many seconds for steady-state (default: 540)
    #[arg(short = 'g', value_name = "SEC")]
    pub gather_seconds: Option<u64>,

    /// Require this many seconds of dwell in steady-state (default: 60)
    #[arg(short = 'd', value_name = "SEC")]
    pub dwell_seconds: Option<u64>,

    /// Slope tolerance for steady-state (default: 0.001)
    #[arg(short = 't', value_name = "FLOAT", allow_negative_numbers = true)]
    pub slope_tolerance: Option<f64>,

    /// Prefix every progress message with this text
    #[arg(short = 'p', value_name = "STR", allow_hyphen_values = true)]
    pub progress_prefix: Option<String>,

    /// TOML configuration file; explicit options override its values
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// IO engine to use
    #[arg(long, value_enum)]
    pub engine: Option<EngineType>,

    /// Open the target through the page cache instead of O_DIRECT
    #[arg(long)]
    pub buffered: bool,

    /// Seed the random source for a reproducible IO pattern
    #[arg(long)]
    pub seed: Option<u64>,

    /// Write a JSON run summary to this file
    #[arg(long, value_name = "FILE")]
    pub json_output: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    /// Parse the process arguments, exiting with usage on error
    pub fn parse_args() -> Self {
        Self::parse_from(normalize_args(std::env::args_os()))
    }

    /// Parse an explicit argument list (first item is the program name)
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Self::try_parse_from(normalize_args(args))
    }

    /// Whether any steady-state tuning option was given
    pub fn has_steady_state_tuning(&self) -> bool {
        self.gather_seconds.is_some() || self.dwell_seconds.is_some() || self.slope_tolerance.is_some()
    }
}

/// Rewrite the single-dash `-ss` switch into its long form
pub fn normalize_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            if arg.as_os_str() == "-ss" {
                OsString::from("--ss")
            } else {
                arg
            }
        })
        .collect()
}
