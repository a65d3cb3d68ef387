//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.
//! Values are layered: built-in defaults, then the optional config file, then
//! explicit command-line options.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::engine::EngineType;
use crate::stats::steady_state::{
    SteadyStateConfig, DEFAULT_DWELL_SECONDS, DEFAULT_GATHER_SECONDS, DEFAULT_MAX_WAIT,
    DEFAULT_SLOPE_TOLERANCE,
};
use crate::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest accepted queue depth
pub const MAX_QUEUE_DEPTH: usize = 256;

/// Largest single transfer
pub const MAX_IO_SIZE: u64 = 2 * 1024 * 1024;

/// Default block size (1 MiB)
pub const DEFAULT_BLOCK_SIZE: u64 = 1024 * 1024;

pub const DEFAULT_QUEUE_DEPTH: usize = MAX_QUEUE_DEPTH;

pub const DEFAULT_WRITE_PERCENTAGE: u8 = 100;

/// Order in which blocks are visited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccessPattern {
    /// Block 0, 1, 2, ... wrapping at the end of the target
    #[default]
    Sequential,
    /// Uniformly random blocks, repeats allowed
    Random,
}

impl fmt::Display for AccessPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessPattern::Sequential => write!(f, "sequential"),
            AccessPattern::Random => write!(f, "random"),
        }
    }
}

/// Run parameters, fixed once the run starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Parameters {
    /// Bytes per IO
    pub block_size: u64,
    pub access_pattern: AccessPattern,
    /// Outstanding IOs kept in flight (1-256)
    pub queue_depth: usize,
    /// Share of IOs that are writes (0-100)
    pub write_percentage: u8,
    /// Run until throughput converges instead of one pass over the target
    pub steady_state: bool,
    pub gather_seconds: u64,
    pub dwell_seconds: u64,
    pub slope_tolerance: f64,
    /// Text placed before every progress message
    pub progress_prefix: String,
    pub engine: EngineType,
    /// Open the target with O_DIRECT
    pub direct: bool,
    /// Seed for block, direction and payload choices; entropy when absent
    pub seed: Option<u64>,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            access_pattern: AccessPattern::default(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            write_percentage: DEFAULT_WRITE_PERCENTAGE,
            steady_state: false,
            gather_seconds: DEFAULT_GATHER_SECONDS,
            dwell_seconds: DEFAULT_DWELL_SECONDS,
            slope_tolerance: DEFAULT_SLOPE_TOLERANCE,
            progress_prefix: String::new(),
            engine: EngineType::default(),
            direct: true,
            seed: None,
        }
    }
}

impl Parameters {
    /// Detector settings derived from these parameters
    pub fn steady_state_config(&self) -> SteadyStateConfig {
        SteadyStateConfig {
            gather_seconds: self.gather_seconds,
            dwell_seconds: self.dwell_seconds,
            slope_tolerance: self.slope_tolerance,
            max_wait: DEFAULT_MAX_WAIT,
        }
    }

    /// Whether a single pass is guaranteed to overwrite the whole target
    pub fn writes_full_target(&self) -> bool {
        self.access_pattern == AccessPattern::Sequential && self.write_percentage == 100
    }
}

/// Build validated parameters from the command line and its optional config file
pub fn resolve(cli: &cli::Cli) -> Result<Parameters> {
    let mut params = match &cli.config {
        Some(path) => toml::parse_toml_file(path)?.into_parameters()?,
        None => Parameters::default(),
    };

    cli_convert::apply_cli(cli, &mut params)?;
    validator::validate_parameters(&params)?;

    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = Parameters::default();
        assert_eq!(params.block_size, 1024 * 1024);
        assert_eq!(params.queue_depth, 256);
        assert_eq!(params.write_percentage, 100);
        assert_eq!(params.access_pattern, AccessPattern::Sequential);
        assert!(!params.steady_state);
        assert!(params.direct);
        assert!(params.writes_full_target());
        assert!(validator::validate_parameters(&params).is_ok());
    }

    #[test]
    fn test_steady_state_config() {
        let params = Parameters {
            gather_seconds: 120,
            dwell_seconds: 30,
            slope_tolerance: 0.01,
            ..Default::default()
        };

        let config = params.steady_state_config();
        assert_eq!(config.gather_seconds, 120);
        assert_eq!(config.dwell_seconds, 30);
        assert_eq!(config.slope_tolerance, 0.01);
        assert_eq!(config.max_wait, DEFAULT_MAX_WAIT);
    }

    #[test]
    fn test_resolve_cli_only() {
        let cli = cli::Cli::try_parse_args(["precondition", "-b64", "-r", "-ss", "-g120", "/tmp/x"]).unwrap();
        let params = resolve(&cli).unwrap();

        assert_eq!(params.block_size, 64 * 1024);
        assert_eq!(params.access_pattern, AccessPattern::Random);
        assert!(params.steady_state);
        assert_eq!(params.gather_seconds, 120);
        assert_eq!(params.dwell_seconds, DEFAULT_DWELL_SECONDS);
    }

    #[test]
    fn test_resolve_rejects_out_of_range() {
        let cli = cli::Cli::try_parse_args(["precondition", "-o300", "/tmp/x"]).unwrap();
        assert!(resolve(&cli).is_err());
    }
}
