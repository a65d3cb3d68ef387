//! TOML configuration file parsing
//!
//! Every key is optional; missing keys keep their built-in defaults.
//!
//! ```toml
//! block_size = "64k"        # or a plain byte count
//! access_pattern = "random"
//! queue_depth = 32
//! write_percentage = 70
//! steady_state = true
//! gather_seconds = 300
//! dwell_seconds = 60
//! slope_tolerance = 0.001
//! progress_prefix = "phase 1: "
//! engine = "io_uring"
//! direct = true
//! seed = 42
//! ```

use super::cli_convert::parse_size;
use super::{AccessPattern, Parameters};
use crate::engine::EngineType;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// A size given either as bytes or as text with a unit suffix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeValue {
    Bytes(u64),
    Text(String),
}

impl SizeValue {
    pub fn to_bytes(&self) -> Result<u64> {
        match self {
            SizeValue::Bytes(bytes) => Ok(*bytes),
            SizeValue::Text(text) => parse_size(text),
        }
    }
}

/// Contents of a configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub block_size: Option<SizeValue>,
    pub access_pattern: Option<AccessPattern>,
    pub queue_depth: Option<usize>,
    pub write_percentage: Option<u8>,
    pub steady_state: Option<bool>,
    pub gather_seconds: Option<u64>,
    pub dwell_seconds: Option<u64>,
    pub slope_tolerance: Option<f64>,
    pub progress_prefix: Option<String>,
    pub engine: Option<EngineType>,
    pub direct: Option<bool>,
    pub seed: Option<u64>,
}

impl FileConfig {
    /// Overlay the values present in this file onto `params`
    pub fn apply_to(&self, params: &mut Parameters) -> Result<()> {
        if let Some(size) = &self.block_size {
            params.block_size = size.to_bytes().context("Invalid block_size")?;
        }
        if let Some(pattern) = self.access_pattern {
            params.access_pattern = pattern;
        }
        if let Some(depth) = self.queue_depth {
            params.queue_depth = depth;
        }
        if let Some(pct) = self.write_percentage {
            params.write_percentage = pct;
        }
        if let Some(steady) = self.steady_state {
            params.steady_state = steady;
        }
        if let Some(gather) = self.gather_seconds {
            params.gather_seconds = gather;
        }
        if let Some(dwell) = self.dwell_seconds {
            params.dwell_seconds = dwell;
        }
        if let Some(tolerance) = self.slope_tolerance {
            params.slope_tolerance = tolerance;
        }
        if let Some(prefix) = &self.progress_prefix {
            params.progress_prefix = prefix.clone();
        }
        if let Some(engine) = self.engine {
            params.engine = engine;
        }
        if let Some(direct) = self.direct {
            params.direct = direct;
        }
        if self.seed.is_some() {
            params.seed = self.seed;
        }
        Ok(())
    }

    /// Defaults overlaid with this file
    pub fn into_parameters(self) -> Result<Parameters> {
        let mut params = Parameters::default();
        self.apply_to(&mut params)?;
        Ok(params)
    }
}

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<FileConfig> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<FileConfig> {
    let config: FileConfig = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}
