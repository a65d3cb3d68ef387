//! CLI to Parameters conversion utilities

use crate::config::cli::Cli;
use crate::config::{AccessPattern, Parameters};
use crate::error::PreconditionError;
use anyhow::{Context, Result};

/// Parse a size string (e.g., "1G", "100M", "4k") to bytes
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if s.ends_with('k') || s.ends_with("kb") {
        (s.trim_end_matches("kb").trim_end_matches('k'), 1024u64)
    } else if s.ends_with('m') || s.ends_with("mb") {
        (s.trim_end_matches("mb").trim_end_matches('m'), 1024 * 1024)
    } else if s.ends_with('g') || s.ends_with("gb") {
        (s.trim_end_matches("gb").trim_end_matches('g'), 1024 * 1024 * 1024)
    } else {
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .parse()
        .with_context(|| format!("Invalid size format: {}", s))?;

    num.checked_mul(multiplier)
        .with_context(|| format!("Size out of range: {}", s))
}

/// Convert a kilobyte count from `-b` to bytes
pub fn kib_to_bytes(kb: u64) -> Result<u64> {
    kb.checked_mul(1024)
        .ok_or_else(|| PreconditionError::invalid(format!("-b{} is too large", kb)).into())
}

/// Overlay explicit command-line options onto `params`
///
/// # Errors
///
/// Fails when `-g`, `-d` or `-t` is given but steady-state mode ends up
/// disabled, or when a value cannot be represented.
pub fn apply_cli(cli: &Cli, params: &mut Parameters) -> Result<()> {
    if let Some(kb) = cli.block_size_kb {
        params.block_size = kib_to_bytes(kb)?;
    }
    if cli.random {
        params.access_pattern = AccessPattern::Random;
    }
    if let Some(depth) = cli.outstanding_ios {
        params.queue_depth = depth;
    }
    if let Some(pct) = cli.write_percentage {
        params.write_percentage = u8::try_from(pct)
            .ok()
            .filter(|&pct| pct <= 100)
            .ok_or_else(|| PreconditionError::invalid(format!("-w must be between 0 and 100, got {}", pct)))?;
    }
    if cli.steady_state {
        params.steady_state = true;
    }
    if let Some(gather) = cli.gather_seconds {
        params.gather_seconds = gather;
    }
    if let Some(dwell) = cli.dwell_seconds {
        params.dwell_seconds = dwell;
    }
    if let Some(tolerance) = cli.slope_tolerance {
        params.slope_tolerance = tolerance;
    }
    if let Some(prefix) = &cli.progress_prefix {
        params.progress_prefix = prefix.clone();
    }
    if let Some(engine) = cli.engine {
        params.engine = engine;
    }
    if cli.buffered {
        params.direct = false;
    }
    if cli.seed.is_some() {
        params.seed = cli.seed;
    }

    if cli.has_steady_state_tuning() && !params.steady_state {
        return Err(PreconditionError::invalid("-g, -d, and -t require -ss").into());
    }

    Ok(())
}
