//! Configuration validation
//!
//! Hard range checks run before any target is touched. Combinations that are
//! legal but do not overwrite every block only produce warnings.

use super::*;
use crate::error::PreconditionError;
use crate::target::DEFAULT_SECTOR_SIZE;
use anyhow::Result;

/// Validate run parameters
pub fn validate_parameters(params: &Parameters) -> Result<()> {
    if params.queue_depth == 0 || params.queue_depth > MAX_QUEUE_DEPTH {
        return Err(PreconditionError::invalid(format!(
            "-o must be between 1 and {}, got {}",
            MAX_QUEUE_DEPTH, params.queue_depth
        ))
        .into());
    }

    if params.write_percentage > 100 {
        return Err(PreconditionError::invalid(format!(
            "-w must be between 0 and 100, got {}",
            params.write_percentage
        ))
        .into());
    }

    validate_block_size(params.block_size)?;

    if params.gather_seconds == 0 {
        return Err(PreconditionError::invalid("-g must be > 0").into());
    }

    if params.dwell_seconds == 0 {
        return Err(PreconditionError::invalid("-d must be > 0").into());
    }

    if !params.slope_tolerance.is_finite() || params.slope_tolerance < 0.0 {
        return Err(PreconditionError::invalid(format!(
            "-t must be a non-negative number, got {}",
            params.slope_tolerance
        ))
        .into());
    }

    Ok(())
}

/// Validate block size
fn validate_block_size(block_size: u64) -> Result<()> {
    if block_size == 0 || block_size % DEFAULT_SECTOR_SIZE != 0 {
        return Err(PreconditionError::invalid(format!(
            "block size must be a positive multiple of {} bytes, got {}",
            DEFAULT_SECTOR_SIZE, block_size
        ))
        .into());
    }

    if block_size > MAX_IO_SIZE {
        return Err(PreconditionError::invalid(format!(
            "block size must be at most {} KB, got {} KB",
            MAX_IO_SIZE / 1024,
            block_size / 1024
        ))
        .into());
    }

    Ok(())
}

/// Legal settings that will leave part of the target unwritten
pub fn coverage_warnings(params: &Parameters) -> Vec<String> {
    let mut warnings = Vec::new();
    if params.steady_state {
        return warnings;
    }

    if params.access_pattern == AccessPattern::Random {
        warnings.push("full target write not guaranteed with -r".to_string());
    }
    if params.write_percentage < 100 {
        warnings.push("full target write not guaranteed with -w < 100".to_string());
    }
    warnings
}
