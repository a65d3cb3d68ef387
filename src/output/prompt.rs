//! Destructive-write confirmation

use crate::Result;
use std::io::{BufRead, Write};

/// Warn that `target` is about to be overwritten and ask for confirmation
///
/// Returns `true` only when the first non-blank character of the answer is
/// `Y` or `y`. End of input counts as "no".
pub fn confirm_overwrite<R: BufRead, W: Write>(target: &str, mut input: R, mut out: W) -> Result<bool> {
    writeln!(out)?;
    writeln!(out, "\tWARNING! WARNING! WARNING!")?;
    writeln!(out, "\tThis will overwrite {}", target)?;
    writeln!(out)?;
    writeln!(out, "Are you sure you want to continue? [Y/N]")?;
    out.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;

    let confirmed = matches!(answer.trim_start().chars().next(), Some('Y' | 'y'));
    if confirmed {
        writeln!(out)?;
    }
    Ok(confirmed)
}
