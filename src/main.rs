//! precondition CLI entry point

use anyhow::{Context, Result};
use clap::CommandFactory;
use precondition::config::{self, cli::Cli, validator};
use precondition::engine::create_engine;
use precondition::generator::IOGenerator;
use precondition::output::{json, prompt};
use precondition::target::{effective_size, open_target, OpenFlags, TargetSpec};
use precondition::util::logging::{init_logging, level_for};
use std::io;
use tracing::{info, warn};

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    init_logging(level_for(cli.debug));

    let params = match config::resolve(&cli) {
        Ok(params) => params,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            eprintln!();
            eprintln!("{}", Cli::command().render_usage());
            std::process::exit(1);
        }
    };

    for warning in validator::coverage_warnings(&params) {
        warn!("{}", warning);
    }

    let spec = TargetSpec::parse(&cli.target);

    // A read-only run cannot damage anything
    if !cli.yes && params.write_percentage > 0 {
        let stdin = io::stdin();
        if !prompt::confirm_overwrite(&spec.to_string(), stdin.lock(), io::stderr())? {
            return Ok(());
        }
    }

    let mut target = open_target(&spec, OpenFlags { direct: params.direct })
        .with_context(|| format!("Cannot use target {}", spec))?;

    let size = target.size();
    let sector_size = target.logical_block_size();
    let usable = effective_size(size, sector_size);
    if usable != size {
        warn!(size, usable, "target is not an even multiple of {} B", sector_size);
        warn!("Target will not be completely overwritten");
    }

    let engine = create_engine(params.engine)?;
    info!(engine = engine.name(), direct = params.direct, "opened {}", spec);

    let summary = IOGenerator::new(target.as_ref(), usable, &params, engine)?.run()?;
    target.close()?;

    if let Some(path) = &cli.json_output {
        json::write_summary(path, &summary)?;
        info!(path = %path.display(), "wrote run summary");
    }

    Ok(())
}
