//! JSON output formatting
//!
//! Serializes a finished run into a self-describing document: where and when
//! it ran, the parameters it ran with, and what it achieved.

use crate::config::{AccessPattern, Parameters};
use crate::generator::{RunSummary, Termination};
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::time::Duration;

/// Duration with both microseconds and human-readable format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonDuration {
    pub micros: u64,
    pub human: String,
}

impl JsonDuration {
    pub fn from_duration(d: Duration) -> Self {
        let micros = d.as_micros() as u64;
        let human = crate::util::time::format_duration(d);
        Self { micros, human }
    }
}

/// Throughput with bytes/sec and human-readable format
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonThroughput {
    pub bytes_per_sec: u64,
    pub human: String,
}

impl JsonThroughput {
    pub fn new(bytes_per_sec: u64) -> Self {
        let human = crate::util::time::format_throughput(bytes_per_sec as f64);
        Self { bytes_per_sec, human }
    }
}

/// Parameters the run used
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunConfig {
    pub block_size: u64,
    pub access_pattern: AccessPattern,
    pub queue_depth: usize,
    pub write_percent: u8,
    pub engine: String,
    pub direct: bool,
    pub steady_state: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gather_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dwell_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slope_tolerance: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

/// Run information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunInfo {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub target: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration: JsonDuration,
    pub config: JsonRunConfig,
}

/// Final regression over the steady-state window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonFit {
    pub slope: f64,
    pub r_squared: f64,
}

/// What the run did
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunResult {
    pub termination: Termination,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub effective_size: u64,
    pub total_blocks: u64,
    pub posted_ops: u64,
    pub completed_ops: u64,
    pub read_ops: u64,
    pub write_ops: u64,
    pub total_bytes: u64,
    pub average_throughput: JsonThroughput,
    pub last_period_mbps: f64,
    pub last_period_iops: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_fit: Option<JsonFit>,
}

/// Complete JSON document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRunOutput {
    pub run_info: JsonRunInfo,
    pub result: JsonRunResult,
}

/// Build JsonRunConfig from Parameters
pub fn build_run_config(params: &Parameters, engine: &str) -> JsonRunConfig {
    let steady = params.steady_state;
    JsonRunConfig {
        block_size: params.block_size,
        access_pattern: params.access_pattern,
        queue_depth: params.queue_depth,
        write_percent: params.write_percentage,
        engine: engine.to_string(),
        direct: params.direct,
        steady_state: steady,
        gather_seconds: steady.then_some(params.gather_seconds),
        dwell_seconds: steady.then_some(params.dwell_seconds),
        slope_tolerance: steady.then_some(params.slope_tolerance),
        seed: params.seed,
    }
}

/// Build the JSON document for a finished run
pub fn build_run_output(summary: &RunSummary, hostname: Option<String>) -> JsonRunOutput {
    JsonRunOutput {
        run_info: JsonRunInfo {
            hostname,
            target: summary.target.clone(),
            start_time: summary.started_at,
            end_time: summary.finished_at,
            duration: JsonDuration::from_duration(summary.elapsed),
            config: build_run_config(&summary.parameters, summary.engine),
        },
        result: JsonRunResult {
            termination: summary.termination,
            reason: summary.reason(),
            effective_size: summary.effective_size,
            total_blocks: summary.total_blocks,
            posted_ops: summary.posted_ios,
            completed_ops: summary.completed_ios,
            read_ops: summary.reads,
            write_ops: summary.writes,
            total_bytes: summary.completed_bytes,
            average_throughput: JsonThroughput::new(summary.average_bytes_per_sec() as u64),
            last_period_mbps: summary.last_mbps,
            last_period_iops: summary.last_iops,
            final_fit: summary.final_fit.map(|fit| JsonFit {
                slope: fit.slope,
                r_squared: fit.r_squared,
            }),
        },
    }
}

/// Name of this host, if it can be determined
pub fn local_hostname() -> Option<String> {
    hostname::get().ok().and_then(|name| name.into_string().ok())
}

/// Write JSON output to file
pub fn write_json_output(output_path: &Path, output: &JsonRunOutput, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output file: {}", output_path.display()))?;
    let writer = BufWriter::new(file);

    if pretty {
        serde_json::to_writer_pretty(writer, output)?;
    } else {
        serde_json::to_writer(writer, output)?;
    }

    Ok(())
}

/// Write the summary of `summary` to `output_path` as pretty JSON
pub fn write_summary(output_path: &Path, summary: &RunSummary) -> Result<()> {
    let output = build_run_output(summary, local_hostname());
    write_json_output(output_path, &output, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::regression::LinearFit;
    use tempfile::TempDir;

    fn summary(termination: Termination) -> RunSummary {
        let started_at = Utc::now();
        RunSummary {
            target: "/dev/nvme0n1".into(),
            engine: "io_uring",
            parameters: Parameters {
                steady_state: termination != Termination::TargetReached,
                ..Default::default()
            },
            effective_size: 1 << 30,
            total_blocks: 1024,
            posted_ios: 5000,
            completed_ios: 5000,
            completed_bytes: 5000 << 20,
            reads: 0,
            writes: 5000,
            started_at,
            finished_at: started_at,
            elapsed: Duration::from_secs(125),
            termination,
            final_fit: Some(LinearFit {
                slope: 0.0004,
                r_squared: 0.01,
            }),
            last_mbps: 41.5,
            last_iops: 41.5,
        }
    }

    #[test]
    fn test_build_steady_state_output() {
        let output = build_run_output(&summary(Termination::SteadyStateAchieved), Some("host1".into()));

        assert_eq!(output.run_info.hostname.as_deref(), Some("host1"));
        assert_eq!(output.run_info.duration.micros, 125_000_000);
        assert_eq!(output.run_info.duration.human, "2m05s");
        assert_eq!(output.run_info.config.gather_seconds, Some(540));
        assert_eq!(
            output.result.reason.as_deref(),
            Some("achieved steady-state after 2 minutes")
        );
        assert_eq!(output.result.average_throughput.bytes_per_sec, (5000u64 << 20) / 125);
        assert_eq!(output.result.final_fit.as_ref().unwrap().slope, 0.0004);
    }

    #[test]
    fn test_fixed_run_omits_steady_state_fields() {
        let output = build_run_output(&summary(Termination::TargetReached), None);
        let json = serde_json::to_value(&output).unwrap();

        let config = &json["run_info"]["config"];
        assert!(config.get("gather_seconds").is_none());
        assert!(json["run_info"].get("hostname").is_none());
        assert!(json["result"].get("reason").is_none());
        assert_eq!(json["result"]["termination"], "target_reached");
        assert_eq!(config["access_pattern"], "sequential");
    }

    #[test]
    fn test_write_summary_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("run.json");

        write_summary(&path, &summary(Termination::SteadyStateAbandoned)).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: JsonRunOutput = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.result.termination, Termination::SteadyStateAbandoned);
        assert_eq!(parsed.result.completed_ops, 5000);
        assert_eq!(parsed.run_info.target, "/dev/nvme0n1");
    }

    #[test]
    fn test_write_to_missing_directory_fails() {
        let err = write_summary(Path::new("/nonexistent/dir/run.json"), &summary(Termination::TargetReached))
            .unwrap_err();
        assert!(err.to_string().contains("Failed to create JSON output file"));
    }
}
