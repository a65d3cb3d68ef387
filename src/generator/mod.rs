//! IO generation
//!
//! The generator keeps a fixed window of IOs outstanding against one target.
//! Every slot in the window is posted once at startup; after that a slot is
//! only reposted from the completion of its previous IO, so the number in
//! flight never exceeds the queue depth.
//!
//! A run ends in one of two ways:
//!
//! - **Fixed target**: every block has been posted once and all IOs have
//!   completed. With sequential access and 100% writes this overwrites the
//!   whole target exactly once.
//! - **Steady state**: blocks are chosen forever (sequential access wraps)
//!   until the [`SteadyStateDetector`] reports steady state achieved or
//!   abandoned, then the outstanding IOs are drained.
//!
//! All per-IO state lives in the slot whose index travels with the IO as its
//! `user_data`, so completions may arrive in any order.

pub mod slot;
pub mod summary;

pub use slot::OperationSlot;
pub use summary::{RunSummary, Termination};

use crate::config::{AccessPattern, Parameters, MAX_IO_SIZE, MAX_QUEUE_DEPTH};
use crate::distribution::{self, Distribution};
use crate::engine::{EngineConfig, IOCompletion, IOEngine, IOOperation, OperationType};
use crate::error::PreconditionError;
use crate::output::status::StatusLine;
use crate::stats::{SteadyStateDetector, ThroughputMeter};
use crate::target::Target;
use crate::util::buffer::AlignedBuffer;
use crate::util::clock::{MonotonicClock, SharedClock};
use crate::util::random::RandomSource;
use crate::Result;
use chrono::Utc;
use std::io::Write;
use std::os::unix::io::RawFd;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Minimum alignment of IO buffers, whatever the sector size
const MIN_BUFFER_ALIGNMENT: usize = 4096;

/// How often the status line may be redrawn
pub const STATUS_PERIOD: Duration = Duration::from_secs(1);

/// Period of the throughput meter
pub const THROUGHPUT_PERIOD: Duration = Duration::from_secs(1);

/// Where a run reads time from and writes its output to
pub struct RunContext {
    pub clock: SharedClock,
    /// Receives the self-overwriting status line
    pub status_sink: Box<dyn Write + Send>,
    /// Receives the steady-state termination reason
    pub output: Box<dyn Write + Send>,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            clock: MonotonicClock::shared(),
            status_sink: Box::new(std::io::stderr()),
            output: Box::new(std::io::stdout()),
        }
    }
}

/// Asynchronous IO generator for one run against one target
pub struct IOGenerator<'a> {
    target: &'a dyn Target,
    fd: RawFd,
    params: Parameters,
    engine: Box<dyn IOEngine>,
    distribution: Box<dyn Distribution>,
    rng: RandomSource,

    effective_size: u64,
    total_blocks: u64,
    sector_size: usize,
    initial_target_size: u64,

    slots: Vec<OperationSlot>,
    /// Random payload shared by every write, 2 x the largest IO
    write_buffer: AlignedBuffer,

    posted_ios: u64,
    completed_ios: u64,
    completed_bytes: u64,
    reads: u64,
    writes: u64,
    in_flight: usize,

    throughput: ThroughputMeter,
    detector: SteadyStateDetector,
    status: StatusLine<Box<dyn Write + Send>>,
    output: Box<dyn Write + Send>,
    clock: SharedClock,
    termination: Option<Termination>,
}

impl<'a> IOGenerator<'a> {
    /// Build a generator writing status to stderr and the result to stdout
    pub fn new(
        target: &'a dyn Target,
        effective_size: u64,
        params: &Parameters,
        engine: Box<dyn IOEngine>,
    ) -> Result<Self> {
        Self::with_context(target, effective_size, params, engine, RunContext::default())
    }

    /// Build a generator with an explicit clock and output sinks
    ///
    /// # Errors
    ///
    /// - [`PreconditionError::InvalidParameter`] for a queue depth outside
    ///   1..=256 or a block size that is not a multiple of the target's sector
    /// - [`PreconditionError::EmptyTarget`] when `effective_size` is zero
    /// - engine initialisation and buffer allocation failures
    pub fn with_context(
        target: &'a dyn Target,
        effective_size: u64,
        params: &Parameters,
        mut engine: Box<dyn IOEngine>,
        context: RunContext,
    ) -> Result<Self> {
        if params.queue_depth == 0 || params.queue_depth > MAX_QUEUE_DEPTH {
            return Err(PreconditionError::invalid(format!(
                "queue depth must be between 1 and {}, got {}",
                MAX_QUEUE_DEPTH, params.queue_depth
            ))
            .into());
        }

        let sector_size = target.logical_block_size().max(1);
        if params.block_size == 0
            || params.block_size > MAX_IO_SIZE
            || params.block_size % sector_size != 0
        {
            return Err(PreconditionError::invalid(format!(
                "block size {} is not a multiple of the {} byte sector size up to {} bytes",
                params.block_size, sector_size, MAX_IO_SIZE
            ))
            .into());
        }

        if effective_size == 0 {
            return Err(PreconditionError::EmptyTarget {
                path: target.path().to_path_buf(),
                size: target.size(),
            }
            .into());
        }

        let fd = target.fd()?;
        let initial_target_size = target.query_size()?;
        let total_blocks = effective_size.div_ceil(params.block_size);
        let sector_size = sector_size as usize;
        let alignment = sector_size.max(MIN_BUFFER_ALIGNMENT).next_power_of_two();

        let mut rng = RandomSource::new(params.seed);

        // Reused for every write at a random offset; filling it per IO costs
        // more CPU than the device can absorb
        let mut write_buffer = AlignedBuffer::new(2 * MAX_IO_SIZE as usize, alignment)?;
        write_buffer.fill_random(&mut rng);

        let read_size = (params.write_percentage < 100).then_some(params.block_size as usize);
        let slots = (0..params.queue_depth)
            .map(|_| OperationSlot::new(read_size, alignment))
            .collect::<Result<Vec<_>>>()?;

        engine.init(&EngineConfig {
            queue_depth: params.queue_depth,
        })?;

        let detector = SteadyStateDetector::new(params.steady_state_config(), context.clock.clone())?;
        let throughput = ThroughputMeter::new(context.clock.clone(), THROUGHPUT_PERIOD);
        let status = StatusLine::new(context.status_sink, context.clock.clone(), STATUS_PERIOD);
        let distribution = distribution::for_pattern(params.access_pattern);

        debug!(
            engine = engine.name(),
            total_blocks,
            effective_size,
            sector_size,
            distribution = distribution.name(),
            "generator ready"
        );

        Ok(Self {
            target,
            fd,
            distribution,
            params: params.clone(),
            engine,
            rng,
            effective_size,
            total_blocks,
            sector_size,
            initial_target_size,
            slots,
            write_buffer,
            posted_ios: 0,
            completed_ios: 0,
            completed_bytes: 0,
            reads: 0,
            writes: 0,
            in_flight: 0,
            throughput,
            detector,
            status,
            output: context.output,
            clock: context.clock,
            termination: None,
        })
    }

    /// Number of blocks covering the effective size, the last possibly partial
    pub fn total_blocks(&self) -> u64 {
        self.total_blocks
    }

    pub fn effective_size(&self) -> u64 {
        self.effective_size
    }

    /// Drive IO until the run terminates, then flush and check the run's books
    pub fn run(mut self) -> Result<RunSummary> {
        let started_at = Utc::now();
        let started = self.clock.now();

        info!(
            target_path = %self.target.path().display(),
            engine = self.engine.name(),
            block_size = self.params.block_size,
            queue_depth = self.params.queue_depth,
            write_percentage = self.params.write_percentage,
            pattern = %self.params.access_pattern,
            steady_state = self.params.steady_state,
            "starting run"
        );

        if let Err(err) = self.drive() {
            // Reap whatever is still in flight before the buffers are freed
            if let Err(cleanup_err) = self.engine.cleanup() {
                warn!("engine cleanup after failure also failed: {:#}", cleanup_err);
            }
            return Err(err);
        }

        self.target.flush()?;
        self.final_sanity_checks()?;

        self.status.finish()?;

        let elapsed = self.clock.now().saturating_sub(started);
        let termination = self.termination.unwrap_or(Termination::TargetReached);
        if let Some(reason) = summary::steady_state_reason(termination, self.detector.elapsed()) {
            writeln!(self.output, "{}", reason)?;
            self.output.flush()?;
        }

        self.engine.cleanup()?;

        let summary = RunSummary {
            target: self.target.path().display().to_string(),
            engine: self.engine.name(),
            parameters: self.params.clone(),
            effective_size: self.effective_size,
            total_blocks: self.total_blocks,
            posted_ios: self.posted_ios,
            completed_ios: self.completed_ios,
            completed_bytes: self.completed_bytes,
            reads: self.reads,
            writes: self.writes,
            started_at,
            finished_at: Utc::now(),
            elapsed,
            termination,
            final_fit: self.detector.linear_fit(),
            last_mbps: self.throughput.mbps(),
            last_iops: self.throughput.iops(),
        };

        info!(
            termination = %summary.termination,
            completed_ios = summary.completed_ios,
            completed_bytes = summary.completed_bytes,
            elapsed = %crate::util::time::format_duration(summary.elapsed),
            last_mbps = summary.last_mbps,
            "run finished"
        );

        Ok(summary)
    }

    /// Post the initial window, then wait for and handle completions until done
    fn drive(&mut self) -> Result<()> {
        let initial = self.total_blocks.min(self.params.queue_depth as u64) as usize;
        for index in 0..initial {
            self.post_next_io(index)?;
        }

        let mut completions = Vec::with_capacity(self.params.queue_depth);
        while !self.all_ios_completed() {
            if self.in_flight == 0 {
                return Err(PreconditionError::invariant("more IO to post but none in flight").into());
            }

            completions.clear();
            self.engine.poll_completions(&mut completions)?;

            for completion in completions.drain(..) {
                self.handle_completion(completion)?;
            }
        }

        Ok(())
    }

    /// Whether the slot just completed should be reposted
    fn should_post_another_io(&self) -> bool {
        if self.params.steady_state {
            self.termination.is_none()
        } else {
            self.posted_ios < self.total_blocks
        }
    }

    fn all_ios_completed(&self) -> bool {
        !self.should_post_another_io() && self.in_flight == 0
    }

    /// Pick offset, size and direction for `index` and submit it
    fn post_next_io(&mut self, index: usize) -> Result<()> {
        let block = self.distribution.next_block(self.total_blocks, &mut self.rng);
        let offset = block * self.params.block_size;
        let length = (self.effective_size - offset).min(self.params.block_size) as usize;

        let op_type = if self.rng.percent_trial(self.params.write_percentage) {
            OperationType::Write
        } else {
            OperationType::Read
        };

        let slot = &mut self.slots[index];
        let buffer = match op_type {
            OperationType::Write => {
                // Varying the payload offset defeats device de-duplication
                let start = self.rng.aligned_offset(MAX_IO_SIZE as usize, self.sector_size);
                debug_assert!(start + length <= self.write_buffer.size());
                // SAFETY: start <= MAX_IO_SIZE and length <= MAX_IO_SIZE, and the
                // buffer holds 2 * MAX_IO_SIZE bytes. The engine only reads from it.
                unsafe { self.write_buffer.as_ptr().add(start) as *mut u8 }
            }
            OperationType::Read => slot
                .read_ptr()
                .ok_or_else(|| PreconditionError::invariant(format!("slot {} has no read buffer", index)))?,
        };

        slot.offset = offset;
        slot.length = length;
        slot.op_type = op_type;

        self.engine
            .submit(IOOperation {
                op_type,
                target_fd: self.fd,
                offset,
                buffer,
                length,
                user_data: index as u64,
            })
            .map_err(|source| PreconditionError::Submit { op: op_type, offset, source })?;

        slot.in_flight = true;
        self.in_flight += 1;
        self.posted_ios += 1;
        Ok(())
    }

    fn handle_completion(&mut self, completion: IOCompletion) -> Result<()> {
        let index = usize::try_from(completion.user_data)
            .ok()
            .filter(|&index| index < self.slots.len())
            .ok_or_else(|| {
                PreconditionError::invariant(format!("completion for unknown slot {}", completion.user_data))
            })?;

        let slot = &mut self.slots[index];
        if !slot.in_flight {
            return Err(PreconditionError::invariant(format!("completion for idle slot {}", index)).into());
        }
        slot.in_flight = false;
        self.in_flight -= 1;

        let bytes = completion.result.map_err(|source| PreconditionError::Io {
            op: slot.op_type,
            offset: slot.offset,
            length: slot.length,
            source,
        })?;

        if bytes != slot.length {
            return Err(PreconditionError::ShortTransfer {
                op: slot.op_type,
                offset: slot.offset,
                expected: slot.length,
                actual: bytes,
            }
            .into());
        }

        match slot.op_type {
            OperationType::Read => self.reads += 1,
            OperationType::Write => self.writes += 1,
        }
        self.completed_ios += 1;
        self.completed_bytes += bytes as u64;
        self.throughput.track_completion(bytes as u64);

        if self.params.steady_state {
            self.report_steady_state()?;
        } else {
            self.report_progress()?;
        }

        if self.should_post_another_io() {
            self.post_next_io(index)?;
        }

        Ok(())
    }

    /// Percentage-of-target status for fixed runs
    fn report_progress(&mut self) -> Result<()> {
        // The last completion always shows 100% so the run doesn't look cut short
        let finished = self.completed_ios == self.total_blocks;
        if !finished && !self.status.is_due() {
            return Ok(());
        }

        let percent = self.completed_ios as f64 / self.total_blocks as f64 * 100.0;
        let message = format!(
            "{}{:.1}% [{:.1} MB/s]",
            self.params.progress_prefix,
            percent,
            self.throughput.mbps()
        );
        self.status.force_write(&message)?;
        Ok(())
    }

    /// Feed the detector and report its progress or its verdict
    fn report_steady_state(&mut self) -> Result<()> {
        if self.termination.is_some() {
            // Completions draining after the verdict
            return Ok(());
        }

        self.detector.track_completion();

        let termination = if self.detector.done() {
            Some(Termination::SteadyStateAchieved)
        } else if self.detector.abandoned() {
            Some(Termination::SteadyStateAbandoned)
        } else {
            None
        };

        if let Some(termination) = termination {
            self.termination = Some(termination);
            let reason = summary::steady_state_reason(termination, self.detector.elapsed()).unwrap_or_default();
            let message = format!("{}{}", self.params.progress_prefix, reason);
            self.status.force_write(&message)?;

            match self.detector.linear_fit() {
                Some(fit) => info!(slope = fit.slope, r_squared = fit.r_squared, "{}", reason),
                None => info!("{}", reason),
            }
            return Ok(());
        }

        if self.status.is_due() {
            let message = format!(
                "{}{} [{:.1} MB/s]",
                self.params.progress_prefix,
                self.detector.progress_message(),
                self.throughput.mbps()
            );
            self.status.force_write(&message)?;
        }
        Ok(())
    }

    fn final_sanity_checks(&self) -> Result<()> {
        if self.in_flight != 0 {
            return Err(PreconditionError::invariant(format!("{} IOs still in flight", self.in_flight)).into());
        }
        if self.should_post_another_io() {
            return Err(PreconditionError::invariant("run ended with IO left to post").into());
        }

        if !self.params.steady_state && self.params.access_pattern == AccessPattern::Sequential {
            if self.completed_ios != self.total_blocks {
                return Err(PreconditionError::invariant(format!(
                    "completed {} IOs, expected {}",
                    self.completed_ios, self.total_blocks
                ))
                .into());
            }
            if self.completed_bytes != self.effective_size {
                return Err(PreconditionError::invariant(format!(
                    "transferred {} bytes, expected {}",
                    self.completed_bytes, self.effective_size
                ))
                .into());
            }
        }

        let final_size = self.target.query_size()?;
        if final_size != self.initial_target_size {
            return Err(PreconditionError::invariant(format!(
                "target size changed from {} to {} during the run",
                self.initial_target_size, final_size
            ))
            .into());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
