use super::*;
use crate::engine::mock::MockEngine;
use crate::target::OpenFlags;
use crate::util::clock::ManualClock;
use std::cell::Cell;
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

const KIB: u64 = 1024;
const MIB: u64 = 1024 * 1024;

/// In-memory target that counts flushes and can report a resize
struct FakeTarget {
    path: PathBuf,
    size: u64,
    size_after_first_query: u64,
    queries: Cell<u32>,
    flushes: Cell<u32>,
}

impl FakeTarget {
    fn new(size: u64) -> Self {
        Self::resized(size, size)
    }

    fn resized(size: u64, later: u64) -> Self {
        Self {
            path: PathBuf::from("/fake/target"),
            size,
            size_after_first_query: later,
            queries: Cell::new(0),
            flushes: Cell::new(0),
        }
    }
}

impl Target for FakeTarget {
    fn open(&mut self, _flags: OpenFlags) -> Result<()> {
        Ok(())
    }

    fn fd(&self) -> Result<RawFd> {
        Ok(42)
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn query_size(&self) -> Result<u64> {
        let n = self.queries.get();
        self.queries.set(n + 1);
        Ok(if n == 0 { self.size } else { self.size_after_first_query })
    }

    fn flush(&self) -> Result<()> {
        self.flushes.set(self.flushes.get() + 1);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

/// Writer whose contents stay readable after it is boxed
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

struct Harness {
    clock: ManualClock,
    engine: MockEngine,
    status: SharedBuf,
    output: SharedBuf,
}

impl Harness {
    fn new() -> Self {
        Self {
            clock: ManualClock::new(),
            engine: MockEngine::new(),
            status: SharedBuf::default(),
            output: SharedBuf::default(),
        }
    }

    fn generator<'a>(&self, target: &'a FakeTarget, params: &Parameters) -> Result<IOGenerator<'a>> {
        let context = RunContext {
            clock: self.clock.shared(),
            status_sink: Box::new(self.status.clone()),
            output: Box::new(self.output.clone()),
        };
        IOGenerator::with_context(target, target.size, params, Box::new(self.engine.clone()), context)
    }

    fn run(&self, target: &FakeTarget, params: &Parameters) -> Result<RunSummary> {
        self.generator(target, params)?.run()
    }
}

fn params(block_size: u64, queue_depth: usize) -> Parameters {
    Parameters {
        block_size,
        queue_depth,
        seed: Some(1),
        ..Default::default()
    }
}

fn steady_params(block_size: u64, gather_seconds: u64, dwell_seconds: u64) -> Parameters {
    Parameters {
        steady_state: true,
        gather_seconds,
        dwell_seconds,
        ..params(block_size, 1)
    }
}

fn error_kind(err: &anyhow::Error) -> Option<&PreconditionError> {
    err.downcast_ref::<PreconditionError>()
}

#[test]
fn test_sequential_pass_writes_each_block_once_in_order() {
    let harness = Harness::new();
    let target = FakeTarget::new(10 * MIB);

    let summary = harness.run(&target, &params(MIB, 4)).unwrap();

    assert_eq!(summary.total_blocks, 10);
    assert_eq!(summary.completed_ios, 10);
    assert_eq!(summary.posted_ios, 10);
    assert_eq!(summary.completed_bytes, 10 * MIB);
    assert_eq!(summary.writes, 10);
    assert_eq!(summary.reads, 0);
    assert_eq!(summary.termination, Termination::TargetReached);
    assert_eq!(target.flushes.get(), 1);
    assert_eq!(harness.engine.queue_depth(), Some(4));

    let ops = harness.engine.submitted_operations();
    let offsets: Vec<u64> = ops.iter().map(|op| op.offset).collect();
    let expected: Vec<u64> = (0..10).map(|block| block * MIB).collect();
    assert_eq!(offsets, expected);
    assert!(ops.iter().all(|op| op.op_type == OperationType::Write));
    assert!(ops.iter().all(|op| op.length == MIB as usize));
    assert!(ops.iter().all(|op| op.user_data < 4 && op.target_fd == 42));

    // No steady-state reason for fixed runs
    assert_eq!(harness.output.text(), "");
    assert!(harness.status.text().ends_with("100.0% [0.0 MB/s]\r\n"));
}

#[test]
fn test_window_is_filled_then_refilled_per_completion() {
    let harness = Harness::new();
    harness.engine.set_max_completions_per_poll(1);
    let target = FakeTarget::new(MIB);

    harness.run(&target, &params(64 * KIB, 4)).unwrap();

    let slots: Vec<u64> = harness.engine.submitted_operations().iter().map(|op| op.user_data).collect();
    // Four initial posts, then each completed slot is reposted in place
    assert_eq!(&slots[..4], &[0, 1, 2, 3]);
    assert_eq!(&slots[4..8], &[0, 1, 2, 3]);
    assert_eq!(slots.len(), 16);
}

#[test]
fn test_last_block_sized_to_remainder() {
    let harness = Harness::new();
    let target = FakeTarget::new(10 * MIB + 512);

    let summary = harness.run(&target, &params(MIB, 4)).unwrap();

    assert_eq!(summary.total_blocks, 11);
    assert_eq!(summary.completed_bytes, 10 * MIB + 512);

    let ops = harness.engine.submitted_operations();
    let last = ops.last().unwrap();
    assert_eq!(last.offset, 10 * MIB);
    assert_eq!(last.length, 512);
}

#[test]
fn test_fewer_blocks_than_queue_depth() {
    let harness = Harness::new();
    let target = FakeTarget::new(3 * MIB);

    let summary = harness.run(&target, &params(MIB, 256)).unwrap();

    assert_eq!(summary.completed_ios, 3);
    assert_eq!(harness.engine.submitted_count(), 3);
}

#[test]
fn test_random_offsets_stay_in_range() {
    let harness = Harness::new();
    let target = FakeTarget::new(64 * MIB);
    let params = Parameters {
        access_pattern: AccessPattern::Random,
        ..params(64 * KIB, 8)
    };

    let summary = harness.run(&target, &params).unwrap();
    assert_eq!(summary.completed_ios, 1024);

    let ops = harness.engine.submitted_operations();
    assert!(ops.iter().all(|op| op.offset % (64 * KIB) == 0 && op.offset < 64 * MIB));

    let sequential: Vec<u64> = (0..1024).map(|block| block * 64 * KIB).collect();
    let offsets: Vec<u64> = ops.iter().map(|op| op.offset).collect();
    assert_ne!(offsets, sequential);

    // Write payloads start at varying sector-aligned offsets
    let payloads: HashSet<usize> = ops.iter().map(|op| op.buffer).collect();
    assert!(payloads.len() > 1);
    assert!(ops.iter().all(|op| op.buffer % 512 == 0));
}

#[test]
fn test_write_mix_reads_into_slot_buffers() {
    let harness = Harness::new();
    let target = FakeTarget::new(MIB);
    let params = Parameters {
        write_percentage: 30,
        ..params(4 * KIB, 4)
    };

    let summary = harness.run(&target, &params).unwrap();

    assert_eq!(summary.reads + summary.writes, 256);
    assert!(summary.reads > 0);
    assert!(summary.writes > 0);

    let ops = harness.engine.submitted_operations();
    let read_buffers: HashSet<usize> = ops
        .iter()
        .filter(|op| op.op_type == OperationType::Read)
        .map(|op| op.buffer)
        .collect();
    // One private buffer per slot, page aligned
    assert!(read_buffers.len() <= 4);
    assert!(read_buffers.iter().all(|&addr| addr % 4096 == 0));
}

#[test]
fn test_read_only_run() {
    let harness = Harness::new();
    let target = FakeTarget::new(MIB);
    let params = Parameters {
        write_percentage: 0,
        ..params(128 * KIB, 2)
    };

    let summary = harness.run(&target, &params).unwrap();
    assert_eq!(summary.reads, 8);
    assert_eq!(summary.writes, 0);
}

#[test]
fn test_queue_depth_bounds() {
    let harness = Harness::new();
    let target = FakeTarget::new(MIB);

    for depth in [0, 257] {
        let err = harness.generator(&target, &params(64 * KIB, depth)).err().unwrap();
        assert!(matches!(error_kind(&err), Some(PreconditionError::InvalidParameter(_))));
    }
    assert!(harness.generator(&target, &params(64 * KIB, 256)).is_ok());
}

#[test]
fn test_empty_target_rejected() {
    let harness = Harness::new();
    let target = FakeTarget::new(0);

    let err = harness.generator(&target, &params(64 * KIB, 1)).err().unwrap();
    assert!(matches!(error_kind(&err), Some(PreconditionError::EmptyTarget { .. })));
}

#[test]
fn test_block_size_must_be_sector_multiple() {
    let harness = Harness::new();
    let target = FakeTarget::new(MIB);

    let err = harness.generator(&target, &params(1000, 1)).err().unwrap();
    assert!(matches!(error_kind(&err), Some(PreconditionError::InvalidParameter(_))));
}

#[test]
fn test_io_error_is_fatal() {
    let harness = Harness::new();
    harness.engine.set_fail_after(3);
    let target = FakeTarget::new(10 * MIB);

    let err = harness.run(&target, &params(MIB, 4)).unwrap_err();
    match error_kind(&err) {
        Some(PreconditionError::Io { op, source, .. }) => {
            assert_eq!(*op, OperationType::Write);
            assert_eq!(source.raw_os_error(), Some(libc::EIO));
        }
        other => panic!("expected Io error, got {:?}", other),
    }

    // The failed run still reaps its outstanding IOs and never flushes
    assert_eq!(harness.engine.pending_count(), 0);
    assert_eq!(target.flushes.get(), 0);
}

#[test]
fn test_short_transfer_is_fatal() {
    let harness = Harness::new();
    harness.engine.set_bytes_per_op(512);
    let target = FakeTarget::new(MIB);

    let err = harness.run(&target, &params(64 * KIB, 2)).unwrap_err();
    assert!(matches!(
        error_kind(&err),
        Some(PreconditionError::ShortTransfer { expected: 65536, actual: 512, .. })
    ));
}

#[test]
fn test_target_resize_detected() {
    let harness = Harness::new();
    let target = FakeTarget::resized(MIB, 2 * MIB);

    let err = harness.run(&target, &params(64 * KIB, 2)).unwrap_err();
    assert!(matches!(error_kind(&err), Some(PreconditionError::Invariant(_))));
    assert!(err.to_string().contains("size changed"));
}

#[test]
fn test_out_of_order_completions() {
    let harness = Harness::new();
    harness.engine.set_reverse_order(true);
    harness.engine.set_max_completions_per_poll(3);
    let target = FakeTarget::new(4 * MIB);

    let summary = harness.run(&target, &params(128 * KIB, 8)).unwrap();

    assert_eq!(summary.completed_ios, 32);
    assert_eq!(summary.completed_bytes, 4 * MIB);
}

#[test]
fn test_progress_prefix_and_final_line() {
    let harness = Harness::new();
    harness.engine.set_latency(harness.clock.clone(), Duration::from_millis(100));
    let target = FakeTarget::new(MIB);
    let params = Parameters {
        progress_prefix: "phase1: ".into(),
        ..params(64 * KIB, 1)
    };

    harness.run(&target, &params).unwrap();

    let status = harness.status.text();
    assert!(status.starts_with("phase1: "), "{:?}", status);
    assert!(status.contains("phase1: 100.0% ["), "{:?}", status);
    assert!(status.ends_with("\r\n"));
}

#[test]
fn test_steady_state_achieved_at_constant_rate() {
    let harness = Harness::new();
    harness.engine.set_latency(harness.clock.clone(), Duration::from_millis(10));
    let target = FakeTarget::new(MIB);

    let summary = harness.run(&target, &steady_params(64 * KIB, 2, 1)).unwrap();

    assert_eq!(summary.termination, Termination::SteadyStateAchieved);
    assert_eq!(harness.output.text(), "achieved steady-state after 0 minutes\n");
    assert!(harness.status.text().contains("achieved steady-state after 0 minutes"));

    // 20 bins to fill the window, 10 more to dwell
    assert!(summary.completed_ios > 300 && summary.completed_ios < 320);
    let fit = summary.final_fit.unwrap();
    assert!(fit.slope.abs() <= 0.001);

    // Sequential access wraps around the 16 block target
    let ops = harness.engine.submitted_operations();
    assert_eq!(ops[15].offset, 15 * 64 * KIB);
    assert_eq!(ops[16].offset, 0);
}

#[test]
fn test_steady_state_abandoned_after_ceiling() {
    let harness = Harness::new();
    harness.engine.set_latency(harness.clock.clone(), Duration::from_secs(60));
    let target = FakeTarget::new(MIB);

    // A window longer than the ceiling can never fill
    let summary = harness.run(&target, &steady_params(64 * KIB, 7 * 3600, 60)).unwrap();

    assert_eq!(summary.termination, Termination::SteadyStateAbandoned);
    assert_eq!(summary.completed_ios, 360);
    assert!(summary.final_fit.is_none());
    assert_eq!(harness.output.text(), "abandoned steady-state after 360 minutes\n");
}

#[test]
fn test_steady_state_drains_window_after_verdict() {
    let harness = Harness::new();
    harness.engine.set_latency(harness.clock.clone(), Duration::from_millis(1));
    harness.engine.set_max_completions_per_poll(1);
    let target = FakeTarget::new(MIB);
    let params = Parameters {
        queue_depth: 8,
        ..steady_params(64 * KIB, 1, 1)
    };

    let summary = harness.run(&target, &params).unwrap();

    assert_eq!(summary.termination, Termination::SteadyStateAchieved);
    // Everything posted was completed, including IOs in flight at the verdict
    assert_eq!(summary.completed_ios, summary.posted_ios);
    assert_eq!(harness.engine.pending_count(), 0);
}
