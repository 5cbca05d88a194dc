//! Worker-pool plumbing shared by the write and decode planes.
//!
//! Both planes run on a per-request rayon pool and dispatch work in
//! bounded windows of `threads * DISPATCH_FACTOR` blocks. Collecting a
//! window preserves input order, so the coordinator emits strictly in
//! ascending block id while at most one window of results is in flight.
//! An error inside a window stops all further dispatch and surfaces the
//! first failure.

use std::io;
use std::thread;

use rayon::ThreadPool;

use crate::error::{GxdError, Result};

/// Inclusive bounds on the worker count.
pub const THREAD_RANGE: std::ops::RangeInclusive<usize> = 1..=128;

/// Blocks dispatched per worker per window.
pub const DISPATCH_FACTOR: usize = 4;

/// The host's logical core count, clamped to [`THREAD_RANGE`].
pub fn default_threads() -> usize {
    let cores = thread::available_parallelism().map_or(1, |n| n.get());
    cores.clamp(*THREAD_RANGE.start(), *THREAD_RANGE.end())
}

pub fn validate_threads(threads: usize) -> Result<()> {
    if THREAD_RANGE.contains(&threads) {
        Ok(())
    } else {
        Err(GxdError::InvalidArgument(format!(
            "threads must be in {}..={}, got {threads}",
            THREAD_RANGE.start(),
            THREAD_RANGE.end()
        )))
    }
}

/// Build a pool of exactly `threads` workers.
pub fn build_pool(threads: usize) -> Result<ThreadPool> {
    validate_threads(threads)?;
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| GxdError::Io(io::Error::new(io::ErrorKind::Other, e)))
}

/// How many blocks one dispatch window holds.
pub fn window_size(threads: usize) -> usize {
    threads.saturating_mul(DISPATCH_FACTOR).max(1)
}
