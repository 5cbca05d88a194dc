//! Read path: the parallel decode plane behind `decompress` and `seek`.
//!
//! Workers each open their own archive handle, read their block's
//! compressed bytes, decode, and (under the verification policy) check
//! the decoded SHA-256 against the descriptor. Verification always sees
//! the full decoded block; seek trimming happens afterwards in the
//! coordinator. Emission is strictly in ascending block id: the
//! coordinator drains one dispatch window at a time, so at most one
//! window of decoded blocks is in flight. The first worker error stops
//! further dispatch and is returned as-is.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::codec::{Algorithm, CodecRegistry};
use crate::digest::{self, RollingSha256};
use crate::error::{GxdError, Result};
use crate::footer::BlockDescriptor;
use crate::pool;
use crate::reader::{read_block_from, Archive};
use crate::seek::plan_range;

// ── Options ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct DecodeOptions {
    pub threads:       usize,
    /// Recompute per-block digests, and the global digest on a full
    /// decompress. When false, nothing is hash-checked.
    pub verify_blocks: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            threads:       pool::default_threads(),
            verify_blocks: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SeekOptions {
    pub offset:        u64,
    /// Bytes to extract; `None` reads to end of payload.
    pub length:        Option<u64>,
    pub threads:       usize,
    pub verify_blocks: bool,
}

impl Default for SeekOptions {
    fn default() -> Self {
        Self {
            offset:        0,
            length:        None,
            threads:       pool::default_threads(),
            verify_blocks: true,
        }
    }
}

// ── Worker ────────────────────────────────────────────────────────────────────

fn decode_block(
    path: &Path,
    desc: &BlockDescriptor,
    registry: &CodecRegistry,
    algo: Algorithm,
    verify: bool,
) -> Result<Vec<u8>> {
    let mut file = File::open(path)?;
    let payload = read_block_from(&mut file, desc)?;
    let decoded = registry.decode(algo, &payload)?;
    if verify && digest::sha256_hex(&decoded) != desc.hash {
        return Err(GxdError::BlockHashMismatch { id: desc.id });
    }
    if decoded.len() as u64 != desc.orig_size {
        return Err(GxdError::Codec(format!(
            "block {} decoded to {} bytes but descriptor says {}",
            desc.id,
            decoded.len(),
            desc.orig_size
        )));
    }
    Ok(decoded)
}

// ── Full decompression ────────────────────────────────────────────────────────

/// Decode every block of `archive` into `sink`, in order.
///
/// With `verify_blocks`, each block's digest is checked and a rolling
/// SHA-256 over the emitted stream is compared to the footer's
/// `global_hash` on completion. Returns the number of bytes written.
pub fn decompress<W: Write>(
    registry: &CodecRegistry,
    archive: &Path,
    sink: &mut W,
    opts: &DecodeOptions,
) -> Result<u64> {
    pool::validate_threads(opts.threads)?;
    let archive = Archive::open(archive)?;
    let algo = archive.algorithm();
    registry.get(algo)?;
    info!(
        path = %archive.path().display(),
        blocks = archive.block_count(),
        verify = opts.verify_blocks,
        "decompressing"
    );

    let worker_pool = pool::build_pool(opts.threads)?;
    let window = pool::window_size(opts.threads);

    let mut rolling = opts.verify_blocks.then(RollingSha256::new);
    let mut written = 0u64;
    for batch in archive.blocks().chunks(window) {
        let decoded: Result<Vec<Vec<u8>>> = worker_pool.install(|| {
            batch
                .par_iter()
                .map(|d| decode_block(archive.path(), d, registry, algo, opts.verify_blocks))
                .collect()
        });
        for block in decoded? {
            sink.write_all(&block)?;
            if let Some(hasher) = rolling.as_mut() {
                hasher.update(&block);
            }
            written += block.len() as u64;
        }
        debug!(written, "window emitted");
    }

    if let Some(hasher) = rolling {
        if hasher.finalize_hex() != archive.global_hash() {
            return Err(GxdError::GlobalHashMismatch);
        }
    }
    Ok(written)
}

// ── Random access ─────────────────────────────────────────────────────────────

/// Extract `[offset, offset+length)` from `archive` into `sink`, decoding
/// only the covering blocks. A range at or past end of payload writes
/// nothing and succeeds. Returns the number of bytes written.
pub fn seek<W: Write>(
    registry: &CodecRegistry,
    archive: &Path,
    sink: &mut W,
    opts: &SeekOptions,
) -> Result<u64> {
    pool::validate_threads(opts.threads)?;
    let archive = Archive::open(archive)?;
    let algo = archive.algorithm();
    registry.get(algo)?;

    let Some(plan) = plan_range(archive.blocks(), opts.offset, opts.length) else {
        debug!(offset = opts.offset, "seek past end of payload, empty result");
        return Ok(0);
    };
    info!(
        path = %archive.path().display(),
        offset = opts.offset,
        len = plan.len,
        first = plan.first,
        last = plan.last,
        "seeking"
    );

    let worker_pool = pool::build_pool(opts.threads)?;
    let window = pool::window_size(opts.threads);
    let run = &archive.blocks()[plan.first..=plan.last];

    let mut skip = plan.skip as usize;
    let mut remaining = plan.len;
    let mut written = 0u64;
    for batch in run.chunks(window) {
        let decoded: Result<Vec<Vec<u8>>> = worker_pool.install(|| {
            batch
                .par_iter()
                .map(|d| decode_block(archive.path(), d, registry, algo, opts.verify_blocks))
                .collect()
        });
        for block in decoded? {
            // Trim only after the worker has verified the full block.
            let start = skip.min(block.len());
            skip = 0;
            let take = (block.len() - start).min(remaining as usize);
            sink.write_all(&block[start..start + take])?;
            remaining -= take as u64;
            written += take as u64;
        }
        if remaining == 0 {
            break;
        }
    }
    Ok(written)
}
