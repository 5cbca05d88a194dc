//! Write path: the parallel block processor and the archive writer.
//!
//! `compress` plans the block layout, farms the per-block work (read the
//! source slice, SHA-256 it, encode it) out to a bounded worker pool, and
//! appends the results in ascending block id immediately after the
//! opening magic. Workers complete out of order; the coordinator imposes
//! order by draining one dispatch window at a time. The JSON footer, its
//! big-endian length, and the closing magic seal the archive.

use std::fs::{self, File};
use std::io::{BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use byteorder::{BigEndian, WriteBytesExt};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::codec::{Algorithm, CodecRegistry};
use crate::digest;
use crate::error::{GxdError, Result};
use crate::footer::{ArchiveFooter, BlockDescriptor, MAGIC, MAGIC_LEN, WRITER_VERSION};
use crate::layout::{plan_blocks, BlockPlan};
use crate::pool;

/// Default raw bytes per block: 1 MiB.
pub const DEFAULT_BLOCK_SIZE: u64 = 1024 * 1024;
/// Default zstd compression level.
pub const DEFAULT_ZSTD_LEVEL: i32 = 3;

// ── Options ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CompressOptions {
    pub algo:       Algorithm,
    /// Consumed only by zstd; must be in 1..=22.
    pub level:      i32,
    pub block_size: u64,
    pub threads:    usize,
    /// Accepted for API symmetry with the decode plane. The format
    /// requires a hash per block, so digests are always computed and this
    /// flag changes nothing at write time.
    pub verify:     bool,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            algo:       Algorithm::Zstd,
            level:      DEFAULT_ZSTD_LEVEL,
            block_size: DEFAULT_BLOCK_SIZE,
            threads:    pool::default_threads(),
            verify:     true,
        }
    }
}

/// What `compress` reports back on success.
#[derive(Debug, Clone)]
pub struct CompressSummary {
    pub blocks:       u64,
    pub orig_size:    u64,
    pub archive_size: u64,
}

// ── Block processor ───────────────────────────────────────────────────────────

struct BlockRecord {
    id:        u64,
    orig_size: u64,
    hash:      String,
    payload:   Vec<u8>,
}

/// Worker body: read the block's slice through a private handle, digest
/// the raw bytes, encode.
fn process_block(
    source: &Path,
    plan: BlockPlan,
    registry: &CodecRegistry,
    algo: Algorithm,
    level: i32,
) -> Result<BlockRecord> {
    let mut file = File::open(source)?;
    file.seek(SeekFrom::Start(plan.src_off))?;
    let mut raw = vec![0u8; plan.src_len as usize];
    file.read_exact(&mut raw)?;

    let hash = digest::sha256_hex(&raw);
    let payload = registry.encode(algo, level, &raw)?;
    Ok(BlockRecord {
        id: plan.id,
        orig_size: plan.src_len,
        hash,
        payload,
    })
}

// ── Archive writer ────────────────────────────────────────────────────────────

/// Compress `source` into a GXD archive at `archive`.
///
/// The archive is written in place; callers that must never expose a
/// partial file should write to a temporary path and rename on success.
pub fn compress(
    registry: &CodecRegistry,
    source: &Path,
    archive: &Path,
    opts: &CompressOptions,
) -> Result<CompressSummary> {
    if opts.block_size == 0 {
        return Err(GxdError::InvalidArgument(
            "block size must be at least 1 byte".to_string(),
        ));
    }
    pool::validate_threads(opts.threads)?;
    // Fail before touching the output if the codec is unavailable or the
    // level is out of range.
    registry.get(opts.algo)?;
    if opts.algo == Algorithm::Zstd && !crate::codec::ZSTD_LEVEL_RANGE.contains(&opts.level) {
        return Err(GxdError::InvalidArgument(format!(
            "zstd level {} out of range 1..=22",
            opts.level
        )));
    }

    let total_size = fs::metadata(source)?.len();
    let plan = plan_blocks(total_size, opts.block_size);
    info!(
        source = %source.display(),
        algo = %opts.algo,
        blocks = plan.len(),
        block_size = opts.block_size,
        threads = opts.threads,
        "compressing"
    );

    let global_hash = digest::sha256_file(source)?;

    let mut out = BufWriter::new(File::create(archive)?);
    out.write_all(MAGIC)?;

    let worker_pool = pool::build_pool(opts.threads)?;
    let window = pool::window_size(opts.threads);

    let mut offset = MAGIC_LEN;
    let mut blocks = Vec::with_capacity(plan.len());
    for batch in plan.chunks(window) {
        let records: Result<Vec<BlockRecord>> = worker_pool.install(|| {
            batch
                .par_iter()
                .map(|p| process_block(source, *p, registry, opts.algo, opts.level))
                .collect()
        });
        for record in records? {
            out.write_all(&record.payload)?;
            let size = record.payload.len() as u64;
            blocks.push(BlockDescriptor {
                id: record.id,
                start: offset,
                size,
                orig_size: record.orig_size,
                hash: record.hash,
            });
            offset += size;
        }
        debug!(done = blocks.len(), total = plan.len(), "window flushed");
    }

    let footer = ArchiveFooter {
        version: WRITER_VERSION.to_string(),
        algo: opts.algo.tag().to_string(),
        global_hash,
        blocks,
    };
    let footer_bytes = footer
        .to_bytes()
        .map_err(|e| GxdError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    out.write_all(&footer_bytes)?;
    out.write_u64::<BigEndian>(footer_bytes.len() as u64)?;
    out.write_all(MAGIC)?;
    out.flush()?;

    let archive_size = offset + footer_bytes.len() as u64 + crate::footer::TRAILER_LEN;
    info!(
        archive = %archive.display(),
        orig_size = total_size,
        archive_size,
        "archive sealed"
    );
    Ok(CompressSummary {
        blocks: plan.len() as u64,
        orig_size: total_size,
        archive_size,
    })
}
