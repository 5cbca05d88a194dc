//! Read-path seek planner: maps a logical byte range onto the minimal
//! covering run of blocks.

use crate::footer::BlockDescriptor;

/// The covering block range for one `[offset, offset+length)` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeekPlan {
    /// First block index to decode.
    pub first: usize,
    /// Last block index to decode (inclusive).
    pub last:  usize,
    /// Bytes to drop from the front of the first block's decoded output.
    pub skip:  u64,
    /// Total bytes to emit across the run.
    pub len:   u64,
}

/// Compute the covering plan, or `None` when the request selects nothing
/// (offset at or past end of payload, zero-length range, empty archive).
/// A request that runs past the end is clamped, never an error.
pub fn plan_range(
    blocks: &[BlockDescriptor],
    offset: u64,
    length: Option<u64>,
) -> Option<SeekPlan> {
    let total: u64 = blocks.iter().map(|b| b.orig_size).sum();
    if offset >= total {
        return None;
    }
    let end = match length {
        Some(len) => offset.saturating_add(len).min(total),
        None => total,
    };
    if end <= offset {
        return None;
    }

    // offset < total guarantees both bounds are found before the loop ends.
    let mut first = 0;
    let mut skip = 0;
    let mut last = blocks.len() - 1;
    let mut found_first = false;
    let mut cursor = 0u64;
    for (i, block) in blocks.iter().enumerate() {
        let next = cursor + block.orig_size;
        if !found_first && offset < next {
            first = i;
            skip = offset - cursor;
            found_first = true;
        }
        if end <= next {
            last = i;
            break;
        }
        cursor = next;
    }

    Some(SeekPlan {
        first,
        last,
        skip,
        len: end - offset,
    })
}
