//! Write-path block layout planner.

/// One block's slice of the source file, before compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlan {
    pub id:      u64,
    pub src_off: u64,
    pub src_len: u64,
}

/// Partition `total_size` bytes into `block_size`-sized descriptors.
///
/// Every block but the last has `src_len == block_size`; the last covers
/// the remainder. Empty input produces no descriptors. `block_size` must
/// be at least 1 (validated by the caller).
pub fn plan_blocks(total_size: u64, block_size: u64) -> Vec<BlockPlan> {
    debug_assert!(block_size >= 1);
    let count = total_size.div_ceil(block_size);
    (0..count)
        .map(|id| {
            let src_off = id * block_size;
            BlockPlan {
                id,
                src_off,
                src_len: block_size.min(total_size - src_off),
            }
        })
        .collect()
}
