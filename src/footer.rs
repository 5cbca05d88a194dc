//! Wire format: magic bytes, block descriptors, and the JSON footer.
//!
//! Archive layout:
//! ```text
//! [ GXDINC ][ block payloads, ascending id ][ JSON footer ][ len: u64 BE ][ GXDINC ]
//! ```
//!
//! The footer is UTF-8 JSON so an archive remains inspectable with
//! nothing but `tail` and a JSON pretty-printer. Its byte length is the
//! 8-byte big-endian integer immediately before the closing magic.

use serde::{Deserialize, Serialize};

use crate::codec::Algorithm;
use crate::error::{GxdError, Result};

/// Opening and closing magic bytes.
pub const MAGIC: &[u8; 6] = b"GXDINC";
/// Length of one magic marker.
pub const MAGIC_LEN: u64 = 6;
/// Length of the footer-length field.
pub const LEN_FIELD: u64 = 8;
/// Closing magic plus the length field.
pub const TRAILER_LEN: u64 = MAGIC_LEN + LEN_FIELD;

/// Identifier written into the footer's `version` field.
pub const WRITER_VERSION: &str = concat!("gxd/", env!("CARGO_PKG_VERSION"));

// ── Block descriptor ──────────────────────────────────────────────────────────

/// One footer entry. `hash` is the hex SHA-256 of the block's original
/// (pre-compression) bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDescriptor {
    pub id:        u64,
    /// Archive-absolute offset of the compressed payload's first byte.
    pub start:     u64,
    /// Compressed length in bytes.
    pub size:      u64,
    /// Original length in bytes.
    pub orig_size: u64,
    pub hash:      String,
}

// ── Footer ────────────────────────────────────────────────────────────────────

/// The trailing JSON metadata. `algo` stays a plain string in the
/// serialized form so an unknown tag parses cleanly and is rejected as
/// `UnsupportedAlgorithm` rather than a JSON error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveFooter {
    pub version:     String,
    pub algo:        String,
    pub global_hash: String,
    pub blocks:      Vec<BlockDescriptor>,
}

impl ArchiveFooter {
    pub fn to_bytes(&self) -> std::result::Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| GxdError::CorruptFooter(format!("footer JSON: {e}")))
    }

    pub fn algorithm(&self) -> Result<Algorithm> {
        Algorithm::parse(&self.algo)
    }

    /// Sum of `orig_size` over all blocks: the length of the original input.
    pub fn total_orig_size(&self) -> u64 {
        self.blocks.iter().map(|b| b.orig_size).sum()
    }

    /// Validate dense ids and block adjacency against the payload region
    /// `[MAGIC_LEN, payload_end)`.
    pub fn validate_layout(&self, payload_end: u64) -> Result<()> {
        let mut expected_start = MAGIC_LEN;
        for (i, block) in self.blocks.iter().enumerate() {
            if block.id != i as u64 {
                return Err(GxdError::CorruptFooter(format!(
                    "block ids not dense: index {i} holds id {}",
                    block.id
                )));
            }
            if block.start != expected_start {
                return Err(GxdError::CorruptFooter(format!(
                    "block {} starts at {} but previous block ends at {expected_start}",
                    block.id, block.start
                )));
            }
            expected_start += block.size;
        }
        if expected_start != payload_end {
            return Err(GxdError::CorruptFooter(format!(
                "blocks end at {expected_start} but payload region ends at {payload_end}"
            )));
        }
        Ok(())
    }
}
