//! Archive reader: footer location, validation, and the random-access
//! block index.
//!
//! Open sequence:
//! 1. Read the last 6 bytes; reject on magic mismatch.
//! 2. Read the 8 bytes before them as the big-endian footer length `L`.
//! 3. Reject `L == 0` and `L > file_size - 14`.
//! 4. Read and parse the `L` footer bytes (JSON); reject unknown `algo`.
//! 5. Check the opening magic.
//! 6. Check dense block ids and adjacency against the payload region.
//!
//! The whole block index lives in the footer, so after `open` every block
//! read is a single seek + read. Decode workers open their own handles
//! via [`Archive::path`] and [`read_block_from`].

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ReadBytesExt};
use tracing::debug;

use crate::codec::Algorithm;
use crate::error::{GxdError, Result};
use crate::footer::{ArchiveFooter, BlockDescriptor, MAGIC, MAGIC_LEN, TRAILER_LEN};

/// Smallest byte count that can hold both magics and the length field.
const MIN_ARCHIVE_LEN: u64 = MAGIC_LEN + TRAILER_LEN;

pub struct Archive {
    path:   PathBuf,
    file:   File,
    footer: ArchiveFooter,
    algo:   Algorithm,
}

impl Archive {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let mut file = File::open(&path)?;
        let file_size = file.metadata()?.len();
        if file_size < MIN_ARCHIVE_LEN {
            return Err(GxdError::BadMagic);
        }

        let mut magic = [0u8; MAGIC_LEN as usize];
        file.seek(SeekFrom::End(-(MAGIC_LEN as i64)))?;
        file.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(GxdError::BadMagic);
        }

        file.seek(SeekFrom::End(-(TRAILER_LEN as i64)))?;
        let footer_len = file.read_u64::<BigEndian>()?;
        if footer_len == 0 || footer_len > file_size - TRAILER_LEN {
            return Err(GxdError::CorruptFooter(format!(
                "impossible footer length {footer_len} in a {file_size}-byte file"
            )));
        }

        file.seek(SeekFrom::End(-((TRAILER_LEN + footer_len) as i64)))?;
        let mut footer_bytes = vec![0u8; footer_len as usize];
        file.read_exact(&mut footer_bytes)?;
        let footer = ArchiveFooter::from_bytes(&footer_bytes)?;
        let algo = footer.algorithm()?;

        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(GxdError::BadMagic);
        }

        let payload_end = file_size - TRAILER_LEN - footer_len;
        footer.validate_layout(payload_end)?;

        debug!(
            path = %path.display(),
            blocks = footer.blocks.len(),
            algo = %algo,
            "archive opened"
        );
        Ok(Self { path, file, footer, algo })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algo
    }

    pub fn global_hash(&self) -> &str {
        &self.footer.global_hash
    }

    pub fn footer(&self) -> &ArchiveFooter {
        &self.footer
    }

    pub fn block_count(&self) -> usize {
        self.footer.blocks.len()
    }

    pub fn block(&self, i: usize) -> Option<&BlockDescriptor> {
        self.footer.blocks.get(i)
    }

    pub fn blocks(&self) -> &[BlockDescriptor] {
        &self.footer.blocks
    }

    /// Length of the original input in bytes.
    pub fn total_orig_size(&self) -> u64 {
        self.footer.total_orig_size()
    }

    /// Read block `i`'s compressed bytes through this reader's handle.
    pub fn read_block_bytes(&mut self, i: usize) -> Result<Vec<u8>> {
        let desc = self
            .footer
            .blocks
            .get(i)
            .ok_or_else(|| {
                GxdError::InvalidArgument(format!(
                    "block index {i} out of range (archive has {})",
                    self.footer.blocks.len()
                ))
            })?
            .clone();
        read_block_from(&mut self.file, &desc)
    }
}

/// Read one block's compressed bytes through any handle on the archive.
pub fn read_block_from(file: &mut File, desc: &BlockDescriptor) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(desc.start))?;
    let mut payload = vec![0u8; desc.size as usize];
    file.read_exact(&mut payload)?;
    Ok(payload)
}
