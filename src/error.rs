use std::io;
use thiserror::Error;

/// Every failure the engine can surface.
///
/// Worker-local failures are propagated unchanged to the coordinator,
/// which cancels the request and returns the first one observed.
#[derive(Error, Debug)]
pub enum GxdError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Not a GXD archive: magic bytes mismatch")]
    BadMagic,

    #[error("Invalid footer: {0}")]
    CorruptFooter(String),

    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Block {id} failed integrity check: stored and computed SHA-256 differ")]
    BlockHashMismatch { id: u64 },

    #[error("Decoded stream does not match the archive's global SHA-256")]
    GlobalHashMismatch,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type Result<T> = std::result::Result<T, GxdError>;
