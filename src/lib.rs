//! GXD: a block-based archival container with per-block SHA-256
//! integrity and random-access extraction.

pub mod codec;
pub mod decode;
pub mod digest;
pub mod error;
pub mod footer;
pub mod layout;
pub mod pool;
pub mod reader;
pub mod seek;
pub mod writer;

pub use codec::{Algorithm, CodecConfig, CodecRegistry};
pub use decode::{decompress, seek, DecodeOptions, SeekOptions};
pub use error::{GxdError, Result};
pub use footer::{ArchiveFooter, BlockDescriptor};
pub use reader::Archive;
pub use writer::{compress, CompressOptions, CompressSummary};
