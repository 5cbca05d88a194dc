//! Codec registry: maps an algorithm tag to a byte-in/byte-out codec pair.
//!
//! The registry is populated once at process start from a [`CodecConfig`]
//! enumerating the recognized optional codecs. An algorithm that is
//! recognized but not enabled in the configuration fails with
//! `UnsupportedAlgorithm` at use time, never at startup.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{GxdError, Result};

/// Zstd levels accepted by [`CodecRegistry::encode`].
pub const ZSTD_LEVEL_RANGE: std::ops::RangeInclusive<i32> = 1..=22;

// ── Algorithm ─────────────────────────────────────────────────────────────────

/// The algorithm tag stored in the archive footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    Zstd,
    Lz4,
    Brotli,
    /// Identity codec: bytes are stored verbatim.
    None,
}

impl Algorithm {
    /// The wire tag written into the footer's `algo` field.
    pub fn tag(&self) -> &'static str {
        match self {
            Algorithm::Zstd => "zstd",
            Algorithm::Lz4 => "lz4",
            Algorithm::Brotli => "brotli",
            Algorithm::None => "none",
        }
    }

    /// Parse a wire tag. Unknown tags are `UnsupportedAlgorithm`.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag {
            "zstd" => Ok(Algorithm::Zstd),
            "lz4" => Ok(Algorithm::Lz4),
            "brotli" => Ok(Algorithm::Brotli),
            "none" => Ok(Algorithm::None),
            other => Err(GxdError::UnsupportedAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Algorithm {
    type Err = GxdError;
    fn from_str(s: &str) -> Result<Self> {
        Algorithm::parse(s)
    }
}

// ── Codec trait ───────────────────────────────────────────────────────────────

pub trait Codec: Send + Sync {
    fn algorithm(&self) -> Algorithm;
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>>;
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>>;
}

pub struct ZstdCodec;
impl Codec for ZstdCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Zstd
    }
    fn compress(&self, data: &[u8], level: i32) -> Result<Vec<u8>> {
        zstd::encode_all(data, level).map_err(|e| GxdError::Codec(e.to_string()))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        zstd::decode_all(data).map_err(|e| GxdError::Codec(e.to_string()))
    }
}

pub struct Lz4Codec;
impl Codec for Lz4Codec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Lz4
    }
    fn compress(&self, data: &[u8], _level: i32) -> Result<Vec<u8>> {
        Ok(lz4_flex::compress_prepend_size(data))
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        lz4_flex::decompress_size_prepended(data).map_err(|e| GxdError::Codec(e.to_string()))
    }
}

pub struct BrotliCodec;
impl Codec for BrotliCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::Brotli
    }
    fn compress(&self, data: &[u8], _level: i32) -> Result<Vec<u8>> {
        let params = brotli::enc::BrotliEncoderParams::default();
        let mut out = Vec::with_capacity(data.len() / 2 + 64);
        brotli::BrotliCompress(&mut &data[..], &mut out, &params)
            .map_err(|e| GxdError::Codec(e.to_string()))?;
        Ok(out)
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(data.len() * 2 + 64);
        brotli::BrotliDecompress(&mut &data[..], &mut out)
            .map_err(|e| GxdError::Codec(e.to_string()))?;
        Ok(out)
    }
}

pub struct IdentityCodec;
impl Codec for IdentityCodec {
    fn algorithm(&self) -> Algorithm {
        Algorithm::None
    }
    fn compress(&self, data: &[u8], _level: i32) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

// ── Registry ──────────────────────────────────────────────────────────────────

/// Which optional codecs are enabled. The identity codec is always present.
#[derive(Debug, Clone)]
pub struct CodecConfig {
    pub zstd:   bool,
    pub lz4:    bool,
    pub brotli: bool,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self { zstd: true, lz4: true, brotli: true }
    }
}

pub struct CodecRegistry {
    codecs: HashMap<Algorithm, Arc<dyn Codec>>,
}

impl CodecRegistry {
    /// Populate the registry from `config`.
    pub fn from_config(config: &CodecConfig) -> Self {
        let mut registry = Self { codecs: HashMap::new() };
        registry.register(Arc::new(IdentityCodec));
        if config.zstd {
            registry.register(Arc::new(ZstdCodec));
        }
        if config.lz4 {
            registry.register(Arc::new(Lz4Codec));
        }
        if config.brotli {
            registry.register(Arc::new(BrotliCodec));
        }
        registry
    }

    fn register(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.insert(codec.algorithm(), codec);
    }

    pub fn get(&self, algo: Algorithm) -> Result<&Arc<dyn Codec>> {
        self.codecs
            .get(&algo)
            .ok_or_else(|| GxdError::UnsupportedAlgorithm(algo.tag().to_string()))
    }

    /// Compress `data`. `level` is consumed only by zstd and must lie in
    /// [`ZSTD_LEVEL_RANGE`]; other codecs ignore it.
    pub fn encode(&self, algo: Algorithm, level: i32, data: &[u8]) -> Result<Vec<u8>> {
        if algo == Algorithm::Zstd && !ZSTD_LEVEL_RANGE.contains(&level) {
            return Err(GxdError::InvalidArgument(format!(
                "zstd level {level} out of range {}..={}",
                ZSTD_LEVEL_RANGE.start(),
                ZSTD_LEVEL_RANGE.end()
            )));
        }
        self.get(algo)?.compress(data, level)
    }

    pub fn decode(&self, algo: Algorithm, data: &[u8]) -> Result<Vec<u8>> {
        self.get(algo)?.decompress(data)
    }
}

impl Default for CodecRegistry {
    fn default() -> Self {
        Self::from_config(&CodecConfig::default())
    }
}
