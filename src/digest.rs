//! SHA-256 helpers. Block hashes are computed over the raw
//! (pre-compression) bytes; the global hash covers the whole input.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

/// Hex SHA-256 of `data`.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Incremental SHA-256 over a byte stream, finalized to hex.
///
/// Used by the decode plane to digest emitted bytes in order without
/// buffering the whole output.
#[derive(Default)]
pub struct RollingSha256 {
    inner: Sha256,
}

impl RollingSha256 {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    pub fn finalize_hex(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// Hex SHA-256 of an entire file, read in 64 KiB chunks.
pub fn sha256_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // Known vectors from FIPS 180-2.
    const EMPTY: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";
    const ABC: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

    #[test]
    fn known_vectors() {
        assert_eq!(sha256_hex(b""), EMPTY);
        assert_eq!(sha256_hex(b"abc"), ABC);
    }

    #[test]
    fn rolling_matches_one_shot() {
        let mut rolling = RollingSha256::new();
        rolling.update(b"a");
        rolling.update(b"b");
        rolling.update(b"c");
        assert_eq!(rolling.finalize_hex(), ABC);
    }

    #[test]
    fn empty_rolling_is_empty_hash() {
        assert_eq!(RollingSha256::new().finalize_hex(), EMPTY);
    }
}
