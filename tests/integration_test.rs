use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use gxd::{
    Algorithm, Archive, CodecConfig, CodecRegistry, CompressOptions, DecodeOptions, GxdError,
    SeekOptions,
};

const ALL_ALGOS: [Algorithm; 4] = [
    Algorithm::Zstd,
    Algorithm::Lz4,
    Algorithm::Brotli,
    Algorithm::None,
];

const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

// ── Helpers ───────────────────────────────────────────────────────────────────

fn registry() -> CodecRegistry {
    CodecRegistry::default()
}

/// Deterministic pseudo-random bytes from a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

fn opts(algo: Algorithm, block_size: u64) -> CompressOptions {
    CompressOptions {
        algo,
        block_size,
        threads: 2,
        ..CompressOptions::default()
    }
}

fn decode_opts(verify: bool) -> DecodeOptions {
    DecodeOptions {
        threads: 2,
        verify_blocks: verify,
    }
}

/// Write `data` to a source file and compress it, returning the archive path.
fn build_archive(dir: &TempDir, data: &[u8], algo: Algorithm, block_size: u64) -> PathBuf {
    let source = dir.path().join("source.bin");
    fs::write(&source, data).unwrap();
    let archive = dir.path().join("archive.gxd");
    gxd::compress(&registry(), &source, &archive, &opts(algo, block_size)).unwrap();
    archive
}

fn decompress_to_vec(archive: &Path, verify: bool) -> gxd::Result<Vec<u8>> {
    let mut out = Vec::new();
    gxd::decompress(&registry(), archive, &mut out, &decode_opts(verify))?;
    Ok(out)
}

fn seek_to_vec(archive: &Path, offset: u64, length: Option<u64>) -> gxd::Result<Vec<u8>> {
    let mut out = Vec::new();
    gxd::seek(
        &registry(),
        archive,
        &mut out,
        &SeekOptions {
            offset,
            length,
            threads: 2,
            verify_blocks: true,
        },
    )?;
    Ok(out)
}

/// Parse the trailer, hand the footer JSON to `edit`, and splice the
/// rewritten footer (with a fresh length field and closing magic) back in.
fn rewrite_footer(archive: &Path, edit: impl FnOnce(&mut serde_json::Value)) {
    let data = fs::read(archive).unwrap();
    let len = data.len();
    let footer_len =
        u64::from_be_bytes(data[len - 14..len - 6].try_into().unwrap()) as usize;
    let mut footer: serde_json::Value =
        serde_json::from_slice(&data[len - 14 - footer_len..len - 14]).unwrap();

    edit(&mut footer);

    let new_json = serde_json::to_vec(&footer).unwrap();
    let mut rebuilt = data[..len - 14 - footer_len].to_vec();
    rebuilt.extend_from_slice(&new_json);
    rebuilt.extend_from_slice(&(new_json.len() as u64).to_be_bytes());
    rebuilt.extend_from_slice(b"GXDINC");
    fs::write(archive, rebuilt).unwrap();
}

// ── Round-trips ───────────────────────────────────────────────────────────────

#[test]
fn roundtrip_small() {
    let dir = TempDir::new().unwrap();
    let archive = build_archive(&dir, b"ABCDEFGHIJ", Algorithm::None, 4);

    let ar = Archive::open(&archive).unwrap();
    assert_eq!(ar.block_count(), 3);
    let orig_sizes: Vec<u64> = ar.blocks().iter().map(|b| b.orig_size).collect();
    assert_eq!(orig_sizes, vec![4, 4, 2]);

    assert_eq!(decompress_to_vec(&archive, true).unwrap(), b"ABCDEFGHIJ");
}

#[test]
fn roundtrip_all_algorithms_byte_identical() {
    let dir = TempDir::new().unwrap();
    let data = pseudo_random_bytes(64 * 1024 + 77, 0xDEAD_BEEF);
    for algo in ALL_ALGOS {
        let archive = build_archive(&dir, &data, algo, 8 * 1024);
        let out = decompress_to_vec(&archive, true).unwrap();
        assert_eq!(out, data, "{algo} round-trip should be byte-exact");
    }
}

#[test]
fn roundtrip_many_blocks_multiple_windows() {
    // Enough blocks to force several dispatch windows at 2 threads.
    let dir = TempDir::new().unwrap();
    let data = pseudo_random_bytes(300 * 1024, 42);
    let archive = build_archive(&dir, &data, Algorithm::Zstd, 4096);

    let ar = Archive::open(&archive).unwrap();
    assert_eq!(ar.block_count(), 75);
    assert_eq!(decompress_to_vec(&archive, true).unwrap(), data);
}

#[test]
fn empty_input_produces_valid_archive() {
    let dir = TempDir::new().unwrap();
    let archive = build_archive(&dir, b"", Algorithm::Zstd, 1024);

    let ar = Archive::open(&archive).unwrap();
    assert_eq!(ar.block_count(), 0);
    assert_eq!(ar.total_orig_size(), 0);
    assert_eq!(ar.global_hash(), EMPTY_SHA256);

    assert_eq!(decompress_to_vec(&archive, true).unwrap(), b"");
    assert_eq!(seek_to_vec(&archive, 0, None).unwrap(), b"");
}

#[test]
fn verification_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let data = pseudo_random_bytes(10_000, 7);
    let archive = build_archive(&dir, &data, Algorithm::Lz4, 1000);

    let first = decompress_to_vec(&archive, true).unwrap();
    let second = decompress_to_vec(&archive, true).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, data);
}

// ── Footer shape ──────────────────────────────────────────────────────────────

#[test]
fn footer_stability() {
    let dir = TempDir::new().unwrap();
    let data = pseudo_random_bytes(10 * 1024 + 5, 3);
    let archive = build_archive(&dir, &data, Algorithm::Zstd, 1024);

    let ar = Archive::open(&archive).unwrap();
    assert_eq!(ar.block_count(), 11);
    let mut expected_start = 6;
    for (i, b) in ar.blocks().iter().enumerate() {
        assert_eq!(b.id, i as u64);
        assert_eq!(b.start, expected_start);
        expected_start += b.size;
    }
    assert_eq!(ar.total_orig_size(), data.len() as u64);
}

#[test]
fn digest_fidelity() {
    let dir = TempDir::new().unwrap();
    let data = pseudo_random_bytes(5000, 11);
    let archive = build_archive(&dir, &data, Algorithm::None, 1024);

    let ar = Archive::open(&archive).unwrap();
    for b in ar.blocks() {
        let slice = &data[b.start as usize - 6..][..b.orig_size as usize];
        assert_eq!(b.hash, gxd::digest::sha256_hex(slice));
    }
    assert_eq!(ar.global_hash(), gxd::digest::sha256_hex(&data));
}

#[test]
fn read_block_bytes_returns_stored_payload() {
    let dir = TempDir::new().unwrap();
    let data = pseudo_random_bytes(3000, 5);
    let archive = build_archive(&dir, &data, Algorithm::None, 1024);

    // The identity codec stores each block verbatim, so the compressed
    // payload must equal the original slice.
    let mut ar = Archive::open(&archive).unwrap();
    for i in 0..ar.block_count() {
        let desc = ar.block(i).unwrap().clone();
        let payload = ar.read_block_bytes(i).unwrap();
        assert_eq!(payload.len() as u64, desc.size);
        assert_eq!(
            payload,
            &data[desc.start as usize - 6..][..desc.orig_size as usize]
        );
    }
}

// ── Seek ──────────────────────────────────────────────────────────────────────

#[test]
fn seek_mid_block() {
    let dir = TempDir::new().unwrap();
    let archive = build_archive(&dir, b"ABCDEFGHIJ", Algorithm::None, 4);
    assert_eq!(seek_to_vec(&archive, 5, Some(3)).unwrap(), b"FGH");
}

#[test]
fn tail_beyond_eof() {
    let dir = TempDir::new().unwrap();
    let archive = build_archive(&dir, b"ABCDEFGHIJ", Algorithm::None, 4);
    assert_eq!(seek_to_vec(&archive, 8, Some(100)).unwrap(), b"IJ");
    assert_eq!(seek_to_vec(&archive, 10, Some(5)).unwrap(), b"");
    assert_eq!(seek_to_vec(&archive, 1000, None).unwrap(), b"");
}

#[test]
fn seek_equivalence_across_ranges() {
    let dir = TempDir::new().unwrap();
    let data = pseudo_random_bytes(40_000, 99);
    let archive = build_archive(&dir, &data, Algorithm::Zstd, 4096);

    for (offset, length) in [
        (0u64, Some(1u64)),
        (0, Some(40_000)),
        (4095, Some(2)),
        (4096, Some(4096)),
        (12_345, Some(10_000)),
        (39_999, Some(1)),
        (20_000, None),
    ] {
        let got = seek_to_vec(&archive, offset, length).unwrap();
        let end = length.map_or(data.len(), |l| (offset + l) as usize).min(data.len());
        assert_eq!(
            got,
            &data[offset as usize..end],
            "range [{offset}, {length:?})"
        );
    }
}

// ── Corruption ────────────────────────────────────────────────────────────────

#[test]
fn corrupt_closing_magic() {
    let dir = TempDir::new().unwrap();
    let archive = build_archive(&dir, b"ABCDEFGHIJ", Algorithm::None, 4);

    let mut file = OpenOptions::new().write(true).open(&archive).unwrap();
    file.seek(SeekFrom::End(-6)).unwrap();
    file.write_all(b"BADMAG").unwrap();
    drop(file);

    assert!(matches!(
        decompress_to_vec(&archive, true),
        Err(GxdError::BadMagic)
    ));
}

#[test]
fn corrupt_opening_magic() {
    let dir = TempDir::new().unwrap();
    let archive = build_archive(&dir, b"ABCDEFGHIJ", Algorithm::None, 4);

    let mut file = OpenOptions::new().write(true).open(&archive).unwrap();
    file.write_all(b"NOTGXD").unwrap();
    drop(file);

    assert!(matches!(
        decompress_to_vec(&archive, true),
        Err(GxdError::BadMagic)
    ));
}

#[test]
fn truncation_is_rejected() {
    let dir = TempDir::new().unwrap();
    let archive = build_archive(&dir, b"ABCDEFGHIJ", Algorithm::None, 4);

    let len = fs::metadata(&archive).unwrap().len();
    let file = OpenOptions::new().write(true).open(&archive).unwrap();
    file.set_len(len - 20).unwrap();
    drop(file);

    let err = decompress_to_vec(&archive, true).unwrap_err();
    assert!(
        matches!(err, GxdError::BadMagic | GxdError::CorruptFooter(_)),
        "unexpected error for truncated archive: {err}"
    );
}

#[test]
fn corrupt_block_payload() {
    let dir = TempDir::new().unwrap();
    let archive = build_archive(&dir, b"ABCDEFGHIJ", Algorithm::None, 4);

    // With the identity codec, block 1's payload occupies bytes 10..14.
    let mut file = OpenOptions::new().write(true).open(&archive).unwrap();
    file.seek(SeekFrom::Start(11)).unwrap();
    file.write_all(b"\xff").unwrap();
    drop(file);

    match decompress_to_vec(&archive, true) {
        Err(GxdError::BlockHashMismatch { id }) => assert_eq!(id, 1),
        other => panic!("expected BlockHashMismatch for block 1, got {other:?}"),
    }

    // Without verification the identity codec cannot notice; the bytes
    // come back corrupted and no digest is consulted.
    let out = decompress_to_vec(&archive, false).unwrap();
    assert_eq!(out.len(), 10);
    assert_ne!(out, b"ABCDEFGHIJ");
}

#[test]
fn unknown_algorithm_in_footer() {
    let dir = TempDir::new().unwrap();
    let archive = build_archive(&dir, b"ABCDEFGHIJ", Algorithm::None, 4);

    rewrite_footer(&archive, |footer| {
        footer["algo"] = serde_json::json!("ghost-algo");
    });

    assert!(matches!(
        decompress_to_vec(&archive, true),
        Err(GxdError::UnsupportedAlgorithm(_))
    ));
    assert!(matches!(
        seek_to_vec(&archive, 0, Some(4)),
        Err(GxdError::UnsupportedAlgorithm(_))
    ));
}

#[test]
fn tampered_global_hash_is_detected() {
    let dir = TempDir::new().unwrap();
    let archive = build_archive(&dir, b"ABCDEFGHIJ", Algorithm::None, 4);

    rewrite_footer(&archive, |footer| {
        footer["global_hash"] = serde_json::json!(EMPTY_SHA256);
    });

    assert!(matches!(
        decompress_to_vec(&archive, true),
        Err(GxdError::GlobalHashMismatch)
    ));
    // The same archive decodes fine when verification is off.
    assert_eq!(decompress_to_vec(&archive, false).unwrap(), b"ABCDEFGHIJ");
}

#[test]
fn non_adjacent_blocks_are_rejected() {
    let dir = TempDir::new().unwrap();
    let archive = build_archive(&dir, b"ABCDEFGHIJ", Algorithm::None, 4);

    rewrite_footer(&archive, |footer| {
        footer["blocks"][1]["start"] = serde_json::json!(11);
    });

    assert!(matches!(
        Archive::open(&archive),
        Err(GxdError::CorruptFooter(_))
    ));
}

#[test]
fn missing_footer_fields_are_rejected() {
    let dir = TempDir::new().unwrap();
    let archive = build_archive(&dir, b"ABCDEFGHIJ", Algorithm::None, 4);

    rewrite_footer(&archive, |footer| {
        footer.as_object_mut().unwrap().remove("global_hash");
    });

    assert!(matches!(
        Archive::open(&archive),
        Err(GxdError::CorruptFooter(_))
    ));
}

// ── Registry gating and argument validation ──────────────────────────────────

#[test]
fn disabled_codec_fails_at_use_time() {
    let dir = TempDir::new().unwrap();
    let archive = build_archive(&dir, b"ABCDEFGHIJ", Algorithm::Zstd, 4);

    let gated = CodecRegistry::from_config(&CodecConfig {
        zstd: false,
        lz4: true,
        brotli: true,
    });

    // Reading an archive whose codec is unavailable fails up front.
    let mut out = Vec::new();
    assert!(matches!(
        gxd::decompress(&gated, &archive, &mut out, &decode_opts(true)),
        Err(GxdError::UnsupportedAlgorithm(_))
    ));

    // So does writing with it.
    let source = dir.path().join("source.bin");
    let dest = dir.path().join("gated.gxd");
    assert!(matches!(
        gxd::compress(&gated, &source, &dest, &opts(Algorithm::Zstd, 4)),
        Err(GxdError::UnsupportedAlgorithm(_))
    ));
}

#[test]
fn invalid_arguments_are_rejected() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("source.bin");
    fs::write(&source, b"data").unwrap();
    let dest = dir.path().join("out.gxd");
    let reg = registry();

    let zero_block = CompressOptions {
        block_size: 0,
        ..CompressOptions::default()
    };
    assert!(matches!(
        gxd::compress(&reg, &source, &dest, &zero_block),
        Err(GxdError::InvalidArgument(_))
    ));

    for threads in [0usize, 129] {
        let bad = CompressOptions {
            threads,
            ..CompressOptions::default()
        };
        assert!(matches!(
            gxd::compress(&reg, &source, &dest, &bad),
            Err(GxdError::InvalidArgument(_))
        ));
    }

    let bad_level = CompressOptions {
        algo: Algorithm::Zstd,
        level: 23,
        ..CompressOptions::default()
    };
    assert!(matches!(
        gxd::compress(&reg, &source, &dest, &bad_level),
        Err(GxdError::InvalidArgument(_))
    ));

    let archive = build_archive(&dir, b"ABCDEFGHIJ", Algorithm::None, 4);
    let mut out = Vec::new();
    let zero_threads = DecodeOptions {
        threads: 0,
        verify_blocks: true,
    };
    assert!(matches!(
        gxd::decompress(&reg, &archive, &mut out, &zero_threads),
        Err(GxdError::InvalidArgument(_))
    ));
}
