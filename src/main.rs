use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

use gxd::writer::DEFAULT_ZSTD_LEVEL;
use gxd::{Algorithm, CodecConfig, CodecRegistry};

#[derive(Parser)]
#[command(
    name = "gxd",
    about = "Block-based archival container with verified random access",
    version
)]
struct Cli {
    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compress a file into a GXD archive
    Compress {
        /// Source file
        input: PathBuf,
        /// Destination archive
        output: PathBuf,
        /// Codec: zstd | lz4 | brotli | none
        #[arg(short, long, default_value = "zstd")]
        algo: String,
        /// Zstd compression level (1-22; ignored by other codecs)
        #[arg(long)]
        zstd_ratio: Option<i32>,
        /// Raw bytes per block, e.g. "1mb", "64kb", "4096"
        #[arg(short, long, default_value = "1mb")]
        block_size: String,
        /// Worker threads (default: logical core count)
        #[arg(short, long)]
        threads: Option<usize>,
        /// Accepted for symmetry with decompress; block hashes are always recorded
        #[arg(long)]
        block_verify: bool,
    },
    /// Decompress a whole archive
    Decompress {
        /// Source archive
        input: PathBuf,
        /// Destination file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Decode the output as UTF-8 text
        #[arg(long)]
        text: bool,
        /// Recompute per-block and global SHA-256 digests
        #[arg(long)]
        block_verify: bool,
        #[arg(short, long)]
        threads: Option<usize>,
    },
    /// Extract a byte range without decoding unrelated blocks
    Seek {
        /// Source archive
        input: PathBuf,
        /// Logical byte offset into the original input
        #[arg(long)]
        offset: u64,
        /// Bytes to extract (default: to end of payload)
        #[arg(long)]
        length: Option<u64>,
        /// Destination file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Decode the output as UTF-8 text
        #[arg(long)]
        text: bool,
        /// Recompute per-block SHA-256 digests for the touched blocks
        #[arg(long)]
        block_verify: bool,
        #[arg(short, long)]
        threads: Option<usize>,
    },
    /// Print footer metadata and block statistics
    Info {
        /// Archive to inspect
        input: PathBuf,
        /// Print per-block details
        #[arg(long)]
        blocks: bool,
    },
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Parse `INT ("" | "kb" | "mb" | "gb")`, case-insensitive, powers of 1024.
fn parse_size(s: &str) -> anyhow::Result<u64> {
    let lower = s.trim().to_ascii_lowercase();
    let (digits, unit) = if let Some(d) = lower.strip_suffix("kb") {
        (d, 1024u64)
    } else if let Some(d) = lower.strip_suffix("mb") {
        (d, 1024 * 1024)
    } else if let Some(d) = lower.strip_suffix("gb") {
        (d, 1024 * 1024 * 1024)
    } else {
        (lower.as_str(), 1)
    };
    let n: u64 = digits
        .trim()
        .parse()
        .with_context(|| format!("invalid size '{s}'"))?;
    n.checked_mul(unit)
        .with_context(|| format!("size '{s}' overflows"))
}

fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{n} B")
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

fn threads_or_default(threads: Option<usize>) -> usize {
    threads.unwrap_or_else(gxd::pool::default_threads)
}

/// Run a decode operation into a file, stdout, or a UTF-8 text sink.
fn run_to_sink(
    output: Option<PathBuf>,
    text: bool,
    op: impl FnOnce(&mut dyn Write) -> gxd::Result<u64>,
) -> anyhow::Result<u64> {
    if text {
        let mut buf = Vec::new();
        let written = op(&mut buf)?;
        let decoded = String::from_utf8_lossy(&buf);
        match output {
            Some(path) => fs::write(&path, decoded.as_bytes())
                .with_context(|| format!("writing {}", path.display()))?,
            None => {
                print!("{decoded}");
                io::stdout().flush()?;
            }
        }
        Ok(written)
    } else {
        match output {
            Some(path) => {
                let file = File::create(&path)
                    .with_context(|| format!("creating {}", path.display()))?;
                let mut sink = BufWriter::new(file);
                let written = op(&mut sink)?;
                sink.flush()?;
                Ok(written)
            }
            None => {
                let stdout = io::stdout();
                let mut lock = stdout.lock();
                let written = op(&mut lock)?;
                lock.flush()?;
                Ok(written)
            }
        }
    }
}

// ── Subcommands ───────────────────────────────────────────────────────────────

fn run_compress(
    registry: &CodecRegistry,
    input: PathBuf,
    output: PathBuf,
    algo_name: &str,
    zstd_ratio: Option<i32>,
    block_size: &str,
    threads: Option<usize>,
) -> anyhow::Result<()> {
    let algo: Algorithm = algo_name.parse()?;
    if zstd_ratio.is_some() && algo != Algorithm::Zstd {
        warn!("--zstd-ratio is ignored for algorithm {algo}");
    }
    let opts = gxd::CompressOptions {
        algo,
        level: zstd_ratio.unwrap_or(DEFAULT_ZSTD_LEVEL),
        block_size: parse_size(block_size)?,
        threads: threads_or_default(threads),
        verify: true,
    };

    // Build next to the destination and rename on success so a failed run
    // never leaves a valid-looking partial archive behind.
    let tmp = output.with_extension("gxd-partial");
    let t0 = Instant::now();
    let summary = match gxd::compress(registry, &input, &tmp, &opts) {
        Ok(summary) => summary,
        Err(e) => {
            let _ = fs::remove_file(&tmp);
            return Err(e).with_context(|| format!("compressing {}", input.display()));
        }
    };
    fs::rename(&tmp, &output)
        .with_context(|| format!("renaming archive into place at {}", output.display()))?;
    let elapsed = t0.elapsed();

    let ratio = if summary.archive_size > 0 {
        summary.orig_size as f64 / summary.archive_size as f64
    } else {
        1.0
    };
    eprintln!("  algo        : {algo}");
    eprintln!("  blocks      : {}", summary.blocks);
    eprintln!("  raw size    : {}", human_bytes(summary.orig_size));
    eprintln!("  archive     : {}", human_bytes(summary.archive_size));
    eprintln!("  ratio       : {ratio:.2}x");
    eprintln!("  elapsed     : {:.3}s", elapsed.as_secs_f64());
    Ok(())
}

fn run_info(input: PathBuf, show_blocks: bool) -> anyhow::Result<()> {
    let archive = gxd::Archive::open(&input)?;
    let footer = archive.footer();
    let compressed: u64 = archive.blocks().iter().map(|b| b.size).sum();

    println!("--- GXD Archive: {} ---", input.display());
    println!("  writer      : {}", footer.version);
    println!("  algo        : {}", archive.algorithm());
    println!("  blocks      : {}", archive.block_count());
    println!("  raw size    : {}", human_bytes(archive.total_orig_size()));
    println!("  payload     : {}", human_bytes(compressed));
    println!("  global hash : {}", archive.global_hash());

    if show_blocks {
        println!();
        println!(
            "  {:>8}  {:>12}  {:>12}  {:>12}  {}",
            "block", "start", "compressed", "raw", "sha256"
        );
        for b in archive.blocks() {
            println!(
                "  {:>8}  {:>12}  {:>12}  {:>12}  {}",
                b.id,
                b.start,
                human_bytes(b.size),
                human_bytes(b.orig_size),
                &b.hash[..16.min(b.hash.len())]
            );
        }
    }
    Ok(())
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let registry = CodecRegistry::from_config(&CodecConfig::default());

    match cli.command {
        Commands::Compress {
            input,
            output,
            algo,
            zstd_ratio,
            block_size,
            threads,
            block_verify: _,
        } => run_compress(
            &registry, input, output, &algo, zstd_ratio, &block_size, threads,
        ),
        Commands::Decompress {
            input,
            output,
            text,
            block_verify,
            threads,
        } => {
            let opts = gxd::DecodeOptions {
                threads: threads_or_default(threads),
                verify_blocks: block_verify,
            };
            run_to_sink(output, text, |mut sink| {
                gxd::decompress(&registry, &input, &mut sink, &opts)
            })
            .with_context(|| format!("decompressing {}", input.display()))?;
            Ok(())
        }
        Commands::Seek {
            input,
            offset,
            length,
            output,
            text,
            block_verify,
            threads,
        } => {
            let opts = gxd::SeekOptions {
                offset,
                length,
                threads: threads_or_default(threads),
                verify_blocks: block_verify,
            };
            run_to_sink(output, text, |mut sink| {
                gxd::seek(&registry, &input, &mut sink, &opts)
            })
            .with_context(|| format!("seeking in {}", input.display()))?;
            Ok(())
        }
        Commands::Info { input, blocks } => run_info(input, blocks),
    }
}
