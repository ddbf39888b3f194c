//! ctrflow binary.
//!
//! # Usage
//!
//! ```bash
//! # Encrypt in place on device 0
//! ctrflow data.bin 0 --key 00112233445566778899aabbccddeeff --nonce 0000000000000001
//!
//! # Decrypt with a smaller dispatch ceiling (same command, CTR is symmetric)
//! ctrflow data.bin 0 --limit 4096 --key 00112233445566778899aabbccddeeff --nonce 0000000000000001
//! ```

use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use ctrflow_cli::{
    CliError, DEFAULT_CHUNK_BYTES, TransformOptions, parse_blocks, parse_chunk_bytes, parse_device,
    parse_key, parse_nonce, transform_file,
};
use ctrflow_core::{DEFAULT_MAX_INFLIGHT_BLOCKS, DEFAULT_RING_BLOCKS, HostPlatform, SessionConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// AES-128 CTR in-place file transform
#[derive(Parser, Debug)]
#[command(name = "ctrflow")]
#[command(about = "Encrypt or decrypt a file in place with AES-128 in CTR mode")]
#[command(version)]
struct Args {
    /// File to transform in place
    file: PathBuf,

    /// Device index
    device: String,

    /// Maximum keystream blocks per dispatch
    #[arg(short, long)]
    limit: Option<String>,

    /// Key, 32 hex digits
    #[arg(short, long)]
    key: String,

    /// Nonce, 16 hex digits
    #[arg(short, long)]
    nonce: String,

    /// Ring buffer capacity in 16-byte blocks
    #[arg(long)]
    ring_blocks: Option<String>,

    /// File I/O chunk in bytes (multiple of 16, default 1 MiB)
    #[arg(long)]
    chunk_bytes: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> ExitCode {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(code = err.exit_code(), "{err}");
            ExitCode::from(err.exit_code())
        },
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let device = parse_device(&args.device)?;
    let max_inflight = args.limit.as_deref().map(parse_blocks).transpose()?;
    let ring_blocks = args.ring_blocks.as_deref().map(parse_blocks).transpose()?;
    let chunk_bytes = args.chunk_bytes.as_deref().map(parse_chunk_bytes).transpose()?;
    let key = parse_key(&args.key)?;
    let nonce = parse_nonce(&args.nonce)?;

    let config = SessionConfig::default()
        .with_max_inflight_blocks(max_inflight.unwrap_or(DEFAULT_MAX_INFLIGHT_BLOCKS))
        .with_ring_blocks(ring_blocks.unwrap_or(DEFAULT_RING_BLOCKS));

    let options = TransformOptions {
        path: args.file,
        device,
        key,
        nonce,
        config,
        chunk_bytes: chunk_bytes.unwrap_or(DEFAULT_CHUNK_BYTES),
    };

    let report = transform_file(&HostPlatform::new(), options)?;
    tracing::info!(
        bytes = report.bytes,
        elapsed_ms = report.elapsed.as_millis() as u64,
        mib_per_second = %format!("{:.2}", report.mib_per_second()),
        "transform complete"
    );

    Ok(())
}
