//! In-place file transform
//!
//! Reads the file one chunk at a time, runs the chunk through a
//! [`StreamSession`], seeks back and overwrites it. Chunks are a whole number
//! of blocks, so consecutive `crypt` calls see one continuous keystream and
//! only the final chunk may end in a partial block.

use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Seek, SeekFrom, Write},
    path::PathBuf,
    time::{Duration, Instant},
};

use ctrflow_core::{Platform, SessionConfig, SessionError, StreamSession};
use ctrflow_crypto::{BLOCK_SIZE, Key, Nonce};
use tracing::{debug, info, warn};

use crate::error::CliError;

/// Default file I/O chunk (1 MiB).
pub const DEFAULT_CHUNK_BYTES: usize = 1 << 20;

/// Everything needed for one run.
#[derive(Debug)]
pub struct TransformOptions {
    /// File to transform in place
    pub path: PathBuf,
    /// Device index on the platform
    pub device: usize,
    /// Session key
    pub key: Key,
    /// Session nonce
    pub nonce: Nonce,
    /// Ring and admission settings
    pub config: SessionConfig,
    /// Bytes read and written per iteration, a multiple of 16
    pub chunk_bytes: usize,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformReport {
    /// Bytes transformed
    pub bytes: u64,
    /// Wall-clock time spent, session setup included
    pub elapsed: Duration,
}

impl TransformReport {
    /// Throughput in MiB per second, zero for an instantaneous run.
    pub fn mib_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs == 0.0 {
            return 0.0;
        }
        self.bytes as f64 / (1024.0 * 1024.0) / secs
    }
}

/// Parse a device index argument.
pub fn parse_device(text: &str) -> Result<usize, CliError> {
    text.trim().parse().map_err(|_| CliError::Device(format!("{text:?} is not a device index")))
}

/// Parse a positive block count argument (in-flight limit, ring size).
pub fn parse_blocks(text: &str) -> Result<usize, CliError> {
    match text.trim().parse::<usize>() {
        Ok(0) => Err(CliError::Limit(format!("{text:?} must be at least 1"))),
        Ok(blocks) => Ok(blocks),
        Err(_) => Err(CliError::Limit(format!("{text:?} is not a block count"))),
    }
}

/// Parse a chunk size argument: a positive multiple of 16 bytes.
pub fn parse_chunk_bytes(text: &str) -> Result<usize, CliError> {
    let bytes = text
        .trim()
        .parse::<usize>()
        .map_err(|_| CliError::Limit(format!("{text:?} is not a chunk size")))?;
    check_chunk_bytes(bytes)?;
    Ok(bytes)
}

fn check_chunk_bytes(chunk_bytes: usize) -> Result<(), CliError> {
    if chunk_bytes == 0 || !chunk_bytes.is_multiple_of(BLOCK_SIZE) {
        return Err(CliError::Limit(format!(
            "chunk size {chunk_bytes} is not a positive multiple of {BLOCK_SIZE}"
        )));
    }
    Ok(())
}

/// Parse a 32-hex-digit key.
pub fn parse_key(text: &str) -> Result<Key, CliError> {
    Key::from_hex(text.trim()).map_err(CliError::Key)
}

/// Parse a 16-hex-digit nonce.
pub fn parse_nonce(text: &str) -> Result<Nonce, CliError> {
    Nonce::from_hex(text.trim()).map_err(CliError::Nonce)
}

/// Encrypt or decrypt `options.path` in place.
///
/// On a dispatch failure the transformed prefix of the current chunk is
/// written back before returning [`CliError::ShortTransform`], so the file is
/// consistently transformed up to the reported offset.
pub fn transform_file<P: Platform>(
    platform: &P,
    options: TransformOptions,
) -> Result<TransformReport, CliError> {
    let TransformOptions { path, device, key, nonce, config, chunk_bytes } = options;

    check_chunk_bytes(chunk_bytes)?;
    let mut buf = allocate_chunk(chunk_bytes)?;

    let started = Instant::now();
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|source| CliError::File { path: path.clone(), source })?;
    let file_len = file.metadata()?.len();

    let mut session = StreamSession::open(platform, device, key, nonce, config)?;
    info!(
        path = %path.display(),
        bytes = file_len,
        artifact = session.variant().artifact(),
        "transforming file"
    );

    let mut offset = 0u64;

    loop {
        let read = read_chunk(&mut file, &mut buf)?;
        if read == 0 {
            break;
        }
        let chunk = &mut buf[..read];

        match session.crypt(chunk) {
            Ok(_) => {},
            Err(SessionError::Dispatch { source, processed }) => {
                write_back(&mut file, offset, &chunk[..processed])?;
                let offset = offset + processed as u64;
                warn!(offset, error = %source, "dispatch failed, file partially transformed");
                return Err(CliError::ShortTransform { offset, source });
            },
            Err(err) => return Err(err.into()),
        }

        write_back(&mut file, offset, chunk)?;
        offset += read as u64;
        debug!(offset, counter = session.counter(), "chunk written");
    }

    file.flush()?;
    session.close()?;

    Ok(TransformReport { bytes: offset, elapsed: started.elapsed() })
}

fn allocate_chunk(chunk_bytes: usize) -> Result<Vec<u8>, CliError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(chunk_bytes)
        .map_err(|_| CliError::Limit(format!("cannot allocate a {chunk_bytes} byte chunk")))?;
    buf.resize(chunk_bytes, 0);
    Ok(buf)
}

/// Fill `buf` from the current position, stopping early only at end of file.
fn read_chunk(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {},
            Err(err) => return Err(err),
        }
    }
    Ok(filled)
}

/// Overwrite `bytes` at `offset`, leaving the cursor just past them.
fn write_back(file: &mut File, offset: u64, bytes: &[u8]) -> Result<(), CliError> {
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(bytes).map_err(|err| match err.kind() {
        io::ErrorKind::WriteZero => CliError::ShortWrite { offset, expected: bytes.len() },
        _ => CliError::Io(err),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_index_must_be_numeric() {
        assert_eq!(parse_device("2").unwrap(), 2);
        assert_eq!(parse_device("gpu").unwrap_err().exit_code(), 2);
        assert_eq!(parse_device("-1").unwrap_err().exit_code(), 2);
    }

    #[test]
    fn block_counts_must_be_positive() {
        assert_eq!(parse_blocks("64").unwrap(), 64);
        assert_eq!(parse_blocks("0").unwrap_err().exit_code(), 3);
        assert_eq!(parse_blocks("lots").unwrap_err().exit_code(), 3);
    }

    #[test]
    fn chunk_size_must_be_whole_blocks() {
        assert_eq!(parse_chunk_bytes("4096").unwrap(), 4096);
        assert_eq!(parse_chunk_bytes("abc").unwrap_err().exit_code(), 3);
        assert_eq!(parse_chunk_bytes("17").unwrap_err().exit_code(), 3);
        assert_eq!(parse_chunk_bytes("0").unwrap_err().exit_code(), 3);
        assert_eq!(parse_chunk_bytes("-16").unwrap_err().exit_code(), 3);
    }

    #[test]
    fn key_and_nonce_errors_have_their_own_codes() {
        assert_eq!(parse_key("0011").unwrap_err().exit_code(), 4);
        assert_eq!(parse_key(&"zz".repeat(16)).unwrap_err().exit_code(), 4);
        assert_eq!(parse_nonce("00").unwrap_err().exit_code(), 5);
        assert!(parse_nonce("0000000000000001").is_ok());
    }

    #[test]
    fn throughput_of_empty_run_is_zero() {
        let report = TransformReport { bytes: 0, elapsed: Duration::ZERO };
        assert_eq!(report.mib_per_second(), 0.0);

        let report = TransformReport { bytes: 2 << 20, elapsed: Duration::from_secs(2) };
        assert!((report.mib_per_second() - 1.0).abs() < f64::EPSILON);
    }
}
