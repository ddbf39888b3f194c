//! File transform tests
//!
//! Run `transform_file` against real temporary files and check the bytes on
//! disk, the exit code of every failure point, and the write-back of a
//! partially transformed chunk.

use std::{fs, io::Write, path::Path};

use ctrflow_cli::{CliError, TransformOptions, parse_key, parse_nonce, transform_file};
use ctrflow_core::{BackendOp, ChaoticPlatform, HostPlatform, SessionConfig};
use ctrflow_crypto::{BLOCK_SIZE, apply_keystream, expand};
use proptest::prelude::*;
use tempfile::NamedTempFile;

const KEY: &str = "00112233445566778899aabbccddeeff";
const NONCE: &str = "0000000000000001";

fn write_temp(contents: &[u8]) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents).unwrap();
    file.flush().unwrap();
    file
}

fn options(path: &Path, chunk_bytes: usize, config: SessionConfig) -> TransformOptions {
    TransformOptions {
        path: path.to_path_buf(),
        device: 0,
        key: parse_key(KEY).unwrap(),
        nonce: parse_nonce(NONCE).unwrap(),
        config,
        chunk_bytes,
    }
}

fn small_config() -> SessionConfig {
    SessionConfig::default().with_ring_blocks(8).with_max_inflight_blocks(3)
}

fn reference(data: &[u8]) -> Vec<u8> {
    let mut out = data.to_vec();
    let schedule = expand(&parse_key(KEY).unwrap());
    apply_keystream(&schedule, &parse_nonce(NONCE).unwrap(), 0, &mut out);
    out
}

#[test]
fn zero_file_becomes_keystream() {
    let file = write_temp(&[0u8; 40]);
    let report =
        transform_file(&HostPlatform::new(), options(file.path(), 1 << 20, small_config()))
            .unwrap();
    assert_eq!(report.bytes, 40);

    let expected = hex::decode(concat!(
        "b8c09bdba7378ff2499cf18537901d0b",
        "75312ceef13588a50550d782e78fd6ac",
        "3212910fed22673447f40fe6f936fd86",
    ))
    .unwrap();
    assert_eq!(fs::read(file.path()).unwrap(), expected[..40]);
}

#[test]
fn second_run_restores_original() {
    let original: Vec<u8> = (0..5000u32).map(|i| (i % 256) as u8).collect();
    let file = write_temp(&original);
    let platform = HostPlatform::new();

    transform_file(&platform, options(file.path(), 64, small_config())).unwrap();
    assert_ne!(fs::read(file.path()).unwrap(), original);

    transform_file(&platform, options(file.path(), 64, small_config())).unwrap();
    assert_eq!(fs::read(file.path()).unwrap(), original);
}

#[test]
fn empty_file_is_a_noop() {
    let file = write_temp(b"");
    let report =
        transform_file(&HostPlatform::new(), options(file.path(), 16, small_config())).unwrap();
    assert_eq!(report.bytes, 0);
    assert!(fs::read(file.path()).unwrap().is_empty());
}

#[test]
fn missing_file_exits_with_file_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.bin");

    let err =
        transform_file(&HostPlatform::new(), options(&path, 16, small_config())).unwrap_err();
    assert!(matches!(err, CliError::File { .. }));
    assert_eq!(err.exit_code(), 1);
}

#[test]
fn unknown_device_exits_with_device_code() {
    let file = write_temp(&[1u8; 32]);
    let mut opts = options(file.path(), 16, small_config());
    opts.device = 4;

    let err = transform_file(&HostPlatform::new(), opts).unwrap_err();
    assert_eq!(err.exit_code(), 2);
    assert_eq!(fs::read(file.path()).unwrap(), [1u8; 32]);
}

#[test]
fn bad_chunk_and_limit_exit_with_limit_code() {
    let file = write_temp(&[0u8; 32]);
    let platform = HostPlatform::new();

    let err = transform_file(&platform, options(file.path(), 20, small_config())).unwrap_err();
    assert_eq!(err.exit_code(), 3);

    let config = small_config().with_max_inflight_blocks(0);
    let err = transform_file(&platform, options(file.path(), 16, config)).unwrap_err();
    assert_eq!(err.exit_code(), 3);
}

#[test]
fn oversized_chunk_is_rejected_without_touching_file() {
    let file = write_temp(&[3u8; 32]);
    let opts = options(file.path(), usize::MAX & !(BLOCK_SIZE - 1), small_config());

    let err = transform_file(&HostPlatform::new(), opts).unwrap_err();
    assert!(matches!(err, CliError::Limit(_)));
    assert_eq!(err.exit_code(), 3);
    assert_eq!(fs::read(file.path()).unwrap(), [3u8; 32]);
}

#[test]
fn acquisition_failure_exits_with_backend_code() {
    let file = write_temp(&[0u8; 32]);
    let platform =
        ChaoticPlatform::new(HostPlatform::new()).failing_open_at(BackendOp::UploadConstants);

    let err = transform_file(&platform, options(file.path(), 16, small_config())).unwrap_err();
    assert_eq!(err.exit_code(), 6);
    assert_eq!(fs::read(file.path()).unwrap(), [0u8; 32]);
}

#[test]
fn dispatch_failure_writes_back_transformed_prefix() {
    let original = vec![0x5Au8; 40 * BLOCK_SIZE];
    let file = write_temp(&original);

    // Ring of 8 blocks, 3 per dispatch: dispatches 0..=2 fill the ring, the
    // fourth dispatch happens after the first 8 blocks are consumed.
    let platform = ChaoticPlatform::new(HostPlatform::new()).failing_dispatch(3);
    let err = transform_file(&platform, options(file.path(), 32 * BLOCK_SIZE, small_config()))
        .unwrap_err();

    let offset = match err {
        CliError::ShortTransform { offset, .. } => offset,
        other => panic!("expected short transform, got {other:?}"),
    };
    assert_eq!(offset, 8 * BLOCK_SIZE as u64);

    let on_disk = fs::read(file.path()).unwrap();
    let split = offset as usize;
    assert_eq!(on_disk[..split], reference(&original)[..split]);
    assert_eq!(on_disk[split..], original[split..]);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_any_chunking_matches_one_shot(
        data in prop::collection::vec(any::<u8>(), 0..2000),
        chunk_blocks in 1usize..20,
        ring_blocks in 1usize..10,
        limit in 1usize..5,
    ) {
        let file = write_temp(&data);
        let config = SessionConfig::default()
            .with_ring_blocks(ring_blocks)
            .with_max_inflight_blocks(limit);

        let opts = options(file.path(), chunk_blocks * BLOCK_SIZE, config);
        transform_file(&HostPlatform::new(), opts).unwrap();

        prop_assert_eq!(fs::read(file.path()).unwrap(), reference(&data));
    }
}
