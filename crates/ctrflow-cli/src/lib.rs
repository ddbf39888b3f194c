//! ctrflow command-line front end.
//!
//! Library half of the `ctrflow` binary: argument parsing helpers, the
//! in-place file transform and the exit-code taxonomy. Kept separate from
//! `main.rs` so it can be exercised from tests.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod error;
pub mod transform;

pub use error::CliError;
pub use transform::{
    DEFAULT_CHUNK_BYTES, TransformOptions, TransformReport, parse_blocks, parse_chunk_bytes,
    parse_device, parse_key, parse_nonce, transform_file,
};
