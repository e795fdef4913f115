//! Error types shared by every detector.
//!
//! All of these are local and recoverable. Extraction errors in particular
//! are expected during a brute-force search: an `InvalidLength` usually just
//! means the mask/order guess was wrong.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the crate error.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // ===== Bit-plane errors =====
    #[error("channel mask must select between 1 and 8 bits per channel and at least one bit overall")]
    InvalidMask,

    #[error("insufficient capacity: need {needed} bits, image provides {available}")]
    InsufficientCapacity { needed: u64, available: u64 },

    #[error("declared payload length {length} outside 1..={max}")]
    InvalidLength { length: u64, max: u64 },

    #[error("pixel grid is empty")]
    EmptyGrid,

    #[error("pixel buffer of {len} samples does not match {width}x{height}")]
    GridSize { width: u32, height: u32, len: usize },

    // ===== JPEG errors =====
    #[error("not a JPEG (missing SOI marker)")]
    NotAJpeg,

    #[error("truncated or malformed segment 0xFF{marker:02X} at offset {offset}")]
    TruncatedSegment { marker: u8, offset: usize },

    #[error("not implemented: {0}")]
    NotImplemented(String),

    #[error("invalid Huffman code in entropy-coded data")]
    HuffmanDecode,

    #[error("{what}: {requested} exceeds limit of {limit}")]
    ResourceLimit {
        what: &'static str,
        requested: u64,
        limit: u64,
    },

    // ===== I/O and configuration =====
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl Error {
    /// Extraction errors that only mean "wrong guess" rather than bad input.
    pub fn is_wrong_guess(&self) -> bool {
        matches!(
            self,
            Error::InsufficientCapacity { .. } | Error::InvalidLength { .. }
        )
    }
}
