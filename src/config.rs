//! Detection thresholds
//!
//! Every tunable number the detectors use lives in [`Config`]. The defaults
//! are a single constant table, [`Config::DEFAULT`]; callers that want other
//! values build their own `Config` (or load one from JSON) and pass it by
//! reference into each analysis. Nothing here is global or mutable.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Consecutive zero bytes that end a raw (no length header) extraction.
///
/// This is a heuristic, not part of any embedding protocol: a payload that
/// genuinely contains 20 zero bytes in a row will be cut short.
pub const RAW_ZERO_RUN: usize = 20;

/// Upper bound accepted for a decoded 32-bit length header.
pub const MAX_PAYLOAD_LEN: u64 = 100_000_000;

/// Most 8x8 blocks the coefficient decoder will hold in memory at once.
/// 2Mi blocks is 256 MiB of coefficients, roughly a 130-megapixel
/// three-component frame without subsampling.
pub const MAX_DCT_BLOCKS: u64 = 2 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // LSB statistics
    pub lsb_entropy_threshold: f64,
    pub perfect_entropy: f64,
    pub low_entropy: f64,
    pub anomaly_high: f64,
    pub anomaly_unusual: f64,
    pub pattern_threshold: f64,
    pub statistical_anomaly: f64,

    // Recovered text
    pub text_confidence: f64,
    pub min_text_length: usize,

    // Brute-force acceptance
    pub printable_ratio: f64,
    pub entropy_accept: f64,

    // JPEG
    pub dct_suspiciousness: f64,
    pub quant_deviation: u16,
    pub quant_fraction: f64,

    // Extraction limits
    pub max_payload: u64,
    pub raw_zero_run: usize,
    /// Raw extractions this short or shorter are dropped as noise
    pub min_raw_len: usize,
    pub max_dct_blocks: u64,

    // Image complexity
    pub complexity_tile: u32,
    pub complexity_ceiling: f64,

    // Batch
    pub workers: usize,
}

impl Config {
    pub const DEFAULT: Config = Config {
        lsb_entropy_threshold: 0.999,
        perfect_entropy: 0.99,
        low_entropy: 0.3,
        anomaly_high: 0.85,
        anomaly_unusual: 0.75,
        pattern_threshold: 0.8,
        statistical_anomaly: 0.7,
        text_confidence: 0.8,
        min_text_length: 10,
        printable_ratio: 0.8,
        entropy_accept: 6.5,
        dct_suspiciousness: 0.5,
        quant_deviation: 10,
        quant_fraction: 0.25,
        max_payload: MAX_PAYLOAD_LEN,
        raw_zero_run: RAW_ZERO_RUN,
        min_raw_len: 10,
        max_dct_blocks: MAX_DCT_BLOCKS,
        complexity_tile: 16,
        complexity_ceiling: 2000.0,
        workers: 4,
    };

    /// Load thresholds from a JSON file. Missing keys keep their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Config =
            serde_json::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would make a detector meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(Error::Config("workers must be at least 1".into()));
        }
        if self.max_payload == 0 || self.max_payload > u32::MAX as u64 {
            return Err(Error::Config(format!(
                "max_payload must be in 1..={}",
                u32::MAX
            )));
        }
        if self.raw_zero_run == 0 {
            return Err(Error::Config("raw_zero_run must be at least 1".into()));
        }
        if self.max_dct_blocks == 0 {
            return Err(Error::Config("max_dct_blocks must be at least 1".into()));
        }
        if self.complexity_tile == 0 || self.complexity_ceiling <= 0.0 {
            return Err(Error::Config(
                "complexity tile and ceiling must be positive".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}
