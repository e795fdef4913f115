//! Stegscan - Detect and recover data hidden in images
//!
//! Stegscan inspects images for covert payloads: bytes smuggled through the
//! low bits of pixel channels, messages spread over quantized JPEG DCT
//! coefficients, and data appended after the end-of-image marker.
//!
//! # Overview
//!
//! Natural photographs have noisy low bits, so "the LSBs look random" is not
//! evidence on its own. Stegscan combines several weak signals, tries every
//! common embedding layout to actually recover a payload, and then discounts
//! what remains by how likely it is to be an ordinary image.
//!
//! # Detection Methods
//!
//! 1. **LSB statistics** (all raster formats): per-channel entropy,
//!    uniformity, transition rate, periodic patterns and a chi-square parity
//!    test over the least significant bit-plane.
//!
//! 2. **Bit-plane brute force**: length-prefixed and raw extraction over 17
//!    channel masks and both bit orders. Recovered bytes are typed by magic
//!    number and checked for command-and-control indicators.
//!
//! 3. **JPEG structure and coefficients**: marker walk, non-standard
//!    quantization tables, comment content, repeated frame markers, loose
//!    plain text, trailing data, polyglot signatures and coefficient
//!    histograms matched against the traces left by JSteg, OutGuess, F5 and
//!    StegHide. The decoded pixels of a JPEG also go through methods 1 and 2.
//!
//! # Quick Start
//!
//! ```no_run
//! use stegscan::{Level, Scanner};
//!
//! let scanner = Scanner::new();
//! let result = scanner.scan_file("upload.png");
//!
//! match result.level {
//!     Level::Clean => println!("Nothing found"),
//!     Level::Suspicious => println!("Worth a closer look"),
//!     Level::ConfirmedC2 => println!("Command-and-control payload recovered"),
//! }
//!
//! for finding in &result.findings {
//!     println!("[{}] {} ({})", finding.confidence, finding.description, finding.details);
//! }
//! ```
//!
//! # Levels
//!
//! | Level | Meaning |
//! |-------|---------|
//! | CLEAN | No finding survived filtering, or all were explained away |
//! | SUSPICIOUS | Hidden content or a statistical anomaly was found |
//! | C2 | A recovered payload carries command-and-control indicators |
//!
//! # Modules
//!
//! - [`analyzer`]: the [`Scanner`] plus LSB statistics and false-positive scoring
//! - [`bitplane`]: pixel grids, channel masks, bit streams and extraction
//! - [`jpeg`]: marker parsing, baseline coefficient decoding, tool signatures
//! - [`batch`]: parallel scanning of many files
//! - [`report`]: output formatters (JSON, CSV)

pub mod analyzer;
pub mod batch;
pub mod bitplane;
pub mod config;
pub mod content;
pub mod error;
pub mod findings;
pub mod jpeg;
pub mod report;

pub use analyzer::stats::{analyze_lsb, detect_anomaly, LsbDistribution};
pub use analyzer::Scanner;
pub use bitplane::brute::{brute_force, ExtractionCandidate};
pub use bitplane::extract::{extract_length_prefixed, extract_raw};
pub use bitplane::{BitOrder, Channel, ChannelMask, PixelGrid};
pub use config::Config;
pub use error::{Error, Result};
pub use findings::{filter_findings, Finding, Level, ScanResult};
pub use jpeg::{check_trailing_data, parse_dct_coefficients, parse_metadata, JpegDctData, JpegMetadata};
