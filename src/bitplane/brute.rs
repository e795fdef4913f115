//! Brute-force bit-plane search
//!
//! Tries mask/order/protocol combinations and keeps every result that looks
//! like content. Two tiers:
//!
//! 1. Common masks (R, G, B, RGB at one bit) x both orders x both protocols.
//!    Always runs.
//! 2. Only if tier 1 accepted nothing: every R/G/B combination of 0..=2 bits
//!    not already tried, again x both orders x both protocols. Alpha is left
//!    out; payloads rarely live there.
//!
//! A result is accepted when it is at least 80% printable ASCII or its byte
//! entropy is above 6.5 bits (compressed or encrypted data). Raw results
//! must also be longer than `min_raw_len` bytes; a handful of bytes read
//! before a zero run is almost always noise. Duplicates are
//! dropped by exact content; the first combination that produced the bytes
//! keeps the credit.

use super::extract::{extract_length_prefixed, extract_raw};
use super::{BitOrder, ChannelMask, PixelGrid};
use crate::config::Config;
use crate::content::{printable_ratio, shannon_entropy, FileType};
use log::debug;
use serde::Serialize;
use std::fmt;

const COMMON_MASKS: [ChannelMask; 4] = [
    ChannelMask::RED,
    ChannelMask::GREEN,
    ChannelMask::BLUE,
    ChannelMask::RGB,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Protocol {
    LengthPrefixed,
    Raw,
}

impl Protocol {
    pub const BOTH: [Protocol; 2] = [Protocol::LengthPrefixed, Protocol::Raw];

    pub fn tag(self) -> &'static str {
        match self {
            Protocol::LengthPrefixed => "lp",
            Protocol::Raw => "raw",
        }
    }
}

/// One plausible payload recovered from the bit planes.
#[derive(Debug, Clone)]
pub struct ExtractionCandidate {
    pub data: Vec<u8>,
    pub mask: ChannelMask,
    pub order: BitOrder,
    pub protocol: Protocol,
    /// 0.0 (noise) to 1.0 (certainly content)
    pub quality: f64,
    pub file_type: FileType,
    pub printable_ratio: f64,
    pub entropy: f64,
}

impl ExtractionCandidate {
    fn new(data: Vec<u8>, mask: ChannelMask, order: BitOrder, protocol: Protocol) -> Self {
        let ratio = printable_ratio(&data);
        let entropy = shannon_entropy(&data);
        let file_type = FileType::detect(&data);
        let quality = quality_score(file_type, ratio, entropy, protocol);
        Self {
            data,
            mask,
            order,
            protocol,
            quality,
            file_type,
            printable_ratio: ratio,
            entropy,
        }
    }

    /// Tag such as `lp-R1-lsb` or `raw-RGB2-msb`.
    pub fn method(&self) -> String {
        format!("{}-{}-{}", self.protocol.tag(), self.mask, self.order.tag())
    }
}

impl fmt::Display for ExtractionCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bytes, {}, quality {:.2})",
            self.method(),
            self.data.len(),
            self.file_type,
            self.quality
        )
    }
}

/// Signature match beats readable text beats bare high entropy. A valid
/// length header is itself evidence, so length-prefixed results get a bonus.
fn quality_score(file_type: FileType, printable: f64, entropy: f64, protocol: Protocol) -> f64 {
    let base = if file_type.has_signature() {
        0.9
    } else if file_type.is_text() {
        printable
    } else {
        0.5 * entropy / 8.0
    };
    let bonus = match protocol {
        Protocol::LengthPrefixed => 0.1,
        Protocol::Raw => 0.0,
    };
    (base + bonus).clamp(0.0, 1.0)
}

/// Acceptance filter applied to every extraction result.
pub fn looks_like_content(data: &[u8], config: &Config) -> bool {
    !data.is_empty()
        && (printable_ratio(data) >= config.printable_ratio
            || shannon_entropy(data) > config.entropy_accept)
}

struct Search<'a> {
    grid: &'a PixelGrid,
    config: &'a Config,
    found: Vec<ExtractionCandidate>,
    attempts: usize,
}

impl<'a> Search<'a> {
    fn try_mask(&mut self, mask: ChannelMask) {
        for order in BitOrder::BOTH {
            for protocol in Protocol::BOTH {
                self.attempts += 1;
                let data = match protocol {
                    Protocol::LengthPrefixed => {
                        match extract_length_prefixed(self.grid, mask, order, self.config.max_payload) {
                            Ok(data) => data,
                            Err(e) => {
                                if !e.is_wrong_guess() {
                                    debug!("lp-{}-{}: {}", mask, order.tag(), e);
                                }
                                continue;
                            }
                        }
                    }
                    Protocol::Raw => {
                        let data = extract_raw(self.grid, mask, order, self.config.raw_zero_run);
                        if data.len() <= self.config.min_raw_len {
                            continue;
                        }
                        data
                    }
                };

                if !looks_like_content(&data, self.config) {
                    continue;
                }
                if self.found.iter().any(|c| c.data == data) {
                    continue;
                }

                let candidate = ExtractionCandidate::new(data, mask, order, protocol);
                debug!("bit-plane candidate {}", candidate);
                self.found.push(candidate);
            }
        }
    }
}

/// Run the two-tier search over `grid`.
pub fn brute_force(grid: &PixelGrid, config: &Config) -> Vec<ExtractionCandidate> {
    let mut search = Search {
        grid,
        config,
        found: Vec::new(),
        attempts: 0,
    };

    for mask in COMMON_MASKS {
        search.try_mask(mask);
    }

    if search.found.is_empty() {
        for r in 0..=2u8 {
            for g in 0..=2u8 {
                for b in 0..=2u8 {
                    let Ok(mask) = ChannelMask::new(r, g, b, 0) else {
                        continue;
                    };
                    if COMMON_MASKS.contains(&mask) {
                        continue;
                    }
                    search.try_mask(mask);
                }
            }
        }
    }

    debug!(
        "brute force: {} attempts, {} candidates",
        search.attempts,
        search.found.len()
    );
    search.found
}
