//! Browser-encoder LSB layout
//!
//! Canvas-based JavaScript encoders write into the RGB low bits and leave
//! alpha alone, since premultiplied alpha would corrupt the message. An
//! opaque carrier therefore shows a live RGB plane next to a flat alpha
//! plane. Messages are either length-prefixed or a plain byte string ending
//! at the first NUL.

use super::stats::LsbDistribution;
use crate::bitplane::extract::extract_length_prefixed;
use crate::bitplane::{BitOrder, Channel, ChannelMask, PixelGrid};
use crate::config::Config;
use crate::content::is_printable;
use log::debug;

/// RGB LSB entropy strictly inside this range looks written rather than flat.
pub const RGB_ENTROPY_MIN: f64 = 0.7;
pub const RGB_ENTROPY_MAX: f64 = 1.0;
/// Alpha LSB entropy below this counts as untouched.
pub const ALPHA_ENTROPY_MAX: f64 = 0.3;

const MIN_ASCII_LEN: usize = 4;
const ASCII_RATIO: f64 = 0.75;

/// Live RGB plane and flat alpha plane. Images without transparency have a
/// constant alpha, so a missing alpha channel counts as entropy 0.
pub fn detect_js_lsb(dist: &LsbDistribution) -> bool {
    let alpha = dist.channel(Channel::A).map(|c| c.entropy).unwrap_or(0.0);
    dist.entropy > RGB_ENTROPY_MIN && dist.entropy < RGB_ENTROPY_MAX && alpha < ALPHA_ENTROPY_MAX
}

fn is_likely_ascii(data: &[u8]) -> bool {
    if data.len() < MIN_ASCII_LEN {
        return false;
    }
    let printable = data.iter().filter(|&&b| is_printable(b)).count();
    printable as f64 / data.len() as f64 > ASCII_RATIO
}

/// RGB low bits packed MSB-first, up to the first NUL byte.
fn extract_nul_terminated(grid: &PixelGrid) -> Vec<u8> {
    let mut stream = grid.bits(ChannelMask::RGB, BitOrder::LsbFirst);
    let mut data = Vec::new();
    while let Some(byte) = stream.read_byte() {
        if byte == 0 {
            break;
        }
        data.push(byte);
    }
    data
}

fn trim_controls(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .trim_end_matches(|c: char| c.is_control())
        .to_string()
}

/// Recover the message a browser encoder would have written.
///
/// The length-prefixed reading wins when it is ASCII. Otherwise the
/// NUL-terminated reading is tried, and failing that the length-prefixed
/// bytes are returned as they are.
pub fn extract_js_lsb(grid: &PixelGrid, config: &Config) -> Option<String> {
    let prefixed =
        match extract_length_prefixed(grid, ChannelMask::RGB, BitOrder::LsbFirst, config.max_payload) {
            Ok(data) => Some(data),
            Err(e) => {
                debug!("js-lsb length header rejected: {}", e);
                None
            }
        };

    if let Some(data) = prefixed.as_deref().filter(|d| is_likely_ascii(d)) {
        return Some(trim_controls(data));
    }

    let direct = extract_nul_terminated(grid);
    if is_likely_ascii(&direct) {
        return Some(trim_controls(&direct));
    }

    prefixed
        .map(|data| trim_controls(&data))
        .filter(|text| !text.is_empty())
}
