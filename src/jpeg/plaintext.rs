//! Plain text hidden in JPEG bytes
//!
//! The crudest way to hide a message in a JPEG is to write it into the file
//! as-is: between segments, inside the entropy-coded data, or in an EXIF
//! block. Decoders skip such bytes, so the image still displays. This module
//! slides a 40-byte window over everything the marker walk did not claim and
//! keeps windows that read like language rather than table data.

use super::parser::JpegMetadata;
use crate::content::{is_printable, printable_ratio};

const WINDOW: usize = 40;
/// Windows shorter than this at the end of the data are not examined.
const MIN_WINDOW: usize = 20;
const WINDOW_PRINTABLE: f64 = 0.95;
const EXIF_PRINTABLE: f64 = 0.90;
const MIN_TEXT_LEN: usize = 10;
const APP1: u8 = 0xE1;

/// Fragments of Huffman tables, format tags and camera makers that read as
/// text but are part of every other JPEG.
const COMMON_PATTERNS: &[&str] = &[
    "%&'()*456789:CDEFGHIJ",
    "&'()*56789:CDEFGHIJSTUVWXYZcdefghij",
    "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklm",
    "JFIF",
    "Exif",
    "http://",
    "Adobe",
    "ICC_PROFILE",
    "Nikon",
    "Canon",
    "OLYMPUS",
    "PENTAX",
    "SONY",
];

const KEYWORDS: &[&str] = &["secret", "password", "key", "login", "user", "admin", "credit"];

/// Text fragments found outside the parsed segments and inside APP1 blocks.
pub fn scan_plaintext(bytes: &[u8], meta: &JpegMetadata) -> Vec<String> {
    let mut found = loose_text(bytes, meta);
    for text in exif_text(bytes, meta) {
        if !found.contains(&text) {
            found.push(text);
        }
    }
    found.retain(|t| survives_final_filter(t));
    found
}

/// Windows over bytes no segment accounts for: gaps between segments and
/// entropy-coded data. Trailing data has its own check and is left out.
fn loose_text(bytes: &[u8], meta: &JpegMetadata) -> Vec<String> {
    let end = bytes.len().saturating_sub(meta.trailing_size);
    let mut found = Vec::new();
    let mut i = 0;

    while i + MIN_WINDOW < end {
        if let Some(segment) = meta.segments.iter().find(|s| s.start <= i && i < s.end) {
            i = segment.end;
            continue;
        }

        let window = &bytes[i..(i + WINDOW).min(end)];
        if printable_ratio(window) > WINDOW_PRINTABLE {
            let text = String::from_utf8_lossy(window);
            if !is_common_pattern(&text) && is_likely_plaintext(&text) {
                let clean = cleanup(window);
                if clean.len() >= MIN_TEXT_LEN && is_meaningful(&clean) {
                    found.push(clean);
                    i += window.len();
                    continue;
                }
            }
        }
        i += 1;
    }
    found
}

/// Readable runs inside APP1 (EXIF/XMP) bodies.
pub fn exif_text(bytes: &[u8], meta: &JpegMetadata) -> Vec<String> {
    let mut raw = Vec::new();
    for segment in meta.segments.iter().filter(|s| s.marker == APP1) {
        // Marker and length field come first
        let Some(body) = bytes.get(segment.start + 4..segment.end) else {
            continue;
        };
        if body.len() <= 8 {
            continue;
        }

        let mut j = 0;
        while j + MIN_TEXT_LEN < body.len() {
            let window = &body[j..(j + WINDOW).min(body.len())];
            if printable_ratio(window) > EXIF_PRINTABLE {
                raw.push(cleanup(window));
                j += window.len();
            } else {
                j += 1;
            }
        }
    }

    raw.into_iter()
        .filter(|t| !is_common_pattern(t) && is_likely_plaintext(t) && is_meaningful(t))
        .collect()
}

fn cleanup(window: &[u8]) -> String {
    let kept: String = window
        .iter()
        .filter(|&&b| is_printable(b))
        .map(|&b| b as char)
        .collect();
    kept.trim().to_string()
}

fn is_common_pattern(text: &str) -> bool {
    COMMON_PATTERNS.iter().any(|p| text.contains(p)) || has_repetition(text.as_bytes())
}

/// Five identical bytes in a row, or a two-byte unit repeated three times
/// at an even offset.
fn has_repetition(text: &[u8]) -> bool {
    if text.windows(5).any(|w| w.iter().all(|&c| c == w[0])) {
        return true;
    }
    text.len() > 10
        && (0..text.len() - 6)
            .step_by(2)
            .any(|i| text[i] == text[i + 2] && text[i] == text[i + 4] && text[i + 1] == text[i + 3] && text[i + 1] == text[i + 5])
}

/// No dominant byte, and a vowel share a language could produce. All-caps
/// strings (keys, codes) are exempt from the vowel test.
fn is_likely_plaintext(text: &str) -> bool {
    let bytes = text.as_bytes();
    if bytes.len() < MIN_TEXT_LEN {
        return false;
    }

    let mut counts = [0usize; 256];
    for &b in bytes {
        counts[b as usize] += 1;
    }
    let len = bytes.len() as f64;
    if counts.iter().any(|&c| c as f64 / len > 0.5) {
        return false;
    }

    let vowels = bytes
        .iter()
        .filter(|b| matches!(b.to_ascii_lowercase(), b'a' | b'e' | b'i' | b'o' | b'u'))
        .count();
    let ratio = vowels as f64 / len;
    (0.1..=0.7).contains(&ratio) || text.to_uppercase() == text
}

/// A keyword, or at least one run of four letters.
fn is_meaningful(text: &str) -> bool {
    let lower = text.to_lowercase();
    if KEYWORDS.iter().any(|k| lower.contains(k)) {
        return true;
    }
    let mut run = 0;
    for c in text.chars() {
        if c.is_ascii_alphabetic() {
            run += 1;
            if run >= 4 {
                return true;
            }
        } else {
            run = 0;
        }
    }
    false
}

fn survives_final_filter(text: &str) -> bool {
    if text.len() < MIN_TEXT_LEN {
        return false;
    }
    let letters = text.chars().filter(|c| c.is_ascii_alphabetic()).count();
    if (letters as f64) / (text.len() as f64) < 0.4 {
        return false;
    }
    // Tail of the standard AC Huffman symbol table
    !(text.contains("UVWXYZ") && text.contains("cdefghi"))
}
