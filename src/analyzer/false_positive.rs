//! False-positive likelihood
//!
//! Some images trip the LSB statistics without carrying anything: PNG
//! compression and highly textured photos both push LSB entropy towards 1.0,
//! and recovered "text" is often just leftover metadata. This module turns
//! those observations into a likelihood in [0, 1] that the scanner uses to
//! scale down confidences. It never removes a finding on its own.

use regex::Regex;
use std::sync::OnceLock;

/// LSB entropy above which a PNG's plane is explained by compression.
pub const PNG_ENTROPY: f64 = 0.99;
/// Complexity above which high LSB entropy is expected.
pub const HIGH_COMPLEXITY: f64 = 0.85;

const METADATA_KEYWORDS: &[&str] = &[
    "exif", "xmp", "photoshop", "adobe", "icc_profile", "jfif", "ducky", "created with",
    "software:", "artist:", "make:", "model:", "copyright:", "gps", "date", "time",
    "resolution", "color", "profile", "version", "camera", "metadata", "author", "producer",
    "creator", "title", "subject", "keywords", "description", "comment",
];

fn metadata_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            r"^\d{4}[-/]\d{2}[-/]\d{2}",
            r"^\d{2}:\d{2}:\d{2}",
            r"^[A-Za-z]+ \d{1,2}, \d{4}",
            r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            r"^https?://",
            r"^[A-Za-z]+ [A-Za-z]+$",
            r"^v\d+\.\d+\.\d+$",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect()
    })
}

/// Hash or UUID: an even number of hex digits once separators are removed.
fn is_hex_blob(text: &str) -> bool {
    let stripped: String = text
        .chars()
        .filter(|c| !matches!(c, '-' | ':' | ' '))
        .collect();
    !stripped.is_empty() && stripped.len() % 2 == 0 && stripped.chars().all(|c| c.is_ascii_hexdigit())
}

/// True for strings that look like ordinary image metadata: EXIF/XMP
/// keywords, dates, times, e-mail addresses, URLs, a two-word name, a
/// version number or a long hex digest.
pub fn is_metadata_string(text: &str) -> bool {
    let lower = text.to_lowercase();
    if METADATA_KEYWORDS.iter().any(|k| lower.contains(k)) {
        return true;
    }
    let trimmed = text.trim();
    if metadata_patterns().iter().any(|p| p.is_match(trimmed)) {
        return true;
    }
    text.len() >= 32 && is_hex_blob(text)
}

/// What the scanner observed about one image.
#[derive(Debug, Clone, Default)]
pub struct FalsePositiveInput<'a> {
    pub is_png: bool,
    /// An LSB-statistics finding was raised
    pub lsb_anomaly: bool,
    pub lsb_entropy: f64,
    pub image_complexity: f64,
    /// Recovered text fragments
    pub texts: &'a [String],
}

/// Likelihood in [0, 1] that the findings are explained by benign causes.
///
/// Each check that applies contributes up to 1.0; the result is the mean
/// over the checks that ran, 0 when none did.
pub fn false_positive_likelihood(input: &FalsePositiveInput<'_>) -> f64 {
    let mut score = 0.0;
    let mut checks = 0u32;

    if !input.texts.is_empty() {
        checks += 1;
        let n = input.texts.len() as f64;
        let metadata = input.texts.iter().filter(|t| is_metadata_string(t)).count() as f64;
        if metadata / n > 0.7 {
            score += 1.0;
        }
        let short = input.texts.iter().filter(|t| t.len() < 10).count() as f64;
        if short / n > 0.8 {
            score += 0.5;
        }
    }

    if input.lsb_anomaly {
        checks += 1;
        if input.is_png && input.lsb_entropy > PNG_ENTROPY {
            score += 0.5;
        }
        if input.image_complexity > HIGH_COMPLEXITY {
            score += 0.5;
        }
    }

    if checks == 0 {
        return 0.0;
    }
    (score / checks as f64).min(1.0)
}

/// Scale a 1..=10 confidence by `1 - likelihood`, never below 1.
pub fn discount(confidence: u8, likelihood: f64) -> u8 {
    let adjusted = (confidence as f64 * (1.0 - likelihood.clamp(0.0, 1.0))).round();
    adjusted.clamp(1.0, 10.0) as u8
}
