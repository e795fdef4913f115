//! Structural JPEG checks
//!
//! Cheap checks that need only the marker walk, not the coefficients:
//! quantization tables far from the IJG quality-50 reference, comments that
//! look like encoded payloads, other file formats hidden in the same bytes,
//! data appended after EOI, and marker sequences no encoder writes.

use super::marker;
use super::parser::QuantTable;
use crate::content::{printable_ratio, shannon_entropy, FileType};
use serde::Serialize;
use std::collections::HashMap;

/// IJG quality-50 luminance table, zigzag (file) order.
pub const STANDARD_LUMINANCE: [u8; 64] = [
    16, 11, 12, 14, 12, 10, 16, 14, 13, 14, 18, 17, 16, 19, 24, 40, 26, 24, 22, 22, 24, 49, 35, 37,
    29, 40, 58, 51, 61, 60, 57, 51, 56, 55, 64, 72, 92, 78, 64, 68, 87, 69, 55, 56, 80, 109, 81,
    87, 95, 98, 103, 104, 103, 62, 77, 113, 121, 112, 100, 120, 92, 101, 103, 99,
];

/// IJG quality-50 chrominance table, zigzag (file) order.
pub const STANDARD_CHROMINANCE: [u8; 64] = [
    17, 18, 18, 24, 21, 24, 47, 26, 26, 47, 99, 66, 56, 66, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99,
    99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99, 99,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantDeviation {
    pub table_id: u8,
    /// Entries differing from the reference by more than the tolerance
    pub deviations: usize,
    pub fraction: f64,
    pub modified: bool,
}

/// Compare each 8-bit table with the reference for its slot (id 0 against
/// luminance, everything else against chrominance). 16-bit tables are
/// skipped.
pub fn quantization_deviation(tables: &[QuantTable], tolerance: u16, max_fraction: f64) -> Vec<QuantDeviation> {
    tables
        .iter()
        .filter(|t| t.precision == 0 && t.values.len() == 64)
        .map(|t| {
            let reference = if t.id == 0 {
                &STANDARD_LUMINANCE
            } else {
                &STANDARD_CHROMINANCE
            };
            let deviations = t
                .values
                .iter()
                .zip(reference.iter())
                .filter(|&(&v, &r)| v.abs_diff(r as u16) > tolerance)
                .count();
            let fraction = deviations as f64 / 64.0;
            QuantDeviation {
                table_id: t.id,
                deviations,
                fraction,
                modified: fraction > max_fraction,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum CommentIssue {
    /// Longer than 1000 characters
    Oversized(usize),
    /// Share of control characters
    Binary(f64),
    Hex,
    Base64,
    /// Character entropy in bits
    HighEntropy(f64),
}

impl std::fmt::Display for CommentIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommentIssue::Oversized(len) => write!(f, "oversized comment ({} chars)", len),
            CommentIssue::Binary(ratio) => write!(f, "binary comment ({:.0}% control bytes)", ratio * 100.0),
            CommentIssue::Hex => write!(f, "hex-encoded comment"),
            CommentIssue::Base64 => write!(f, "base64-like comment"),
            CommentIssue::HighEntropy(e) => write!(f, "high-entropy comment (entropy={:.2})", e),
        }
    }
}

fn char_entropy(text: &str) -> f64 {
    let mut counts: HashMap<char, usize> = HashMap::new();
    let mut total = 0usize;
    for c in text.chars() {
        *counts.entry(c).or_insert(0) += 1;
        total += 1;
    }
    if total == 0 {
        return 0.0;
    }
    counts
        .values()
        .map(|&n| {
            let p = n as f64 / total as f64;
            -p * p.log2()
        })
        .sum()
}

/// First reason a COM segment looks like a carrier, if any.
pub fn suspicious_comment(comment: &str) -> Option<CommentIssue> {
    let len = comment.chars().count();
    if len == 0 {
        return None;
    }
    if len > 1000 {
        return Some(CommentIssue::Oversized(len));
    }

    let control = comment
        .chars()
        .filter(|&c| (c as u32) < 32 && c != '\t' && c != '\n' && c != '\r')
        .count();
    let ratio = control as f64 / len as f64;
    if ratio > 0.1 {
        return Some(CommentIssue::Binary(ratio));
    }

    if len > 20 {
        if comment.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Some(CommentIssue::Hex);
        }
        if comment
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=')
        {
            return Some(CommentIssue::Base64);
        }
        let entropy = char_entropy(comment);
        if entropy > 4.5 {
            return Some(CommentIssue::HighEntropy(entropy));
        }
    }
    None
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Another container format embedded in the file. A ZIP must sit in the last
/// 30 bytes (its local header tail); PDF, RAR and PNG may appear anywhere
/// past the first byte.
pub fn polyglot_signature(bytes: &[u8]) -> Option<FileType> {
    if bytes.len() > 30 && contains(&bytes[bytes.len() - 30..], b"PK\x03\x04") {
        return Some(FileType::Zip);
    }
    let body = bytes.get(1..).unwrap_or(&[]);
    if contains(body, b"%PDF-") {
        return Some(FileType::Pdf);
    }
    if contains(body, b"Rar!\x1A\x07") {
        return Some(FileType::Rar);
    }
    if contains(body, b"\x89PNG\r\n\x1A\n") {
        return Some(FileType::Png);
    }
    None
}

/// Assessment of bytes found after the image's end marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppendedData {
    pub size: usize,
    pub printable: bool,
    pub entropy: f64,
    pub file_type: FileType,
    /// 1..=10
    pub confidence: u8,
}

pub fn assess_appended(data: &[u8]) -> Option<AppendedData> {
    if data.is_empty() {
        return None;
    }
    let printable = printable_ratio(data) > 0.8;
    let entropy = shannon_entropy(data);

    let mut confidence: i32 = 5;
    if printable {
        confidence += 3;
    }
    if entropy > 7.5 {
        confidence += 2;
    }
    if data.len() < 10 {
        confidence -= 2;
    }

    Some(AppendedData {
        size: data.len(),
        printable,
        entropy,
        file_type: FileType::detect(data),
        confidence: confidence.clamp(1, 10) as u8,
    })
}

/// First frame-level marker that appears twice in a row.
///
/// DQT, DHT, APPn and SOS legitimately repeat back to back (split tables,
/// ICC chunks, progressive scans). SOI, EOI and SOFn never do; a second one
/// right behind the first usually means a second image was spliced in.
pub fn abnormal_marker_sequence(markers: &[u8]) -> Option<u8> {
    markers
        .windows(2)
        .find(|w| w[0] == w[1] && (w[0] == marker::SOI || w[0] == marker::EOI || marker::is_sof(w[0])))
        .map(|w| w[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(id: u8, values: &[u8; 64]) -> QuantTable {
        let mut raw = vec![id];
        raw.extend_from_slice(values);
        QuantTable {
            id,
            precision: 0,
            values: values.iter().map(|&v| v as u16).collect(),
            raw,
        }
    }

    // ==========================================================================
    // QUANTIZATION TABLES
    // ==========================================================================

    #[test]
    fn test_standard_tables_do_not_deviate() {
        let result = quantization_deviation(
            &[table(0, &STANDARD_LUMINANCE), table(1, &STANDARD_CHROMINANCE)],
            10,
            0.25,
        );
        assert_eq!(result.len(), 2);
        assert!(result.iter().all(|d| d.deviations == 0 && !d.modified));
    }

    #[test]
    fn test_flat_table_is_modified() {
        let result = quantization_deviation(&[table(0, &[1; 64])], 10, 0.25);
        assert!(result[0].modified);
        assert!(result[0].fraction > 0.9);
    }

    #[test]
    fn test_sixteen_bit_tables_skipped() {
        let mut t = table(0, &[1; 64]);
        t.precision = 1;
        assert!(quantization_deviation(&[t], 10, 0.25).is_empty());
    }

    // ==========================================================================
    // COMMENTS
    // ==========================================================================

    #[test]
    fn test_comment_issues() {
        assert_eq!(suspicious_comment("Created with GIMP"), None);
        assert_eq!(suspicious_comment(""), None);
        assert!(matches!(
            suspicious_comment(&"a".repeat(1001)),
            Some(CommentIssue::Oversized(1001))
        ));
        assert!(matches!(
            suspicious_comment("ab\u{1}\u{2}\u{3}"),
            Some(CommentIssue::Binary(_))
        ));
        assert_eq!(
            suspicious_comment("deadbeefcafebabe0123456789"),
            Some(CommentIssue::Hex)
        );
        assert_eq!(
            suspicious_comment("aGVsbG8gd29ybGQgdGhpcyBpcyBoaWRkZW4="),
            Some(CommentIssue::Base64)
        );
    }

    // ==========================================================================
    // POLYGLOTS AND APPENDED DATA
    // ==========================================================================

    #[test]
    fn test_polyglot_signatures() {
        let mut jpeg = vec![0xFF, 0xD8];
        jpeg.extend([0u8; 64]);
        assert_eq!(polyglot_signature(&jpeg), None);

        let mut zip = jpeg.clone();
        zip.extend(b"PK\x03\x04tail");
        assert_eq!(polyglot_signature(&zip), Some(FileType::Zip));

        let mut pdf = jpeg.clone();
        pdf.extend(b"%PDF-1.4");
        assert_eq!(polyglot_signature(&pdf), Some(FileType::Pdf));

        // A PNG's own signature at offset 0 does not count
        let png_head = b"\x89PNG\r\n\x1A\n\x00\x00".to_vec();
        assert_eq!(polyglot_signature(&png_head), None);
    }

    #[test]
    fn test_abnormal_marker_sequence() {
        let normal = [0xD8, 0xE0, 0xDB, 0xDB, 0xC0, 0xC4, 0xC4, 0xDA, 0xD9];
        assert_eq!(abnormal_marker_sequence(&normal), None);

        let spliced = [0xD8, 0xD8, 0xDB, 0xC0, 0xC4, 0xDA, 0xD9];
        assert_eq!(abnormal_marker_sequence(&spliced), Some(0xD8));

        let double_frame = [0xD8, 0xDB, 0xC0, 0xC0, 0xC4, 0xDA, 0xD9];
        assert_eq!(abnormal_marker_sequence(&double_frame), Some(0xC0));

        // Progressive scans follow each other directly
        let progressive = [0xD8, 0xC2, 0xC4, 0xDA, 0xDA, 0xDA, 0xD9];
        assert_eq!(abnormal_marker_sequence(&progressive), None);
        assert_eq!(abnormal_marker_sequence(&[]), None);
    }

    #[test]
    fn test_appended_confidence() {
        assert_eq!(assess_appended(&[]), None);

        let text = assess_appended(b"meet at the usual place").unwrap();
        assert!(text.printable);
        assert_eq!(text.confidence, 8);
        assert_eq!(text.file_type, FileType::Text);

        let short = assess_appended(b"ok").unwrap();
        assert_eq!(short.confidence, 6);

        let random: Vec<u8> = (0..=255u8).cycle().take(1024).collect();
        let blob = assess_appended(&random).unwrap();
        assert!(!blob.printable);
        assert_eq!(blob.confidence, 7);
    }
}
