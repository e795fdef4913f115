//! Payload content classification
//!
//! Helpers for judging bytes recovered by any extractor: Shannon entropy,
//! printable ratio, file-type sniffing and the strong-indicator tokens that
//! separate a real C2 payload from statistical noise.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::sync::OnceLock;

/// Shannon entropy of byte data, 0.0 to 8.0 bits per byte.
pub fn shannon_entropy(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }

    let mut frequencies = [0u64; 256];
    for &byte in data {
        frequencies[byte as usize] += 1;
    }

    let len = data.len() as f64;
    frequencies
        .iter()
        .filter(|&&count| count > 0)
        .map(|&count| {
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Printable ASCII plus tab, LF and CR.
#[inline]
pub fn is_printable(byte: u8) -> bool {
    (0x20..=0x7E).contains(&byte) || byte == b'\n' || byte == b'\r' || byte == b'\t'
}

/// Fraction of printable bytes. Empty input scores 0.
pub fn printable_ratio(data: &[u8]) -> f64 {
    if data.is_empty() {
        return 0.0;
    }
    data.iter().filter(|&&b| is_printable(b)).count() as f64 / data.len() as f64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FileType {
    Png,
    Jpeg,
    Gif,
    Bmp,
    Pdf,
    Zip,
    Rar,
    SevenZip,
    Exe,
    Elf,
    Json,
    Xml,
    Text,
    Binary,
}

const SIGNATURES: &[(&[u8], FileType)] = &[
    (&[0x89, 0x50, 0x4E, 0x47], FileType::Png),
    (&[0xFF, 0xD8, 0xFF], FileType::Jpeg),
    (b"GIF87a", FileType::Gif),
    (b"GIF89a", FileType::Gif),
    (b"%PDF", FileType::Pdf),
    (&[0x50, 0x4B, 0x03, 0x04], FileType::Zip),
    (b"Rar!", FileType::Rar),
    (&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C], FileType::SevenZip),
    (&[0x7F, 0x45, 0x4C, 0x46], FileType::Elf),
    (b"BM", FileType::Bmp),
];

/// DOS stub whose `e_lfanew` (offset 0x3C) points at a `PE\0\0` header.
/// Two bytes of "MZ" turn up in noise far too often to count on their own.
pub fn is_pe_image(data: &[u8]) -> bool {
    if data.len() < 0x40 || !data.starts_with(b"MZ") {
        return false;
    }
    let e_lfanew = u32::from_le_bytes([data[0x3C], data[0x3D], data[0x3E], data[0x3F]]) as usize;
    e_lfanew >= 0x40
        && e_lfanew
            .checked_add(4)
            .and_then(|end| data.get(e_lfanew..end))
            .is_some_and(|sig| sig == b"PE\0\0")
}

impl FileType {
    /// Sniff magic bytes first, then fall back to content shape.
    pub fn detect(data: &[u8]) -> FileType {
        if is_pe_image(data) {
            return FileType::Exe;
        }
        for (magic, kind) in SIGNATURES {
            if data.starts_with(magic) {
                return *kind;
            }
        }

        if printable_ratio(data) < 0.8 {
            return FileType::Binary;
        }

        let text = String::from_utf8_lossy(data);
        let trimmed = text.trim();
        if (trimmed.starts_with('{') || trimmed.starts_with('['))
            && serde_json::from_str::<serde_json::Value>(trimmed).is_ok()
        {
            FileType::Json
        } else if trimmed.starts_with("<?xml") || (trimmed.starts_with('<') && trimmed.ends_with('>')) {
            FileType::Xml
        } else {
            FileType::Text
        }
    }

    /// True for formats identified by a magic number rather than by content.
    pub fn has_signature(self) -> bool {
        !matches!(
            self,
            FileType::Json | FileType::Xml | FileType::Text | FileType::Binary
        )
    }

    pub fn is_executable(self) -> bool {
        matches!(self, FileType::Exe | FileType::Elf)
    }

    pub fn is_text(self) -> bool {
        matches!(self, FileType::Json | FileType::Xml | FileType::Text)
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FileType::Png => "png",
            FileType::Jpeg => "jpeg",
            FileType::Gif => "gif",
            FileType::Bmp => "bmp",
            FileType::Pdf => "pdf",
            FileType::Zip => "zip",
            FileType::Rar => "rar",
            FileType::SevenZip => "7z",
            FileType::Exe => "exe",
            FileType::Elf => "elf",
            FileType::Json => "json",
            FileType::Xml => "xml",
            FileType::Text => "text",
            FileType::Binary => "binary",
        };
        write!(f, "{}", s)
    }
}

const STRONG_INDICATORS: &[&str] = &[
    "shell", "password", "secret", "admin", "http://", "https://", "ftp://", ".exe", ".dll",
    ".sh", ".cmd",
];

/// Entropy reading that alone counts as a strong indicator.
pub const INDICATOR_ENTROPY: f64 = 7.9;

fn entropy_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"entropy=(\d+\.\d+)").ok())
        .as_ref()
}

/// Case-insensitive check for C2-flavoured tokens or an `entropy=X.Y`
/// reading above [`INDICATOR_ENTROPY`].
pub fn has_strong_indicator(text: &str) -> bool {
    let lower = text.to_lowercase();
    if STRONG_INDICATORS.iter().any(|token| lower.contains(token)) {
        return true;
    }
    let Some(pattern) = entropy_pattern() else {
        return false;
    };
    pattern
        .captures_iter(&lower)
        .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
        .any(|value| value > INDICATOR_ENTROPY)
}

/// Short printable rendering of a payload for finding details.
pub fn preview(data: &[u8], max: usize) -> String {
    let mut out: String = data
        .iter()
        .take(max)
        .map(|&b| if is_printable(b) && b != b'\n' && b != b'\r' { b as char } else { '.' })
        .collect();
    if data.len() > max {
        out.push_str("...");
    }
    out
}
