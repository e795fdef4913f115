//! JPEG structure and coefficient analysis
//!
//! - [`parser`]: marker walker producing [`JpegMetadata`], trailing-data check
//! - [`huffman`]: canonical Huffman tables and the entropy bit reader
//! - [`dct`]: baseline coefficient decoder producing [`JpegDctData`]
//! - [`heuristics`]: coefficient histogram and tool signatures
//! - [`structure`]: quantization, comment, polyglot, marker-order and
//!   appended-data checks
//! - [`plaintext`]: readable text outside the parsed segments and in EXIF

pub mod dct;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod heuristics;
pub mod huffman;
pub mod parser;
pub mod plaintext;
pub mod structure;

pub use dct::{parse_dct_coefficients, DctBlock, JpegDctData};
pub use parser::{check_trailing_data, parse_metadata, trailing_data, JpegMetadata};

/// True when `bytes` starts with the SOI marker.
pub fn is_jpeg(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] == marker::SOI
}

/// Marker codes (the byte following 0xFF).
pub mod marker {
    pub const SOF0: u8 = 0xC0;
    pub const SOF1: u8 = 0xC1;
    pub const SOF2: u8 = 0xC2;
    pub const DHT: u8 = 0xC4;
    pub const JPG: u8 = 0xC8;
    pub const DAC: u8 = 0xCC;
    pub const RST0: u8 = 0xD0;
    pub const RST7: u8 = 0xD7;
    pub const SOI: u8 = 0xD8;
    pub const EOI: u8 = 0xD9;
    pub const SOS: u8 = 0xDA;
    pub const DQT: u8 = 0xDB;
    pub const DRI: u8 = 0xDD;
    pub const APP0: u8 = 0xE0;
    pub const COM: u8 = 0xFE;
    pub const TEM: u8 = 0x01;

    /// Any start-of-frame marker (C0..=CF minus DHT, JPG and DAC).
    pub fn is_sof(m: u8) -> bool {
        (0xC0..=0xCF).contains(&m) && m != DHT && m != JPG && m != DAC
    }

    pub fn is_rst(m: u8) -> bool {
        (RST0..=RST7).contains(&m)
    }

    /// Markers that are not followed by a length field.
    pub fn is_standalone(m: u8) -> bool {
        m == TEM || is_rst(m) || m == SOI || m == EOI
    }

    /// Short name for logs and finding details.
    pub fn name(m: u8) -> String {
        match m {
            SOI => "SOI".into(),
            EOI => "EOI".into(),
            SOS => "SOS".into(),
            DQT => "DQT".into(),
            DHT => "DHT".into(),
            DRI => "DRI".into(),
            COM => "COM".into(),
            TEM => "TEM".into(),
            m if is_rst(m) => format!("RST{}", m - RST0),
            m if is_sof(m) => format!("SOF{}", m - SOF0),
            m if (APP0..=0xEF).contains(&m) => format!("APP{}", m - APP0),
            m => format!("0x{:02X}", m),
        }
    }
}
