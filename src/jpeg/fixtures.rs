//! Hand-assembled JPEG streams for unit tests.
//!
//! `gray_baseline` builds a single-component SOF0 file with two tiny
//! Huffman tables:
//!
//! - DC: `0` → size 0, `1` → size 2
//! - AC: `0` → EOB, `1` → run 0 / size 1
//!
//! so scan bytes can be written by hand. `0xFC` is one block with DC 3,
//! `zz[1] = 1`, `zz[2] = -1`.

use super::marker;
use super::structure::STANDARD_LUMINANCE;

pub fn segment(code: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, code];
    out.extend(((body.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(body);
    out
}

pub fn dqt(id: u8, values: &[u8; 64]) -> Vec<u8> {
    let mut body = vec![id];
    body.extend_from_slice(values);
    segment(marker::DQT, &body)
}

/// `components`: (id, sampling byte, quant table)
pub fn sof(code: u8, width: u16, height: u16, components: &[(u8, u8, u8)]) -> Vec<u8> {
    let mut body = vec![8];
    body.extend(height.to_be_bytes());
    body.extend(width.to_be_bytes());
    body.push(components.len() as u8);
    for &(id, sampling, tq) in components {
        body.extend([id, sampling, tq]);
    }
    segment(code, &body)
}

pub fn dht(class: u8, id: u8, counts: &[u8], symbols: &[u8]) -> Vec<u8> {
    let mut body = vec![(class << 4) | id];
    let mut padded = [0u8; 16];
    padded[..counts.len()].copy_from_slice(counts);
    body.extend(padded);
    body.extend_from_slice(symbols);
    segment(marker::DHT, &body)
}

/// `components`: (id, dc table, ac table)
pub fn sos(components: &[(u8, u8, u8)]) -> Vec<u8> {
    let mut body = vec![components.len() as u8];
    for &(id, dc, ac) in components {
        body.extend([id, (dc << 4) | ac]);
    }
    body.extend([0, 63, 0]);
    segment(marker::SOS, &body)
}

pub fn gray_baseline(width: u16, height: u16, scan: &[u8], restart: Option<u16>) -> Vec<u8> {
    let mut out = vec![0xFF, marker::SOI];
    out.extend(dqt(0, &STANDARD_LUMINANCE));
    out.extend(sof(marker::SOF0, width, height, &[(1, 0x11, 0)]));
    out.extend(dht(0, 0, &[2], &[0x00, 0x02]));
    out.extend(dht(1, 0, &[2], &[0x00, 0x01]));
    if let Some(interval) = restart {
        out.extend(segment(marker::DRI, &interval.to_be_bytes()));
    }
    out.extend(sos(&[(1, 0, 0)]));
    out.extend_from_slice(scan);
    out.extend([0xFF, marker::EOI]);
    out
}
