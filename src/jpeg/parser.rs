//! JPEG marker walker
//!
//! A JPEG file is a sequence of segments, each introduced by `0xFF <marker>`:
//!
//! ```text
//! FF D8                      SOI, no length
//! FF xx LL LL <body>         length-bearing segment, LLLL counts itself
//! FF DA LL LL <hdr> <data>   SOS header, then entropy-coded data until the
//!                            next non-RST marker
//! FF D9                      EOI; anything after it is trailing data
//! ```
//!
//! Inside entropy-coded data `FF 00` is a stuffed 0xFF byte, `FF D0..D7` are
//! restart markers and `FF FF` is fill.

use super::marker;
use crate::error::{Error, Result};
use log::debug;

/// Byte range `[start, end)` of one segment including its marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegSegment {
    pub marker: u8,
    pub start: usize,
    pub end: usize,
}

/// One DQT table. `values` are in zigzag order as stored in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuantTable {
    pub id: u8,
    /// 0 = 8-bit entries, 1 = 16-bit entries
    pub precision: u8,
    pub values: Vec<u16>,
    /// Table bytes as stored, including the Pq/Tq byte
    pub raw: Vec<u8>,
}

/// One DHT table definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HuffmanSpec {
    /// 0 = DC, 1 = AC
    pub class: u8,
    pub id: u8,
    /// `counts[i]` codes of length `i + 1`
    pub counts: [u8; 16],
    pub symbols: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameComponent {
    pub id: u8,
    pub h: u8,
    pub v: u8,
    pub tq: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanComponent {
    pub id: u8,
    pub dc_table: u8,
    pub ac_table: u8,
    /// Index into [`JpegMetadata::huffman_tables`] of the DC table in force
    /// when the scan started.
    pub dc_spec: Option<usize>,
    pub ac_spec: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanInfo {
    pub components: Vec<ScanComponent>,
    pub ss: u8,
    pub se: u8,
    pub ah: u8,
    pub al: u8,
    pub restart_interval: u16,
    /// Entropy-coded bytes, still stuffed: `bytes[data_start..data_end]`
    pub data_start: usize,
    pub data_end: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JpegMetadata {
    pub width: u16,
    pub height: u16,
    pub precision: u8,
    pub components: Vec<FrameComponent>,
    /// SOFn marker of the frame, if one was seen
    pub frame_marker: Option<u8>,
    pub progressive: bool,
    pub quant_tables: Vec<QuantTable>,
    pub huffman_tables: Vec<HuffmanSpec>,
    pub comments: Vec<String>,
    pub restart_interval: u16,
    pub markers: Vec<u8>,
    pub segments: Vec<JpegSegment>,
    pub scans: Vec<ScanInfo>,
    pub has_trailing_data: bool,
    pub trailing_size: usize,
}

impl JpegMetadata {
    /// SOF0 or SOF1: Huffman-coded sequential DCT.
    pub fn is_sequential_huffman(&self) -> bool {
        matches!(self.frame_marker, Some(marker::SOF0) | Some(marker::SOF1))
    }

    pub fn frame_component(&self, id: u8) -> Option<(usize, &FrameComponent)> {
        self.components.iter().enumerate().find(|(_, c)| c.id == id)
    }

    /// Latest DHT definition seen so far for `(class, id)`.
    fn huffman_index(&self, class: u8, id: u8) -> Option<usize> {
        self.huffman_tables
            .iter()
            .rposition(|t| t.class == class && t.id == id)
    }
}

fn truncated(marker: u8, offset: usize) -> Error {
    Error::TruncatedSegment { marker, offset }
}

/// Walk the marker structure of `bytes`.
pub fn parse_metadata(bytes: &[u8]) -> Result<JpegMetadata> {
    if !super::is_jpeg(bytes) {
        return Err(Error::NotAJpeg);
    }

    let mut meta = JpegMetadata::default();
    meta.markers.push(marker::SOI);
    meta.segments.push(JpegSegment {
        marker: marker::SOI,
        start: 0,
        end: 2,
    });

    let len = bytes.len();
    let mut pos = 2;

    loop {
        while pos < len && bytes[pos] != 0xFF {
            pos += 1;
        }
        while pos < len && bytes[pos] == 0xFF {
            pos += 1;
        }
        if pos >= len {
            break;
        }

        let code = bytes[pos];
        let start = pos - 1;
        pos += 1;

        // A stuffed zero outside a scan carries no meaning
        if code == 0x00 {
            continue;
        }
        meta.markers.push(code);

        if code == marker::EOI {
            meta.segments.push(JpegSegment {
                marker: code,
                start,
                end: pos,
            });
            meta.trailing_size = len - pos;
            meta.has_trailing_data = meta.trailing_size > 0;
            break;
        }
        if marker::is_standalone(code) {
            meta.segments.push(JpegSegment {
                marker: code,
                start,
                end: pos,
            });
            continue;
        }

        if pos + 2 > len {
            return Err(truncated(code, start));
        }
        let length = u16::from_be_bytes([bytes[pos], bytes[pos + 1]]) as usize;
        if length < 2 || pos + length > len {
            return Err(truncated(code, start));
        }
        let body = &bytes[pos + 2..pos + length];
        let end = pos + length;

        match code {
            marker::DQT => meta.quant_tables.extend(parse_dqt(body, start)?),
            marker::DHT => meta.huffman_tables.extend(parse_dht(body, start)?),
            marker::COM => meta
                .comments
                .push(String::from_utf8_lossy(body).into_owned()),
            marker::DRI => {
                if body.len() < 2 {
                    return Err(truncated(code, start));
                }
                meta.restart_interval = u16::from_be_bytes([body[0], body[1]]);
            }
            m if marker::is_sof(m) => parse_sof(&mut meta, m, body, start)?,
            _ => {}
        }

        meta.segments.push(JpegSegment {
            marker: code,
            start,
            end,
        });

        pos = if code == marker::SOS {
            let scan = parse_sos(&meta, body, start, bytes, end)?;
            let next = scan.data_end;
            meta.scans.push(scan);
            next
        } else {
            end
        };
    }

    debug!(
        "jpeg: {}x{}, {} segments, {} scans, {} trailing bytes",
        meta.width,
        meta.height,
        meta.segments.len(),
        meta.scans.len(),
        meta.trailing_size
    );
    Ok(meta)
}

fn parse_dqt(body: &[u8], offset: usize) -> Result<Vec<QuantTable>> {
    let mut tables = Vec::new();
    let mut i = 0;
    while i < body.len() {
        let precision = body[i] >> 4;
        let id = body[i] & 0x0F;
        let size = if precision == 0 { 64 } else { 128 };
        let end = i + 1 + size;
        if end > body.len() {
            return Err(truncated(marker::DQT, offset));
        }
        let entries = &body[i + 1..end];
        let values = if precision == 0 {
            entries.iter().map(|&v| v as u16).collect()
        } else {
            entries
                .chunks_exact(2)
                .map(|p| u16::from_be_bytes([p[0], p[1]]))
                .collect()
        };
        tables.push(QuantTable {
            id,
            precision,
            values,
            raw: body[i..end].to_vec(),
        });
        i = end;
    }
    Ok(tables)
}

fn parse_dht(body: &[u8], offset: usize) -> Result<Vec<HuffmanSpec>> {
    let mut specs = Vec::new();
    let mut i = 0;
    while i < body.len() {
        if i + 17 > body.len() {
            return Err(truncated(marker::DHT, offset));
        }
        let class = body[i] >> 4;
        let id = body[i] & 0x0F;
        let mut counts = [0u8; 16];
        counts.copy_from_slice(&body[i + 1..i + 17]);
        let total: usize = counts.iter().map(|&c| c as usize).sum();
        let end = i + 17 + total;
        if end > body.len() {
            return Err(truncated(marker::DHT, offset));
        }
        specs.push(HuffmanSpec {
            class,
            id,
            counts,
            symbols: body[i + 17..end].to_vec(),
        });
        i = end;
    }
    Ok(specs)
}

fn parse_sof(meta: &mut JpegMetadata, code: u8, body: &[u8], offset: usize) -> Result<()> {
    if body.len() < 6 {
        return Err(truncated(code, offset));
    }
    let count = body[5] as usize;
    if body.len() < 6 + 3 * count {
        return Err(truncated(code, offset));
    }

    meta.frame_marker = Some(code);
    meta.precision = body[0];
    meta.height = u16::from_be_bytes([body[1], body[2]]);
    meta.width = u16::from_be_bytes([body[3], body[4]]);
    meta.progressive = code == marker::SOF2;
    meta.components = body[6..6 + 3 * count]
        .chunks_exact(3)
        .map(|c| FrameComponent {
            id: c[0],
            h: c[1] >> 4,
            v: c[1] & 0x0F,
            tq: c[2],
        })
        .collect();
    Ok(())
}

fn parse_sos(
    meta: &JpegMetadata,
    body: &[u8],
    offset: usize,
    bytes: &[u8],
    data_start: usize,
) -> Result<ScanInfo> {
    let count = body.first().copied().unwrap_or(0) as usize;
    if count == 0 || body.len() < 1 + 2 * count + 3 {
        return Err(truncated(marker::SOS, offset));
    }

    let components = body[1..1 + 2 * count]
        .chunks_exact(2)
        .map(|c| {
            let dc_table = c[1] >> 4;
            let ac_table = c[1] & 0x0F;
            ScanComponent {
                id: c[0],
                dc_table,
                ac_table,
                dc_spec: meta.huffman_index(0, dc_table),
                ac_spec: meta.huffman_index(1, ac_table),
            }
        })
        .collect();
    let tail = &body[1 + 2 * count..];

    Ok(ScanInfo {
        components,
        ss: tail[0],
        se: tail[1],
        ah: tail[2] >> 4,
        al: tail[2] & 0x0F,
        restart_interval: meta.restart_interval,
        data_start,
        data_end: scan_end(bytes, data_start),
    })
}

/// Offset of the 0xFF that ends the entropy-coded data starting at `start`.
fn scan_end(bytes: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < bytes.len() {
        if bytes[i] != 0xFF {
            i += 1;
            continue;
        }
        let Some(&next) = bytes.get(i + 1) else {
            return bytes.len();
        };
        match next {
            0x00 => i += 2,
            m if marker::is_rst(m) => i += 2,
            0xFF => i += 1,
            m if m >= 0xC0 => return i,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Split stuffed entropy-coded data at its restart markers and undo the
/// byte stuffing in each interval.
pub fn unstuff_intervals(data: &[u8]) -> Vec<Vec<u8>> {
    let mut intervals = vec![Vec::with_capacity(data.len())];
    let mut i = 0;
    while i < data.len() {
        let byte = data[i];
        if byte == 0xFF {
            match data.get(i + 1) {
                Some(0x00) => {
                    push_last(&mut intervals, 0xFF);
                    i += 2;
                    continue;
                }
                Some(&m) if marker::is_rst(m) => {
                    intervals.push(Vec::new());
                    i += 2;
                    continue;
                }
                Some(0xFF) => {
                    i += 1;
                    continue;
                }
                _ => {}
            }
        }
        push_last(&mut intervals, byte);
        i += 1;
    }
    intervals
}

fn push_last(intervals: &mut [Vec<u8>], byte: u8) {
    if let Some(last) = intervals.last_mut() {
        last.push(byte);
    }
}

/// Undo byte stuffing and drop restart markers.
pub fn unstuff(data: &[u8]) -> Vec<u8> {
    unstuff_intervals(data).concat()
}

fn last_eoi(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(2)
        .rposition(|w| w[0] == 0xFF && w[1] == marker::EOI)
}

/// Bytes after the last EOI marker. Empty when there is no EOI.
pub fn trailing_data(bytes: &[u8]) -> &[u8] {
    match last_eoi(bytes) {
        Some(p) => &bytes[p + 2..],
        None => &[],
    }
}

/// `(present, size)` of data following the last EOI. Works on any buffer,
/// parsed or not.
pub fn check_trailing_data(bytes: &[u8]) -> (bool, usize) {
    let size = trailing_data(bytes).len();
    (size > 0, size)
}
