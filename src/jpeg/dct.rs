//! Baseline DCT coefficient decoding
//!
//! Decodes the quantized coefficients of Huffman-coded sequential JPEGs
//! (SOF0/SOF1) without dequantizing or running the inverse DCT. Both
//! interleaved and single-component scans are handled, along with restart
//! intervals and per-component DC prediction. Progressive and arithmetic
//! coded frames are reported as not implemented.

use super::huffman::{BitReader, HuffmanTable};
use super::marker;
use super::parser::{
    parse_metadata, unstuff_intervals, FrameComponent, HuffmanSpec, JpegMetadata, QuantTable,
    ScanInfo,
};
use crate::config::MAX_DCT_BLOCKS;
use crate::error::{Error, Result};
use log::debug;

/// One 8x8 block of quantized coefficients in zigzag order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DctBlock {
    pub coefficients: [i16; 64],
    pub block_x: u32,
    pub block_y: u32,
    /// Index into the frame's component list
    pub component: usize,
}

#[derive(Debug, Clone)]
pub struct JpegDctData {
    /// Component-major, then row-major within each component
    pub blocks: Vec<DctBlock>,
    pub quant_tables: Vec<QuantTable>,
    pub huffman_tables: Vec<HuffmanSpec>,
    pub width: u16,
    pub height: u16,
    pub components: Vec<FrameComponent>,
    pub scans: Vec<ScanInfo>,
}

impl JpegDctData {
    /// Count of non-zero AC coefficients across all blocks.
    pub fn nonzero_ac(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| b.coefficients[1..].iter().filter(|&&c| c != 0).count())
            .sum()
    }
}

/// Parse `bytes` and decode every block of every scan.
pub fn parse_dct_coefficients(bytes: &[u8]) -> Result<JpegDctData> {
    let meta = parse_metadata(bytes)?;
    decode_coefficients(&meta, bytes, MAX_DCT_BLOCKS)
}

/// Decode using metadata already parsed from `bytes`, holding at most
/// `max_blocks` blocks in memory.
pub fn decode_coefficients(meta: &JpegMetadata, bytes: &[u8], max_blocks: u64) -> Result<JpegDctData> {
    let Some(frame_marker) = meta.frame_marker else {
        return Err(Error::TruncatedSegment {
            marker: marker::SOF0,
            offset: bytes.len(),
        });
    };
    if meta.progressive {
        return Err(Error::NotImplemented(
            "progressive JPEG (SOF2) coefficient decoding".into(),
        ));
    }
    if !meta.is_sequential_huffman() {
        return Err(Error::NotImplemented(format!(
            "{} coefficient decoding (arithmetic or lossless)",
            marker::name(frame_marker)
        )));
    }
    if meta.scans.is_empty() {
        return Err(Error::TruncatedSegment {
            marker: marker::SOS,
            offset: bytes.len(),
        });
    }

    let geometry = FrameGeometry::new(meta).ok_or(Error::TruncatedSegment {
        marker: frame_marker,
        offset: 0,
    })?;

    // The header alone decides the allocation, so check it before trusting it
    let total = geometry.padded_blocks();
    if total > max_blocks {
        return Err(Error::ResourceLimit {
            what: "DCT blocks",
            requested: total,
            limit: max_blocks,
        });
    }
    for scan in &meta.scans {
        let coded = geometry.coded_blocks(meta, scan);
        // Shortest possible block is a one-bit DC code plus a one-bit EOB
        let available = scan.data_end.saturating_sub(scan.data_start) as u64 * 4;
        if coded > available {
            return Err(Error::ResourceLimit {
                what: "coded blocks for scan data",
                requested: coded,
                limit: available,
            });
        }
    }

    let mut planes: Vec<Vec<[i16; 64]>> = geometry
        .planes
        .iter()
        .map(|p| vec![[0i16; 64]; p.padded_w * p.padded_h])
        .collect();

    for scan in &meta.scans {
        decode_scan(meta, &geometry, scan, bytes, &mut planes)?;
    }

    let mut blocks = Vec::with_capacity(total as usize);
    for (component, (plane, layout)) in planes.into_iter().zip(&geometry.planes).enumerate() {
        for (i, coefficients) in plane.into_iter().enumerate() {
            blocks.push(DctBlock {
                coefficients,
                block_x: (i % layout.padded_w) as u32,
                block_y: (i / layout.padded_w) as u32,
                component,
            });
        }
    }
    debug!("dct: decoded {} blocks in {} scans", blocks.len(), meta.scans.len());

    Ok(JpegDctData {
        blocks,
        quant_tables: meta.quant_tables.clone(),
        huffman_tables: meta.huffman_tables.clone(),
        width: meta.width,
        height: meta.height,
        components: meta.components.clone(),
        scans: meta.scans.clone(),
    })
}

/// Block layout of one component.
struct PlaneLayout {
    h: usize,
    v: usize,
    /// Blocks actually covering the image
    blocks_w: usize,
    blocks_h: usize,
    /// Blocks including MCU padding
    padded_w: usize,
    padded_h: usize,
}

struct FrameGeometry {
    mcus_x: usize,
    mcus_y: usize,
    planes: Vec<PlaneLayout>,
}

impl FrameGeometry {
    fn new(meta: &JpegMetadata) -> Option<Self> {
        let width = meta.width as usize;
        let height = meta.height as usize;
        if width == 0 || height == 0 || meta.components.is_empty() {
            return None;
        }
        if meta.components.iter().any(|c| c.h == 0 || c.v == 0) {
            return None;
        }
        let h_max = meta.components.iter().map(|c| c.h as usize).max()?;
        let v_max = meta.components.iter().map(|c| c.v as usize).max()?;
        let mcus_x = width.div_ceil(8 * h_max);
        let mcus_y = height.div_ceil(8 * v_max);

        let planes = meta
            .components
            .iter()
            .map(|c| {
                let (h, v) = (c.h as usize, c.v as usize);
                PlaneLayout {
                    h,
                    v,
                    blocks_w: (width * h).div_ceil(h_max).div_ceil(8),
                    blocks_h: (height * v).div_ceil(v_max).div_ceil(8),
                    padded_w: mcus_x * h,
                    padded_h: mcus_y * v,
                }
            })
            .collect();

        Some(Self {
            mcus_x,
            mcus_y,
            planes,
        })
    }

    fn padded_blocks(&self) -> u64 {
        self.planes
            .iter()
            .map(|p| p.padded_w as u64 * p.padded_h as u64)
            .sum()
    }

    /// Blocks the entropy coder must emit for `scan`.
    fn coded_blocks(&self, meta: &JpegMetadata, scan: &ScanInfo) -> u64 {
        let planes: Vec<&PlaneLayout> = scan
            .components
            .iter()
            .filter_map(|sc| meta.frame_component(sc.id))
            .filter_map(|(plane, _)| self.planes.get(plane))
            .collect();
        match planes.as_slice() {
            [single] => single.blocks_w as u64 * single.blocks_h as u64,
            many => {
                let per_mcu: u64 = many.iter().map(|p| (p.h * p.v) as u64).sum();
                self.mcus_x as u64 * self.mcus_y as u64 * per_mcu
            }
        }
    }
}

/// Per-scan decoding state for one component.
struct ScanPlane {
    plane: usize,
    dc: HuffmanTable,
    ac: HuffmanTable,
    pred: i32,
}

fn decode_scan(
    meta: &JpegMetadata,
    geometry: &FrameGeometry,
    scan: &ScanInfo,
    bytes: &[u8],
    planes: &mut [Vec<[i16; 64]>],
) -> Result<()> {
    let mut members = Vec::with_capacity(scan.components.len());
    for sc in &scan.components {
        let (plane, _) = meta.frame_component(sc.id).ok_or(Error::TruncatedSegment {
            marker: marker::SOS,
            offset: scan.data_start,
        })?;
        let dc = sc.dc_spec.and_then(|i| meta.huffman_tables.get(i));
        let ac = sc.ac_spec.and_then(|i| meta.huffman_tables.get(i));
        let (Some(dc), Some(ac)) = (dc, ac) else {
            return Err(Error::HuffmanDecode);
        };
        members.push(ScanPlane {
            plane,
            dc: HuffmanTable::build(dc)?,
            ac: HuffmanTable::build(ac)?,
            pred: 0,
        });
    }

    // Coding units are MCUs for interleaved scans, single blocks otherwise
    let single = members.len() == 1;
    let unit_count = if single {
        let layout = &geometry.planes[members[0].plane];
        layout.blocks_w * layout.blocks_h
    } else {
        geometry.mcus_x * geometry.mcus_y
    };

    let intervals = unstuff_intervals(&bytes[scan.data_start..scan.data_end]);
    let restart = scan.restart_interval as usize;
    let mut current = usize::MAX;
    let mut reader = BitReader::new(&[]);

    for u in 0..unit_count {
        let interval = if restart > 0 { u / restart } else { 0 };
        if interval != current {
            let data = intervals.get(interval).ok_or(Error::HuffmanDecode)?;
            reader = BitReader::new(data);
            for member in &mut members {
                member.pred = 0;
            }
            current = interval;
        }

        if single {
            let member = &mut members[0];
            let layout = &geometry.planes[member.plane];
            let (bx, by) = (u % layout.blocks_w, u / layout.blocks_w);
            let block = decode_block(&mut reader, &member.dc, &member.ac, &mut member.pred)?;
            store(&mut planes[member.plane], layout.padded_w, bx, by, block);
            continue;
        }

        let (mx, my) = (u % geometry.mcus_x, u / geometry.mcus_x);
        for member in &mut members {
            let layout = &geometry.planes[member.plane];
            for v in 0..layout.v {
                for h in 0..layout.h {
                    let block = decode_block(&mut reader, &member.dc, &member.ac, &mut member.pred)?;
                    store(
                        &mut planes[member.plane],
                        layout.padded_w,
                        mx * layout.h + h,
                        my * layout.v + v,
                        block,
                    );
                }
            }
        }
    }
    Ok(())
}

fn store(plane: &mut [[i16; 64]], padded_w: usize, bx: usize, by: usize, block: [i16; 64]) {
    if let Some(slot) = plane.get_mut(by * padded_w + bx) {
        *slot = block;
    }
}

fn clamp_i16(value: i32) -> i16 {
    value.clamp(i16::MIN as i32, i16::MAX as i32) as i16
}

fn decode_block(
    reader: &mut BitReader<'_>,
    dc: &HuffmanTable,
    ac: &HuffmanTable,
    pred: &mut i32,
) -> Result<[i16; 64]> {
    let mut zz = [0i16; 64];

    let size = dc.decode(reader)?;
    *pred += reader.receive_extend(size)?;
    zz[0] = clamp_i16(*pred);

    let mut k = 1;
    while k < 64 {
        let rs = ac.decode(reader)?;
        let run = (rs >> 4) as usize;
        let size = rs & 0x0F;
        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            break;
        }
        k += run;
        if k > 63 {
            return Err(Error::HuffmanDecode);
        }
        zz[k] = clamp_i16(reader.receive_extend(size)?);
        k += 1;
    }
    Ok(zz)
}
