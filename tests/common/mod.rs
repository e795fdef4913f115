//! Shared fixtures for integration tests.
//!
//! Everything is synthesised in code: deterministic noise grids and a tiny
//! baseline JPEG whose Huffman tables are simple enough to write scan bytes
//! by hand (DC: `0` size 0, `1` size 2; AC: `0` EOB, `1` run 0 size 1).
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use stegscan::PixelGrid;

/// Deterministic xorshift noise, alpha fully opaque.
pub fn noisy(width: u32, height: u32) -> PixelGrid {
    let mut state = 0x2545_F491u32;
    PixelGrid::from_fn(width, height, |_, _| {
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 17;
            state ^= state << 5;
            (state >> 24) as u8
        };
        [next(), next(), next(), 255]
    })
    .unwrap()
}

pub fn black(width: u32, height: u32) -> PixelGrid {
    PixelGrid::from_fn(width, height, |_, _| [0, 0, 0, 255]).unwrap()
}

/// Encode `grid` as a PNG at `dir/name`.
pub fn write_png(dir: &Path, name: &str, grid: &PixelGrid) -> PathBuf {
    let raw: Vec<u8> = grid.pixels().iter().flatten().copied().collect();
    let img = image::RgbaImage::from_raw(grid.width(), grid.height(), raw).unwrap();
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

/// Encode a textured RGB photo stand-in as a JPEG at `dir/name`.
pub fn write_jpeg(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let grid = noisy(width, height);
    let img = image::RgbImage::from_fn(width, height, |x, y| {
        let [r, g, b, _] = grid.pixel(x, y);
        // Gradient plus mild noise, like a real scene
        image::Rgb([
            ((x * 3) as u8).wrapping_add(r / 8),
            ((y * 2) as u8).wrapping_add(g / 8),
            (((x + y) * 2) as u8).wrapping_add(b / 8),
        ])
    });
    let path = dir.join(name);
    img.save(&path).unwrap();
    path
}

pub fn segment(code: u8, body: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, code];
    out.extend(((body.len() + 2) as u16).to_be_bytes());
    out.extend_from_slice(body);
    out
}

/// Single-component SOF0 stream around hand-written scan bytes.
pub fn gray_baseline(width: u16, height: u16, scan: &[u8]) -> Vec<u8> {
    let mut out = vec![0xFF, 0xD8];

    let mut dqt = vec![0u8];
    dqt.extend([16u8; 64]);
    out.extend(segment(0xDB, &dqt));

    let mut sof = vec![8];
    sof.extend(height.to_be_bytes());
    sof.extend(width.to_be_bytes());
    sof.extend([1, 1, 0x11, 0]);
    out.extend(segment(0xC0, &sof));

    let mut dc = vec![0x00, 2];
    dc.extend([0u8; 15]);
    dc.extend([0x00, 0x02]);
    out.extend(segment(0xC4, &dc));

    let mut ac = vec![0x10, 2];
    ac.extend([0u8; 15]);
    ac.extend([0x00, 0x01]);
    out.extend(segment(0xC4, &ac));

    out.extend(segment(0xDA, &[1, 1, 0x00, 0, 63, 0]));
    out.extend_from_slice(scan);
    out.extend([0xFF, 0xD9]);
    out
}
