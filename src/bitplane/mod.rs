//! Bit-plane model
//!
//! Vocabulary shared by every pixel-domain detector:
//!
//! - [`ChannelMask`]: how many low-order bits of each channel take part in
//!   the bit-stream. Channels are always consumed in R, G, B, A order.
//! - [`BitOrder`]: whether a channel's selected bits are read from the least
//!   or the most significant end.
//! - [`PixelGrid`]: an immutable RGBA8 raster. Row-major raster order defines
//!   the canonical bit-stream order.
//! - [`BitStream`]: the one iterator that turns a grid + mask + order into a
//!   stream of bits. Extraction, embedding and the LSB statistics all walk
//!   pixels through it, so the index arithmetic lives only here.

pub mod brute;
pub mod extract;

use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Channel {
    R,
    G,
    B,
    A,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::R, Channel::G, Channel::B, Channel::A];
    pub const RGB: [Channel; 3] = [Channel::R, Channel::G, Channel::B];

    pub fn index(self) -> usize {
        match self {
            Channel::R => 0,
            Channel::G => 1,
            Channel::B => 2,
            Channel::A => 3,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Channel::R => "R",
            Channel::G => "G",
            Channel::B => "B",
            Channel::A => "A",
        };
        write!(f, "{}", s)
    }
}

/// Per-channel bit counts. Always holds at least one bit in total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChannelMask {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl ChannelMask {
    pub const RED: ChannelMask = ChannelMask { r: 1, g: 0, b: 0, a: 0 };
    pub const GREEN: ChannelMask = ChannelMask { r: 0, g: 1, b: 0, a: 0 };
    pub const BLUE: ChannelMask = ChannelMask { r: 0, g: 0, b: 1, a: 0 };
    pub const RGB: ChannelMask = ChannelMask { r: 1, g: 1, b: 1, a: 0 };

    pub fn new(r: u8, g: u8, b: u8, a: u8) -> Result<Self> {
        if r > 8 || g > 8 || b > 8 || a > 8 || r as u32 + g as u32 + b as u32 + a as u32 == 0 {
            return Err(Error::InvalidMask);
        }
        Ok(Self { r, g, b, a })
    }

    /// Mask selecting `bits` low bits of a single channel.
    pub fn single(channel: Channel, bits: u8) -> Result<Self> {
        let mut counts = [0u8; 4];
        counts[channel.index()] = bits;
        Self::new(counts[0], counts[1], counts[2], counts[3])
    }

    pub fn counts(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn bits(&self, channel: Channel) -> u8 {
        self.counts()[channel.index()]
    }

    /// Bits contributed by one pixel.
    pub fn bits_per_pixel(&self) -> u32 {
        self.counts().iter().map(|&c| c as u32).sum()
    }
}

impl fmt::Display for ChannelMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.r == self.g && self.g == self.b && self.r > 0 && self.a == 0 {
            return write!(f, "RGB{}", self.r);
        }
        for (channel, bits) in Channel::ALL.iter().zip(self.counts()) {
            if bits > 0 {
                write!(f, "{}{}", channel, bits)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BitOrder {
    LsbFirst,
    MsbFirst,
}

impl BitOrder {
    pub const BOTH: [BitOrder; 2] = [BitOrder::LsbFirst, BitOrder::MsbFirst];

    /// Source bit position of stream bit `i` out of `bits` taken from a sample.
    #[inline]
    pub fn position(self, bits: u8, i: u8) -> u8 {
        match self {
            BitOrder::LsbFirst => i,
            BitOrder::MsbFirst => bits - 1 - i,
        }
    }

    #[inline]
    pub fn select(self, value: u8, bits: u8, i: u8) -> u8 {
        (value >> self.position(bits, i)) & 1
    }

    pub fn tag(self) -> &'static str {
        match self {
            BitOrder::LsbFirst => "lsb",
            BitOrder::MsbFirst => "msb",
        }
    }
}

/// Immutable RGBA8 raster in row-major order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelGrid {
    width: u32,
    height: u32,
    pixels: Vec<[u8; 4]>,
}

impl PixelGrid {
    pub fn new(width: u32, height: u32, pixels: Vec<[u8; 4]>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::EmptyGrid);
        }
        if pixels.len() as u64 != width as u64 * height as u64 {
            return Err(Error::GridSize {
                width,
                height,
                len: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build from an interleaved RGBA byte buffer.
    pub fn from_rgba(width: u32, height: u32, rgba: &[u8]) -> Result<Self> {
        if rgba.len() % 4 != 0 {
            return Err(Error::GridSize {
                width,
                height,
                len: rgba.len(),
            });
        }
        let pixels = rgba
            .chunks_exact(4)
            .map(|p| [p[0], p[1], p[2], p[3]])
            .collect();
        Self::new(width, height, pixels)
    }

    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Result<Self>
    where
        F: FnMut(u32, u32) -> [u8; 4],
    {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self::new(width, height, pixels)
    }

    pub fn from_image(image: &image::DynamicImage) -> Result<Self> {
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::from_rgba(width, height, rgba.as_raw())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn pixels(&self) -> &[[u8; 4]] {
        &self.pixels
    }

    /// Panics if `(x, y)` lies outside the grid.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        self.pixels[y as usize * self.width as usize + x as usize]
    }

    /// True when any pixel is not fully opaque.
    pub fn has_alpha(&self) -> bool {
        self.pixels.iter().any(|p| p[3] != 255)
    }

    pub fn bits(&self, mask: ChannelMask, order: BitOrder) -> BitStream<'_> {
        BitStream::new(self, mask, order)
    }
}

/// Raster-scan bit iterator over a [`PixelGrid`].
///
/// For each pixel, for each channel R→G→B→A, for `i in 0..mask.bits(ch)`,
/// yields `order.select(sample, bits, i)`.
#[derive(Debug, Clone)]
pub struct BitStream<'a> {
    pixels: &'a [[u8; 4]],
    counts: [u8; 4],
    order: BitOrder,
    pixel: usize,
    channel: usize,
    bit: u8,
    remaining: u64,
}

impl<'a> BitStream<'a> {
    pub fn new(grid: &'a PixelGrid, mask: ChannelMask, order: BitOrder) -> Self {
        let capacity = grid.pixels.len() as u64 * mask.bits_per_pixel() as u64;
        Self {
            pixels: &grid.pixels,
            counts: mask.counts(),
            order,
            pixel: 0,
            channel: 0,
            bit: 0,
            remaining: capacity,
        }
    }

    /// Total number of bits the stream yields from its start.
    pub fn capacity(grid: &PixelGrid, mask: ChannelMask) -> u64 {
        grid.pixels.len() as u64 * mask.bits_per_pixel() as u64
    }

    /// Bits not yet consumed.
    pub fn remaining(&self) -> u64 {
        self.remaining
    }

    /// Read `n` bits (n ≤ 32) as a big-endian unsigned integer.
    pub fn read_u32(&mut self, n: u32) -> Option<u32> {
        let mut value = 0u32;
        for _ in 0..n {
            value = (value << 1) | self.next()? as u32;
        }
        Some(value)
    }

    /// Read one MSB-first byte.
    pub fn read_byte(&mut self) -> Option<u8> {
        self.read_u32(8).map(|v| v as u8)
    }

    /// Advance to the next sample bit without reading it.
    pub(crate) fn next_slot(&mut self) -> Option<Slot> {
        loop {
            if self.pixel >= self.pixels.len() {
                return None;
            }
            if self.channel == 4 {
                self.channel = 0;
                self.pixel += 1;
                continue;
            }
            let bits = self.counts[self.channel];
            if self.bit >= bits {
                self.bit = 0;
                self.channel += 1;
                continue;
            }
            let slot = Slot {
                pixel: self.pixel,
                channel: self.channel,
                position: self.order.position(bits, self.bit),
            };
            self.bit += 1;
            self.remaining -= 1;
            return Some(slot);
        }
    }
}

/// Location of one stream bit: pixel index, channel index, bit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Slot {
    pub pixel: usize,
    pub channel: usize,
    pub position: u8,
}

impl Iterator for BitStream<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let slot = self.next_slot()?;
        Some((self.pixels[slot.pixel][slot.channel] >> slot.position) & 1)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = usize::try_from(self.remaining).unwrap_or(usize::MAX);
        (n, Some(n))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ==========================================================================
    // CHANNEL MASK TESTS
    // ==========================================================================

    #[test]
    fn test_mask_rejects_empty_and_oversized() {
        assert!(matches!(ChannelMask::new(0, 0, 0, 0), Err(Error::InvalidMask)));
        assert!(matches!(ChannelMask::new(9, 0, 0, 0), Err(Error::InvalidMask)));
        assert!(ChannelMask::new(0, 0, 0, 8).is_ok());
    }

    #[test]
    fn test_mask_labels() {
        assert_eq!(ChannelMask::RED.to_string(), "R1");
        assert_eq!(ChannelMask::RGB.to_string(), "RGB1");
        assert_eq!(ChannelMask::new(2, 0, 1, 0).unwrap().to_string(), "R2B1");
        assert_eq!(ChannelMask::new(1, 1, 1, 1).unwrap().to_string(), "R1G1B1A1");
    }

    #[test]
    fn test_single_channel_mask() {
        let mask = ChannelMask::single(Channel::B, 2).unwrap();
        assert_eq!(mask.counts(), [0, 0, 2, 0]);
        assert!(ChannelMask::single(Channel::G, 0).is_err());
    }

    // ==========================================================================
    // BIT ORDER TESTS
    // ==========================================================================

    #[test]
    fn test_bit_order_positions() {
        // 0b110 with 3 bits: LSB-first walks bit 0 upward, MSB-first bit 2 downward
        let v = 0b0000_0110u8;
        let lsb: Vec<u8> = (0..3).map(|i| BitOrder::LsbFirst.select(v, 3, i)).collect();
        let msb: Vec<u8> = (0..3).map(|i| BitOrder::MsbFirst.select(v, 3, i)).collect();
        assert_eq!(lsb, vec![0, 1, 1]);
        assert_eq!(msb, vec![1, 1, 0]);
    }

    // ==========================================================================
    // PIXEL GRID TESTS
    // ==========================================================================

    #[test]
    fn test_grid_validation() {
        assert!(matches!(PixelGrid::new(0, 4, vec![]), Err(Error::EmptyGrid)));
        assert!(matches!(
            PixelGrid::new(2, 2, vec![[0; 4]; 3]),
            Err(Error::GridSize { .. })
        ));
        assert!(PixelGrid::from_rgba(1, 1, &[1, 2, 3]).is_err());
        let g = PixelGrid::from_rgba(1, 2, &[1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        assert_eq!(g.pixel(0, 1), [5, 6, 7, 8]);
    }

    // ==========================================================================
    // BIT STREAM TESTS
    // ==========================================================================
    //
    // The raster walk is the single place where pixel/channel/bit indices are
    // computed, so it gets checked on its own before any detector relies on it.
    // ==========================================================================

    #[test]
    fn test_stream_raster_order_and_channel_order() {
        // Two pixels, R and B one bit each: R0 B0 R1 B1
        let grid = PixelGrid::new(2, 1, vec![[1, 0, 0, 255], [0, 0, 1, 255]]).unwrap();
        let mask = ChannelMask::new(1, 0, 1, 0).unwrap();
        let bits: Vec<u8> = grid.bits(mask, BitOrder::LsbFirst).collect();
        assert_eq!(bits, vec![1, 0, 0, 1]);
    }

    #[test]
    fn test_stream_multi_bit_orders() {
        let grid = PixelGrid::new(1, 1, vec![[0b10, 0, 0, 0]]).unwrap();
        let mask = ChannelMask::new(2, 0, 0, 0).unwrap();
        let lsb: Vec<u8> = grid.bits(mask, BitOrder::LsbFirst).collect();
        let msb: Vec<u8> = grid.bits(mask, BitOrder::MsbFirst).collect();
        assert_eq!(lsb, vec![0, 1]);
        assert_eq!(msb, vec![1, 0]);
    }

    #[test]
    fn test_stream_capacity_and_remaining() {
        let grid = PixelGrid::new(3, 2, vec![[0; 4]; 6]).unwrap();
        let mask = ChannelMask::new(2, 1, 0, 1).unwrap();
        assert_eq!(BitStream::capacity(&grid, mask), 24);

        let mut stream = grid.bits(mask, BitOrder::LsbFirst);
        assert_eq!(stream.size_hint(), (24, Some(24)));
        stream.read_u32(10).unwrap();
        assert_eq!(stream.remaining(), 14);
        assert_eq!(stream.count(), 14);
    }

    #[test]
    fn test_stream_read_u32_exhaustion() {
        let grid = PixelGrid::new(4, 1, vec![[255; 4]; 4]).unwrap();
        let mut stream = grid.bits(ChannelMask::RED, BitOrder::LsbFirst);
        assert_eq!(stream.read_u32(4), Some(0b1111));
        assert_eq!(stream.read_u32(1), None);
    }
}
