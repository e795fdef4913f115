//! LSB extraction protocol
//!
//! Two ways of reading a payload out of the bit-stream:
//!
//! - **Length-prefixed**: the first 32 stream bits are a big-endian byte
//!   count N, the next N×8 bits are the payload. The header is read from the
//!   same stream as the payload; the stream is never restarted.
//! - **Raw**: no header. Bits are packed into MSB-first bytes until
//!   [`RAW_ZERO_RUN`](crate::config::RAW_ZERO_RUN) consecutive zero bytes
//!   appear, which is taken as the end of the message. Browser-based encoders
//!   commonly write this way.
//!
//! The embedders are the exact inverse and are used to calibrate the
//! detectors against known payloads.

use super::{BitOrder, BitStream, ChannelMask, PixelGrid};
use crate::error::{Error, Result};

const HEADER_BITS: u64 = 32;

/// Read a length-prefixed payload.
pub fn extract_length_prefixed(
    grid: &PixelGrid,
    mask: ChannelMask,
    order: BitOrder,
    max_len: u64,
) -> Result<Vec<u8>> {
    let mut stream = grid.bits(mask, order);
    let available = stream.remaining();

    let length = stream
        .read_u32(HEADER_BITS as u32)
        .ok_or(Error::InsufficientCapacity {
            needed: HEADER_BITS,
            available,
        })? as u64;

    if length == 0 || length > max_len {
        return Err(Error::InvalidLength {
            length,
            max: max_len,
        });
    }

    // Check before allocating so a bogus header never reserves gigabytes
    let needed = HEADER_BITS + length * 8;
    if needed > available {
        return Err(Error::InsufficientCapacity { needed, available });
    }

    let mut payload = Vec::with_capacity(length as usize);
    for _ in 0..length {
        let byte = stream
            .read_byte()
            .ok_or(Error::InsufficientCapacity { needed, available })?;
        payload.push(byte);
    }
    Ok(payload)
}

/// Read a header-less payload, ending at a run of `zero_run` zero bytes.
pub fn extract_raw(grid: &PixelGrid, mask: ChannelMask, order: BitOrder, zero_run: usize) -> Vec<u8> {
    let mut data = Vec::new();
    let mut byte = 0u8;
    let mut filled = 0u8;
    let mut zeros = 0usize;

    for bit in grid.bits(mask, order) {
        byte = (byte << 1) | bit;
        filled += 1;
        if filled < 8 {
            continue;
        }

        data.push(byte);
        if byte == 0 {
            zeros += 1;
            if zeros >= zero_run {
                data.truncate(data.len() - zero_run);
                return data;
            }
        } else {
            zeros = 0;
        }
        byte = 0;
        filled = 0;
    }

    // Partial trailing byte: left-align its bits
    if filled > 0 {
        data.push(byte << (8 - filled));
    }

    while data.last() == Some(&0) {
        data.pop();
    }
    data
}

/// Write `payload` behind a 32-bit big-endian length header.
pub fn embed_length_prefixed(
    grid: &PixelGrid,
    mask: ChannelMask,
    order: BitOrder,
    payload: &[u8],
) -> Result<PixelGrid> {
    let length = u32::try_from(payload.len()).map_err(|_| Error::InvalidLength {
        length: payload.len() as u64,
        max: u32::MAX as u64,
    })?;
    if length == 0 {
        return Err(Error::InvalidLength {
            length: 0,
            max: u32::MAX as u64,
        });
    }

    let mut framed = Vec::with_capacity(payload.len() + 4);
    framed.extend_from_slice(&length.to_be_bytes());
    framed.extend_from_slice(payload);
    embed_raw(grid, mask, order, &framed)
}

/// Write `payload` with no header. Stream bits past the payload are untouched.
pub fn embed_raw(grid: &PixelGrid, mask: ChannelMask, order: BitOrder, payload: &[u8]) -> Result<PixelGrid> {
    let needed = payload.len() as u64 * 8;
    let available = BitStream::capacity(grid, mask);
    if needed > available {
        return Err(Error::InsufficientCapacity { needed, available });
    }

    let mut slots = grid.bits(mask, order);
    let mut pixels = grid.pixels().to_vec();
    let bits = payload
        .iter()
        .flat_map(|&b| (0..8).rev().map(move |i| (b >> i) & 1));

    for bit in bits {
        let slot = slots
            .next_slot()
            .ok_or(Error::InsufficientCapacity { needed, available })?;
        let sample = &mut pixels[slot.pixel][slot.channel];
        *sample = (*sample & !(1 << slot.position)) | (bit << slot.position);
    }

    PixelGrid::new(grid.width(), grid.height(), pixels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MAX_PAYLOAD_LEN, RAW_ZERO_RUN};

    fn grid(width: u32, height: u32) -> PixelGrid {
        // Mid-grey with some variation so untouched bits are not all zero
        PixelGrid::from_fn(width, height, |x, y| {
            let v = ((x * 7 + y * 13) % 251) as u8;
            [v, v.wrapping_add(40), v.wrapping_add(90), 255]
        })
        .unwrap()
    }

    // ==========================================================================
    // ROUND TRIP
    // ==========================================================================
    //
    // Embedding then extracting with the same mask/order must give back the
    // exact payload for every mask shape, including multi-bit and alpha masks.
    // ==========================================================================

    #[test]
    fn test_round_trip_across_masks_and_orders() {
        let payload = b"exfil:10.0.0.7:4444\x00\xff\x01binary tail";
        let masks = [
            ChannelMask::RED,
            ChannelMask::BLUE,
            ChannelMask::RGB,
            ChannelMask::new(2, 0, 1, 0).unwrap(),
            ChannelMask::new(0, 3, 0, 2).unwrap(),
            ChannelMask::new(8, 8, 8, 8).unwrap(),
        ];
        let base = grid(32, 32);

        for mask in masks {
            for order in BitOrder::BOTH {
                let stego = embed_length_prefixed(&base, mask, order, payload).unwrap();
                let out = extract_length_prefixed(&stego, mask, order, MAX_PAYLOAD_LEN).unwrap();
                assert_eq!(out, payload, "mask {} order {:?}", mask, order);
            }
        }
    }

    #[test]
    fn test_wrong_order_does_not_round_trip() {
        let mask = ChannelMask::new(2, 0, 0, 0).unwrap();
        let stego = embed_length_prefixed(&grid(16, 16), mask, BitOrder::LsbFirst, b"abc").unwrap();
        let out = extract_length_prefixed(&stego, mask, BitOrder::MsbFirst, MAX_PAYLOAD_LEN);
        assert!(out.map(|d| d != b"abc").unwrap_or(true));
    }

    // ==========================================================================
    // CAPACITY BOUNDARY
    // ==========================================================================

    #[test]
    fn test_header_needs_32_bits() {
        // 31 pixels x 1 bit
        let small = grid(31, 1);
        let err = extract_length_prefixed(&small, ChannelMask::RED, BitOrder::LsbFirst, MAX_PAYLOAD_LEN)
            .unwrap_err();
        assert!(matches!(
            err,
            Error::InsufficientCapacity {
                needed: 32,
                available: 31
            }
        ));
    }

    #[test]
    fn test_exact_capacity_succeeds_one_bit_short_fails() {
        let payload = b"hi!";
        let exact_bits = 32 + payload.len() as u32 * 8;

        let exact = grid(exact_bits, 1);
        let stego = embed_length_prefixed(&exact, ChannelMask::RED, BitOrder::LsbFirst, payload).unwrap();
        let out = extract_length_prefixed(&stego, ChannelMask::RED, BitOrder::LsbFirst, MAX_PAYLOAD_LEN).unwrap();
        assert_eq!(out, payload);

        // Same header bits in a grid one pixel shorter
        let short = PixelGrid::new(exact_bits - 1, 1, stego.pixels()[..exact_bits as usize - 1].to_vec()).unwrap();
        let err = extract_length_prefixed(&short, ChannelMask::RED, BitOrder::LsbFirst, MAX_PAYLOAD_LEN)
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientCapacity { .. }));
    }

    #[test]
    fn test_embed_rejects_oversized_payload() {
        let err = embed_length_prefixed(&grid(8, 1), ChannelMask::RED, BitOrder::LsbFirst, b"x").unwrap_err();
        assert!(matches!(err, Error::InsufficientCapacity { needed: 40, available: 8 }));
    }

    // ==========================================================================
    // LENGTH BOUNDS
    // ==========================================================================

    #[test]
    fn test_zero_length_header_rejected() {
        let zeros = PixelGrid::new(64, 1, vec![[0, 0, 0, 255]; 64]).unwrap();
        for mask in [ChannelMask::RED, ChannelMask::RGB, ChannelMask::new(0, 2, 0, 0).unwrap()] {
            let err = extract_length_prefixed(&zeros, mask, BitOrder::LsbFirst, MAX_PAYLOAD_LEN).unwrap_err();
            assert!(matches!(err, Error::InvalidLength { length: 0, .. }));
        }
    }

    #[test]
    fn test_oversized_length_header_rejected() {
        // All ones decodes to 0xFFFFFFFF for any mask
        let ones = PixelGrid::new(64, 1, vec![[255; 4]; 64]).unwrap();
        for mask in [ChannelMask::RED, ChannelMask::RGB, ChannelMask::new(1, 1, 1, 1).unwrap()] {
            for order in BitOrder::BOTH {
                let err = extract_length_prefixed(&ones, mask, order, MAX_PAYLOAD_LEN).unwrap_err();
                assert!(matches!(err, Error::InvalidLength { length: 0xFFFF_FFFF, .. }));
            }
        }
    }

    #[test]
    fn test_configurable_maximum() {
        let stego = embed_length_prefixed(&grid(64, 64), ChannelMask::RED, BitOrder::LsbFirst, b"0123456789").unwrap();
        assert!(extract_length_prefixed(&stego, ChannelMask::RED, BitOrder::LsbFirst, 10).is_ok());
        let err = extract_length_prefixed(&stego, ChannelMask::RED, BitOrder::LsbFirst, 9).unwrap_err();
        assert!(matches!(err, Error::InvalidLength { length: 10, max: 9 }));
    }

    // ==========================================================================
    // RAW EXTRACTION
    // ==========================================================================

    fn blank(width: u32, height: u32) -> PixelGrid {
        PixelGrid::new(width, height, vec![[0, 0, 0, 255]; (width * height) as usize]).unwrap()
    }

    #[test]
    fn test_raw_stops_at_zero_run() {
        let stego = embed_raw(&blank(64, 64), ChannelMask::RED, BitOrder::LsbFirst, b"hello").unwrap();
        let out = extract_raw(&stego, ChannelMask::RED, BitOrder::LsbFirst, RAW_ZERO_RUN);
        assert_eq!(out, b"hello");
    }

    #[test]
    fn test_raw_keeps_short_zero_runs_inside_payload() {
        let mut payload = b"ab".to_vec();
        payload.extend_from_slice(&[0u8; 5]);
        payload.extend_from_slice(b"cd");
        let stego = embed_raw(&blank(64, 64), ChannelMask::RGB, BitOrder::MsbFirst, &payload).unwrap();
        let out = extract_raw(&stego, ChannelMask::RGB, BitOrder::MsbFirst, RAW_ZERO_RUN);
        assert_eq!(out, payload);
    }

    #[test]
    fn test_raw_all_zero_is_empty() {
        let out = extract_raw(&blank(100, 10), ChannelMask::RGB, BitOrder::LsbFirst, RAW_ZERO_RUN);
        assert!(out.is_empty());
    }

    #[test]
    fn test_raw_run_overridable() {
        let mut payload = b"x".to_vec();
        payload.extend_from_slice(&[0u8; 3]);
        payload.push(b'y');
        let stego = embed_raw(&blank(64, 2), ChannelMask::RED, BitOrder::LsbFirst, &payload).unwrap();
        assert_eq!(extract_raw(&stego, ChannelMask::RED, BitOrder::LsbFirst, 3), b"x");
        assert_eq!(extract_raw(&stego, ChannelMask::RED, BitOrder::LsbFirst, RAW_ZERO_RUN), payload);
    }

    #[test]
    fn test_raw_partial_byte_left_aligned() {
        // 12 bits: 0xAB then 0b1100 -> 0xAB, 0xC0
        let bits = [1, 0, 1, 0, 1, 0, 1, 1, 1, 1, 0, 0];
        let pixels = bits.iter().map(|&b| [b, 0, 0, 255]).collect();
        let g = PixelGrid::new(12, 1, pixels).unwrap();
        assert_eq!(
            extract_raw(&g, ChannelMask::RED, BitOrder::LsbFirst, RAW_ZERO_RUN),
            vec![0xAB, 0xC0]
        );
    }

    #[test]
    fn test_raw_trims_trailing_zeros_at_stream_end() {
        let stego = embed_raw(&blank(40, 1), ChannelMask::RED, BitOrder::LsbFirst, b"ok").unwrap();
        // 40 bits = 5 bytes, only 3 zero bytes follow: no run, trailing zeros trimmed
        assert_eq!(extract_raw(&stego, ChannelMask::RED, BitOrder::LsbFirst, RAW_ZERO_RUN), b"ok");
    }
}
