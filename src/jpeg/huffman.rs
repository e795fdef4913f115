//! Huffman decoding for baseline entropy-coded data
//!
//! Tables are canonical (ITU-T T.81 Annex C): codes of each length are
//! consecutive integers, so a table reduces to per-length `mincode`,
//! `maxcode` and an offset into the symbol list.

use super::parser::HuffmanSpec;
use crate::error::{Error, Result};

/// MSB-first bit reader over one unstuffed restart interval.
pub struct BitReader<'a> {
    data: &'a [u8],
    bit: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, bit: 0 }
    }

    pub fn read_bit(&mut self) -> Result<u8> {
        let byte = *self.data.get(self.bit / 8).ok_or(Error::HuffmanDecode)?;
        let value = (byte >> (7 - (self.bit % 8))) & 1;
        self.bit += 1;
        Ok(value)
    }

    pub fn read_bits(&mut self, count: u8) -> Result<u16> {
        let mut value = 0u16;
        for _ in 0..count {
            value = (value << 1) | self.read_bit()? as u16;
        }
        Ok(value)
    }

    /// Read `size` magnitude bits and sign-extend them (T.81 F.2.2.1).
    pub fn receive_extend(&mut self, size: u8) -> Result<i32> {
        if size == 0 {
            return Ok(0);
        }
        if size > 16 {
            return Err(Error::HuffmanDecode);
        }
        let value = self.read_bits(size)? as i32;
        Ok(extend(value, size))
    }

    pub fn bits_consumed(&self) -> usize {
        self.bit
    }
}

/// Values below `2^(size-1)` encode negatives.
pub fn extend(value: i32, size: u8) -> i32 {
    if size == 0 {
        return 0;
    }
    if value < 1 << (size - 1) {
        value - (1 << size) + 1
    } else {
        value
    }
}

#[derive(Debug, Clone)]
pub struct HuffmanTable {
    mincode: [i32; 17],
    maxcode: [i32; 17],
    valptr: [usize; 17],
    symbols: Vec<u8>,
}

impl HuffmanTable {
    pub fn build(spec: &HuffmanSpec) -> Result<Self> {
        let total: usize = spec.counts.iter().map(|&c| c as usize).sum();
        if total > spec.symbols.len() || total > 256 {
            return Err(Error::HuffmanDecode);
        }

        let mut mincode = [0i32; 17];
        let mut maxcode = [-1i32; 17];
        let mut valptr = [0usize; 17];
        let mut code = 0i32;
        let mut k = 0usize;

        for length in 1..=16 {
            let n = spec.counts[length - 1] as i32;
            if n > 0 {
                valptr[length] = k;
                mincode[length] = code;
                code += n;
                k += n as usize;
                maxcode[length] = code - 1;
            }
            // Over-subscribed: more codes than fit in `length` bits
            if code > 1 << length {
                return Err(Error::HuffmanDecode);
            }
            code <<= 1;
        }

        Ok(Self {
            mincode,
            maxcode,
            valptr,
            symbols: spec.symbols[..total].to_vec(),
        })
    }

    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<u8> {
        let mut code = 0i32;
        for length in 1..=16 {
            code = (code << 1) | reader.read_bit()? as i32;
            if code <= self.maxcode[length] {
                let index = self.valptr[length] + (code - self.mincode[length]) as usize;
                return self.symbols.get(index).copied().ok_or(Error::HuffmanDecode);
            }
        }
        Err(Error::HuffmanDecode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(counts: &[u8], symbols: &[u8]) -> HuffmanSpec {
        let mut padded = [0u8; 16];
        padded[..counts.len()].copy_from_slice(counts);
        HuffmanSpec {
            class: 0,
            id: 0,
            counts: padded,
            symbols: symbols.to_vec(),
        }
    }

    // Luminance DC table from T.81 Table K.3
    fn luminance_dc() -> HuffmanSpec {
        spec(&[0, 1, 5, 1, 1, 1, 1, 1, 1], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11])
    }

    #[test]
    fn test_decode_standard_dc_codes() {
        let table = HuffmanTable::build(&luminance_dc()).unwrap();
        // 00 | 010 | 110 | 1110 | padding
        let data = [0x16, 0xEF];
        let mut reader = BitReader::new(&data);
        let symbols: Vec<u8> = (0..4).map(|_| table.decode(&mut reader).unwrap()).collect();
        assert_eq!(symbols, vec![0, 1, 5, 6]);
        assert_eq!(reader.bits_consumed(), 12);
    }

    #[test]
    fn test_unknown_code_is_error() {
        let table = HuffmanTable::build(&spec(&[1], &[5])).unwrap();
        let data = [0xFF, 0xFF];
        let mut reader = BitReader::new(&data);
        assert!(matches!(table.decode(&mut reader), Err(Error::HuffmanDecode)));
    }

    #[test]
    fn test_rejects_bad_tables() {
        // Three one-bit codes cannot exist
        assert!(HuffmanTable::build(&spec(&[3], &[1, 2, 3])).is_err());
        // Counts promise more symbols than supplied
        assert!(HuffmanTable::build(&spec(&[0, 4], &[1, 2])).is_err());
    }

    #[test]
    fn test_reader_exhaustion() {
        let mut reader = BitReader::new(&[0b1010_0000]);
        assert_eq!(reader.read_bits(3).unwrap(), 0b101);
        assert_eq!(reader.read_bits(5).unwrap(), 0);
        assert!(reader.read_bit().is_err());
    }

    #[test]
    fn test_extend() {
        assert_eq!(extend(0, 0), 0);
        assert_eq!(extend(1, 1), 1);
        assert_eq!(extend(0, 1), -1);
        assert_eq!(extend(0b11, 2), 3);
        assert_eq!(extend(0b01, 2), -2);
        assert_eq!(extend(0b00, 2), -3);
        let mut reader = BitReader::new(&[0b0100_0000]);
        assert_eq!(reader.receive_extend(3).unwrap(), -5);
    }
}
