//! DCT coefficient heuristics
//!
//! Embedding tools leave fingerprints in the histogram of quantized AC
//! coefficients. JSteg flattens the even/odd balance, F5 shrinks the ±1
//! bins, StegHide inflates zeros. The four known tools are one table of
//! predicates over the same [`CoefficientStats`]; a single detector walks it.

use super::dct::DctBlock;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CoefficientStats {
    /// AC coefficients examined
    pub total: usize,
    pub even_ratio: f64,
    pub odd_ratio: f64,
    pub zero_ratio: f64,
    pub one_ratio: f64,
    pub minus_one_ratio: f64,
    /// Shannon entropy of coefficient values
    pub entropy: f64,
    pub suspiciousness: f64,
}

/// Expected share of ±1 AC coefficients in a natural image.
const EXPECTED_ONE_RATIO: f64 = 0.15;

pub fn coefficient_histogram(blocks: &[DctBlock]) -> CoefficientStats {
    let mut values = std::collections::HashMap::<i16, usize>::new();
    let (mut even, mut zero, mut one, mut minus_one, mut total) = (0usize, 0usize, 0usize, 0usize, 0usize);

    for block in blocks {
        for &c in &block.coefficients[1..] {
            total += 1;
            match c {
                0 => zero += 1,
                1 => one += 1,
                -1 => minus_one += 1,
                _ => {}
            }
            if c % 2 == 0 {
                even += 1;
            }
            *values.entry(c).or_insert(0) += 1;
        }
    }

    if total == 0 {
        return CoefficientStats::default();
    }

    let n = total as f64;
    let entropy = values
        .values()
        .map(|&count| {
            let p = count as f64 / n;
            -p * p.log2()
        })
        .sum();

    let mut stats = CoefficientStats {
        total,
        even_ratio: even as f64 / n,
        odd_ratio: (total - even) as f64 / n,
        zero_ratio: zero as f64 / n,
        one_ratio: one as f64 / n,
        minus_one_ratio: minus_one as f64 / n,
        entropy,
        suspiciousness: 0.0,
    };

    let balance = (stats.even_ratio - 0.5).abs();
    if balance < 0.02 {
        stats.suspiciousness += (0.02 - balance) * 50.0;
    }
    if stats.one_ratio < EXPECTED_ONE_RATIO * 0.7 {
        stats.suspiciousness += (EXPECTED_ONE_RATIO - stats.one_ratio) * 10.0;
    }
    if stats.zero_ratio > 0.6 {
        stats.suspiciousness += (stats.zero_ratio - 0.6) * 5.0;
    }
    stats
}

/// Which coefficients carry payload bits for a given tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Selection {
    /// Non-zero AC coefficients
    NonZeroAc,
    /// Every coefficient, DC included
    All,
}

pub struct Signature {
    pub name: &'static str,
    pub matches: fn(&CoefficientStats) -> bool,
    pub selection: Selection,
}

impl std::fmt::Debug for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Signature")
            .field("name", &self.name)
            .field("selection", &self.selection)
            .finish()
    }
}

fn jsteg(s: &CoefficientStats) -> bool {
    (s.even_ratio - 0.5).abs() < 0.02
}

fn f5(s: &CoefficientStats) -> bool {
    s.one_ratio < 0.08 && s.minus_one_ratio < 0.08
}

fn steghide(s: &CoefficientStats) -> bool {
    s.zero_ratio > 0.65 && s.entropy < 2.0
}

fn outguess(s: &CoefficientStats) -> bool {
    (s.even_ratio - s.odd_ratio).abs() > 0.2
}

/// Known embedding tools, in priority order (later entries win).
pub const SIGNATURES: &[Signature] = &[
    Signature {
        name: "JSteg",
        matches: jsteg,
        selection: Selection::NonZeroAc,
    },
    Signature {
        name: "F5",
        matches: f5,
        selection: Selection::NonZeroAc,
    },
    Signature {
        name: "StegHide",
        matches: steghide,
        selection: Selection::All,
    },
    Signature {
        name: "OutGuess",
        matches: outguess,
        selection: Selection::NonZeroAc,
    },
];

#[derive(Debug, Clone)]
pub struct Detection {
    pub stats: CoefficientStats,
    /// Matching signatures in table order; empty unless suspicious
    pub matches: Vec<&'static Signature>,
}

impl Detection {
    pub fn is_suspicious(&self) -> bool {
        !self.matches.is_empty()
    }

    /// Best guess at the embedding tool.
    pub fn primary(&self) -> Option<&'static Signature> {
        self.matches.last().copied()
    }
}

/// Match `stats` against [`SIGNATURES`] once suspiciousness exceeds `threshold`.
pub fn detect(stats: &CoefficientStats, threshold: f64) -> Detection {
    let matches = if stats.suspiciousness > threshold {
        SIGNATURES.iter().filter(|s| (s.matches)(stats)).collect()
    } else {
        Vec::new()
    };
    Detection {
        stats: *stats,
        matches,
    }
}

/// Collect coefficient LSBs under `selection` and pack them MSB-first.
///
/// Packing stops after a zero byte once more than 10 bytes exist. A leading
/// 4-byte big-endian length that fits inside the data is honoured.
pub fn extract_coefficient_payload(blocks: &[DctBlock], selection: Selection) -> Vec<u8> {
    let start = match selection {
        Selection::NonZeroAc => 1,
        Selection::All => 0,
    };
    let bits = blocks.iter().flat_map(|b| {
        b.coefficients[start..]
            .iter()
            .filter(move |&&c| selection == Selection::All || c != 0)
            .map(|&c| (c & 1) as u8)
    });

    let mut out = Vec::new();
    let mut byte = 0u8;
    let mut filled = 0;
    for bit in bits {
        byte = (byte << 1) | bit;
        filled += 1;
        if filled < 8 {
            continue;
        }
        out.push(byte);
        if byte == 0 && out.len() > 10 {
            break;
        }
        byte = 0;
        filled = 0;
    }

    if out.len() > 4 {
        let declared = u32::from_be_bytes([out[0], out[1], out[2], out[3]]) as usize;
        if declared > 0 && declared < out.len() && 4 + declared <= out.len() {
            return out[4..4 + declared].to_vec();
        }
    }
    out
}

/// Rough payload capacity in bytes: 80% of non-zero AC coefficients, one
/// bit each.
pub fn estimated_capacity(blocks: &[DctBlock]) -> usize {
    let nonzero: usize = blocks
        .iter()
        .map(|b| b.coefficients[1..].iter().filter(|&&c| c != 0).count())
        .sum();
    (nonzero as f64 * 0.8) as usize / 8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(ac: &[i16]) -> DctBlock {
        let mut coefficients = [0i16; 64];
        coefficients[1..1 + ac.len()].copy_from_slice(ac);
        DctBlock {
            coefficients,
            block_x: 0,
            block_y: 0,
            component: 0,
        }
    }

    /// Blocks whose non-zero AC LSBs spell out `payload`: bit 1 → 1, bit 0 → 2.
    fn blocks_carrying(payload: &[u8]) -> Vec<DctBlock> {
        let coeffs: Vec<i16> = payload
            .iter()
            .flat_map(|&b| (0..8).rev().map(move |i| if (b >> i) & 1 == 1 { 1 } else { 2 }))
            .collect();
        coeffs.chunks(63).map(block).collect()
    }

    // ==========================================================================
    // HISTOGRAM
    // ==========================================================================

    #[test]
    fn test_histogram_of_natural_block() {
        let mut ac = vec![0i16; 20];
        ac.extend([1; 15]);
        ac.extend([-1; 10]);
        ac.extend([2; 18]);
        let stats = coefficient_histogram(&[block(&ac)]);

        assert_eq!(stats.total, 63);
        assert!((stats.zero_ratio - 20.0 / 63.0).abs() < 1e-9);
        assert!((stats.even_ratio - 38.0 / 63.0).abs() < 1e-9);
        assert!((stats.even_ratio + stats.odd_ratio - 1.0).abs() < 1e-9);
        assert_eq!(stats.suspiciousness, 0.0);
        assert!(!detect(&stats, 0.5).is_suspicious());
    }

    #[test]
    fn test_histogram_empty() {
        assert_eq!(coefficient_histogram(&[]), CoefficientStats::default());
    }

    // ==========================================================================
    // SIGNATURE TABLE
    // ==========================================================================

    #[test]
    fn test_all_zero_ac_matches_late_signatures() {
        let stats = coefficient_histogram(&[block(&[])]);
        assert!((stats.suspiciousness - 3.5).abs() < 1e-9);

        let detection = detect(&stats, 0.5);
        let names: Vec<&str> = detection.matches.iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["F5", "StegHide", "OutGuess"]);
        assert_eq!(detection.primary().map(|s| s.name), Some("OutGuess"));
    }

    #[test]
    fn test_balanced_parity_matches_jsteg() {
        // Alternating 3/2 across two blocks: 64 odd, 62 even
        let ac: Vec<i16> = (1..64).map(|i| if i % 2 == 0 { 2 } else { 3 }).collect();
        let stats = coefficient_histogram(&[block(&ac), block(&ac)]);
        let detection = detect(&stats, 0.5);
        assert!(detection.matches.iter().any(|s| s.name == "JSteg"));
        assert_eq!(detection.primary().map(|s| s.name), Some("F5"));
    }

    #[test]
    fn test_threshold_gates_matches() {
        let stats = coefficient_histogram(&[block(&[])]);
        assert!(detect(&stats, 10.0).matches.is_empty());
    }

    // ==========================================================================
    // PAYLOAD EXTRACTION
    // ==========================================================================

    #[test]
    fn test_extract_honours_length_prefix() {
        let blocks = blocks_carrying(&[0, 0, 0, 2, b'H', b'i', b'!']);
        assert_eq!(extract_coefficient_payload(&blocks, Selection::NonZeroAc), b"Hi");
    }

    #[test]
    fn test_extract_stops_after_zero_byte() {
        let mut payload = b"hello world!".to_vec();
        payload.push(0);
        payload.extend_from_slice(b"more");
        let blocks = blocks_carrying(&payload);
        assert_eq!(
            extract_coefficient_payload(&blocks, Selection::NonZeroAc),
            b"hello world!\0"
        );
    }

    #[test]
    fn test_extract_all_includes_dc() {
        let mut b = block(&[]);
        b.coefficients[0] = 1;
        // DC bit 1 then 63 zero bits
        let out = extract_coefficient_payload(&[b], Selection::All);
        assert_eq!(out[0], 0x80);
        assert!(extract_coefficient_payload(&[block(&[])], Selection::NonZeroAc).is_empty());
    }

    #[test]
    fn test_negative_coefficient_lsb() {
        // -1 and -3 are odd, -2 even
        let out = extract_coefficient_payload(&[block(&[-1, -2, -3, -1, -1, -2, -2, -1])], Selection::NonZeroAc);
        assert_eq!(out, vec![0b1011_1001]);
    }

    #[test]
    fn test_estimated_capacity() {
        assert_eq!(estimated_capacity(&[block(&[1; 20])]), 2);
        assert_eq!(estimated_capacity(&[]), 0);
    }
}
