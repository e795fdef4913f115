//! LSB-plane statistics
//!
//! Natural images have LSB planes that are noisy but not *perfectly* noisy:
//! the split between zeros and ones is a little off, neighbouring bits are
//! slightly correlated, and there is no short repeating structure. Embedding
//! tools push the plane towards an exact 50/50 split with either perfect
//! randomness or visible regularity.
//!
//! # Metrics
//!
//! | Metric | Per channel | Meaning |
//! |--------|-------------|---------|
//! | entropy | yes | binary entropy of the LSB plane, 0..1 |
//! | transition rate | yes | raster-adjacent bit pairs that differ |
//! | first-order bias | yes | raster-adjacent bit pairs that agree (00/11) |
//! | uniformity | averaged | 1.0 at an exact 50/50 split |
//! | pattern score | averaged | period-2 repetition along rows/columns |
//! | chi-square | yes | even/odd balance of raw sample values |
//!
//! The anomaly score combines them:
//! `0.3·uniformity + 0.4·pattern + 0.3·|0.5 − bias|·2`, clamped to [0, 1].
//!
//! Every plane is read through the same [`BitStream`](crate::bitplane::BitStream)
//! the extractors use, with a one-bit single-channel mask.

use crate::bitplane::{BitOrder, Channel, ChannelMask, PixelGrid};
use crate::error::{Error, Result};
use serde::Serialize;
use std::fmt;

/// Chi-square below this means suspiciously even parity.
pub const PARITY_UNIFORM: f64 = 0.5;
/// Chi-square above this means suspiciously structured parity.
pub const PARITY_STRUCTURED: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Parity {
    Uniform,
    Normal,
    Structured,
}

impl Parity {
    pub fn classify(chi_square: f64) -> Self {
        if chi_square < PARITY_UNIFORM {
            Parity::Uniform
        } else if chi_square > PARITY_STRUCTURED {
            Parity::Structured
        } else {
            Parity::Normal
        }
    }
}

impl fmt::Display for Parity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parity::Uniform => write!(f, "uniform"),
            Parity::Normal => write!(f, "normal"),
            Parity::Structured => write!(f, "structured"),
        }
    }
}

/// Goodness-of-fit of one channel's even/odd sample values against 50/50.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParityTest {
    pub channel: Channel,
    pub even: u64,
    pub odd: u64,
    pub chi_square: f64,
    pub parity: Parity,
}

impl ParityTest {
    fn from_counts(channel: Channel, even: u64, odd: u64) -> Self {
        let chi_square = chi_square(even, odd);
        Self {
            channel,
            even,
            odd,
            chi_square,
            parity: Parity::classify(chi_square),
        }
    }
}

/// Two-category chi-square with expected count `N/2` for each.
fn chi_square(even: u64, odd: u64) -> f64 {
    let n = (even + odd) as f64;
    if n == 0.0 {
        return 0.0;
    }
    let expected = n / 2.0;
    [even, odd]
        .iter()
        .map(|&observed| {
            let d = observed as f64 - expected;
            d * d / expected
        })
        .sum()
}

/// Binary entropy of a zero/one split. 0 when either side is empty.
pub fn binary_entropy(zeros: u64, ones: u64) -> f64 {
    let n = (zeros + ones) as f64;
    if zeros == 0 || ones == 0 {
        return 0.0;
    }
    let p0 = zeros as f64 / n;
    let p1 = ones as f64 / n;
    -p0 * p0.log2() - p1 * p1.log2()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelLsbStats {
    pub channel: Channel,
    pub entropy: f64,
    pub zeros: u64,
    pub ones: u64,
    pub transition_rate: f64,
    pub first_order_bias: f64,
    pub uniformity: f64,
    pub pattern_score: f64,
    pub chi_square: f64,
    pub parity: Parity,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LsbDistribution {
    /// R, G, B, then A when the image has any transparency
    pub channels: Vec<ChannelLsbStats>,
    /// Mean entropy over R, G and B
    pub entropy: f64,
    pub uniformity: f64,
    pub pattern_score: f64,
    pub first_order_bias: f64,
    pub anomaly_score: f64,
}

impl LsbDistribution {
    pub fn channel(&self, channel: Channel) -> Option<&ChannelLsbStats> {
        self.channels.iter().find(|c| c.channel == channel)
    }
}

/// One channel's LSB plane in raster order.
fn lsb_plane(grid: &PixelGrid, channel: Channel) -> Result<Vec<u8>> {
    let mask = ChannelMask::single(channel, 1)?;
    Ok(grid.bits(mask, BitOrder::LsbFirst).collect())
}

/// Period-2 repetition rate: rows and columns scored separately, the
/// stronger direction wins.
fn pattern_score(plane: &[u8], width: usize, height: usize) -> f64 {
    if width <= 3 || height < 4 {
        return 0.0;
    }
    let repeats = |at: &dyn Fn(usize) -> u8, len: usize| {
        (3..len)
            .filter(|&i| at(i) == at(i - 2) && at(i - 1) == at(i - 3))
            .count() as f64
            / (len - 3) as f64
    };

    let rows: f64 = (0..height)
        .map(|y| repeats(&|x| plane[y * width + x], width))
        .sum::<f64>()
        / height as f64;
    let columns: f64 = (0..width)
        .map(|x| repeats(&|y| plane[y * width + x], height))
        .sum::<f64>()
        / width as f64;

    rows.max(columns)
}

fn channel_stats(grid: &PixelGrid, channel: Channel) -> Result<ChannelLsbStats> {
    let plane = lsb_plane(grid, channel)?;
    let n = plane.len() as u64;
    let ones = plane.iter().filter(|&&b| b == 1).count() as u64;
    let zeros = n - ones;

    let transitions = plane.windows(2).filter(|w| w[0] != w[1]).count() as u64;
    let (transition_rate, first_order_bias) = if n < 2 {
        (0.0, 0.5)
    } else {
        let pairs = (n - 1) as f64;
        (
            transitions as f64 / pairs,
            (n - 1 - transitions) as f64 / pairs,
        )
    };

    let half = n as f64 / 2.0;
    let uniformity = 1.0 - ((ones as f64 - half).abs() / half * 2.0).min(1.0);
    let parity = ParityTest::from_counts(channel, zeros, ones);

    Ok(ChannelLsbStats {
        channel,
        entropy: binary_entropy(zeros, ones),
        zeros,
        ones,
        transition_rate,
        first_order_bias,
        uniformity,
        pattern_score: pattern_score(&plane, grid.width() as usize, grid.height() as usize),
        chi_square: parity.chi_square,
        parity: parity.parity,
    })
}

/// Full LSB-plane statistics for every channel.
pub fn analyze_lsb(grid: &PixelGrid) -> Result<LsbDistribution> {
    if grid.is_empty() {
        return Err(Error::EmptyGrid);
    }

    let mut channels = Channel::RGB
        .iter()
        .map(|&ch| channel_stats(grid, ch))
        .collect::<Result<Vec<_>>>()?;
    let mean = |f: fn(&ChannelLsbStats) -> f64| channels.iter().map(f).sum::<f64>() / 3.0;

    let entropy = mean(|c| c.entropy);
    let uniformity = mean(|c| c.uniformity);
    let pattern = mean(|c| c.pattern_score);
    let bias = mean(|c| c.first_order_bias);
    let anomaly = (0.3 * uniformity + 0.4 * pattern + 0.3 * (0.5 - bias).abs() * 2.0).clamp(0.0, 1.0);

    if grid.has_alpha() {
        channels.push(channel_stats(grid, Channel::A)?);
    }

    Ok(LsbDistribution {
        channels,
        entropy,
        uniformity,
        pattern_score: pattern,
        first_order_bias: bias,
        anomaly_score: anomaly,
    })
}

/// Anomaly score together with the distribution it came from.
pub fn detect_anomaly(grid: &PixelGrid) -> Result<(f64, LsbDistribution)> {
    let distribution = analyze_lsb(grid)?;
    Ok((distribution.anomaly_score, distribution))
}

/// Even/odd balance of raw sample values in R, G and B.
pub fn chi_square_parity(grid: &PixelGrid) -> [ParityTest; 3] {
    let mut even = [0u64; 3];
    let mut odd = [0u64; 3];
    for pixel in grid.pixels() {
        for i in 0..3 {
            if pixel[i] % 2 == 0 {
                even[i] += 1;
            } else {
                odd[i] += 1;
            }
        }
    }
    Channel::RGB.map(|ch| {
        let i = ch.index();
        ParityTest::from_counts(ch, even[i], odd[i])
    })
}

/// Mean per-tile intensity variance, normalised by `ceiling` into [0, 1].
///
/// Intensity is the R/G/B mean scaled to 16 bits (`v * 257`). Edge tiles are
/// clipped to the image.
pub fn image_complexity(grid: &PixelGrid, tile: u32, ceiling: f64) -> f64 {
    if tile == 0 || ceiling <= 0.0 || grid.is_empty() {
        return 0.0;
    }
    let (width, height) = (grid.width(), grid.height());

    let mut total = 0.0;
    let mut tiles = 0usize;
    for ty in (0..height).step_by(tile as usize) {
        for tx in (0..width).step_by(tile as usize) {
            let samples: Vec<f64> = (ty..(ty + tile).min(height))
                .flat_map(|y| (tx..(tx + tile).min(width)).map(move |x| (x, y)))
                .map(|(x, y)| {
                    let [r, g, b, _] = grid.pixel(x, y);
                    (r as f64 + g as f64 + b as f64) * 257.0 / 3.0
                })
                .collect();
            let n = samples.len() as f64;
            let mean = samples.iter().sum::<f64>() / n;
            total += samples.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
            tiles += 1;
        }
    }

    (total / tiles as f64 / ceiling).min(1.0)
}
