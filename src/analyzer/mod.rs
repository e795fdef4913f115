//! Per-file scanning
//!
//! [`Scanner`] runs every detector that applies to one file and turns their
//! outputs into [`Finding`](crate::findings::Finding)s:
//!
//! 1. **Pixel images** (PNG, BMP, GIF, ...): LSB statistics, parity test,
//!    brute-force bit-plane extraction, false-positive discount.
//! 2. **JPEG**: trailing data, marker walk, quantization tables, comments,
//!    marker order, loose plain text, polyglot signatures, DCT coefficient
//!    heuristics. The decoded pixels then go through the pixel checks too.
//!
//! Every detector failure is recorded as a low-confidence finding; a scan
//! never aborts part-way. Filtering runs once at the end.

pub mod false_positive;
pub mod jslsb;
pub mod stats;

use crate::bitplane::brute::{brute_force, ExtractionCandidate, Protocol};
use crate::bitplane::PixelGrid;
use crate::config::Config;
use crate::content::{has_strong_indicator, preview, printable_ratio, FileType};
use crate::error::Error;
use crate::findings::{filter_findings, CandidateSummary, Level, ScanResult};
use crate::jpeg::dct::decode_coefficients;
use crate::jpeg::heuristics::{coefficient_histogram, detect, estimated_capacity, extract_coefficient_payload};
use crate::jpeg::plaintext::scan_plaintext;
use crate::jpeg::structure::{
    abnormal_marker_sequence, assess_appended, polyglot_signature, quantization_deviation, suspicious_comment,
};
use crate::jpeg::{check_trailing_data, is_jpeg, marker, parse_metadata, trailing_data, JpegMetadata};
use false_positive::{discount, false_positive_likelihood, is_metadata_string, FalsePositiveInput};
use jslsb::{detect_js_lsb, extract_js_lsb};
use log::{debug, info, warn};
use stats::{chi_square_parity, detect_anomaly, image_complexity, Parity};
use std::path::Path;

/// Above this false-positive likelihood, statistical LSB findings are
/// recorded at [`Level::Clean`].
pub const LIKELY_FALSE_POSITIVE: f64 = 0.7;

const PREVIEW_LEN: usize = 80;

#[derive(Debug, Clone)]
pub struct Scanner {
    config: Config,
    brute_force: bool,
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

impl Scanner {
    pub fn new() -> Self {
        Self {
            config: Config::DEFAULT,
            brute_force: true,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    pub fn with_brute_force(mut self, enabled: bool) -> Self {
        self.brute_force = enabled;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Read, sniff and scan one file.
    pub fn scan_file<P: AsRef<Path>>(&self, path: P) -> ScanResult {
        let path = path.as_ref();
        let name = path.to_string_lossy().to_string();

        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(source) => {
                let err = Error::Io {
                    path: path.to_path_buf(),
                    source,
                };
                return self.failed(&name, "Failed to read file", err);
            }
        };

        if is_jpeg(&bytes) {
            let mut result = ScanResult::new(&name);
            let texts = self.analyze_jpeg(&mut result, &bytes);
            // Structure findings stand even when the pixels cannot be decoded
            match decode_grid(&bytes) {
                Ok(grid) => self.analyze_pixels(&mut result, &grid, false, &texts),
                Err(err) => {
                    warn!("{}: JPEG pixel decoding failed: {}", name, err);
                    result.add_finding("Pixel analysis unavailable", 2, Level::Clean, err.to_string());
                }
            }
            return self.finish(result);
        }

        let grid = match decode_grid(&bytes) {
            Ok(g) => g,
            Err(err) => return self.failed(&name, "Failed to decode image", err),
        };

        let is_png = FileType::detect(&bytes) == FileType::Png;
        let mut result = ScanResult::new(&name);
        self.analyze_pixels(&mut result, &grid, is_png, &[]);
        self.analyze_container(&mut result, &bytes, is_png);
        self.finish(result)
    }

    /// Scan an already decoded raster. `name` ending in `.png` enables the
    /// PNG compression allowance of the false-positive stage.
    pub fn scan_pixels(&self, name: &str, grid: &PixelGrid) -> ScanResult {
        let mut result = ScanResult::new(name);
        let is_png = name.to_lowercase().ends_with(".png");
        self.analyze_pixels(&mut result, grid, is_png, &[]);
        self.finish(result)
    }

    /// Scan raw JPEG bytes: structure, text and coefficients, no pixels.
    pub fn scan_jpeg(&self, name: &str, bytes: &[u8]) -> ScanResult {
        let mut result = ScanResult::new(name);
        self.analyze_jpeg(&mut result, bytes);
        self.finish(result)
    }

    fn failed(&self, name: &str, description: &str, err: Error) -> ScanResult {
        warn!("{}: {}", name, err);
        let mut result = ScanResult::new(name);
        result.add_finding(description, 5, Level::Clean, err.to_string());
        result.error = Some(err.to_string());
        result
    }

    fn finish(&self, result: ScanResult) -> ScanResult {
        let result = filter_findings(result);
        info!(
            "{}: {} ({} findings)",
            result.file_name,
            result.level,
            result.findings.len()
        );
        result
    }

    // ==========================================================================
    // PIXEL DOMAIN
    // ==========================================================================

    /// `known_texts` are strings other detectors already recovered from the
    /// same file; they count towards the metadata check.
    fn analyze_pixels(&self, result: &mut ScanResult, grid: &PixelGrid, is_png: bool, known_texts: &[String]) {
        let cfg = &self.config;

        let (anomaly, dist) = match detect_anomaly(grid) {
            Ok(v) => v,
            Err(err) => {
                warn!("{}: statistical analysis failed: {}", result.file_name, err);
                result.add_finding("Statistical analysis failed", 5, Level::Clean, err.to_string());
                return;
            }
        };
        let complexity = image_complexity(grid, cfg.complexity_tile, cfg.complexity_ceiling);
        let parity = chi_square_parity(grid);
        debug!(
            "{}: anomaly={:.4} entropy={:.4} uniformity={:.3} pattern={:.3} bias={:.3} complexity={:.3}",
            result.file_name,
            anomaly,
            dist.entropy,
            dist.uniformity,
            dist.pattern_score,
            dist.first_order_bias,
            complexity
        );
        result.lsb_entropy = Some(dist.entropy);
        result.image_complexity = Some(complexity);

        let candidates = if self.brute_force {
            brute_force(grid, cfg)
        } else {
            Vec::new()
        };
        result.candidates = candidates.iter().map(CandidateSummary::from).collect();

        let texts: Vec<String> = known_texts
            .iter()
            .cloned()
            .chain(
                candidates
                    .iter()
                    .filter(|c| c.file_type.is_text())
                    .map(|c| String::from_utf8_lossy(&c.data).to_string()),
            )
            .collect();
        let entropy_extreme = dist.entropy > cfg.perfect_entropy || dist.entropy < cfg.low_entropy;
        let likelihood = false_positive_likelihood(&FalsePositiveInput {
            is_png,
            lsb_anomaly: anomaly > cfg.statistical_anomaly || entropy_extreme,
            lsb_entropy: dist.entropy,
            image_complexity: complexity,
            texts: &texts,
        });
        result.false_positive_likelihood = likelihood;

        // Statistical findings share one discount and one level
        let stat_level = if likelihood > LIKELY_FALSE_POSITIVE {
            Level::Clean
        } else {
            Level::Suspicious
        };
        let statistical = |result: &mut ScanResult, description: &str, confidence: u8, details: String| {
            result.add_finding(description, discount(confidence, likelihood), stat_level, details);
        };

        let summary = format!(
            "anomaly score={:.4} uniformity={:.3} pattern={:.3} bias={:.3}",
            anomaly, dist.uniformity, dist.pattern_score, dist.first_order_bias
        );
        if anomaly > cfg.anomaly_high {
            statistical(result, "Highly anomalous LSB distribution", 9, summary);
        } else if anomaly > cfg.anomaly_unusual {
            statistical(result, "Unusual LSB distribution", 7, summary);
        }

        if dist.entropy > cfg.perfect_entropy {
            let confidence = if dist.entropy > cfg.lsb_entropy_threshold { 10 } else { 9 };
            statistical(
                result,
                "Perfect LSB entropy",
                confidence,
                format!("LSB entropy={:.4} (unnaturally random)", dist.entropy),
            );
        } else if dist.entropy < cfg.low_entropy {
            statistical(
                result,
                "Abnormally low LSB entropy",
                8,
                format!("LSB entropy={:.4} (unnaturally flat)", dist.entropy),
            );
        }

        // A constant plane repeats trivially; only flag structure in a live plane
        if dist.pattern_score > cfg.pattern_threshold && dist.entropy >= cfg.low_entropy {
            statistical(
                result,
                "Periodic LSB pattern",
                7,
                format!("pattern score={:.3}", dist.pattern_score),
            );
        }

        if parity.iter().all(|p| p.parity == Parity::Uniform) {
            statistical(
                result,
                "Uniform LSB parity",
                6,
                format!(
                    "chi-square R={:.4} G={:.4} B={:.4}",
                    parity[0].chi_square, parity[1].chi_square, parity[2].chi_square
                ),
            );
        }

        for candidate in &candidates {
            self.candidate_finding(result, candidate);
        }

        if self.brute_force && detect_js_lsb(&dist) {
            self.js_lsb_finding(result, grid);
        }
    }

    /// RGB-only layout of browser encoders. Only a C2 message is reported;
    /// plain text in the same layout is already covered by the brute force.
    fn js_lsb_finding(&self, result: &mut ScanResult, grid: &PixelGrid) {
        let Some(message) = extract_js_lsb(grid, &self.config) else {
            return;
        };
        if has_strong_indicator(&message) {
            result.add_finding(
                "C2 indicators in JavaScript LSB payload",
                10,
                Level::ConfirmedC2,
                preview(message.as_bytes(), PREVIEW_LEN),
            );
        } else {
            debug!(
                "{}: js-lsb message without indicators: {}",
                result.file_name,
                preview(message.as_bytes(), PREVIEW_LEN)
            );
        }
    }

    fn candidate_finding(&self, result: &mut ScanResult, c: &ExtractionCandidate) {
        let text = String::from_utf8_lossy(&c.data);
        let details = format!("{}: {}", c.method(), preview(&c.data, PREVIEW_LEN));

        if c.file_type.is_executable() || (c.file_type.is_text() && has_strong_indicator(&text)) {
            result.add_finding("C2 indicators in LSB payload", 10, Level::ConfirmedC2, details);
            return;
        }

        if c.file_type.is_text() {
            match c.protocol {
                Protocol::LengthPrefixed => {
                    result.add_finding("Length-prefixed text in LSB plane", 9, Level::Suspicious, details);
                }
                // Header-less text without indicators reads as noise more
                // often than not; it stays in the candidate list only
                Protocol::Raw => {
                    debug!("{}: raw LSB text {}", result.file_name, details);
                }
            }
        } else if c.file_type.has_signature() {
            result.add_finding(
                format!("Embedded {} file in LSB plane", c.file_type),
                8,
                Level::Suspicious,
                format!("{} ({} bytes, entropy={:.2})", c.method(), c.data.len(), c.entropy),
            );
        } else if c.protocol == Protocol::LengthPrefixed {
            result.add_finding(
                "Encrypted or compressed LSB payload",
                6,
                Level::Suspicious,
                format!("{} ({} bytes, entropy={:.2})", c.method(), c.data.len(), c.entropy),
            );
        }
    }

    /// Checks on the encoded file rather than its pixels.
    fn analyze_container(&self, result: &mut ScanResult, bytes: &[u8], is_png: bool) {
        if let Some(kind) = polyglot_signature(bytes) {
            result.add_finding(
                "Polyglot file detected",
                8,
                Level::Suspicious,
                format!("file also contains {} data", kind),
            );
        }
        if is_png {
            self.appended_finding(result, png_trailing(bytes), "IEND");
        }
    }

    fn appended_finding(&self, result: &mut ScanResult, tail: &[u8], end_marker: &str) {
        let Some(appended) = assess_appended(tail) else {
            return;
        };
        let text = String::from_utf8_lossy(tail);
        let details = format!(
            "{} bytes after {} ({}, entropy={:.2}): {}",
            appended.size,
            end_marker,
            appended.file_type,
            appended.entropy,
            preview(tail, PREVIEW_LEN)
        );

        if appended.file_type.is_executable() || (appended.printable && has_strong_indicator(&text)) {
            result.add_finding("C2 indicators in appended data", 10, Level::ConfirmedC2, details);
        } else {
            result.add_finding(
                format!("Appended data after {}", end_marker),
                appended.confidence.max(8),
                Level::Suspicious,
                details,
            );
        }
    }

    // ==========================================================================
    // JPEG
    // ==========================================================================

    /// Returns the plain-text fragments found in the file.
    fn analyze_jpeg(&self, result: &mut ScanResult, bytes: &[u8]) -> Vec<String> {
        let cfg = &self.config;

        // Independent of the marker walk so it survives malformed files
        let (has_trailing, size) = check_trailing_data(bytes);
        if has_trailing {
            debug!("{}: {} bytes after EOI", result.file_name, size);
            self.appended_finding(result, trailing_data(bytes), "EOI");
        }

        if let Some(kind) = polyglot_signature(bytes) {
            result.add_finding(
                "Polyglot file detected",
                8,
                Level::Suspicious,
                format!("file also contains {} data", kind),
            );
        }

        let meta = match parse_metadata(bytes) {
            Ok(m) => m,
            Err(err) => {
                warn!("{}: JPEG parse failed: {}", result.file_name, err);
                result.add_finding("Failed to parse JPEG structure", 5, Level::Suspicious, err.to_string());
                return Vec::new();
            }
        };
        debug!(
            "{}: {}x{} components={} progressive={} segments={}",
            result.file_name,
            meta.width,
            meta.height,
            meta.components.len(),
            meta.progressive,
            meta.segments.len()
        );

        for deviation in quantization_deviation(&meta.quant_tables, cfg.quant_deviation, cfg.quant_fraction) {
            if deviation.modified {
                result.add_finding(
                    "Non-standard quantization table",
                    3,
                    Level::Clean,
                    format!(
                        "table {}: {}/64 entries differ by more than {}",
                        deviation.table_id, deviation.deviations, cfg.quant_deviation
                    ),
                );
            }
        }

        for comment in &meta.comments {
            if has_strong_indicator(comment) {
                result.add_finding(
                    "C2 indicators in JPEG comment",
                    10,
                    Level::ConfirmedC2,
                    preview(comment.as_bytes(), PREVIEW_LEN),
                );
            } else if let Some(issue) = suspicious_comment(comment) {
                result.add_finding(
                    "Suspicious JPEG comment",
                    6,
                    Level::Suspicious,
                    format!("{}: {}", issue, preview(comment.as_bytes(), PREVIEW_LEN)),
                );
            }
        }

        if let Some(repeated) = abnormal_marker_sequence(&meta.markers) {
            result.add_finding(
                "Abnormal JPEG marker sequence",
                5,
                Level::Suspicious,
                format!("{} repeated back to back", marker::name(repeated)),
            );
        }

        let texts = scan_plaintext(bytes, &meta);
        for text in &texts {
            let details = preview(text.as_bytes(), PREVIEW_LEN);
            if has_strong_indicator(text) {
                result.add_finding("C2 indicators in hidden text", 10, Level::ConfirmedC2, details);
            } else if is_metadata_string(text) {
                debug!("{}: metadata-like text {}", result.file_name, details);
            } else {
                result.add_finding("Hidden text in JPEG data", 7, Level::Suspicious, details);
            }
        }

        self.analyze_coefficients(result, &meta, bytes);
        texts
    }

    fn analyze_coefficients(&self, result: &mut ScanResult, meta: &JpegMetadata, bytes: &[u8]) {
        let cfg = &self.config;
        let dct = match decode_coefficients(meta, bytes, cfg.max_dct_blocks) {
            Ok(d) => d,
            Err(Error::NotImplemented(what)) => {
                info!("{}: coefficient analysis skipped ({})", result.file_name, what);
                result.add_finding("Coefficient analysis unavailable", 2, Level::Clean, what);
                return;
            }
            Err(err) => {
                warn!("{}: coefficient decoding failed: {}", result.file_name, err);
                result.add_finding("Coefficient decoding failed", 4, Level::Clean, err.to_string());
                return;
            }
        };

        let stats = coefficient_histogram(&dct.blocks);
        let detection = detect(&stats, cfg.dct_suspiciousness);
        debug!(
            "{}: {} blocks, {} AC coefficients, suspiciousness={:.3}, capacity~{} bytes",
            result.file_name,
            dct.blocks.len(),
            stats.total,
            stats.suspiciousness,
            estimated_capacity(&dct.blocks)
        );

        let Some(signature) = detection.primary() else {
            return;
        };
        let names: Vec<&str> = detection.matches.iter().map(|s| s.name).collect();
        result.add_finding(
            format!("{} coefficient signature", signature.name),
            6,
            Level::Suspicious,
            format!(
                "suspiciousness={:.3} even={:.3} zero={:.3} ones={:.3} matches={}",
                stats.suspiciousness,
                stats.even_ratio,
                stats.zero_ratio,
                stats.one_ratio,
                names.join(",")
            ),
        );

        let payload = extract_coefficient_payload(&dct.blocks, signature.selection);
        let text = String::from_utf8_lossy(&payload);
        if printable_ratio(&payload) < cfg.text_confidence || text.trim().len() < cfg.min_text_length {
            return;
        }
        let details = format!("{}: {}", signature.name, preview(&payload, PREVIEW_LEN));
        if has_strong_indicator(&text) {
            result.add_finding("C2 indicators in DCT payload", 10, Level::ConfirmedC2, details);
        } else {
            result.add_finding("Readable text in DCT coefficients", 7, Level::Suspicious, details);
        }
    }
}

fn decode_grid(bytes: &[u8]) -> crate::error::Result<PixelGrid> {
    let img = image::load_from_memory(bytes).map_err(|e| Error::ImageDecode(e.to_string()))?;
    PixelGrid::from_image(&img)
}

/// Bytes after a PNG's IEND chunk (type + CRC).
fn png_trailing(bytes: &[u8]) -> &[u8] {
    let Some(pos) = bytes.windows(4).rposition(|w| w == b"IEND") else {
        return &[];
    };
    bytes.get(pos + 8..).unwrap_or(&[])
}
