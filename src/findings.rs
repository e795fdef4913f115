//! Findings and per-file results
//!
//! Detectors report through [`ScanResult::add_finding`]. The overall
//! [`Level`] only ever goes up while a file is scanned. [`filter_findings`]
//! then drops low-value LSB noise and known-benign phrasings once all
//! detectors have run. It removes entries and leaves the recorded level alone.

use crate::bitplane::brute::ExtractionCandidate;
use crate::content::{has_strong_indicator, preview, FileType};
use serde::Serialize;
use std::fmt;
use std::path::Path;

/// Severity of a file or finding. Ordered: `Clean < Suspicious < ConfirmedC2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Default)]
pub enum Level {
    #[default]
    Clean,
    Suspicious,
    ConfirmedC2,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Clean => write!(f, "CLEAN"),
            Level::Suspicious => write!(f, "SUSPICIOUS"),
            Level::ConfirmedC2 => write!(f, "C2"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub description: String,
    /// 1 (weak) to 10 (certain)
    pub confidence: u8,
    pub level: Level,
    pub details: String,
}

/// Serializable summary of a bit-plane candidate.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateSummary {
    pub method: String,
    pub size: usize,
    pub file_type: FileType,
    pub quality: f64,
    pub preview: String,
}

impl From<&ExtractionCandidate> for CandidateSummary {
    fn from(c: &ExtractionCandidate) -> Self {
        Self {
            method: c.method(),
            size: c.data.len(),
            file_type: c.file_type,
            quality: c.quality,
            preview: preview(&c.data, 64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScanResult {
    pub file_path: String,
    pub file_name: String,
    pub level: Level,
    pub findings: Vec<Finding>,
    pub false_positive_likelihood: f64,
    pub lsb_entropy: Option<f64>,
    pub image_complexity: Option<f64>,
    pub candidates: Vec<CandidateSummary>,
    pub error: Option<String>,
}

impl ScanResult {
    pub fn new(file_path: &str) -> Self {
        let file_name = Path::new(file_path)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| file_path.to_string());
        Self {
            file_path: file_path.to_string(),
            file_name,
            level: Level::Clean,
            findings: Vec::new(),
            false_positive_likelihood: 0.0,
            lsb_entropy: None,
            image_complexity: None,
            candidates: Vec::new(),
            error: None,
        }
    }

    /// Record a finding. Confidence is clamped to 1..=10 and the result's
    /// level is raised to `level` if that is higher.
    pub fn add_finding(
        &mut self,
        description: impl Into<String>,
        confidence: u8,
        level: Level,
        details: impl Into<String>,
    ) {
        self.findings.push(Finding {
            description: description.into(),
            confidence: confidence.clamp(1, 10),
            level,
            details: details.into(),
        });
        self.level = self.level.max(level);
    }

    /// Highest confidence among the findings, 0 when there are none.
    pub fn max_confidence(&self) -> u8 {
        self.findings.iter().map(|f| f.confidence).max().unwrap_or(0)
    }
}

/// Wording used by detectors for observations that are normal in most images.
pub const BENIGN_PHRASES: &[&str] = &[
    "slight variation in lsb",
    "minor statistical anomaly",
    "low entropy distribution",
    "standard jpeg pattern",
];

/// Confidence an LSB finding needs to survive without a strong indicator.
pub const LSB_MIN_CONFIDENCE: u8 = 9;

fn is_benign(finding: &Finding) -> bool {
    let description = finding.description.to_lowercase();
    let details = finding.details.to_lowercase();
    BENIGN_PHRASES
        .iter()
        .any(|p| description.contains(p) || details.contains(p))
}

fn is_weak_lsb(finding: &Finding) -> bool {
    finding.description.contains("LSB")
        && finding.confidence < LSB_MIN_CONFIDENCE
        && !has_strong_indicator(&finding.details)
}

/// Drop weak LSB findings and known-benign phrasings.
pub fn filter_findings(mut result: ScanResult) -> ScanResult {
    result
        .findings
        .retain(|f| !is_weak_lsb(f) && !is_benign(f));
    result
}
