//! Report generation for scan results
//!
//! - **JSON**: full results, findings and candidates, for programmatic use
//! - **CSV**: one row per file for spreadsheets
//!
//! ```ignore
//! use stegscan::report;
//!
//! // Format follows the extension
//! report::generate("scan.json", &results)?;
//! report::generate("scan.csv", &results)?;
//! ```

pub mod csv;
pub mod json;

use crate::batch::BatchTotals;
use crate::findings::ScanResult;
use serde::Serialize;
use std::io;
use std::path::Path;

/// Write a report, choosing JSON for `.json` and CSV for anything else.
pub fn generate<P: AsRef<Path>>(path: P, results: &[ScanResult]) -> io::Result<()> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    let mut file = std::fs::File::create(path)?;

    match ext.as_str() {
        "json" => json::write(&mut file, results),
        _ => csv::write(&mut file, results),
    }
}

/// Verdict counts as written into reports. Counting itself is
/// [`BatchTotals::record`]; this is only its serialized shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub total: usize,
    pub clean: usize,
    pub suspicious: usize,
    pub confirmed: usize,
    pub error: usize,
}

impl From<BatchTotals> for Summary {
    fn from(t: BatchTotals) -> Self {
        Self {
            total: t.total,
            clean: t.clean,
            suspicious: t.suspicious,
            confirmed: t.confirmed,
            error: t.errors,
        }
    }
}

impl Summary {
    pub fn from_results(results: &[ScanResult]) -> Self {
        let mut totals = BatchTotals::default();
        for r in results {
            totals.record(r);
        }
        totals.into()
    }
}
