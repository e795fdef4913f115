//! JSON report: summary plus every result.

use super::Summary;
use crate::findings::ScanResult;
use chrono::Local;
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct Report<'a> {
    generated: String,
    version: &'static str,
    summary: Summary,
    results: &'a [ScanResult],
}

pub fn write<W: Write>(writer: &mut W, results: &[ScanResult]) -> io::Result<()> {
    let report = Report {
        generated: Local::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        summary: Summary::from_results(results),
        results,
    };
    serde_json::to_writer_pretty(&mut *writer, &report)?;
    writeln!(writer)
}
