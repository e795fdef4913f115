//! CSV report: one row per file.

use crate::findings::ScanResult;
use std::io::{self, Write};

const HEADER: &str = "file_path,file_name,level,findings,max_confidence,false_positive_likelihood,lsb_entropy,image_complexity,candidates,top_finding,error";

pub fn write<W: Write>(writer: &mut W, results: &[ScanResult]) -> io::Result<()> {
    writeln!(writer, "{}", HEADER)?;

    for r in results {
        let top = r
            .findings
            .iter()
            .max_by_key(|f| (f.level, f.confidence))
            .map(|f| format!("{} ({})", f.description, f.details))
            .unwrap_or_default();
        let optional = |v: Option<f64>| v.map(|v| format!("{:.4}", v)).unwrap_or_default();

        writeln!(
            writer,
            "{},{},{},{},{},{:.2},{},{},{},{},{}",
            escape(&r.file_path),
            escape(&r.file_name),
            r.level,
            r.findings.len(),
            r.max_confidence(),
            r.false_positive_likelihood,
            optional(r.lsb_entropy),
            optional(r.image_complexity),
            r.candidates.len(),
            escape(&top),
            escape(r.error.as_deref().unwrap_or("")),
        )?;
    }

    Ok(())
}

/// Quote a field containing a delimiter, quote or line break.
fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
