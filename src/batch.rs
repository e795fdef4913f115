//! Parallel batch scanning
//!
//! A fixed rayon pool runs one job per path. Each job sends its finished
//! [`ScanResult`] down an mpsc channel; the calling thread is the only
//! receiver and keeps the running totals. The pool scope doubles as the join
//! barrier: it returns only after every job has finished, and the receive
//! loop ends once the last sender is gone. Results come back in completion
//! order.

use crate::analyzer::Scanner;
use crate::error::{Error, Result};
use crate::findings::{Level, ScanResult};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BatchTotals {
    pub total: usize,
    pub clean: usize,
    pub suspicious: usize,
    pub confirmed: usize,
    pub errors: usize,
}

impl BatchTotals {
    pub fn record(&mut self, result: &ScanResult) {
        self.total += 1;
        if result.error.is_some() {
            self.errors += 1;
            return;
        }
        match result.level {
            Level::Clean => self.clean += 1,
            Level::Suspicious => self.suspicious += 1,
            Level::ConfirmedC2 => self.confirmed += 1,
        }
    }
}

/// Scan `paths` on `workers` threads, calling `on_result` from the calling
/// thread as each file completes.
pub fn scan_paths<F>(
    scanner: &Scanner,
    paths: &[PathBuf],
    workers: usize,
    mut on_result: F,
) -> Result<(Vec<ScanResult>, BatchTotals)>
where
    F: FnMut(&ScanResult),
{
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| Error::Config(format!("worker pool: {}", e)))?;

    let (tx, rx) = mpsc::channel::<ScanResult>();
    let mut results = Vec::with_capacity(paths.len());
    let mut totals = BatchTotals::default();

    pool.in_place_scope(|scope| {
        for path in paths {
            let tx = tx.clone();
            scope.spawn(move |_| {
                // The receiver outlives every job
                let _ = tx.send(scanner.scan_file(path));
            });
        }
        drop(tx);

        for result in rx {
            totals.record(&result);
            on_result(&result);
            results.push(result);
        }
    });

    Ok((results, totals))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn write_png(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let img = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 16) as u8, (y * 16) as u8, 7, 255]));
        img.save(&path).unwrap();
        path
    }

    // ==========================================================================
    // TOTALS
    // ==========================================================================

    #[test]
    fn test_totals_record() {
        let mut totals = BatchTotals::default();
        let mut c2 = ScanResult::new("a");
        c2.add_finding("x", 10, Level::ConfirmedC2, "");
        let mut failed = ScanResult::new("b");
        failed.error = Some("boom".into());

        totals.record(&ScanResult::new("c"));
        totals.record(&c2);
        totals.record(&failed);

        assert_eq!(
            totals,
            BatchTotals {
                total: 3,
                clean: 1,
                suspicious: 0,
                confirmed: 1,
                errors: 1,
            }
        );
    }

    // ==========================================================================
    // POOL
    // ==========================================================================

    #[test]
    fn test_every_path_yields_one_result() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths: Vec<PathBuf> = (0..6).map(|i| write_png(dir.path(), &format!("{}.png", i))).collect();
        paths.push(dir.path().join("missing.png"));

        let mut seen = 0;
        let (results, totals) = scan_paths(&Scanner::new(), &paths, 3, |_| seen += 1).unwrap();

        assert_eq!(seen, 7);
        assert_eq!(results.len(), 7);
        assert_eq!(totals.total, 7);
        assert_eq!(totals.errors, 1);
        for path in &paths {
            let name = path.to_string_lossy();
            assert_eq!(results.iter().filter(|r| r.file_path == name).count(), 1);
        }
    }

    #[test]
    fn test_empty_batch() {
        let (results, totals) = scan_paths(&Scanner::new(), &[], 4, |_| {}).unwrap();
        assert!(results.is_empty());
        assert_eq!(totals, BatchTotals::default());
    }

    #[test]
    fn test_zero_workers_still_runs() {
        let dir = tempfile::tempdir().unwrap();
        let paths = vec![write_png(dir.path(), "one.png")];
        let (results, _) = scan_paths(&Scanner::new(), &paths, 0, |_| {}).unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].error.is_none());
    }
}
