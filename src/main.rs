use chrono::Local;
use clap::Parser;
use env_logger::Env;
use indicatif::{ProgressBar, ProgressStyle};
use log::warn;
use std::io::{self, Write};
use std::path::PathBuf;
use stegscan::batch::scan_paths;
use stegscan::{Config, Level, ScanResult, Scanner};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(name = "stegscan")]
#[command(author, version, about = "Detect data hidden in image bit-planes and JPEG structures")]
struct Args {
    /// File or directory to scan
    path: PathBuf,

    /// Output report file (.csv, .json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for auto-generated reports
    #[arg(long, default_value = "stegscan-reports")]
    report_dir: PathBuf,

    /// Don't auto-generate CSV report
    #[arg(long)]
    no_report: bool,

    /// Don't prompt to open report
    #[arg(long)]
    no_open: bool,

    /// Number of parallel workers (default: 4, or `workers` from --config)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// Skip bit-plane brute-force extraction (statistics only)
    #[arg(long)]
    no_brute_force: bool,

    /// JSON file overriding detection thresholds
    #[arg(long)]
    config: Option<PathBuf>,

    /// Show every finding and enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Only show summary
    #[arg(short, long)]
    quiet: bool,
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "bmp", "gif", "jpg", "jpeg", "tif", "tiff", "webp"];

fn main() {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(default_filter)).init();

    let config = match args.config {
        Some(ref path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    let workers = args.jobs.unwrap_or(config.workers);

    // Collect image files
    let files: Vec<PathBuf> = if args.path.is_dir() {
        WalkDir::new(&args.path)
            .into_iter()
            .filter_map(|e| match e {
                Ok(e) => Some(e),
                Err(err) => {
                    warn!("skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|e| e.file_type().is_file())
            .filter(|e| {
                e.path()
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                    .unwrap_or(false)
            })
            .map(|e| e.path().to_path_buf())
            .collect()
    } else {
        vec![args.path.clone()]
    };

    if files.is_empty() {
        eprintln!("No image files found (supported: {})", IMAGE_EXTENSIONS.join(", "));
        std::process::exit(1);
    }

    if !args.quiet {
        eprintln!("\x1b[1mStegscan - Hidden Payload Detector\x1b[0m");
        eprintln!("{}", "─".repeat(70));
        eprintln!("Found {} image file(s)\n", files.len());
    }

    let pb = if !args.quiet && files.len() > 1 {
        let pb = ProgressBar::new(files.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar().template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}") {
            pb.set_style(style.progress_chars("=>-"));
        }
        Some(pb)
    } else {
        None
    };

    let scanner = Scanner::new()
        .with_config(config)
        .with_brute_force(!args.no_brute_force);

    let outcome = scan_paths(&scanner, &files, workers, |r| {
        if let Some(ref pb) = pb {
            pb.inc(1);
            pb.set_message(r.file_name.clone());
        }
    });

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let (mut results, totals) = match outcome {
        Ok(o) => o,
        Err(e) => {
            eprintln!("Scan failed: {}", e);
            std::process::exit(1);
        }
    };
    results.sort_by(|a, b| a.file_path.cmp(&b.file_path));

    if !args.quiet {
        for r in &results {
            print_result(r, args.verbose);
        }
    }

    if !args.quiet {
        eprintln!("\n{}", "─".repeat(70));
        eprintln!("\x1b[1mSummary:\x1b[0m");
        eprintln!("  \x1b[32m✓ Clean:\x1b[0m      {}", totals.clean);
        eprintln!("  \x1b[33m? Suspicious:\x1b[0m {}", totals.suspicious);
        eprintln!("  \x1b[31m✗ C2:\x1b[0m         {}", totals.confirmed);
        if totals.errors > 0 {
            eprintln!("  \x1b[90mErrors:\x1b[0m       {}", totals.errors);
        }
    }

    let report_path = if let Some(ref output) = args.output {
        Some(output.clone())
    } else if !args.no_report {
        if let Err(e) = std::fs::create_dir_all(&args.report_dir) {
            warn!("cannot create {}: {}", args.report_dir.display(), e);
        }
        let timestamp = Local::now().format("%Y%m%d_%H%M%S");
        let filename = format!("stegscan_report_{}.csv", timestamp);
        Some(args.report_dir.join(filename))
    } else {
        None
    };

    if let Some(ref output_path) = report_path {
        if let Err(e) = stegscan::report::generate(output_path, &results) {
            eprintln!("Failed to write report: {}", e);
            std::process::exit(1);
        }
        if !args.quiet {
            eprintln!("\n\x1b[32mReport saved: {}\x1b[0m", output_path.display());
        }

        if !args.no_open && !args.quiet {
            eprint!("\nOpen report? [Y/n] ");
            io::stderr().flush().ok();

            let mut input = String::new();
            if io::stdin().read_line(&mut input).is_ok() {
                let input = input.trim().to_lowercase();
                if input.is_empty() || input == "y" || input == "yes" {
                    if let Err(e) = open::that(output_path) {
                        eprintln!("Failed to open report: {}", e);
                    }
                }
            }
        }
    }

    if !args.quiet {
        eprintln!("\n\x1b[90mScan complete.\x1b[0m");
    }

    if totals.confirmed > 0 {
        std::process::exit(2);
    } else if totals.suspicious > 0 {
        std::process::exit(1);
    }
}

fn print_result(r: &ScanResult, verbose: bool) {
    let color = if r.error.is_some() {
        "\x1b[90m" // Gray
    } else {
        match r.level {
            Level::Clean => "\x1b[32m",       // Green
            Level::Suspicious => "\x1b[33m",  // Yellow
            Level::ConfirmedC2 => "\x1b[31m", // Red
        }
    };
    let reset = "\x1b[0m";

    let top = r
        .findings
        .iter()
        .filter(|f| f.level > Level::Clean)
        .max_by_key(|f| (f.level, f.confidence))
        .map(|f| f.description.as_str())
        .or(r.error.as_deref())
        .unwrap_or("-");

    println!(
        "{}{:<13}{} {:>2}/10  fp={:.2}  {:<40}  {}",
        color,
        format!("[{}]", r.level),
        reset,
        r.max_confidence(),
        r.false_positive_likelihood,
        truncate(top, 40),
        &r.file_name
    );

    if verbose {
        for f in &r.findings {
            eprintln!("    [{}] {} ({}) {}", f.confidence, f.description, f.level, f.details);
        }
        for c in &r.candidates {
            eprintln!(
                "    candidate {} {} bytes {:?} q={:.2}: {}",
                c.method,
                c.size,
                c.file_type,
                c.quality,
                truncate(&c.preview, 48)
            );
        }
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
