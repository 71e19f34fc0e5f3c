//! unpii CLI - find and mask personal information in documents

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};

use unpii::pdf::PdfDocument;
use unpii::pipeline::skipped_report;
use unpii::{
    Document, DocumentFormat, JsonLinesAuditSink, Pipeline, PipelineOptions, ScanReport,
    ScanStatus, ScanSummary, Settings, Severity,
};

#[derive(Parser)]
#[command(name = "unpii")]
#[command(author = "iyulab")]
#[command(version)]
#[command(about = "Find and mask personal information in documents", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GlobalArgs {
    /// Directory holding the tagger model (regex-only if not set)
    #[arg(long, global = true, env = "UNPII_MODEL_DIR", value_name = "DIR")]
    model_dir: Option<PathBuf>,

    /// Path of the tesseract binary
    #[arg(long, global = true, env = "UNPII_TESSERACT", value_name = "PATH")]
    tesseract: Option<PathBuf>,

    /// Rasterization DPI for OCR
    #[arg(long, global = true, value_name = "DPI")]
    dpi: Option<u32>,

    /// Per-document time budget in seconds
    #[arg(long, global = true, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Settings file (custom patterns, sensitive terms, policy)
    #[arg(long, global = true, env = "UNPII_SETTINGS", value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Append an audit record per document to this file
    #[arg(long, global = true, value_name = "FILE")]
    audit_log: Option<PathBuf>,

    /// User recorded in audit records
    #[arg(long, global = true)]
    user: Option<String>,

    /// Fail if the tagger model cannot be loaded
    #[arg(long, global = true)]
    require_model: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Count personal information in files
    Scan {
        /// Input files
        #[arg(value_name = "FILES", required = true)]
        inputs: Vec<PathBuf>,

        /// Print reports as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a masked copy of a file
    Mask {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (masked_<name> next to the input if not specified)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Mask inline text ("-" reads stdin)
    Text {
        /// Text to mask
        #[arg(value_name = "TEXT")]
        text: String,
    },

    /// Show document information
    Info {
        /// Input file
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },

    /// Show version information
    Version,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Scan { inputs, json } => cmd_scan(&cli.global, inputs, *json),
        Commands::Mask { input, output } => cmd_mask(&cli.global, input, output.as_deref()),
        Commands::Text { text } => cmd_text(&cli.global, text),
        Commands::Info { input } => cmd_info(&cli.global, input),
        Commands::Version => {
            cmd_version();
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn build_pipeline(args: &GlobalArgs) -> Result<Pipeline, Box<dyn std::error::Error>> {
    let mut options = PipelineOptions::new().require_model(args.require_model);
    if let Some(dir) = &args.model_dir {
        options = options.with_model_dir(dir);
    }
    if let Some(binary) = &args.tesseract {
        options = options.with_tesseract(binary);
    }
    if let Some(dpi) = args.dpi {
        options = options.with_dpi(dpi);
    }
    if let Some(secs) = args.timeout_secs {
        options = options.with_timeout(Duration::from_secs(secs));
    }

    let mut pipeline = Pipeline::new(options)?;
    if let Some(path) = &args.settings {
        pipeline = pipeline.with_settings(&Settings::load(path)?)?;
    }
    if let Some(path) = &args.audit_log {
        pipeline = pipeline.with_audit_sink(Arc::new(JsonLinesAuditSink::new(path)));
    }
    if let Some(user) = &args.user {
        pipeline = pipeline.with_user(user);
    }

    if !pipeline.engine().tagger().is_available() {
        log::info!("running regex-only detection");
    }
    Ok(pipeline)
}

fn cmd_scan(
    args: &GlobalArgs,
    inputs: &[PathBuf],
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = build_pipeline(args)?;

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );
    if json {
        pb.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let mut reports = Vec::with_capacity(inputs.len());
    for input in inputs {
        let name = display_name(input);
        pb.set_message(name.clone());
        let report = match Document::open(input) {
            Ok(doc) => pipeline.scan_document(&doc),
            Err(e) => {
                let size = fs::metadata(input).map(|m| m.len() as usize).unwrap_or(0);
                skipped_report(&name, size, &e)
            }
        };
        reports.push(report);
        pb.inc(1);
    }
    pb.finish_and_clear();

    let summary: ScanSummary = reports.iter().collect();
    let violations = pipeline.policy().evaluate(&reports);

    if json {
        let out = serde_json::json!({
            "documents": reports,
            "summary": summary,
            "violations": violations,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", "Scan Results".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    for report in &reports {
        print_report(report);
    }

    println!();
    println!("{}", "Summary".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    println!("{}: {}", "Documents".bold(), summary.documents);
    if summary.counts.is_empty() {
        println!("{}", "No personal information found".green());
    }
    for (label, count) in summary.counts.iter() {
        println!("{}: {}", label.display_name().bold(), count);
    }
    for (name, count) in &summary.custom_counts {
        println!("{}: {}", name.bold(), count);
    }
    if !summary.keyword_hits.is_empty() {
        let terms: Vec<&str> = summary.keyword_hits.iter().map(String::as_str).collect();
        println!("{}: {}", "Sensitive terms".bold(), terms.join(", "));
    }
    if !summary.processed_with_warnings.is_empty() {
        println!(
            "{}: {}",
            "Processed with warnings".yellow().bold(),
            summary.processed_with_warnings.join(", ")
        );
    }

    for violation in &violations {
        match violation.severity {
            Severity::Block => println!("{}", violation.to_string().red()),
            Severity::Warn => println!("{}", violation.to_string().yellow()),
        }
    }

    Ok(())
}

fn print_report(report: &ScanReport) {
    let status = match report.status {
        ScanStatus::Complete if report.is_sensitive() => "PII".red().bold(),
        ScanStatus::Complete => "clean".green(),
        ScanStatus::Skipped => "skipped".dimmed(),
        ScanStatus::Failed => "failed".yellow(),
    };
    println!("{} [{}] {}", "├─".dimmed(), status, report.name);

    let mut found: Vec<String> = report
        .counts
        .iter()
        .map(|(label, count)| format!("{} {}", label.display_name(), count))
        .collect();
    found.extend(
        report
            .custom_counts
            .iter()
            .map(|(name, count)| format!("{} {}", name, count)),
    );
    if !found.is_empty() {
        println!("{}   {}", "│".dimmed(), found.join(", "));
    }
    if !report.keyword_hits.is_empty() {
        println!("{}   terms: {}", "│".dimmed(), report.keyword_hits.join(", "));
    }
    for warning in &report.warnings {
        println!("{}   {}", "│".dimmed(), warning.yellow());
    }
}

fn cmd_mask(
    args: &GlobalArgs,
    input: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = build_pipeline(args)?;
    let doc = Document::open(input)?;

    let pb = ProgressBar::new_spinner();
    pb.set_message(format!("Masking {}...", doc.name()));
    pb.enable_steady_tick(Duration::from_millis(100));
    let masked = pipeline.mask_document(&doc);
    pb.finish_and_clear();
    let masked = masked?;

    let path = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_output(input, &masked.name));
    fs::write(&path, masked.as_bytes())?;

    let found: Vec<String> = masked
        .counts
        .iter()
        .map(|(label, count)| format!("{} {}", label.display_name(), count))
        .collect();
    if found.is_empty() {
        println!("{}", "No personal information found".green());
    } else {
        println!("{}: {}", "Masked".bold(), found.join(", "));
    }
    println!("{} {}", "Saved to".green(), path.display());

    Ok(())
}

fn cmd_text(args: &GlobalArgs, text: &str) -> Result<(), Box<dyn std::error::Error>> {
    let input = if text == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        text.to_string()
    };

    let pipeline = build_pipeline(args)?;
    println!("{}", pipeline.mask_text(&input));
    Ok(())
}

fn cmd_info(args: &GlobalArgs, input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let pipeline = build_pipeline(args)?;
    let doc = Document::open(input)?;

    println!("{}", "Document Information".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());

    println!("{}: {}", "File".bold(), input.display());
    println!("{}: {}", "Format".bold(), doc.format());
    println!("{}: {}", "Content type".bold(), doc.content_type());
    println!("{}: {} bytes", "Size".bold(), doc.size());

    if doc.format() == DocumentFormat::Pdf {
        let pdf = PdfDocument::load_bytes(doc.data())?;
        println!("{}: {}", "Pages".bold(), pdf.page_count());
        println!("{}: {}", "Kind".bold(), pipeline.redactor().classify(&pdf)?);
    }

    println!();
    println!("{}", "Detection".cyan().bold());
    println!("{}", "─".repeat(40).dimmed());
    match pipeline.engine().tagger().unavailable_reason() {
        None => println!("{}: {}", "Tagger".bold(), "loaded".green()),
        Some(reason) => println!("{}: {} ({})", "Tagger".bold(), "regex-only".yellow(), reason),
    }

    Ok(())
}

fn cmd_version() {
    println!("{} {}", "unpii".cyan().bold(), env!("CARGO_PKG_VERSION"));
    println!("PII detection and masking tool");
    println!();
    println!("Repository: {}", "https://github.com/iyulab/unpii".dimmed());
    println!("License: MIT");
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

fn default_output(input: &Path, masked_name: &str) -> PathBuf {
    match input.parent() {
        Some(dir) => dir.join(masked_name),
        None => PathBuf::from(masked_name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output_next_to_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("list.csv");
        assert_eq!(
            default_output(&input, "masked_list.csv"),
            dir.path().join("masked_list.csv")
        );
        assert_eq!(
            default_output(Path::new("list.csv"), "masked_list.csv"),
            PathBuf::from("masked_list.csv")
        );
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "unpii",
            "scan",
            "a.txt",
            "b.pdf",
            "--json",
            "--dpi",
            "300",
            "--user",
            "kim",
        ])
        .unwrap();
        assert_eq!(cli.global.dpi, Some(300));
        assert_eq!(cli.global.user.as_deref(), Some("kim"));
        match cli.command {
            Commands::Scan { inputs, json } => {
                assert_eq!(inputs.len(), 2);
                assert!(json);
            }
            _ => panic!("expected scan"),
        }
    }
}
