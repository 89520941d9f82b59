//! Parse command - reconstruct vouchers from a saved export document.

use std::fs;
use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::{debug, info};

use vouch_core::{SalesSummary, VoucherEngine};

use super::load_config;
use super::output::{format_summary, format_vouchers, OutputFormat};

/// Arguments for the parse command.
#[derive(Args)]
pub struct ParseArgs {
    /// Export document (XML)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Voucher types to keep (overrides the configured policy)
    #[arg(short = 't', long = "type")]
    types: Vec<String>,

    /// Print totals and skipped record counts
    #[arg(long)]
    summary: bool,
}

pub async fn run(args: ParseArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Parsing file: {}", args.input.display());
    let raw = fs::read_to_string(&args.input)?;

    let engine = if args.types.is_empty() {
        VoucherEngine::with_allowed_types(config.extraction.allowed_types.iter().cloned())
    } else {
        VoucherEngine::with_allowed_types(args.types.iter().cloned())
    };

    let report = engine.reconstruct_text(&raw)?;
    debug!("Reconstruction took {}ms", report.processing_time_ms);

    let output = format_vouchers(&report.vouchers, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} {} vouchers written to {}",
            style("✓").green(),
            report.vouchers.len(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.summary {
        eprintln!();
        eprint!("{}", format_summary(&SalesSummary::from_vouchers(&report.vouchers)));
        eprintln!(
            "{} Skipped: {} empty, {} other types, {} faulty",
            style("ℹ").blue(),
            report.skipped_noise,
            report.skipped_type,
            report.skipped_faulty
        );
    }

    Ok(())
}
