use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;

use cif_shift_augment::analysis::{self, AnalysisInputs};
use cif_shift_augment::logging;
use cif_shift_augment::output::{JsonOutput, OutputMode, TextOutput};

#[derive(Parser)]
#[command(name = "compare-csp")]
#[command(about = "Plot predicted chemical-shift distributions against BMRB reference data")]
#[command(version)]
struct Cli {
    /// BMRB statistics CSV (first line skipped, second line header)
    #[arg(long)]
    bmrb_csv: PathBuf,

    /// BMRB reference shifts JSON
    #[arg(long)]
    bmrb_cs: PathBuf,

    /// Predicted shifts JSON keyed by entry and predictor
    #[arg(long)]
    all_cs: PathBuf,

    /// Random-coil shift lookup JSON
    #[arg(long)]
    rccs_lookup: PathBuf,

    #[arg(long, default_value = ".")]
    output_dir: PathBuf,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run() -> miette::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let inputs = AnalysisInputs::load(&cli.bmrb_csv, &cli.bmrb_cs, &cli.all_cs, &cli.rccs_lookup)?;
    let report = analysis::run(&inputs, &cli.output_dir)?;

    match OutputMode::from_flag(cli.json) {
        OutputMode::Json => JsonOutput::print_analysis(&report).into_diagnostic()?,
        OutputMode::Text => TextOutput::print_analysis(&report).into_diagnostic()?,
    }
    Ok(())
}
