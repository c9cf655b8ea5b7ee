use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::Parser;
use miette::IntoDiagnostic;

use cif_shift_augment::catalog::BmrbHttpCatalog;
use cif_shift_augment::config::{ConfigLoader, RunSettings};
use cif_shift_augment::logging;
use cif_shift_augment::output::TextOutput;
use cif_shift_augment::pipeline::Pipeline;
use cif_shift_augment::predictions::{ENTRY_QUERY, REQUIRED_QUERIES};
use cif_shift_augment::query::PgQueryRunner;

#[derive(Parser)]
#[command(name = "augment-cif")]
#[command(about = "Augment AlphaFold mmCIF models with predicted chemical shifts")]
#[command(version)]
struct Cli {
    /// INI configuration holding the database and query sections
    #[arg(long)]
    cfg_file: PathBuf,

    /// Model file or directory searched recursively for .cif/.cif.gz
    #[arg(long)]
    af_path: PathBuf,

    /// Directory receiving <model>_augmented.cif files
    #[arg(long)]
    output_path: Utf8PathBuf,

    /// Model to BMRB entry mapping file
    #[arg(long)]
    mapping_file: Utf8PathBuf,
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
    logging::init(0);

    let config = ConfigLoader::default().load(&cli.cfg_file)?;
    let settings = RunSettings::from_config(&config, cli.mapping_file, cli.output_path)?;
    let runner = PgQueryRunner::new(config);
    runner.validate(&REQUIRED_QUERIES)?;
    runner.check_connection(ENTRY_QUERY)?;
    fs::create_dir_all(settings.output_dir.as_std_path()).into_diagnostic()?;

    let catalog = BmrbHttpCatalog::new()?;
    let pipeline = Pipeline::new(settings, runner, catalog);
    let report = pipeline.run_batch(&cli.af_path)?;
    TextOutput::print_batch(&report).into_diagnostic()?;
    Ok(())
}
