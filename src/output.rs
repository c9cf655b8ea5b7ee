use std::io::{self, Write};

use serde::Serialize;

use crate::analysis::AnalysisReport;
use crate::pipeline::BatchReport;

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

impl OutputMode {
    pub fn from_flag(json: bool) -> Self {
        if json { OutputMode::Json } else { OutputMode::Text }
    }
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_analysis(report: &AnalysisReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

pub struct TextOutput;

impl TextOutput {
    pub fn print_batch(report: &BatchReport) -> io::Result<()> {
        let mut stdout = io::stdout();
        writeln!(
            stdout,
            "augmented: {}  already augmented: {}  no predictions: {}  failed: {}",
            report.augmented, report.already_augmented, report.no_predictions, report.failed
        )?;
        for entry in &report.entries {
            match (&entry.output, &entry.error) {
                (_, Some(error)) => writeln!(stdout, "  {} {}: {error}", entry.status, entry.input)?,
                (Some(output), None) => {
                    writeln!(stdout, "  {} {} -> {output}", entry.status, entry.input)?
                }
                (None, None) => writeln!(stdout, "  {} {}", entry.status, entry.input)?,
            }
        }
        Ok(())
    }

    pub fn print_analysis(report: &AnalysisReport) -> io::Result<()> {
        let mut stdout = io::stdout();
        writeln!(stdout, "plots written: {}", report.plots.len())?;
        for plot in &report.plots {
            writeln!(stdout, "  {plot}")?;
        }
        Ok(())
    }
}
