//! Distribution plots comparing predicted chemical shifts with BMRB
//! reference data, one SVG per residue type and atom type.

pub mod histogram;
pub mod inputs;
pub mod svg;

use std::fs;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::catalog::{PREDICTOR_IDS, predictor_label};
use crate::error::AugmentError;
use histogram::{bin_edges, histogram, midpoints, rolling_mean};
use inputs::{PredictedShifts, RandomCoilTable, ReferenceShifts, ReferenceStats};

pub const BIN_COUNT: usize = 100;
pub const TAIL_AREA: f64 = 0.015;
pub const SMOOTHING_WINDOW: usize = 3;
pub const RANDOM_COIL_PH: f64 = 7.0;

/// One smoothed histogram, in percent of the series' own count.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub label: String,
    pub slot: usize,
    pub total: usize,
    pub points: Vec<(f64, Option<f64>)>,
}

impl Series {
    fn from_values(label: &str, slot: usize, values: &[f64], edges: &[f64]) -> Self {
        let counts = histogram(values, edges);
        let total = counts.iter().sum::<usize>();
        let smoothed = rolling_mean(&counts, SMOOTHING_WINDOW);
        let points = midpoints(edges)
            .into_iter()
            .zip(smoothed)
            .map(|(x, y)| {
                let percent = y.filter(|_| total > 0).map(|y| y / total as f64 * 100.0);
                (x, percent)
            })
            .collect();
        Self {
            label: format!("{label} ({total})"),
            slot,
            total,
            points,
        }
    }

    pub fn peak(&self) -> f64 {
        self.points
            .iter()
            .filter_map(|(_, y)| *y)
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DistributionPlot {
    pub residue: String,
    pub atom: String,
    pub edges: Vec<f64>,
    pub series: Vec<Series>,
    pub reference: Series,
    pub random_coil: Option<f64>,
    /// Highest smoothed predictor fraction; the random-coil marker reaches it.
    pub y_max: f64,
    pub reference_stats: IndexMap<String, String>,
}

impl DistributionPlot {
    pub fn file_name(&self) -> String {
        format!("{}_{}.svg", self.residue, self.atom)
    }

    pub fn y_limit(&self) -> f64 {
        self.series
            .iter()
            .chain(std::iter::once(&self.reference))
            .map(Series::peak)
            .fold(self.y_max * 100.0, f64::max)
    }
}

pub struct AnalysisInputs {
    pub stats: ReferenceStats,
    pub reference: ReferenceShifts,
    pub predictions: PredictedShifts,
    pub random_coil: RandomCoilTable,
}

impl AnalysisInputs {
    pub fn load(
        bmrb_csv: &Path,
        bmrb_cs: &Path,
        all_cs: &Path,
        rccs_lookup: &Path,
    ) -> Result<Self, AugmentError> {
        Ok(Self {
            stats: inputs::load_reference_stats(bmrb_csv)?,
            reference: inputs::load_reference_shifts(bmrb_cs)?,
            predictions: inputs::load_predictions(all_cs)?,
            random_coil: RandomCoilTable::load(rccs_lookup)?,
        })
    }
}

fn finite(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|value| value.is_finite()).collect()
}

/// Builds every plot the predictions support; combinations without a
/// finite value are left out.
pub fn build_plots(inputs: &AnalysisInputs) -> Vec<DistributionPlot> {
    let mut plots = Vec::new();
    for (residue, atoms) in &inputs.predictions {
        for (atom, predictors) in atoms {
            let reference = inputs
                .reference
                .get(residue)
                .and_then(|atoms| atoms.get(atom))
                .map(|values| finite(values))
                .unwrap_or_default();
            let predicted = predictors
                .iter()
                .map(|(id, values)| (*id, finite(values)))
                .collect::<Vec<_>>();

            let mut all = predicted
                .iter()
                .map(|(_, values)| values.as_slice())
                .collect::<Vec<_>>();
            all.push(&reference);
            let Some(edges) = bin_edges(&all, BIN_COUNT, TAIL_AREA) else {
                debug!(%residue, %atom, "no finite shifts, skipping");
                continue;
            };

            let series = predicted
                .iter()
                .map(|(id, values)| {
                    let slot = PREDICTOR_IDS
                        .iter()
                        .position(|known| known == id)
                        .unwrap_or(*id as usize);
                    let label = predictor_label(*id)
                        .map(str::to_string)
                        .unwrap_or_else(|| format!("predictor_{id}"));
                    Series::from_values(&label, slot, values, &edges)
                })
                .collect::<Vec<_>>();
            let y_max = series
                .iter()
                .map(|series| series.peak() / 100.0)
                .fold(0.0, f64::max);

            plots.push(DistributionPlot {
                residue: residue.clone(),
                atom: atom.clone(),
                reference: Series::from_values("BMRB", 0, &reference, &edges),
                series,
                random_coil: inputs.random_coil.lookup(residue, atom, RANDOM_COIL_PH),
                y_max,
                reference_stats: inputs
                    .stats
                    .get(&(residue.clone(), atom.clone()))
                    .cloned()
                    .unwrap_or_default(),
                edges,
            });
        }
    }
    plots
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub generated_at: String,
    pub plots: Vec<String>,
}

pub fn write_plots(
    plots: &[DistributionPlot],
    output_dir: &Path,
) -> Result<Vec<PathBuf>, AugmentError> {
    fs::create_dir_all(output_dir).map_err(|err| {
        AugmentError::Filesystem(format!("create {}: {err}", output_dir.display()))
    })?;
    let mut written = Vec::with_capacity(plots.len());
    for plot in plots {
        let path = output_dir.join(plot.file_name());
        fs::write(&path, svg::render(plot)?)
            .map_err(|err| AugmentError::Filesystem(format!("write {}: {err}", path.display())))?;
        written.push(path);
    }
    Ok(written)
}

pub fn run(inputs: &AnalysisInputs, output_dir: &Path) -> Result<AnalysisReport, AugmentError> {
    let plots = build_plots(inputs);
    let written = write_plots(&plots, output_dir)?;
    info!(plots = written.len(), dir = %output_dir.display(), "distribution plots written");
    Ok(AnalysisReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        plots: written
            .iter()
            .map(|path| path.display().to_string())
            .collect(),
    })
}
