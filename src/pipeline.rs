use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::aligner::{AlignmentSummary, AtomSiteAligner};
use crate::catalog::{self, AccessionCatalog};
use crate::cif::{
    BLOCK_SEPARATOR, LOOP_MARKER, LoopTable, append_multi_loop, append_single_loop, append_text,
    ends_with_line, require_line,
};
use crate::config::RunSettings;
use crate::domain::StructureId;
use crate::error::AugmentError;
use crate::fs_util::{collect_inputs, discard, is_input_file, read_lines};
use crate::predictions::PredictionSource;
use crate::provenance::{rewrite_author_block, rewrite_software_block};
use crate::query::QueryRunner;

pub const OUTPUT_SUFFIX: &str = "_augmented.cif";
pub const ATOM_SITE_ANCHOR: &str = "_atom_site.group_PDB";

pub const PROTONATION_METHOD: [(&str, &str); 3] = [
    ("_protonation_method.idx", "1"),
    ("_protonation_method.name", "REDUCE"),
    ("_protonation_method.version", "4.7.210416"),
];

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Augmented {
        output: PathBuf,
        summary: AlignmentSummary,
    },
    AlreadyAugmented {
        output: PathBuf,
    },
    NoPredictions,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Augmented { .. } => "augmented",
            Outcome::AlreadyAugmented { .. } => "already_augmented",
            Outcome::NoPredictions => "no_predictions",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub input: String,
    pub status: String,
    pub output: Option<String>,
    pub merged: Option<usize>,
    pub synthesized: Option<usize>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    pub started_at: String,
    pub augmented: usize,
    pub already_augmented: usize,
    pub no_predictions: usize,
    pub failed: usize,
    pub entries: Vec<BatchEntry>,
}

impl BatchReport {
    fn record(&mut self, input: &Path, outcome: &Outcome) {
        let mut entry = BatchEntry {
            input: input.display().to_string(),
            status: outcome.as_str().to_string(),
            output: None,
            merged: None,
            synthesized: None,
            error: None,
        };
        match outcome {
            Outcome::Augmented { output, summary } => {
                self.augmented += 1;
                entry.output = Some(output.display().to_string());
                entry.merged = Some(summary.merged);
                entry.synthesized = Some(summary.synthesized);
            }
            Outcome::AlreadyAugmented { output } => {
                self.already_augmented += 1;
                entry.output = Some(output.display().to_string());
            }
            Outcome::NoPredictions => self.no_predictions += 1,
        }
        self.entries.push(entry);
    }

    fn record_failure(&mut self, input: &Path, error: &AugmentError) {
        self.failed += 1;
        self.entries.push(BatchEntry {
            input: input.display().to_string(),
            status: "failed".to_string(),
            output: None,
            merged: None,
            synthesized: None,
            error: Some(error.to_string()),
        });
    }
}

/// Drives the augmentation of single models and of whole directories.
pub struct Pipeline<Q: QueryRunner, C: AccessionCatalog> {
    settings: RunSettings,
    runner: Q,
    catalog: C,
}

impl<Q: QueryRunner, C: AccessionCatalog> Pipeline<Q, C> {
    pub fn new(settings: RunSettings, runner: Q, catalog: C) -> Self {
        Self {
            settings,
            runner,
            catalog,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn output_path(&self, id: &StructureId) -> PathBuf {
        self.settings
            .output_dir
            .as_std_path()
            .join(format!("{}{OUTPUT_SUFFIX}", id.model()))
    }

    /// Augments one model file. Nothing is left on disk when a step fails.
    pub fn augment_file(&self, input: &Path) -> Result<Outcome, AugmentError> {
        let id = StructureId::from_path(input)?;
        let output = self.output_path(&id);
        if output.exists() {
            debug!(%id, output = %output.display(), "output exists, skipping");
            return Ok(Outcome::AlreadyAugmented { output });
        }

        let source = PredictionSource::new(&self.runner);
        let Some(entry) = source.entry_id(&id)? else {
            debug!(%id, "no predictions stored");
            return Ok(Outcome::NoPredictions);
        };

        match self.write_augmented(input, &id, entry, &source, &output) {
            Ok(summary) => {
                info!(
                    %id,
                    merged = summary.merged,
                    synthesized = summary.synthesized,
                    "augmented"
                );
                Ok(Outcome::Augmented { output, summary })
            }
            Err(err) => {
                if let Err(cleanup) = discard(&output) {
                    warn!(output = %output.display(), error = %cleanup, "failed to remove partial output");
                }
                Err(err)
            }
        }
    }

    /// Augments a file, or every model below a directory. Per-file failures
    /// are logged and counted; fatal ones abort the batch.
    pub fn run_batch(&self, path: &Path) -> Result<BatchReport, AugmentError> {
        let inputs = if path.is_dir() {
            collect_inputs(path)?
        } else if is_input_file(path) {
            vec![path.to_path_buf()]
        } else {
            return Err(AugmentError::InvalidStructurePath(
                path.display().to_string(),
            ));
        };

        let mut report = BatchReport {
            started_at: chrono::Utc::now().to_rfc3339(),
            ..BatchReport::default()
        };
        info!(inputs = inputs.len(), "starting batch");
        for input in &inputs {
            match self.augment_file(input) {
                Ok(outcome) => report.record(input, &outcome),
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(input = %input.display(), error = %err, "input abandoned");
                    report.record_failure(input, &err);
                }
            }
        }
        Ok(report)
    }

    fn write_augmented(
        &self,
        input: &Path,
        id: &StructureId,
        entry: i64,
        source: &PredictionSource<'_, Q>,
        output: &Path,
    ) -> Result<AlignmentSummary, AugmentError> {
        let lines = read_lines(input)?;
        let entry_name = id.entry_id();

        debug!(%id, "writing identifiers");
        self.write_identifiers(id, output)?;

        debug!(%id, "copying header region");
        let entry_line = require_line(&lines, 0, &format!("_entry.id {entry_name}"))?;
        let group_line = require_line(&lines, entry_line, ATOM_SITE_ANCHOR)?;
        let header_end = if lines[group_line - 1].trim_end() == LOOP_MARKER {
            group_line - 1
        } else {
            group_line
        };
        let mut header = &lines[entry_line + 1..header_end];
        if header
            .first()
            .is_some_and(|line| line.trim_end() == BLOCK_SEPARATOR)
            && ends_with_line(output, BLOCK_SEPARATOR)?
        {
            header = &header[1..];
        }
        append_text(output, &header.concat())?;

        debug!(%id, "writing protonation and predictor loops");
        let protonation = PROTONATION_METHOD
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<IndexMap<_, _>>();
        append_single_loop(output, &protonation)?;

        let predictors = source.active_predictors(entry, &self.settings)?;
        let rows = predictor_rows(&predictors);
        if !rows.is_empty() {
            append_multi_loop(output, "_chemical_shift_predictor", &rows)?;
        }

        debug!(%id, predictors = ?predictors, "aligning atom site");
        let (table, table_end) = LoopTable::read(&lines, group_line)?;
        let shifts = source.shift_tables(entry, &predictors)?;
        let candidates = source.atom_candidates(entry, &self.settings.chain)?;
        let aligner = AtomSiteAligner::new(&table, &predictors, &shifts)?;
        let (block, summary) = aligner.align(&candidates)?;

        let mut text = String::new();
        let opened =
            ends_with_line(output, BLOCK_SEPARATOR)? || ends_with_line(output, LOOP_MARKER)?;
        if !opened {
            text.push_str(BLOCK_SEPARATOR);
            text.push('\n');
        }
        text.push_str(&block.render());
        let trailer = &lines[table_end..];
        if !trailer
            .first()
            .is_some_and(|line| line.trim_end() == BLOCK_SEPARATOR)
        {
            text.push_str(BLOCK_SEPARATOR);
            text.push('\n');
        }
        text.push_str(&trailer.concat());
        append_text(output, &text)?;

        debug!(%id, "rewriting provenance blocks");
        rewrite_software_block(output, &predictors)?;
        rewrite_author_block(output)?;

        Ok(summary)
    }

    fn write_identifiers(&self, id: &StructureId, output: &Path) -> Result<(), AugmentError> {
        let bmrb =
            catalog::bmrb_ids_for_model(self.settings.mapping_file.as_std_path(), id.model())?;
        let mut pdb = BTreeSet::new();
        for bmrb_id in &bmrb {
            pdb.extend(self.catalog.pdb_ids(bmrb_id)?);
        }

        let entry_name = id.entry_id();
        append_text(
            output,
            &format!("data_{entry_name}\n{BLOCK_SEPARATOR}\n_entry.id {entry_name}\n"),
        )?;
        let mut ids = IndexMap::new();
        ids.insert("_ascension_ids.uniprot".to_string(), id.accession().to_string());
        ids.insert("_ascension_ids.bmrb".to_string(), bmrb.join(" "));
        ids.insert(
            "_ascension_ids.pdb".to_string(),
            pdb.into_iter().collect::<Vec<_>>().join(" "),
        );
        append_single_loop(output, &ids)
    }
}

/// Catalogue rows for the given predictors; unknown ids are left out.
pub fn predictor_rows(predictors: &[i64]) -> IndexMap<i64, IndexMap<String, String>> {
    predictors
        .iter()
        .filter_map(|id| catalog::predictor(*id))
        .map(|info| {
            let row = [
                ("idx", info.id.to_string()),
                ("name", info.name.to_string()),
                ("version", info.version.to_string()),
                ("temperature", info.temperature.to_string()),
                ("ph", info.ph.to_string()),
            ]
            .into_iter()
            .map(|(attribute, value)| (format!("_chemical_shift_predictor.{attribute}"), value))
            .collect();
            (info.id, row)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predictor_rows_skip_unknown_ids() {
        let rows = predictor_rows(&[1, 7, 8]);
        assert_eq!(rows.keys().copied().collect::<Vec<_>>(), vec![1, 8]);
        assert_eq!(rows[&8]["_chemical_shift_predictor.name"], "UCBSHIFT");
        assert_eq!(rows[&1]["_chemical_shift_predictor.ph"], ".");
    }

    #[test]
    fn outcome_labels() {
        assert_eq!(Outcome::NoPredictions.as_str(), "no_predictions");
        assert_eq!(
            Outcome::AlreadyAugmented {
                output: PathBuf::from("x")
            }
            .as_str(),
            "already_augmented"
        );
    }
}
