use std::collections::HashMap;

use serde::Serialize;

use crate::cif::{LoopBlock, LoopTable, NOT_AVAILABLE, PLACEHOLDER};
use crate::domain::{AtomCandidate, PredictionRecord};
use crate::error::AugmentError;
use crate::predictions::ShiftTables;

pub const ATOM_SITE: &str = "_atom_site";
pub const PROTONATED_ATTRIBUTES: [&str; 3] = [
    "Cartn_x_protonated_1",
    "Cartn_y_protonated_1",
    "Cartn_z_protonated_1",
];

/// Attributes a synthesized row copies from the first source row of the
/// same residue.
const RESIDUE_CONTEXT: [&str; 13] = [
    "group_pdb",
    "label_alt_id",
    "label_asym_id",
    "label_entity_id",
    "pdbx_pdb_ins_code",
    "occupancy",
    "b_iso_or_equiv",
    "pdbx_formal_charge",
    "pdbx_pdb_model_num",
    "pdbx_sifts_xref_db_acc",
    "pdbx_sifts_xref_db_name",
    "pdbx_sifts_xref_db_num",
    "pdbx_sifts_xref_db_res",
];

pub fn shift_label(predictor: i64) -> String {
    format!("{ATOM_SITE}.chemical_shift_predictor_{predictor}")
}

/// Shift of `atom` in `residue`. With duplicate residue/atom pairs the last
/// one wins; an absent value at that row yields `None`.
pub fn lookup_shift(records: &[PredictionRecord], residue: i64, atom: &str) -> Option<f64> {
    records
        .iter()
        .filter(|record| record.residue == residue && record.atom == atom)
        .last()
        .and_then(|record| record.shift)
}

pub fn format_decimal(value: f64) -> String {
    format!("{value:.3}")
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AlignmentSummary {
    pub merged: usize,
    pub synthesized: usize,
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    id: usize,
    cartn_x: usize,
    cartn_y: usize,
    cartn_z: usize,
    auth_atom_id: usize,
}

/// Builds the extended `_atom_site` loop from the source table, the
/// protonated atom candidates and the per-predictor shift tables.
pub struct AtomSiteAligner<'a> {
    table: &'a LoopTable,
    predictors: &'a [i64],
    shifts: &'a ShiftTables,
    columns: Columns,
    residues: HashMap<i64, Vec<usize>>,
    next_id: i64,
}

impl<'a> AtomSiteAligner<'a> {
    pub fn new(
        table: &'a LoopTable,
        predictors: &'a [i64],
        shifts: &'a ShiftTables,
    ) -> Result<Self, AugmentError> {
        let columns = Columns {
            id: table.require_column("id")?,
            cartn_x: table.require_column("Cartn_x")?,
            cartn_y: table.require_column("Cartn_y")?,
            cartn_z: table.require_column("Cartn_z")?,
            auth_atom_id: table.require_column("auth_atom_id")?,
        };
        let xref = table.require_column("pdbx_sifts_xref_db_num")?;

        let first = table.value(0, xref);
        let base = first
            .parse::<i64>()
            .map_err(|_| AugmentError::InvalidNumber {
                field: format!("{ATOM_SITE}.pdbx_sifts_xref_db_num"),
                value: first.to_string(),
            })?;
        let offset = base - 1;
        let mut residues: HashMap<i64, Vec<usize>> = HashMap::new();
        for row in 0..table.len() {
            if let Ok(num) = table.value(row, xref).parse::<i64>() {
                residues.entry(num - offset).or_default().push(row);
            }
        }

        let max_id = (0..table.len())
            .filter_map(|row| table.value(row, columns.id).parse::<i64>().ok())
            .max()
            .unwrap_or(0);
        let next_id = max_id.max(table.len() as i64) + 1;

        Ok(Self {
            table,
            predictors,
            shifts,
            columns,
            residues,
            next_id,
        })
    }

    /// Source labels with the protonated coordinates and one shift column
    /// per predictor inserted after `Cartn_z`.
    pub fn labels(&self) -> Vec<String> {
        let mut labels = self.table.labels().to_vec();
        let at = self.columns.cartn_z + 1;
        let extra = PROTONATED_ATTRIBUTES
            .iter()
            .map(|attribute| format!("{ATOM_SITE}.{attribute}"))
            .chain(self.predictors.iter().map(|id| shift_label(*id)));
        let mut tail = labels.split_off(at);
        labels.extend(extra);
        labels.append(&mut tail);
        labels
    }

    pub fn align(
        mut self,
        candidates: &[AtomCandidate],
    ) -> Result<(LoopBlock, AlignmentSummary), AugmentError> {
        let mut block = LoopBlock::new(ATOM_SITE, self.labels());
        let mut summary = AlignmentSummary::default();

        for candidate in candidates {
            let residue_rows = self.residue_rows(candidate.residue);
            let matched = residue_rows.iter().copied().find(|row| {
                self.table.value(*row, self.columns.auth_atom_id) == candidate.atom
            });
            let context = residue_rows.first().copied();
            let mut row = match matched {
                Some(source) => {
                    summary.merged += 1;
                    self.merged_row(source)
                }
                None => {
                    summary.synthesized += 1;
                    self.synthesized_row(candidate, context)
                }
            };
            let mut tail = row.split_off(self.columns.cartn_z + 1);
            row.extend(self.extra_cells(candidate));
            row.append(&mut tail);
            block.push_row(row)?;
        }

        Ok((block, summary))
    }

    /// Source rows of `residue`, in file order.
    pub fn residue_rows(&self, residue: i64) -> &[usize] {
        self.residues
            .get(&residue)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn merged_row(&self, source: usize) -> Vec<String> {
        let coordinates = [self.columns.cartn_x, self.columns.cartn_y, self.columns.cartn_z];
        (0..self.table.labels().len())
            .map(|column| {
                let raw = self.table.value(source, column);
                if coordinates.contains(&column) {
                    raw.parse::<f64>()
                        .map(format_decimal)
                        .unwrap_or_else(|_| raw.to_string())
                } else {
                    raw.to_string()
                }
            })
            .collect()
    }

    fn synthesized_row(&mut self, candidate: &AtomCandidate, context: Option<usize>) -> Vec<String> {
        let id = self.next_id;
        self.next_id += 1;

        self.table
            .labels()
            .iter()
            .enumerate()
            .map(|(column, label)| {
                let attribute = label
                    .split_once('.')
                    .map(|(_, name)| name.to_ascii_lowercase())
                    .unwrap_or_default();
                match attribute.as_str() {
                    "id" => id.to_string(),
                    "type_symbol" => candidate.element.clone(),
                    "label_atom_id" => candidate.atom.clone(),
                    "label_comp_id" => candidate.residue_type.clone(),
                    "label_seq_id" => candidate.residue.to_string(),
                    name if RESIDUE_CONTEXT.contains(&name) => context
                        .map(|row| self.table.value(row, column).to_string())
                        .unwrap_or_else(|| PLACEHOLDER.to_string()),
                    _ => PLACEHOLDER.to_string(),
                }
            })
            .collect()
    }

    fn extra_cells(&self, candidate: &AtomCandidate) -> Vec<String> {
        let mut cells = vec![
            format_decimal(candidate.x),
            format_decimal(candidate.y),
            format_decimal(candidate.z),
        ];
        for predictor in self.predictors {
            let value = self
                .shifts
                .get(predictor)
                .and_then(|records| lookup_shift(records, candidate.residue, &candidate.atom));
            cells.push(
                value
                    .map(format_decimal)
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            );
        }
        cells
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(residue: i64, atom: &str, shift: Option<f64>) -> PredictionRecord {
        PredictionRecord {
            residue,
            residue_type: "ALA".to_string(),
            atom: atom.to_string(),
            shift,
            predictor: 1,
        }
    }

    #[test]
    fn lookup_returns_last_duplicate() {
        let records = vec![
            record(12, "CA", Some(52.1)),
            record(12, "CB", Some(19.0)),
            record(12, "CA", Some(52.9)),
        ];
        assert_eq!(lookup_shift(&records, 12, "CA"), Some(52.9));
        assert_eq!(lookup_shift(&records, 13, "CA"), None);
    }

    #[test]
    fn lookup_matches_first_row_too() {
        let records = vec![record(1, "N", Some(120.25))];
        assert_eq!(lookup_shift(&records, 1, "N"), Some(120.25));
    }

    #[test]
    fn absent_value_at_last_match_is_none() {
        let records = vec![record(4, "H", Some(8.1)), record(4, "H", None)];
        assert_eq!(lookup_shift(&records, 4, "H"), None);
    }

    fn source_table() -> LoopTable {
        let lines = [
            "_atom_site.id",
            "_atom_site.Cartn_x",
            "_atom_site.Cartn_y",
            "_atom_site.Cartn_z",
            "_atom_site.auth_atom_id",
            "_atom_site.pdbx_sifts_xref_db_num",
            "1 1.0 2.0 3.0 N  5",
            "2 1.5 2.5 3.5 CA 5",
            "3 4.0 5.0 6.0 N  7",
            "#",
        ];
        LoopTable::read(&lines, 0).unwrap().0
    }

    #[test]
    fn residues_are_indexed_from_xref_offset() {
        let table = source_table();
        let shifts = ShiftTables::new();
        let aligner = AtomSiteAligner::new(&table, &[], &shifts).unwrap();
        assert_eq!(aligner.residue_rows(1), &[0, 1]);
        assert_eq!(aligner.residue_rows(3), &[2]);
        assert!(aligner.residue_rows(2).is_empty());
        assert!(aligner.residue_rows(5).is_empty());
    }

    #[test]
    fn candidates_merge_within_their_residue_only() {
        let table = source_table();
        let shifts = ShiftTables::new();
        let aligner = AtomSiteAligner::new(&table, &[], &shifts).unwrap();
        let candidate = |residue: i64, atom: &str| AtomCandidate {
            residue,
            residue_type: "GLY".to_string(),
            element: atom[..1].to_string(),
            atom: atom.to_string(),
            x: 0.0,
            y: 0.0,
            z: 0.0,
        };
        let (block, summary) = aligner
            .align(&[candidate(3, "N"), candidate(3, "CA")])
            .unwrap();
        assert_eq!(summary, AlignmentSummary { merged: 1, synthesized: 1 });
        assert_eq!(block.rows()[0][1], "4.000");
        assert_eq!(block.rows()[1][0], "4");
        assert_eq!(block.rows()[1][1], "?");
    }
}
