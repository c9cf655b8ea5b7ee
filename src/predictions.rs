use std::collections::BTreeMap;

use crate::config::RunSettings;
use crate::domain::{AtomCandidate, PredictionRecord, StructureId};
use crate::error::AugmentError;
use crate::query::{QueryRunner, Row, SqlValue, Substitutions};

pub const ENTRY_QUERY: &str = "afID_Index";
pub const PREDICTORS_QUERY: &str = "selectUniqueAF_cspID";
pub const SHIFTS_QUERY: &str = "compareCSP";
pub const ATOMS_QUERY: &str = "select_pdbAtoms";

/// Every query a run issues.
pub const REQUIRED_QUERIES: [&str; 4] =
    [ENTRY_QUERY, PREDICTORS_QUERY, SHIFTS_QUERY, ATOMS_QUERY];

/// Predicted shifts per predictor id, ascending.
pub type ShiftTables = BTreeMap<i64, Vec<PredictionRecord>>;

pub struct PredictionSource<'a, Q: QueryRunner> {
    runner: &'a Q,
}

impl<'a, Q: QueryRunner> PredictionSource<'a, Q> {
    pub fn new(runner: &'a Q) -> Self {
        Self { runner }
    }

    /// Database id of the model, `None` when nothing was predicted for it.
    pub fn entry_id(&self, id: &StructureId) -> Result<Option<i64>, AugmentError> {
        let rows = self.runner.run(
            ENTRY_QUERY,
            &Substitutions::new()
                .with("%%%GENOMEID%%%", id.accession())
                .with("%%%PROTEINID%%%", id.model()),
        )?;
        Ok(rows
            .first()
            .and_then(|row| row.get("id"))
            .and_then(SqlValue::as_i64))
    }

    /// Predictors with data for the entry, restricted to the allowed set.
    pub fn active_predictors(
        &self,
        entry: i64,
        settings: &RunSettings,
    ) -> Result<Vec<i64>, AugmentError> {
        let rows = self.runner.run(
            PREDICTORS_QUERY,
            &Substitutions::new().with("%%%AFID%%%", entry),
        )?;
        let mut predictors = rows
            .iter()
            .filter_map(|row| row.get("csp_id").and_then(SqlValue::as_i64))
            .filter(|id| settings.allows(*id))
            .collect::<Vec<_>>();
        predictors.sort_unstable();
        predictors.dedup();
        Ok(predictors)
    }

    pub fn shift_tables(
        &self,
        entry: i64,
        predictors: &[i64],
    ) -> Result<ShiftTables, AugmentError> {
        let mut tables = ShiftTables::new();
        for &predictor in predictors {
            let rows = self.runner.run(
                SHIFTS_QUERY,
                &Substitutions::new()
                    .with("%%%AFID%%%", entry)
                    .with("%%%CSPID%%%", predictor),
            )?;
            let records = rows
                .iter()
                .map(|row| prediction_from_row(row, predictor))
                .collect::<Result<Vec<_>, _>>()?;
            tables.insert(predictor, records);
        }
        Ok(tables)
    }

    /// Atoms of the protonated model, in the order the store returns them.
    pub fn atom_candidates(
        &self,
        entry: i64,
        chain: &str,
    ) -> Result<Vec<AtomCandidate>, AugmentError> {
        let rows = self.runner.run(
            ATOMS_QUERY,
            &Substitutions::new()
                .with("%%%AFID%%%", entry)
                .with("%%%CHAIN%%%", chain),
        )?;
        rows.iter().map(candidate_from_row).collect()
    }
}

fn field<'r>(row: &'r Row, query: &str, name: &str) -> Result<&'r SqlValue, AugmentError> {
    row.get(name)
        .ok_or_else(|| AugmentError::MissingColumn(format!("{query}.{name}")))
}

fn int_field(row: &Row, query: &str, name: &str) -> Result<i64, AugmentError> {
    let value = field(row, query, name)?;
    value.as_i64().ok_or_else(|| AugmentError::InvalidNumber {
        field: format!("{query}.{name}"),
        value: value.to_string(),
    })
}

fn float_field(row: &Row, query: &str, name: &str) -> Result<f64, AugmentError> {
    let value = field(row, query, name)?;
    value.as_f64().ok_or_else(|| AugmentError::InvalidNumber {
        field: format!("{query}.{name}"),
        value: value.to_string(),
    })
}

fn text_field(row: &Row, query: &str, name: &str) -> Result<String, AugmentError> {
    Ok(field(row, query, name)?.to_string())
}

fn prediction_from_row(row: &Row, predictor: i64) -> Result<PredictionRecord, AugmentError> {
    Ok(PredictionRecord {
        residue: int_field(row, SHIFTS_QUERY, "res_sequence")?,
        residue_type: row
            .get("residue_type")
            .map(|value| value.to_string())
            .unwrap_or_default(),
        atom: text_field(row, SHIFTS_QUERY, "atom")?,
        shift: row
            .get("chemical_shift")
            .and_then(SqlValue::as_f64)
            .filter(|value| value.is_finite()),
        predictor,
    })
}

fn candidate_from_row(row: &Row) -> Result<AtomCandidate, AugmentError> {
    Ok(AtomCandidate {
        residue: int_field(row, ATOMS_QUERY, "residue_sequence")?,
        residue_type: text_field(row, ATOMS_QUERY, "residue_type")?,
        element: text_field(row, ATOMS_QUERY, "element")?,
        atom: text_field(row, ATOMS_QUERY, "protein_atom")?,
        x: float_field(row, ATOMS_QUERY, "x_coord")?,
        y: float_field(row, ATOMS_QUERY, "y_coord")?,
        z: float_field(row, ATOMS_QUERY, "z_coord")?,
    })
}
